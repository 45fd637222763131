//! Routine lifecycle controller.
//!
//! Owns start/stop orchestration for the single background routine and
//! drives enablement and log lines into the presentation collaborator.

use crate::cli::{build_config, Cli};
use crate::model::{RoutineConfig, RoutineEvent, RoutineOutcome, SettingsDraft};
use crate::routine::{RoutineHandle, RoutineLauncher, TokioRoutineLauncher};
use crate::settings::{SettingsBackend, SettingsStore};
use crate::view::{ChannelView, RoutineView, UiEvent};
use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::session::SettingsSessionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleState {
    Idle,
    Running,
    StopRequested,
}

/// Commands emitted by UI layers to control the routine and its settings.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    /// Start the routine from the current form values.
    Start(SettingsDraft),
    Stop,
    OpenSettings,
    /// Save the staged session values and close the session.
    SaveSettings(SettingsDraft),
    CancelSettings,
    Quit,
}

/// At most one routine runs at a time; this controller owns the only handle.
pub(crate) struct RoutineController<V, L: RoutineLauncher> {
    view: V,
    launcher: L,
    events: UnboundedSender<RoutineEvent>,
    active: Option<L::Handle>,
    state: LifecycleState,
    stop_timeout: Duration,
}

impl<V: RoutineView, L: RoutineLauncher> RoutineController<V, L> {
    pub fn new(
        view: V,
        launcher: L,
        events: UnboundedSender<RoutineEvent>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            view,
            launcher,
            events,
            active: None,
            state: LifecycleState::Idle,
            stop_timeout,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == LifecycleState::Idle
    }

    /// Launch a new routine worker.
    ///
    /// Rejected unless idle. The UI disables the start action while a
    /// routine runs, but the single-worker invariant holds even if a start
    /// slips through, and the existing handle is left untouched.
    pub fn start(&mut self, cfg: RoutineConfig) -> Result<()> {
        if self.state != LifecycleState::Idle {
            bail!("routine already running");
        }
        let handle = self.launcher.launch(cfg, self.events.clone())?;
        self.active = Some(handle);
        self.state = LifecycleState::Running;
        self.view.log("Routine started.");
        self.view.set_all_inputs_enabled(false);
        self.view.set_start_enabled(false);
        self.view.set_stop_enabled(true);
        self.view.set_settings_enabled(false);
        Ok(())
    }

    /// Signal the routine to stop and wait a bounded time for it to finish.
    ///
    /// Returns `true` when the routine is known finished (or none was
    /// running). This can block the caller for up to the stop timeout; a
    /// window-close handler going through here must expect a multi-second
    /// delay. The handle is never cleared here — completion is the sole
    /// authority.
    pub async fn stop(&mut self) -> bool {
        match self.state {
            LifecycleState::Idle => {
                self.view.log("No routine running.");
                true
            }
            LifecycleState::StopRequested => {
                self.view.log("Stop already requested.");
                false
            }
            LifecycleState::Running => {
                let Some(handle) = self.active.as_mut() else {
                    return true;
                };
                self.view.log("Stopping routine…");
                handle.request_stop();
                self.state = LifecycleState::StopRequested;
                let finished = handle.await_finished(self.stop_timeout).await;
                if !finished {
                    self.view.log_warn(&format!(
                        "Routine did not confirm termination within {}; \
                         it may still be winding down.",
                        humantime::format_duration(self.stop_timeout)
                    ));
                }
                finished
            }
        }
    }

    /// Completion notification, driven by the worker's `Finished` event.
    ///
    /// The single place the handle is cleared. Idempotent: a duplicate
    /// invocation is a no-op and cannot corrupt a subsequent start.
    pub fn routine_finished(&mut self) {
        if self.active.take().is_none() {
            return;
        }
        self.state = LifecycleState::Idle;
        self.view.log("Routine finished.");
        self.view.set_all_inputs_enabled(true);
        self.view.set_start_enabled(true);
        self.view.set_stop_enabled(false);
        self.view.set_settings_enabled(true);
    }
}

/// Orchestrate the routine and settings session based on UI commands,
/// forwarding worker events back to the presentation layer.
pub(crate) async fn run_controller(
    args: &Cli,
    store: &mut SettingsStore,
    backend: &dyn SettingsBackend,
    ui_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let (event_tx, mut event_rx) = unbounded_channel::<RoutineEvent>();
    let view = ChannelView::new(ui_tx.clone());
    let mut controller = RoutineController::new(
        view.clone(),
        TokioRoutineLauncher,
        event_tx,
        args.stop_timeout.into(),
    );
    let mut session = SettingsSessionController::new();

    if let Err(e) = store.load(backend) {
        view.log_error(&format!("Failed to load settings: {e:#}"));
    }
    match store.decode_draft() {
        Ok(draft) => view.seed_form(draft),
        Err(e) => view.log_error(&format!("Settings are corrupt: {e:#}")),
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Start(draft)) => {
                        let cfg = build_config(&draft, store, args);
                        if let Err(e) = controller.start(cfg) {
                            view.log_error(&format!("{e:#}"));
                        }
                    }
                    Some(UiCommand::Stop) => {
                        controller.stop().await;
                    }
                    Some(UiCommand::OpenSettings) => {
                        if let Err(e) = session.open(controller.state(), store, &view) {
                            view.log_error(&format!("{e:#}"));
                        }
                    }
                    Some(UiCommand::SaveSettings(draft)) => {
                        if let Err(e) = session.commit(&draft, store, backend, &view) {
                            view.log_error(&format!("{e:#}"));
                        }
                    }
                    Some(UiCommand::CancelSettings) => {
                        session.close(&view);
                    }
                    Some(UiCommand::Quit) | None => {
                        // Window-close counts as the session's one close.
                        if session.is_open() {
                            session.close(&view);
                        }
                        // Quit gives the routine its bounded chance to stop,
                        // then exits regardless; a stuck worker is logged,
                        // not waited on forever.
                        if !controller.is_idle() {
                            controller.stop().await;
                        }
                        break;
                    }
                }
            }
            ev = event_rx.recv() => {
                match ev {
                    Some(RoutineEvent::PhaseStarted { phase }) => {
                        let _ = ui_tx.send(UiEvent::Phase(phase));
                        view.log(&format!("Phase: {}", phase.label()));
                    }
                    Some(RoutineEvent::Info(info)) => {
                        view.log(&info.to_message());
                    }
                    Some(RoutineEvent::Finished { outcome }) => {
                        match &outcome {
                            RoutineOutcome::Failed { .. } => view.log_error(&outcome.describe()),
                            _ => view.log(&outcome.describe()),
                        }
                        controller.routine_finished();
                    }
                    // The controller keeps a sender alive, so this arm is
                    // unreachable in practice.
                    None => {}
                }
            }
        }
    }

    let _ = ui_tx.send(UiEvent::Shutdown);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Browser, World};
    use crate::view::test_support::RecordingView;
    use clap::Parser;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockLauncher {
        launched: Arc<AtomicUsize>,
        finish_within_bound: bool,
        stopped: Arc<AtomicBool>,
    }

    struct MockHandle {
        stopped: Arc<AtomicBool>,
        finish_within_bound: bool,
    }

    impl RoutineLauncher for MockLauncher {
        type Handle = MockHandle;

        fn launch(
            &self,
            _cfg: RoutineConfig,
            _events: UnboundedSender<RoutineEvent>,
        ) -> Result<MockHandle> {
            self.launched.fetch_add(1, Ordering::SeqCst);
            Ok(MockHandle {
                stopped: self.stopped.clone(),
                finish_within_bound: self.finish_within_bound,
            })
        }
    }

    impl RoutineHandle for MockHandle {
        fn request_stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        async fn await_finished(&mut self, _timeout: Duration) -> bool {
            self.finish_within_bound
        }
    }

    fn test_config() -> RoutineConfig {
        RoutineConfig {
            username: "alice".to_string(),
            password: "secret".to_string(),
            world: World::One,
            browser: Browser::Chrome,
            move_options: Default::default(),
            tasks: Default::default(),
            use_protection_spell: false,
            protection_spell: None,
            use_special_skill: false,
            driver_path: None,
            binary_path: None,
            step_pause: Duration::from_millis(1),
        }
    }

    fn controller_with(
        launcher: MockLauncher,
    ) -> (RoutineController<RecordingView, MockLauncher>, RecordingView) {
        let view = RecordingView::default();
        let (event_tx, _event_rx) = unbounded_channel();
        let controller =
            RoutineController::new(view.clone(), launcher, event_tx, Duration::from_millis(10));
        (controller, view)
    }

    #[test]
    fn start_while_running_is_rejected_and_leaves_handle() {
        let launcher = MockLauncher {
            finish_within_bound: true,
            ..Default::default()
        };
        let launched = launcher.launched.clone();
        let (mut controller, _view) = controller_with(launcher);

        controller.start(test_config()).expect("first start");
        let err = controller
            .start(test_config())
            .expect_err("second start must fail");
        assert!(err.to_string().contains("already running"));
        assert_eq!(launched.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), LifecycleState::Running);
    }

    #[test]
    fn start_drives_enablement() {
        let (mut controller, view) = controller_with(MockLauncher::default());

        controller.start(test_config()).expect("start");
        let calls = view.calls();
        assert!(calls.contains(&"inputs:false".to_string()));
        assert!(calls.contains(&"start:false".to_string()));
        assert!(calls.contains(&"stop:true".to_string()));
        assert!(calls.contains(&"settings:false".to_string()));
    }

    #[tokio::test]
    async fn stop_then_finished_restores_exactly_once() {
        let launcher = MockLauncher {
            finish_within_bound: true,
            ..Default::default()
        };
        let stopped = launcher.stopped.clone();
        let (mut controller, view) = controller_with(launcher);

        controller.start(test_config()).expect("start");
        view.take_calls();

        assert!(controller.stop().await);
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(controller.state(), LifecycleState::StopRequested);

        // Worker finishes right as the stop lands: the race resolves to a
        // single restore because completion alone clears the handle.
        controller.routine_finished();
        controller.routine_finished();

        let restores = view
            .calls()
            .iter()
            .filter(|c| c.as_str() == "inputs:true")
            .count();
        assert_eq!(restores, 1);
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn stop_without_routine_is_a_logged_noop() {
        let (mut controller, view) = controller_with(MockLauncher::default());
        assert!(controller.stop().await);
        assert!(view.calls().iter().any(|c| c.contains("No routine running")));
        assert_eq!(controller.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn stop_timeout_is_a_warning_not_an_error() {
        let launcher = MockLauncher {
            finish_within_bound: false,
            ..Default::default()
        };
        let (mut controller, view) = controller_with(launcher);

        controller.start(test_config()).expect("start");
        assert!(!controller.stop().await);

        assert!(view.calls().iter().any(|c| c.starts_with("warn:")));
        // Control returned; the handle stays until completion reports in.
        assert_eq!(controller.state(), LifecycleState::StopRequested);
    }

    /// Drives the whole stack: command loop, real tokio launcher and engine,
    /// event forwarding, and enablement restore on completion.
    #[tokio::test]
    async fn scripted_end_to_end_lifecycle() {
        let args = Cli::parse_from([
            "routine-bot",
            "--step-pause",
            "1ms",
            "--stop-timeout",
            "500ms",
        ]);
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = crate::settings::JsonFileSettings::new(temp.path().join("settings.json"));
        let mut store = SettingsStore::new();

        let (ui_tx, mut ui_rx) = unbounded_channel::<UiEvent>();
        let (cmd_tx, cmd_rx) = unbounded_channel::<UiCommand>();

        let mut draft = SettingsDraft::default();
        draft.username = "alice".to_string();
        draft.password = "secret".to_string();
        draft.tasks.insert(crate::model::RoutineTask::CollectResources);

        let controller_fut = run_controller(&args, &mut store, &backend, ui_tx, cmd_rx);

        let script = async move {
            cmd_tx
                .send(UiCommand::Start(draft))
                .expect("send start");
            let mut logs = Vec::new();
            let mut restores = 0usize;
            while let Some(ev) = ui_rx.recv().await {
                match ev {
                    UiEvent::Log(_, line) => {
                        let completed = line.contains("Routine completed");
                        logs.push(line);
                        if completed {
                            cmd_tx.send(UiCommand::Quit).expect("send quit");
                        }
                    }
                    UiEvent::SetAllInputsEnabled(true) => restores += 1,
                    UiEvent::Shutdown => break,
                    _ => {}
                }
            }
            (logs, restores)
        };

        let (res, (logs, restores)) = tokio::join!(controller_fut, script);
        res.expect("controller loop");

        assert!(logs.iter().any(|l| l.contains("Routine started.")));
        assert!(logs.iter().any(|l| l.contains("Phase: Login")));
        assert!(logs.iter().any(|l| l.contains("Routine finished.")));
        assert_eq!(restores, 1);
    }

    #[test]
    fn restart_after_finish_succeeds() {
        let launcher = MockLauncher::default();
        let launched = launcher.launched.clone();
        let (mut controller, _view) = controller_with(launcher);

        controller.start(test_config()).expect("first start");
        controller.routine_finished();
        controller.start(test_config()).expect("second start");
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }
}
