use crate::model::{
    Browser, MoveType, RoutineConfig, RoutineEvent, RoutineOutcome, RoutineTask, SettingsDraft,
    World,
};
use crate::orchestrator::RoutineController;
use crate::routine::TokioRoutineLauncher;
use crate::settings::{JsonFileSettings, SettingsStore};
use crate::view::RoutineView;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
pub(crate) enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
pub(crate) fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "routine-bot",
    version,
    about = "Browser-game routine automation bot with optional TUI"
)]
pub struct Cli {
    /// Run the routine once in text mode and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Settings file location (defaults to the platform config directory)
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Bounded wait for the routine to stop cooperatively
    #[arg(long, default_value = "2s")]
    pub stop_timeout: humantime::Duration,

    /// Pacing between automation sub-steps
    #[arg(long, default_value = "500ms")]
    pub step_pause: humantime::Duration,

    /// Start the routine immediately after launch (TUI mode)
    #[arg(long)]
    pub start_on_launch: bool,

    /// Override the saved username
    #[arg(long)]
    pub username: Option<String>,

    /// Override the saved password
    #[arg(long)]
    pub password: Option<String>,

    /// Override the saved world (e.g. ONE)
    #[arg(long, value_parser = parse_world)]
    pub world: Option<World>,

    /// Override the saved browser (e.g. CHROME)
    #[arg(long, value_parser = parse_browser)]
    pub browser: Option<Browser>,

    /// Allowed movement option, repeatable (e.g. BLUE_SPHERE); overrides the saved selection
    #[arg(long = "move-option", value_parser = parse_move_type)]
    pub move_option: Vec<MoveType>,

    /// Task to run, repeatable (e.g. COLLECT_RESOURCES); overrides the saved selection
    #[arg(long = "task", value_parser = parse_task)]
    pub task: Vec<RoutineTask>,

    /// Override the saved protection spell toggle
    #[arg(long, action = clap::ArgAction::Set)]
    pub use_protection_spell: Option<bool>,

    /// Override the saved protection spell name
    #[arg(long)]
    pub protection_spell: Option<String>,

    /// Override the saved special skill toggle
    #[arg(long, action = clap::ArgAction::Set)]
    pub use_special_skill: Option<bool>,

    /// Override the configured driver path for the chosen browser
    #[arg(long)]
    pub driver: Option<PathBuf>,

    /// Override the configured browser binary path
    #[arg(long)]
    pub binary: Option<PathBuf>,
}

fn parse_world(s: &str) -> Result<World, String> {
    World::from_wire(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown world `{s}`"))
}

fn parse_browser(s: &str) -> Result<Browser, String> {
    Browser::from_wire(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown browser `{s}`"))
}

fn parse_move_type(s: &str) -> Result<MoveType, String> {
    MoveType::from_wire(&s.to_ascii_uppercase())
        .ok_or_else(|| format!("unknown movement option `{s}`"))
}

fn parse_task(s: &str) -> Result<RoutineTask, String> {
    RoutineTask::from_wire(&s.to_ascii_uppercase()).ok_or_else(|| format!("unknown task `{s}`"))
}

pub async fn run(args: Cli) -> Result<()> {
    let backend = match &args.settings_file {
        Some(path) => JsonFileSettings::new(path.clone()),
        None => JsonFileSettings::default_location()?,
    };
    let store = SettingsStore::new();

    if !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, store, backend).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args, store, backend).await;
        }
    }

    run_text(args, store, backend).await
}

/// Build a `RoutineConfig` from the staged form values, the store's typed
/// getters, and CLI overrides.
pub(crate) fn build_config(draft: &SettingsDraft, store: &SettingsStore, args: &Cli) -> RoutineConfig {
    let browser = args
        .browser
        .or(draft.browser)
        .unwrap_or(Browser::Chrome);
    let protection_spell = args
        .protection_spell
        .clone()
        .or_else(|| store.protection_spell().map(str::to_string))
        .filter(|s| !s.is_empty());

    RoutineConfig {
        username: args
            .username
            .clone()
            .unwrap_or_else(|| draft.username.clone()),
        password: args
            .password
            .clone()
            .unwrap_or_else(|| draft.password.clone()),
        world: args.world.or(draft.world).unwrap_or(World::One),
        browser,
        move_options: if args.move_option.is_empty() {
            draft.move_options.clone()
        } else {
            args.move_option.iter().copied().collect()
        },
        tasks: if args.task.is_empty() {
            draft.tasks.clone()
        } else {
            args.task.iter().copied().collect()
        },
        use_protection_spell: args
            .use_protection_spell
            .unwrap_or(draft.use_protection_spell),
        protection_spell,
        use_special_skill: args.use_special_skill.unwrap_or(draft.use_special_skill),
        driver_path: args
            .driver
            .clone()
            .or_else(|| store.driver_for(browser).map(PathBuf::from)),
        binary_path: args
            .binary
            .clone()
            .or_else(|| store.browser_binary().map(PathBuf::from)),
        step_pause: args.step_pause.into(),
    }
}

/// Headless presentation: log lines go through the blocking writer task;
/// enablement notifications only matter to the TUI and become dev traces.
#[derive(Clone)]
struct ConsoleView {
    out: mpsc::UnboundedSender<OutputLine>,
}

impl RoutineView for ConsoleView {
    fn set_all_inputs_enabled(&self, enabled: bool) {
        tracing::debug!(enabled, "set_all_inputs_enabled");
    }

    fn set_start_enabled(&self, enabled: bool) {
        tracing::debug!(enabled, "set_start_enabled");
    }

    fn set_stop_enabled(&self, enabled: bool) {
        tracing::debug!(enabled, "set_stop_enabled");
    }

    fn set_settings_enabled(&self, enabled: bool) {
        tracing::debug!(enabled, "set_settings_enabled");
    }

    fn log(&self, message: &str) {
        let _ = self.out.send(OutputLine::Stderr(message.to_string()));
    }

    fn log_warn(&self, message: &str) {
        let _ = self.out.send(OutputLine::Stderr(format!("warning: {message}")));
    }

    fn log_error(&self, message: &str) {
        let _ = self.out.send(OutputLine::Stderr(format!("error: {message}")));
    }

    fn seed_form(&self, _draft: SettingsDraft) {}

    fn show_session(&self, _draft: SettingsDraft) {}

    fn hide_session(&self) {}
}

/// Run the routine once without a TUI. Ctrl-C requests the bounded stop.
async fn run_text(args: Cli, mut store: SettingsStore, backend: JsonFileSettings) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();

    if let Err(e) = store.load(&backend) {
        let _ = out_tx.send(OutputLine::Stderr(format!("Failed to load settings: {e:#}")));
    }
    let draft = store
        .decode_draft()
        .with_context(|| format!("settings at {} are corrupt", backend.path().display()))?;
    let cfg = build_config(&draft, &store, &args);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RoutineEvent>();
    let view = ConsoleView {
        out: out_tx.clone(),
    };
    let mut controller = RoutineController::new(
        view,
        TokioRoutineLauncher,
        event_tx,
        args.stop_timeout.into(),
    );
    controller.start(cfg)?;

    let mut outcome: Option<RoutineOutcome> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                // A timed-out stop means the worker is beyond our control;
                // do not sit waiting for a Finished that may never come.
                if !controller.stop().await {
                    break;
                }
            }
            ev = event_rx.recv() => {
                match ev {
                    Some(RoutineEvent::PhaseStarted { phase }) => {
                        let _ = out_tx.send(OutputLine::Stderr(format!("== {} ==", phase.label())));
                    }
                    Some(RoutineEvent::Info(info)) => {
                        let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
                    }
                    Some(RoutineEvent::Finished { outcome: o }) => {
                        controller.routine_finished();
                        outcome = Some(o);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let Some(outcome) = outcome else {
        let _ = out_tx.send(OutputLine::Stdout(
            "Routine did not stop in time; exiting.".to_string(),
        ));
        drop(out_tx);
        let _ = out_handle.await;
        return Ok(());
    };
    let _ = out_tx.send(OutputLine::Stdout(outcome.describe()));

    drop(out_tx);
    let _ = out_handle.await;

    match outcome {
        RoutineOutcome::Failed { message } => Err(anyhow!(message)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Cli {
        let mut full = vec!["routine-bot"];
        full.extend_from_slice(argv);
        Cli::parse_from(full)
    }

    #[test]
    fn overrides_win_over_draft_and_store() {
        let mut draft = SettingsDraft::default();
        draft.username = "saved".to_string();
        draft.browser = Some(Browser::Firefox);
        draft.tasks.insert(RoutineTask::TrainSkill);

        let mut store = SettingsStore::new();
        store.set("driver@CHROME", "/opt/chromedriver");

        let cli = args(&[
            "--username",
            "cli-user",
            "--browser",
            "CHROME",
            "--task",
            "DELIVER_GOODS",
        ]);
        let cfg = build_config(&draft, &store, &cli);

        assert_eq!(cfg.username, "cli-user");
        assert_eq!(cfg.browser, Browser::Chrome);
        assert_eq!(
            cfg.tasks.iter().copied().collect::<Vec<_>>(),
            [RoutineTask::DeliverGoods]
        );
        assert_eq!(cfg.driver_path, Some(PathBuf::from("/opt/chromedriver")));
    }

    #[test]
    fn draft_values_used_without_overrides() {
        let mut draft = SettingsDraft::default();
        draft.username = "saved".to_string();
        draft.world = Some(World::Three);
        draft.use_special_skill = true;

        let store = SettingsStore::new();
        let cfg = build_config(&draft, &store, &args(&[]));

        assert_eq!(cfg.username, "saved");
        assert_eq!(cfg.world, World::Three);
        assert!(cfg.use_special_skill);
        assert_eq!(cfg.driver_path, None);
    }

    #[test]
    fn unknown_enum_argument_is_rejected() {
        let result = Cli::try_parse_from(["routine-bot", "--world", "FORTY_TWO"]);
        assert!(result.is_err());
    }
}
