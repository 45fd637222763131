//! Settings session synchronization.
//!
//! Opening a session freezes the main lifecycle controls for its whole
//! duration; commit stages the draft through the codec into the store and
//! persists it; close restores the controls. Close runs once per opened
//! session no matter how the session ends (save, cancel, window close).

use super::controller::LifecycleState;
use crate::model::SettingsDraft;
use crate::settings::{SettingsBackend, SettingsStore};
use crate::view::RoutineView;
use anyhow::{bail, Result};

#[derive(Debug, Default)]
pub(crate) struct SettingsSessionController {
    open: bool,
}

impl SettingsSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the modal settings session, staged with the current store.
    ///
    /// Rejected while a routine runs; the settings action is disabled then,
    /// but misuse must not slip through. A corrupt store also surfaces here
    /// instead of opening a session over silently-dropped entries.
    pub fn open(
        &mut self,
        lifecycle: LifecycleState,
        store: &SettingsStore,
        view: &impl RoutineView,
    ) -> Result<()> {
        if lifecycle != LifecycleState::Idle {
            bail!("cannot open settings while the routine is running");
        }
        if self.open {
            bail!("settings session already open");
        }
        let draft = store.decode_draft()?;
        self.open = true;
        view.set_all_inputs_enabled(false);
        view.set_start_enabled(false);
        view.set_stop_enabled(false);
        view.set_settings_enabled(false);
        view.show_session(draft);
        Ok(())
    }

    /// Apply every stageable field from the session and persist.
    ///
    /// Persistence is best effort: a save failure is logged and the session
    /// still closes with the new values in memory.
    pub fn commit(
        &mut self,
        draft: &SettingsDraft,
        store: &mut SettingsStore,
        backend: &dyn SettingsBackend,
        view: &impl RoutineView,
    ) -> Result<()> {
        if !self.open {
            bail!("no settings session open");
        }
        store.apply_draft(draft);
        match store.save(backend) {
            Ok(()) => view.log("Settings saved."),
            Err(e) => view.log_error(&format!("Failed to save settings: {e:#}")),
        }
        self.close(view);
        Ok(())
    }

    /// Drop the session and restore the main controls.
    ///
    /// Safe to call repeatedly; only the first close per session acts.
    pub fn close(&mut self, view: &impl RoutineView) {
        if !self.open {
            return;
        }
        self.open = false;
        view.hide_session();
        view.set_all_inputs_enabled(true);
        view.set_start_enabled(true);
        view.set_stop_enabled(false);
        view.set_settings_enabled(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoutineTask;
    use crate::view::test_support::RecordingView;
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingBackend {
        saved: Arc<Mutex<Option<HashMap<String, String>>>>,
        fail_save: bool,
    }

    impl SettingsBackend for RecordingBackend {
        fn load_all(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }

        fn save_all(&self, entries: &HashMap<String, String>) -> Result<()> {
            if self.fail_save {
                return Err(anyhow!("disk full"));
            }
            *self.saved.lock().unwrap() = Some(entries.clone());
            Ok(())
        }
    }

    #[test]
    fn open_while_running_is_rejected() {
        let mut session = SettingsSessionController::new();
        let store = SettingsStore::new();
        let view = RecordingView::default();

        let err = session
            .open(LifecycleState::Running, &store, &view)
            .expect_err("open while running must fail");
        assert!(err.to_string().contains("running"));
        assert!(!session.is_open());
        assert!(view.calls().is_empty());
    }

    #[test]
    fn open_disables_everything_and_stages_draft() {
        let mut session = SettingsSessionController::new();
        let store = SettingsStore::new();
        let view = RecordingView::default();

        session
            .open(LifecycleState::Idle, &store, &view)
            .expect("open");
        let calls = view.calls();
        assert!(calls.contains(&"inputs:false".to_string()));
        assert!(calls.contains(&"start:false".to_string()));
        assert!(calls.contains(&"stop:false".to_string()));
        assert!(calls.contains(&"settings:false".to_string()));
        assert!(calls.contains(&"session:open".to_string()));
    }

    #[test]
    fn double_close_is_a_noop() {
        let mut session = SettingsSessionController::new();
        let store = SettingsStore::new();
        let view = RecordingView::default();

        session
            .open(LifecycleState::Idle, &store, &view)
            .expect("open");
        view.take_calls();

        session.close(&view);
        let first = view.take_calls();
        assert!(first.contains(&"session:close".to_string()));
        assert!(first.contains(&"inputs:true".to_string()));

        session.close(&view);
        assert!(view.calls().is_empty());
    }

    #[test]
    fn commit_writes_store_persists_and_closes() {
        let mut session = SettingsSessionController::new();
        let mut store = SettingsStore::new();
        let backend = RecordingBackend::default();
        let view = RecordingView::default();

        session
            .open(LifecycleState::Idle, &store, &view)
            .expect("open");

        let mut draft = SettingsDraft::default();
        draft.username = "alice".to_string();
        draft.tasks.insert(RoutineTask::DeliverGoods);
        session
            .commit(&draft, &mut store, &backend, &view)
            .expect("commit");

        assert_eq!(store.get("username"), "alice");
        assert_eq!(store.get("task@DELIVER_GOODS"), "true");
        assert_eq!(store.get("task@COLLECT_RESOURCES"), "false");

        let saved = backend.saved.lock().unwrap().clone().expect("saved");
        assert_eq!(saved.get("username").map(String::as_str), Some("alice"));
        assert!(!session.is_open());
    }

    #[test]
    fn commit_save_failure_is_logged_and_still_closes() {
        let mut session = SettingsSessionController::new();
        let mut store = SettingsStore::new();
        let backend = RecordingBackend {
            fail_save: true,
            ..Default::default()
        };
        let view = RecordingView::default();

        session
            .open(LifecycleState::Idle, &store, &view)
            .expect("open");
        session
            .commit(&SettingsDraft::default(), &mut store, &backend, &view)
            .expect("commit");

        assert!(view
            .calls()
            .iter()
            .any(|c| c.starts_with("error:") && c.contains("disk full")));
        assert!(!session.is_open());
    }

    #[test]
    fn commit_without_open_session_is_rejected() {
        let mut session = SettingsSessionController::new();
        let mut store = SettingsStore::new();
        let backend = RecordingBackend::default();
        let view = RecordingView::default();

        let err = session
            .commit(&SettingsDraft::default(), &mut store, &backend, &view)
            .expect_err("commit without session must fail");
        assert!(err.to_string().contains("no settings session"));
    }
}
