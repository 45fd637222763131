//! Presentation collaborator contract.
//!
//! Controllers never touch widgets; they talk to a [`RoutineView`] and the
//! presentation layer (TUI or text mode) decides what enablement and log
//! lines look like. The channel-backed impl keeps all widget mutation on the
//! UI thread: controllers emit [`UiEvent`]s, the UI drains them.

use crate::model::{RoutinePhase, SettingsDraft};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Events emitted toward presentation layers.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Log(LogLevel, String),
    SetAllInputsEnabled(bool),
    SetStartEnabled(bool),
    SetStopEnabled(bool),
    SetSettingsEnabled(bool),
    Phase(RoutinePhase),
    /// Seed the main form with decoded settings at startup.
    SeedForm(SettingsDraft),
    /// Open the modal settings session, staged with the current store.
    SessionOpened(SettingsDraft),
    SessionClosed,
    /// The controller loop is done; the UI should exit.
    Shutdown,
}

/// What the coordinators need from a presentation layer.
pub trait RoutineView {
    fn set_all_inputs_enabled(&self, enabled: bool);
    fn set_start_enabled(&self, enabled: bool);
    fn set_stop_enabled(&self, enabled: bool);
    fn set_settings_enabled(&self, enabled: bool);
    fn log(&self, message: &str);
    fn log_warn(&self, message: &str);
    fn log_error(&self, message: &str);
    /// Stage the given draft into the main form fields.
    fn seed_form(&self, draft: SettingsDraft);
    /// Open the modal settings surface staged with the given draft.
    fn show_session(&self, draft: SettingsDraft);
    /// Drop the modal settings surface, if shown.
    fn hide_session(&self);
}

/// View backed by the [`UiEvent`] channel. Clones share the same UI sink.
#[derive(Debug, Clone)]
pub struct ChannelView {
    tx: UnboundedSender<UiEvent>,
}

impl ChannelView {
    pub fn new(tx: UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: UiEvent) {
        // A closed UI means we are shutting down; nothing left to present.
        let _ = self.tx.send(event);
    }
}

impl RoutineView for ChannelView {
    fn set_all_inputs_enabled(&self, enabled: bool) {
        self.send(UiEvent::SetAllInputsEnabled(enabled));
    }

    fn set_start_enabled(&self, enabled: bool) {
        self.send(UiEvent::SetStartEnabled(enabled));
    }

    fn set_stop_enabled(&self, enabled: bool) {
        self.send(UiEvent::SetStopEnabled(enabled));
    }

    fn set_settings_enabled(&self, enabled: bool) {
        self.send(UiEvent::SetSettingsEnabled(enabled));
    }

    fn log(&self, message: &str) {
        self.send(UiEvent::Log(LogLevel::Info, message.to_string()));
    }

    fn log_warn(&self, message: &str) {
        self.send(UiEvent::Log(LogLevel::Warn, message.to_string()));
    }

    fn log_error(&self, message: &str) {
        self.send(UiEvent::Log(LogLevel::Error, message.to_string()));
    }

    fn seed_form(&self, draft: SettingsDraft) {
        self.send(UiEvent::SeedForm(draft));
    }

    fn show_session(&self, draft: SettingsDraft) {
        self.send(UiEvent::SessionOpened(draft));
    }

    fn hide_session(&self) {
        self.send(UiEvent::SessionClosed);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every call for assertions; shared across clones.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingView {
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingView {
        pub fn take_calls(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl RoutineView for RecordingView {
        fn set_all_inputs_enabled(&self, enabled: bool) {
            self.push(format!("inputs:{enabled}"));
        }

        fn set_start_enabled(&self, enabled: bool) {
            self.push(format!("start:{enabled}"));
        }

        fn set_stop_enabled(&self, enabled: bool) {
            self.push(format!("stop:{enabled}"));
        }

        fn set_settings_enabled(&self, enabled: bool) {
            self.push(format!("settings:{enabled}"));
        }

        fn log(&self, message: &str) {
            self.push(format!("log:{message}"));
        }

        fn log_warn(&self, message: &str) {
            self.push(format!("warn:{message}"));
        }

        fn log_error(&self, message: &str) {
            self.push(format!("error:{message}"));
        }

        fn seed_form(&self, _draft: SettingsDraft) {
            self.push("seed".to_string());
        }

        fn show_session(&self, _draft: SettingsDraft) {
            self.push("session:open".to_string());
        }

        fn hide_session(&self) {
            self.push("session:close".to_string());
        }
    }
}
