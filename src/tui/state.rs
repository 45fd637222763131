use crate::model::{Browser, MoveType, RoutinePhase, RoutineTask, SettingsDraft, World};
use crate::view::LogLevel;
use std::collections::BTreeMap;

/// One rendered line in the append-only log pane.
pub(crate) struct LogLine {
    pub at: String,
    pub level: LogLevel,
    pub text: String,
}

/// Main-form fields in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainField {
    Username,
    Password,
    World,
    Browser,
    MoveOption(MoveType),
    Task(RoutineTask),
    UseProtectionSpell,
    UseSpecialSkill,
}

pub(crate) fn main_fields() -> Vec<MainField> {
    let mut fields = vec![
        MainField::Username,
        MainField::Password,
        MainField::World,
        MainField::Browser,
    ];
    fields.extend(MoveType::ALL.into_iter().map(MainField::MoveOption));
    fields.extend(RoutineTask::ALL.into_iter().map(MainField::Task));
    fields.push(MainField::UseProtectionSpell);
    fields.push(MainField::UseSpecialSkill);
    fields
}

/// Session-overlay fields in focus order: one driver path per browser, then
/// the browser binary and the protection spell name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionField {
    Driver(Browser),
    Binary,
    ProtectionSpell,
}

pub(crate) fn session_fields() -> Vec<SessionField> {
    let mut fields: Vec<SessionField> =
        Browser::ALL.into_iter().map(SessionField::Driver).collect();
    fields.push(SessionField::Binary);
    fields.push(SessionField::ProtectionSpell);
    fields
}

/// Staged values of an open settings session.
pub(crate) struct SessionState {
    pub drivers: BTreeMap<Browser, String>,
    pub binary: String,
    pub protection_spell: String,
    pub focus: usize,
}

impl SessionState {
    pub fn from_draft(draft: &SettingsDraft) -> Self {
        let mut drivers = BTreeMap::new();
        for browser in Browser::ALL {
            drivers.insert(
                browser,
                draft.drivers.get(&browser).cloned().unwrap_or_default(),
            );
        }
        Self {
            drivers,
            binary: draft.binary.clone(),
            protection_spell: draft.protection_spell.clone(),
            focus: 0,
        }
    }

    pub fn field_text_mut(&mut self, field: SessionField) -> &mut String {
        match field {
            SessionField::Driver(browser) => self.drivers.entry(browser).or_default(),
            SessionField::Binary => &mut self.binary,
            SessionField::ProtectionSpell => &mut self.protection_spell,
        }
    }
}

/// UiState is owned by the UI thread only; controllers reach it exclusively
/// through the UiEvent channel.
pub(crate) struct UiState {
    pub username: String,
    pub password: String,
    pub world: World,
    pub browser: Browser,
    pub move_options: std::collections::BTreeSet<MoveType>,
    pub tasks: std::collections::BTreeSet<RoutineTask>,
    pub use_protection_spell: bool,
    pub use_special_skill: bool,
    /// Fields persisted only through the settings session (not on the main
    /// form); carried so a save from the main form keeps them intact.
    pub drivers: BTreeMap<Browser, String>,
    pub binary: String,
    pub protection_spell: String,

    pub session: Option<SessionState>,

    pub inputs_enabled: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub settings_enabled: bool,

    pub phase: Option<RoutinePhase>,
    pub focus: usize,
    pub log: Vec<LogLine>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            world: World::One,
            browser: Browser::Chrome,
            move_options: Default::default(),
            tasks: Default::default(),
            use_protection_spell: false,
            use_special_skill: false,
            drivers: BTreeMap::new(),
            binary: String::new(),
            protection_spell: String::new(),
            session: None,
            inputs_enabled: true,
            start_enabled: true,
            stop_enabled: false,
            settings_enabled: true,
            phase: None,
            focus: 0,
            log: Vec::new(),
        }
    }
}

impl UiState {
    /// Fill the main form (and the session-only fields) from a decoded draft.
    pub fn seed(&mut self, draft: SettingsDraft) {
        self.username = draft.username;
        self.password = draft.password;
        self.world = draft.world.unwrap_or(World::One);
        self.browser = draft.browser.unwrap_or(Browser::Chrome);
        self.move_options = draft.move_options;
        self.tasks = draft.tasks;
        self.use_protection_spell = draft.use_protection_spell;
        self.use_special_skill = draft.use_special_skill;
        self.drivers = draft.drivers;
        self.binary = draft.binary;
        self.protection_spell = draft.protection_spell;
    }

    /// Snapshot of every stageable field, session values included when a
    /// session is open.
    pub fn draft(&self) -> SettingsDraft {
        let (drivers, binary, protection_spell) = match &self.session {
            Some(session) => (
                session
                    .drivers
                    .iter()
                    .filter(|(_, path)| !path.is_empty())
                    .map(|(browser, path)| (*browser, path.clone()))
                    .collect(),
                session.binary.clone(),
                session.protection_spell.clone(),
            ),
            None => (
                self.drivers.clone(),
                self.binary.clone(),
                self.protection_spell.clone(),
            ),
        };
        SettingsDraft {
            username: self.username.clone(),
            password: self.password.clone(),
            world: Some(self.world),
            browser: Some(self.browser),
            move_options: self.move_options.clone(),
            tasks: self.tasks.clone(),
            use_protection_spell: self.use_protection_spell,
            use_special_skill: self.use_special_skill,
            drivers,
            binary,
            protection_spell,
        }
    }

    pub fn push_log(&mut self, level: LogLevel, text: String) {
        const MAX: usize = 500;
        self.log.push(LogLine {
            at: timestamp(),
            level,
            text,
        });
        if self.log.len() > MAX {
            let _ = self.log.drain(0..(self.log.len() - MAX));
        }
    }
}

fn timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let fmt = time::macros::format_description!("[hour]:[minute]:[second]");
    now.format(&fmt).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_defaults_world_and_browser_when_absent() {
        let mut state = UiState::default();
        state.seed(SettingsDraft::default());
        assert_eq!(state.world, World::One);
        assert_eq!(state.browser, Browser::Chrome);
    }

    #[test]
    fn draft_prefers_open_session_values() {
        let mut state = UiState::default();
        state.username = "alice".to_string();
        state.binary = "/old/binary".to_string();

        let mut session = SessionState::from_draft(&state.draft());
        session.binary = "/new/binary".to_string();
        session
            .drivers
            .insert(Browser::Chrome, "/opt/chromedriver".to_string());
        state.session = Some(session);

        let draft = state.draft();
        assert_eq!(draft.binary, "/new/binary");
        assert_eq!(
            draft.drivers.get(&Browser::Chrome).map(String::as_str),
            Some("/opt/chromedriver")
        );
        // Browsers with empty staged paths produce no draft entry.
        assert!(!draft.drivers.contains_key(&Browser::Firefox));
        assert_eq!(draft.username, "alice");
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut state = UiState::default();
        for i in 0..600 {
            state.push_log(LogLevel::Info, format!("line {i}"));
        }
        assert_eq!(state.log.len(), 500);
        assert_eq!(state.log[0].text, "line 100");
    }
}
