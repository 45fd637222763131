use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Firefox,
    Edge,
    Opera,
    Safari,
}

impl Browser {
    pub const ALL: [Browser; 5] = [
        Browser::Chrome,
        Browser::Firefox,
        Browser::Edge,
        Browser::Opera,
        Browser::Safari,
    ];

    /// Stable name used in persisted setting keys and values.
    pub fn as_wire(self) -> &'static str {
        match self {
            Browser::Chrome => "CHROME",
            Browser::Firefox => "FIREFOX",
            Browser::Edge => "EDGE",
            Browser::Opera => "OPERA",
            Browser::Safari => "SAFARI",
        }
    }

    pub fn from_wire(s: &str) -> Option<Browser> {
        Browser::ALL.into_iter().find(|b| b.as_wire() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Edge => "Edge",
            Browser::Opera => "Opera",
            Browser::Safari => "Safari",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum World {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl World {
    pub const ALL: [World; 5] = [
        World::One,
        World::Two,
        World::Three,
        World::Four,
        World::Five,
    ];

    /// Stable name used in persisted setting values.
    pub fn as_wire(self) -> &'static str {
        match self {
            World::One => "ONE",
            World::Two => "TWO",
            World::Three => "THREE",
            World::Four => "FOUR",
            World::Five => "FIVE",
        }
    }

    pub fn from_wire(s: &str) -> Option<World> {
        World::ALL.into_iter().find(|w| w.as_wire() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            World::One => "World 1",
            World::Two => "World 2",
            World::Three => "World 3",
            World::Four => "World 4",
            World::Five => "World 5",
        }
    }
}

/// Movement options the routine is allowed to use when travelling between
/// locations. Deselected options are avoided even when they would be faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoveType {
    BlueSphere,
    Portal,
    Teleporter,
}

impl MoveType {
    pub const ALL: [MoveType; 3] = [MoveType::BlueSphere, MoveType::Portal, MoveType::Teleporter];

    pub fn as_wire(self) -> &'static str {
        match self {
            MoveType::BlueSphere => "BLUE_SPHERE",
            MoveType::Portal => "PORTAL",
            MoveType::Teleporter => "TELEPORTER",
        }
    }

    pub fn from_wire(s: &str) -> Option<MoveType> {
        MoveType::ALL.into_iter().find(|m| m.as_wire() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            MoveType::BlueSphere => "Blue sphere",
            MoveType::Portal => "Portal",
            MoveType::Teleporter => "Teleporter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoutineTask {
    CollectResources,
    DeliverGoods,
    TrainSkill,
}

impl RoutineTask {
    pub const ALL: [RoutineTask; 3] = [
        RoutineTask::CollectResources,
        RoutineTask::DeliverGoods,
        RoutineTask::TrainSkill,
    ];

    pub fn as_wire(self) -> &'static str {
        match self {
            RoutineTask::CollectResources => "COLLECT_RESOURCES",
            RoutineTask::DeliverGoods => "DELIVER_GOODS",
            RoutineTask::TrainSkill => "TRAIN_SKILL",
        }
    }

    pub fn from_wire(s: &str) -> Option<RoutineTask> {
        RoutineTask::ALL.into_iter().find(|t| t.as_wire() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            RoutineTask::CollectResources => "Collect resources",
            RoutineTask::DeliverGoods => "Deliver goods",
            RoutineTask::TrainSkill => "Train skill",
        }
    }
}

/// Everything a routine worker needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineConfig {
    pub username: String,
    pub password: String,
    pub world: World,
    pub browser: Browser,
    pub move_options: BTreeSet<MoveType>,
    pub tasks: BTreeSet<RoutineTask>,
    pub use_protection_spell: bool,
    #[serde(default)]
    pub protection_spell: Option<String>,
    pub use_special_skill: bool,
    #[serde(default)]
    pub driver_path: Option<PathBuf>,
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub step_pause: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutinePhase {
    Login,
    ProtectionSpell,
    SpecialSkill,
    Task(RoutineTask),
    Logout,
}

impl RoutinePhase {
    pub fn label(self) -> &'static str {
        match self {
            RoutinePhase::Login => "Login",
            RoutinePhase::ProtectionSpell => "Protection spell",
            RoutinePhase::SpecialSkill => "Special skill",
            RoutinePhase::Task(task) => task.label(),
            RoutinePhase::Logout => "Logout",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutineEvent {
    PhaseStarted {
        phase: RoutinePhase,
    },
    Info(InfoEvent),
    /// Sent exactly once per worker, as its last event.
    Finished {
        outcome: RoutineOutcome,
    },
}

/// Structured info events emitted by the engine and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    // UI/CLI messages generated outside the engine.
    Message(String),
    UsingDriver { browser: Browser, path: PathBuf },
    UsingBinary { path: PathBuf },
    MoveRestriction { options: Vec<MoveType> },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::UsingDriver { browser, path } => {
                format!("Using {} driver at {}", browser.label(), path.display())
            }
            InfoEvent::UsingBinary { path } => {
                format!("Using browser binary at {}", path.display())
            }
            InfoEvent::MoveRestriction { options } => {
                let names: Vec<&str> = options.iter().map(|o| o.label()).collect();
                if names.is_empty() {
                    "Movement restricted to plain walking".to_string()
                } else {
                    format!("Movement restricted to: {}", names.join(", "))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutineOutcome {
    Completed { tasks_run: u32 },
    Cancelled,
    Failed { message: String },
}

impl RoutineOutcome {
    pub fn describe(&self) -> String {
        match self {
            RoutineOutcome::Completed { tasks_run } => {
                format!("Routine completed ({tasks_run} task(s) run).")
            }
            RoutineOutcome::Cancelled => "Routine cancelled.".to_string(),
            RoutineOutcome::Failed { message } => format!("Routine failed: {message}"),
        }
    }
}

/// Typed staging view of every persisted setting. Decoding fills one of
/// these from the flat store; saving encodes one back into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDraft {
    pub username: String,
    pub password: String,
    pub world: Option<World>,
    pub browser: Option<Browser>,
    pub move_options: BTreeSet<MoveType>,
    pub tasks: BTreeSet<RoutineTask>,
    pub use_protection_spell: bool,
    pub use_special_skill: bool,
    /// Configured driver path per browser; browsers without one are absent.
    pub drivers: BTreeMap<Browser, String>,
    pub binary: String,
    pub protection_spell: String,
}
