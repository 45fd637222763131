//! Typed codec between domain values and the flat `(key, value)` wire form.
//!
//! Wire keys are `identifier` or `identifier@qualifier` (`driver@CHROME`).
//! The tagged [`SettingKey`] union keeps the key space closed internally
//! while serializing to the same format existing settings files already use.

use crate::model::{Browser, MoveType, RoutineTask, SettingsDraft, World};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Value sentinel for "absent / unknown". Never persisted: writers skip the
/// entry entirely instead of storing an empty string.
pub(crate) const UNKNOWN_VALUE: &str = "";

const SEPARATOR: char = '@';

const ID_USERNAME: &str = "username";
const ID_PASSWORD: &str = "password";
const ID_WORLD: &str = "world";
const ID_BROWSER: &str = "browser";
const ID_MOVE_OPTION: &str = "movement_option";
const ID_TASK: &str = "task";
const ID_USE_PROTECTION_SPELL: &str = "use_protection_spell";
const ID_USE_SPECIAL_SKILL: &str = "use_special_skill";
const ID_DRIVER: &str = "driver";
const ID_BINARY: &str = "binary";
const ID_PROTECTION_SPELL: &str = "protection_spell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettingKey {
    Username,
    Password,
    World,
    Browser,
    MoveOption(MoveType),
    Task(RoutineTask),
    UseProtectionSpell,
    UseSpecialSkill,
    Driver(Browser),
    Binary,
    ProtectionSpell,
}

impl SettingKey {
    /// The composite key persisted in the flat store.
    pub(crate) fn wire(self) -> String {
        match self {
            SettingKey::Username => ID_USERNAME.to_string(),
            SettingKey::Password => ID_PASSWORD.to_string(),
            SettingKey::World => ID_WORLD.to_string(),
            SettingKey::Browser => ID_BROWSER.to_string(),
            SettingKey::MoveOption(option) => {
                format!("{ID_MOVE_OPTION}{SEPARATOR}{}", option.as_wire())
            }
            SettingKey::Task(task) => format!("{ID_TASK}{SEPARATOR}{}", task.as_wire()),
            SettingKey::UseProtectionSpell => ID_USE_PROTECTION_SPELL.to_string(),
            SettingKey::UseSpecialSkill => ID_USE_SPECIAL_SKILL.to_string(),
            SettingKey::Driver(browser) => {
                format!("{ID_DRIVER}{SEPARATOR}{}", browser.as_wire())
            }
            SettingKey::Binary => ID_BINARY.to_string(),
            SettingKey::ProtectionSpell => ID_PROTECTION_SPELL.to_string(),
        }
    }
}

/// Parse a composite wire key.
///
/// Unknown identifiers come back as `Ok(None)` so stores written by newer
/// versions still load. A known identifier with a qualifier that is not a
/// member of its enumeration is a corrupt payload and a hard error.
pub(crate) fn parse_key(raw: &str) -> Result<Option<SettingKey>> {
    let (identifier, qualifier) = match raw.split_once(SEPARATOR) {
        Some((identifier, qualifier)) => (identifier, Some(qualifier)),
        None => (raw, None),
    };

    let key = match identifier {
        ID_USERNAME => SettingKey::Username,
        ID_PASSWORD => SettingKey::Password,
        ID_WORLD => SettingKey::World,
        ID_BROWSER => SettingKey::Browser,
        ID_USE_PROTECTION_SPELL => SettingKey::UseProtectionSpell,
        ID_USE_SPECIAL_SKILL => SettingKey::UseSpecialSkill,
        ID_BINARY => SettingKey::Binary,
        ID_PROTECTION_SPELL => SettingKey::ProtectionSpell,
        ID_MOVE_OPTION => {
            let qualifier = require_qualifier(raw, qualifier)?;
            let option = MoveType::from_wire(qualifier)
                .ok_or_else(|| anyhow!("unknown movement option `{qualifier}` in key `{raw}`"))?;
            SettingKey::MoveOption(option)
        }
        ID_TASK => {
            let qualifier = require_qualifier(raw, qualifier)?;
            let task = RoutineTask::from_wire(qualifier)
                .ok_or_else(|| anyhow!("unknown task `{qualifier}` in key `{raw}`"))?;
            SettingKey::Task(task)
        }
        ID_DRIVER => {
            let qualifier = require_qualifier(raw, qualifier)?;
            let browser = Browser::from_wire(qualifier)
                .ok_or_else(|| anyhow!("unknown browser `{qualifier}` in key `{raw}`"))?;
            SettingKey::Driver(browser)
        }
        _ => return Ok(None),
    };
    Ok(Some(key))
}

fn require_qualifier<'a>(raw: &str, qualifier: Option<&'a str>) -> Result<&'a str> {
    qualifier.ok_or_else(|| anyhow!("setting key `{raw}` is missing its qualifier"))
}

/// Encode a draft into store entries.
///
/// Scalars follow the skip-empty policy: the sentinel writes no entry.
/// Collection fields write one `true`/`false` entry for every member of the
/// enumeration, so deselected members are recorded explicitly. Driver paths
/// are written only for browsers with a non-empty configured path.
pub(crate) fn encode_draft(draft: &SettingsDraft) -> Vec<(String, String)> {
    let mut entries = Vec::new();

    push_scalar(&mut entries, SettingKey::Username, &draft.username);
    push_scalar(&mut entries, SettingKey::Password, &draft.password);
    if let Some(world) = draft.world {
        entries.push((SettingKey::World.wire(), world.as_wire().to_string()));
    }
    if let Some(browser) = draft.browser {
        entries.push((SettingKey::Browser.wire(), browser.as_wire().to_string()));
    }

    for option in MoveType::ALL {
        entries.push((
            SettingKey::MoveOption(option).wire(),
            draft.move_options.contains(&option).to_string(),
        ));
    }
    for task in RoutineTask::ALL {
        entries.push((
            SettingKey::Task(task).wire(),
            draft.tasks.contains(&task).to_string(),
        ));
    }

    entries.push((
        SettingKey::UseProtectionSpell.wire(),
        draft.use_protection_spell.to_string(),
    ));
    entries.push((
        SettingKey::UseSpecialSkill.wire(),
        draft.use_special_skill.to_string(),
    ));

    for browser in Browser::ALL {
        if let Some(path) = draft.drivers.get(&browser) {
            push_scalar(&mut entries, SettingKey::Driver(browser), path);
        }
    }
    push_scalar(&mut entries, SettingKey::Binary, &draft.binary);
    push_scalar(&mut entries, SettingKey::ProtectionSpell, &draft.protection_spell);

    entries
}

fn push_scalar(entries: &mut Vec<(String, String)>, key: SettingKey, value: &str) {
    if value != UNKNOWN_VALUE {
        entries.push((key.wire(), value.to_string()));
    }
}

/// Decode the full store into a draft.
///
/// Unknown identifiers are skipped (they stay in the store untouched).
/// Enum-typed values that fail to parse are a hard error rather than being
/// dropped: silently reapplying a default would contradict saved user intent.
pub(crate) fn decode(entries: &HashMap<String, String>) -> Result<SettingsDraft> {
    let mut draft = SettingsDraft::default();

    for (raw_key, value) in entries {
        let Some(key) = parse_key(raw_key)? else {
            continue;
        };
        match key {
            SettingKey::Username => draft.username = value.clone(),
            SettingKey::Password => draft.password = value.clone(),
            SettingKey::World => {
                let world = World::from_wire(value)
                    .ok_or_else(|| anyhow!("unknown world `{value}` in settings"))?;
                draft.world = Some(world);
            }
            SettingKey::Browser => {
                let browser = Browser::from_wire(value)
                    .ok_or_else(|| anyhow!("unknown browser `{value}` in settings"))?;
                draft.browser = Some(browser);
            }
            SettingKey::MoveOption(option) => {
                if is_true(value) {
                    draft.move_options.insert(option);
                } else {
                    draft.move_options.remove(&option);
                }
            }
            SettingKey::Task(task) => {
                if is_true(value) {
                    draft.tasks.insert(task);
                } else {
                    draft.tasks.remove(&task);
                }
            }
            SettingKey::UseProtectionSpell => draft.use_protection_spell = is_true(value),
            SettingKey::UseSpecialSkill => draft.use_special_skill = is_true(value),
            SettingKey::Driver(browser) => {
                if value != UNKNOWN_VALUE {
                    draft.drivers.insert(browser, value.clone());
                }
            }
            SettingKey::Binary => draft.binary = value.clone(),
            SettingKey::ProtectionSpell => draft.protection_spell = value.clone(),
        }
    }

    Ok(draft)
}

fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
