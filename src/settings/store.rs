//! The flat settings map and its load/save round trip.

use super::codec::{self, SettingKey, UNKNOWN_VALUE};
use crate::model::{Browser, SettingsDraft};
use anyhow::Result;
use std::collections::HashMap;

/// Durable store collaborator. Both operations are best effort: callers log
/// failures and keep going with whatever is in memory.
pub(crate) trait SettingsBackend {
    fn load_all(&self) -> Result<HashMap<String, String>>;
    fn save_all(&self, entries: &HashMap<String, String>) -> Result<()>;
}

/// Owns the flat composite-key map for the lifetime of the process.
#[derive(Debug, Default)]
pub(crate) struct SettingsStore {
    entries: HashMap<String, String>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, or the empty sentinel when absent.
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .get(key)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_VALUE)
    }

    /// Re-setting an existing key overwrites silently.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// The live map used by the save path. Not a defensive copy.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.entries
    }

    /// Replace the map from the durable collaborator. On failure the current
    /// contents are left untouched (effectively empty on first run).
    pub fn load(&mut self, backend: &dyn SettingsBackend) -> Result<()> {
        self.entries = backend.load_all()?;
        Ok(())
    }

    /// Hand the current map to the durable collaborator. Not retried.
    pub fn save(&self, backend: &dyn SettingsBackend) -> Result<()> {
        backend.save_all(self.all())
    }

    /// Decode the whole store into the typed draft.
    pub fn decode_draft(&self) -> Result<SettingsDraft> {
        codec::decode(&self.entries)
    }

    /// Write encoded draft entries into the map. Entries for keys the draft
    /// does not produce (including unknown identifiers) are preserved.
    pub fn apply_draft(&mut self, draft: &SettingsDraft) {
        for (key, value) in codec::encode_draft(draft) {
            self.set(key, value);
        }
    }

    /// Configured driver path for `browser`, if any. Absence is `None`,
    /// never the empty string.
    pub fn driver_for(&self, browser: Browser) -> Option<&str> {
        non_empty(self.get(&SettingKey::Driver(browser).wire()))
    }

    pub fn browser_binary(&self) -> Option<&str> {
        non_empty(self.get(&SettingKey::Binary.wire()))
    }

    pub fn protection_spell(&self) -> Option<&str> {
        non_empty(self.get(&SettingKey::ProtectionSpell.wire()))
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value == UNKNOWN_VALUE {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FailingBackend;

    impl SettingsBackend for FailingBackend {
        fn load_all(&self) -> Result<HashMap<String, String>> {
            Err(anyhow!("disk on fire"))
        }

        fn save_all(&self, _entries: &HashMap<String, String>) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn get_returns_sentinel_when_absent() {
        let store = SettingsStore::new();
        assert_eq!(store.get("username"), UNKNOWN_VALUE);
    }

    #[test]
    fn typed_getters_translate_sentinel_to_none() {
        let mut store = SettingsStore::new();
        assert_eq!(store.driver_for(Browser::Chrome), None);
        assert_eq!(store.browser_binary(), None);
        assert_eq!(store.protection_spell(), None);

        store.set("driver@CHROME", "/opt/drivers/chromedriver");
        assert_eq!(
            store.driver_for(Browser::Chrome),
            Some("/opt/drivers/chromedriver")
        );
        assert_eq!(store.driver_for(Browser::Firefox), None);
    }

    #[test]
    fn load_failure_preserves_prior_state() {
        let mut store = SettingsStore::new();
        store.set("username", "alice");

        let err = store.load(&FailingBackend).expect_err("load must fail");
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(store.get("username"), "alice");
    }

    #[test]
    fn set_overwrites_silently() {
        let mut store = SettingsStore::new();
        store.set("world", "ONE");
        store.set("world", "TWO");
        assert_eq!(store.get("world"), "TWO");
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn apply_draft_preserves_unknown_entries() {
        let mut store = SettingsStore::new();
        store.set("future_feature@X", "kept");

        let mut draft = SettingsDraft::default();
        draft.username = "alice".to_string();
        store.apply_draft(&draft);

        assert_eq!(store.get("future_feature@X"), "kept");
        assert_eq!(store.get("username"), "alice");
    }
}
