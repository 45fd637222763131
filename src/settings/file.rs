//! JSON file backend for the settings map.
//!
//! Lives under the user config directory. Writes go through a temp file and
//! rename so a crash mid-save cannot truncate the existing file.

use super::store::SettingsBackend;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const SETTINGS_DIR: &str = "routine-bot";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub(crate) struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location under the platform config directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().context("no config directory on this platform")?;
        Ok(Self::new(dir.join(SETTINGS_DIR).join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsBackend for JsonFileSettings {
    fn load_all(&self) -> Result<HashMap<String, String>> {
        // A missing file is a first run, not a failure.
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", self.path.display()))?;
        Ok(entries)
    }

    fn save_all(&self, entries: &HashMap<String, String>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .with_context(|| format!("settings path missing parent {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;

        let mut buf =
            serde_json::to_string_pretty(entries).context("serialize settings json")?;
        buf.push('\n');

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, buf)
            .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace settings {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = JsonFileSettings::new(temp.path().join("missing.json"));
        let entries = backend.load_all().expect("load");
        assert!(entries.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backend = JsonFileSettings::new(temp.path().join("nested/settings.json"));

        let mut entries = HashMap::new();
        entries.insert("username".to_string(), "alice".to_string());
        entries.insert("driver@CHROME".to_string(), "/opt/chromedriver".to_string());

        backend.save_all(&entries).expect("save");
        let loaded = backend.load_all().expect("load");
        assert_eq!(loaded, entries);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        fs::write(&path, "not json at all").expect("write");

        let backend = JsonFileSettings::new(path);
        let err = backend.load_all().expect_err("parse must fail");
        assert!(err.to_string().contains("parse"));
    }
}
