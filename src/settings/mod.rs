//! Settings persistence: a flat string-keyed map on disk, composite
//! `identifier@qualifier` keys on the wire, and a typed codec in between.
//!
//! Controllers work with [`crate::model::SettingsDraft`] and the typed
//! getters; only this module knows the wire key format.

mod codec;
mod file;
mod store;

pub(crate) use file::JsonFileSettings;
pub(crate) use store::{SettingsBackend, SettingsStore};
