//! Per-store settings: the administrative flags of one active database.
//!
//! A store that has never been opened gets a settings file with defaults
//! written on first open, so subsequent reads always have a file to parse.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fsutil::write_atomic;
use crate::store::StoreError;

/// Settings file name inside a store root.
pub const SETTINGS_FILE: &str = "settings.json";

/// Administrative settings of one active database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    /// Whether guest sessions may view ticket contents.
    #[serde(default)]
    pub guest_can_view: bool,
}

/// Load a store's settings, writing the defaults first if no settings file
/// exists yet.
pub fn load_or_init(store_root: &Path) -> Result<StoreSettings, StoreError> {
    let path = store_root.join(SETTINGS_FILE);
    if !path.exists() {
        let defaults = StoreSettings::default();
        save(store_root, defaults)?;
        debug!(path = %path.display(), "settings file initialized");
        return Ok(defaults);
    }
    let file = File::open(&path)?;
    serde_json::from_reader(file).map_err(|e| StoreError::Malformed {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

/// Persist a store's settings atomically.
pub fn save(store_root: &Path, settings: StoreSettings) -> Result<(), StoreError> {
    let path = store_root.join(SETTINGS_FILE);
    let bytes = serde_json::to_vec_pretty(&settings).map_err(|e| StoreError::Malformed {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    write_atomic(&path, &bytes)?;
    Ok(())
}
