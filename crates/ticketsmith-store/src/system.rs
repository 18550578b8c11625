//! The per-installation system database.
//!
//! Lives under the platform data directory and holds the settings file
//! naming the currently selected active database, the distinguished
//! login-free default store, and the placeholder image used when a
//! template's background document cannot be produced. Failure to establish
//! the system database at startup is fatal for callers; everything else is
//! recoverable.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fsutil::write_atomic;
use crate::store::{ActiveStore, StoreError, DEFAULT_STORE_DIR};

/// Directory name of the system database under the platform data dir.
pub const SYSTEM_DIR_NAME: &str = "TicketSmith";
/// Settings file naming the active database.
pub const SYSTEM_FILE: &str = "system.json";
/// Placeholder shown when a background document cannot be rasterized.
pub const DEFAULT_DOCUMENT_FILE: &str = "default-document.png";

/// A 1×1 transparent PNG. Document imaging is a collaborator concern; the
/// engine only guarantees that the placeholder path exists and holds a
/// decodable image.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemSettings {
    active_database: PathBuf,
}

/// Handle on the system database directory.
#[derive(Debug, Clone)]
pub struct SystemDatabase {
    root: PathBuf,
}

impl SystemDatabase {
    /// The system database under the platform data directory.
    pub fn discover() -> Result<Self, StoreError> {
        let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self { root: data_dir.join(SYSTEM_DIR_NAME) })
    }

    /// A system database rooted at an explicit directory. Used by tests and
    /// by callers overriding the installation location.
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn default_store_root(&self) -> PathBuf {
        self.root.join(DEFAULT_STORE_DIR)
    }

    #[must_use]
    pub fn default_document_path(&self) -> PathBuf {
        self.root.join(DEFAULT_DOCUMENT_FILE)
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join(SYSTEM_FILE)
    }

    /// Establish the system database: the directory itself, the placeholder
    /// document, the default store layout, and a settings file pointing at
    /// the default store when none exists yet. Idempotent.
    pub fn initialize(&self) -> Result<ActiveStore, StoreError> {
        fs::create_dir_all(&self.root)?;
        let placeholder = self.default_document_path();
        if !placeholder.exists() {
            write_atomic(&placeholder, PLACEHOLDER_PNG)?;
            debug!(path = %placeholder.display(), "placeholder document written");
        }
        let default_store = ActiveStore::open(self.default_store_root())?;
        if !self.settings_path().exists() {
            self.set_active_database(default_store.root())?;
        }
        Ok(default_store)
    }

    /// Path of the currently selected active database.
    pub fn active_database(&self) -> Result<PathBuf, StoreError> {
        let path = self.settings_path();
        let file = File::open(&path)?;
        let settings: SystemSettings =
            serde_json::from_reader(file).map_err(|e| StoreError::Malformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        Ok(settings.active_database)
    }

    /// Record a new active database selection.
    pub fn set_active_database(&self, store_root: &Path) -> Result<(), StoreError> {
        let settings = SystemSettings { active_database: store_root.to_path_buf() };
        let bytes = serde_json::to_vec_pretty(&settings).map_err(|e| StoreError::Malformed {
            path: self.settings_path().display().to_string(),
            detail: e.to_string(),
        })?;
        write_atomic(&self.settings_path(), &bytes)?;
        debug!(active = %store_root.display(), "active database recorded");
        Ok(())
    }

    /// Open the currently selected active database, initializing the system
    /// database first if needed.
    pub fn open_active(&self) -> Result<ActiveStore, StoreError> {
        if !self.settings_path().exists() {
            return self.initialize();
        }
        ActiveStore::open(self.active_database()?)
    }
}
