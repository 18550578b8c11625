//! The directory-backed active database: templates, job tickets, sequence
//! numbering, sessions, and the annual counter rollover policy.
//!
//! A store root contains `Templates/` and `JobTickets/`, one file per
//! entity, plus the credential and settings files. All operations are
//! synchronous; every file handle is opened immediately before use and
//! released on every path.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use ticketsmith_core::{sanitize_name, FieldError, Template, Ticket, TicketInput};
use tracing::{debug, warn};

use crate::auth::{CredentialStore, Privilege};
use crate::codec::{self, CodecError};
use crate::fsutil::write_atomic;
use crate::settings::{self, StoreSettings};

/// Template directory name inside a store root.
pub const TEMPLATE_DIR: &str = "Templates";
/// Job ticket directory name inside a store root.
pub const TICKET_DIR: &str = "JobTickets";
/// Directory name of the distinguished login-free store.
pub const DEFAULT_STORE_DIR: &str = "DefaultActiveDatabase";

const ENTITY_EXT: &str = "json";

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data in {path}: {detail}")]
    Malformed { path: String, detail: String },
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("ticket not found: {0}")]
    TicketNotFound(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("no platform data directory available")]
    NoDataDir,
}

/// An established session: who is operating and at what privilege.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: Option<String>,
    pub privilege: Privilege,
}

impl Session {
    /// The login-free session granted on the default store.
    #[must_use]
    pub fn default_admin() -> Self {
        Self { username: None, privilege: Privilege::Admin }
    }

    #[must_use]
    pub fn for_user(username: impl Into<String>, privilege: Privilege) -> Self {
        Self { username: Some(username.into()), privilege }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.privilege == Privilege::Admin
    }
}

/// A ticket that has just been persisted, with its assigned identity.
#[derive(Debug, Clone)]
pub struct SavedTicket {
    pub sequence: u64,
    pub stem: String,
    pub ticket: Ticket,
}

/// File stem of a persisted ticket: `<sequence> <template name>`.
#[must_use]
pub fn ticket_stem(sequence: u64, template_name: &str) -> String {
    format!("{sequence} {template_name}")
}

/// One active database rooted at a directory.
#[derive(Debug, Clone)]
pub struct ActiveStore {
    root: PathBuf,
}

impl ActiveStore {
    /// Open (and if needed lay out) the store at `root`: the entity
    /// directories are created and the settings file is initialized with
    /// defaults on first open.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        fs::create_dir_all(store.template_dir())?;
        fs::create_dir_all(store.ticket_dir())?;
        settings::load_or_init(&store.root)?;
        debug!(root = %store.root.display(), "active database opened");
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this is the distinguished default store, which requires no
    /// login and is unconditionally admin-privileged.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.root.file_name().is_some_and(|name| name == DEFAULT_STORE_DIR)
    }

    /// The login-free admin session, available only on the default store.
    #[must_use]
    pub fn default_session(&self) -> Option<Session> {
        self.is_default().then(Session::default_admin)
    }

    #[must_use]
    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(&self.root)
    }

    pub fn settings(&self) -> Result<StoreSettings, StoreError> {
        settings::load_or_init(&self.root)
    }

    /// Flip whether guest sessions may view ticket contents.
    pub fn set_guest_can_view(&self, guest_can_view: bool) -> Result<(), StoreError> {
        let mut current = self.settings()?;
        current.guest_can_view = guest_can_view;
        settings::save(&self.root, current)
    }

    fn template_dir(&self) -> PathBuf {
        self.root.join(TEMPLATE_DIR)
    }

    fn ticket_dir(&self) -> PathBuf {
        self.root.join(TICKET_DIR)
    }

    fn template_path(&self, name: &str) -> PathBuf {
        let stem = sanitize_name(name, "Template");
        self.template_dir().join(format!("{stem}.{ENTITY_EXT}"))
    }

    fn ticket_path(&self, stem: &str) -> PathBuf {
        self.ticket_dir().join(format!("{stem}.{ENTITY_EXT}"))
    }

    fn list_stems(dir: &Path) -> Result<Vec<String>, StoreError> {
        let mut stems = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == ENTITY_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Names of all persisted templates, sorted.
    pub fn list_templates(&self) -> Result<Vec<String>, StoreError> {
        Self::list_stems(&self.template_dir())
    }

    /// File stems of all persisted tickets, sorted.
    pub fn list_tickets(&self) -> Result<Vec<String>, StoreError> {
        Self::list_stems(&self.ticket_dir())
    }

    /// Persist a template under its (sanitized) name, replacing any
    /// previous file atomically.
    pub fn save_template(&self, template: &Template) -> Result<PathBuf, StoreError> {
        if template.name.trim().is_empty() {
            return Err(FieldError::RequiredEmpty("template name".to_string()).into());
        }
        let path = self.template_path(&template.name);
        let mut buffer = Vec::new();
        codec::save_template(template, &mut buffer)?;
        write_atomic(&path, &buffer)?;
        debug!(path = %path.display(), "template saved");
        Ok(path)
    }

    /// Load a template by name. A missing file is
    /// [`StoreError::TemplateNotFound`].
    pub fn load_template(&self, name: &str) -> Result<Template, StoreError> {
        let path = self.template_path(name);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::TemplateNotFound(name.to_string()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(codec::load_template(file)?)
    }

    /// Load a template and apply the annual rollover policy: when the
    /// file's modification year differs from `now`'s year, counters flagged
    /// to reset annually are zeroed and the template is re-persisted before
    /// it is returned.
    pub fn load_template_for_year(
        &self,
        name: &str,
        now: OffsetDateTime,
    ) -> Result<Template, StoreError> {
        let path = self.template_path(name);
        let mut template = self.load_template(name)?;
        let modified_year = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(|t| OffsetDateTime::from(t).year())
            .ok();
        if let Some(year) = modified_year {
            if year != now.year() && template.reset_annual_counters().changed() {
                debug!(template = %name, stored_year = year, "annual counter reset applied");
                self.save_template(&template)?;
            }
        }
        Ok(template)
    }

    /// Delete a template file. A missing file is
    /// [`StoreError::TemplateNotFound`].
    pub fn delete_template(&self, name: &str) -> Result<(), StoreError> {
        let path = self.template_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::TemplateNotFound(name.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Reserve the lowest unused positive sequence number for a ticket
    /// derived from `template_name` by creating the empty slot file.
    fn reserve_sequence(&self, template_name: &str) -> Result<(u64, PathBuf), StoreError> {
        let mut sequence: u64 = 1;
        loop {
            let path = self.ticket_path(&ticket_stem(sequence, template_name));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok((sequence, path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => sequence += 1,
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    /// Create and persist a new ticket from `template` and `input`.
    ///
    /// The sequence slot is reserved first; static resolution then advances
    /// the template's counters and the template is re-persisted immediately,
    /// before the ticket itself is written. If anything fails after the
    /// reservation the empty slot is removed best-effort and the error
    /// surfaced — a failed creation must not consume a sequence number
    /// silently.
    pub fn create_ticket(
        &self,
        template: &mut Template,
        input: &TicketInput,
        now: OffsetDateTime,
    ) -> Result<SavedTicket, StoreError> {
        if template.name.trim().is_empty() {
            return Err(FieldError::RequiredEmpty("template name".to_string()).into());
        }
        let sanitized = sanitize_name(&template.name, "Template");
        let (sequence, path) = self.reserve_sequence(&sanitized)?;

        let result = Ticket::from_template(template, input, sequence, now)
            .map_err(StoreError::from)
            .and_then(|ticket| {
                self.save_template(template)?;
                let mut buffer = Vec::new();
                codec::save_ticket(&ticket, &mut buffer)?;
                write_atomic(&path, &buffer)?;
                Ok(ticket)
            });

        match result {
            Ok(ticket) => {
                let stem = ticket_stem(sequence, &sanitized);
                debug!(stem = %stem, "ticket created");
                Ok(SavedTicket { sequence, stem, ticket })
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %cleanup, "failed to release reserved ticket slot");
                }
                Err(err)
            }
        }
    }

    /// Load a ticket by file stem. A missing file is
    /// [`StoreError::TicketNotFound`].
    pub fn load_ticket(&self, stem: &str) -> Result<Ticket, StoreError> {
        let path = self.ticket_path(stem);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::TicketNotFound(stem.to_string()));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(codec::load_ticket(file)?)
    }

    /// Replace a persisted ticket wholesale (the modify-and-resave flow).
    /// The slot must already exist.
    pub fn save_ticket(&self, stem: &str, ticket: &Ticket) -> Result<(), StoreError> {
        let path = self.ticket_path(stem);
        if !path.exists() {
            return Err(StoreError::TicketNotFound(stem.to_string()));
        }
        let mut buffer = Vec::new();
        codec::save_ticket(ticket, &mut buffer)?;
        write_atomic(&path, &buffer)?;
        debug!(stem = %stem, "ticket replaced");
        Ok(())
    }

    /// Delete a ticket file. A missing file is
    /// [`StoreError::TicketNotFound`].
    pub fn delete_ticket(&self, stem: &str) -> Result<(), StoreError> {
        let path = self.ticket_path(stem);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::TicketNotFound(stem.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
