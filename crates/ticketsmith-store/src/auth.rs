//! User credential store and login for an active database.
//!
//! Credentials live in one JSON file at the store root. Each record holds
//! the username, a random per-user salt, a SHA-256 digest of salt-then-
//! password, and the privilege tag. Login distinguishes every outcome a
//! caller must branch on: a missing credential file is not an unknown
//! username, and an unknown username is not a bad password.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::fsutil::write_atomic;
use crate::store::StoreError;

/// Credential file name inside a store root.
pub const USERS_FILE: &str = "users.json";

const SALT_LEN: usize = 16;

/// Session privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Admin,
    Guest,
}

impl Privilege {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Guest => "guest",
        }
    }
}

impl std::fmt::Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of adding a user. A duplicate username leaves the existing
/// record, including its privilege, untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AddUserOutcome {
    Added,
    UsernameExists,
}

/// Outcome of a login attempt. Callers branch on all of these (plus the
/// `StoreError` side of the result) distinctly; none may be collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum LoginOutcome {
    Admin,
    Guest,
    StoreMissing,
    UsernameNotFound,
    WrongPassword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    salt: String,
    digest: String,
    privilege: Privilege,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct UserFile {
    users: Vec<UserRecord>,
}

fn password_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// The credential store of one active database.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    #[must_use]
    pub fn new(store_root: &Path) -> Self {
        Self { path: store_root.join(USERS_FILE) }
    }

    /// Whether a credential file exists. A store that is not the default
    /// one must have a first Admin user created before logins can succeed.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.path.exists()
    }

    fn read_records(&self) -> Result<UserFile, StoreError> {
        let file = File::open(&self.path)?;
        serde_json::from_reader(file).map_err(|e| StoreError::Malformed {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })
    }

    fn write_records(&self, records: &UserFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records).map_err(|e| StoreError::Malformed {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Add a user. Creates the credential file on first use; a duplicate
    /// username is reported and the stored record is left untouched.
    pub fn add_user(
        &self,
        username: &str,
        password: &str,
        privilege: Privilege,
    ) -> Result<AddUserOutcome, StoreError> {
        let mut records = if self.initialized() {
            self.read_records()?
        } else {
            UserFile::default()
        };
        if records.users.iter().any(|u| u.username == username) {
            return Ok(AddUserOutcome::UsernameExists);
        }
        let salt = generate_salt();
        records.users.push(UserRecord {
            username: username.to_string(),
            salt: hex::encode(salt),
            digest: password_digest(&salt, password),
            privilege,
        });
        self.write_records(&records)?;
        debug!(username, %privilege, "user added");
        Ok(AddUserOutcome::Added)
    }

    /// Attempt a login. A missing credential file yields `StoreMissing`
    /// for every username/password pair.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoginOutcome::StoreMissing),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let records: UserFile =
            serde_json::from_reader(file).map_err(|e| StoreError::Malformed {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            })?;

        let Some(record) = records.users.iter().find(|u| u.username == username) else {
            return Ok(LoginOutcome::UsernameNotFound);
        };
        let salt = hex::decode(&record.salt).map_err(|e| StoreError::Malformed {
            path: self.path.display().to_string(),
            detail: format!("bad salt for {username}: {e}"),
        })?;
        if password_digest(&salt, password) != record.digest {
            return Ok(LoginOutcome::WrongPassword);
        }
        Ok(match record.privilege {
            Privilege::Admin => LoginOutcome::Admin,
            Privilege::Guest => LoginOutcome::Guest,
        })
    }

    /// Change an existing user's privilege. An unknown username is a
    /// [`StoreError::UserNotFound`].
    pub fn promote_user(&self, username: &str, privilege: Privilege) -> Result<(), StoreError> {
        if !self.initialized() {
            return Err(StoreError::UserNotFound(username.to_string()));
        }
        let mut records = self.read_records()?;
        let record = records
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
        record.privilege = privilege;
        self.write_records(&records)?;
        debug!(username, %privilege, "user privilege updated");
        Ok(())
    }

    /// Stored privilege of a user, if any.
    pub fn privilege_of(&self, username: &str) -> Result<Option<Privilege>, StoreError> {
        if !self.initialized() {
            return Ok(None);
        }
        let records = self.read_records()?;
        Ok(records.users.iter().find(|u| u.username == username).map(|u| u.privilege))
    }

    /// Usernames in the credential file, for administrative listings.
    pub fn list_users(&self) -> Result<Vec<(String, Privilege)>, StoreError> {
        if !self.initialized() {
            return Ok(Vec::new());
        }
        let records = self.read_records()?;
        Ok(records
            .users
            .into_iter()
            .map(|u| (u.username, u.privilege))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn tmp() -> TempDir {
        match TempDir::new() {
            Ok(dir) => dir,
            Err(err) => panic!("tempdir: {err}"),
        }
    }

    fn ok<T>(result: Result<T, StoreError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => panic!("store error: {err}"),
        }
    }

    #[test]
    fn test_login_without_credential_file_is_store_missing() {
        let dir = tmp();
        let store = CredentialStore::new(dir.path());
        assert!(!store.initialized());
        for (user, password) in [("admin", "pw"), ("", ""), ("ghost", "anything")] {
            assert_eq!(ok(store.login(user, password)), LoginOutcome::StoreMissing);
        }
    }

    #[test]
    fn test_add_then_login_all_outcomes() {
        let dir = tmp();
        let store = CredentialStore::new(dir.path());
        assert_eq!(ok(store.add_user("boss", "secret", Privilege::Admin)), AddUserOutcome::Added);
        assert_eq!(ok(store.add_user("clerk", "view", Privilege::Guest)), AddUserOutcome::Added);

        assert_eq!(ok(store.login("boss", "secret")), LoginOutcome::Admin);
        assert_eq!(ok(store.login("clerk", "view")), LoginOutcome::Guest);
        assert_eq!(ok(store.login("boss", "wrong")), LoginOutcome::WrongPassword);
        assert_eq!(ok(store.login("nobody", "secret")), LoginOutcome::UsernameNotFound);
    }

    #[test]
    fn test_duplicate_username_keeps_existing_record() {
        let dir = tmp();
        let store = CredentialStore::new(dir.path());
        assert_eq!(ok(store.add_user("x", "pw", Privilege::Admin)), AddUserOutcome::Added);
        assert_eq!(
            ok(store.add_user("x", "other", Privilege::Guest)),
            AddUserOutcome::UsernameExists
        );
        assert_eq!(ok(store.privilege_of("x")), Some(Privilege::Admin));
        // The first password still logs in; the rejected one does not.
        assert_eq!(ok(store.login("x", "pw")), LoginOutcome::Admin);
        assert_eq!(ok(store.login("x", "other")), LoginOutcome::WrongPassword);
    }

    #[test]
    fn test_promote_user() {
        let dir = tmp();
        let store = CredentialStore::new(dir.path());
        assert_eq!(ok(store.add_user("clerk", "pw", Privilege::Guest)), AddUserOutcome::Added);
        assert!(store.promote_user("clerk", Privilege::Admin).is_ok());
        assert_eq!(ok(store.login("clerk", "pw")), LoginOutcome::Admin);

        assert!(matches!(
            store.promote_user("ghost", Privilege::Admin),
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_salts_differ_between_users() {
        let dir = tmp();
        let store = CredentialStore::new(dir.path());
        assert_eq!(ok(store.add_user("a", "same", Privilege::Admin)), AddUserOutcome::Added);
        assert_eq!(ok(store.add_user("b", "same", Privilege::Admin)), AddUserOutcome::Added);
        let records = ok(store.read_records());
        assert_ne!(records.users[0].salt, records.users[1].salt);
        assert_ne!(records.users[0].digest, records.users[1].digest);
    }
}
