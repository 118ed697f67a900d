//! Credential store: user records, username rules and the snapshot storage
//! contract.
//!
//! The store moves whole snapshots (`load_all`/`save_all`); callers doing a
//! read-modify-write are responsible for serializing against other writers.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod json;

pub use self::json::JsonUserStore;

/// Repository registered on a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One user as stored in the credential snapshot.
///
/// `api_keys` holds SHA-256 digests, never raw keys. Unknown fields in the
/// snapshot are tolerated so other tools can annotate records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub password_hash: String,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl UserRecord {
    #[must_use]
    pub fn has_repo(&self, name: &str) -> bool {
        self.repos.iter().any(|repo| repo.name == name)
    }
}

/// All users, keyed by normalized username.
pub type Users = BTreeMap<String, UserRecord>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Snapshot storage for the credential store.
pub trait UserStore: Send + Sync {
    /// Read the whole snapshot; a store that was never written is empty.
    ///
    /// # Errors
    /// Returns a `StoreError` if the backing representation cannot be read.
    fn load_all(&self) -> Result<Users, StoreError>;

    /// Replace the whole snapshot.
    ///
    /// # Errors
    /// Returns a `StoreError` if the backing representation cannot be
    /// written.
    fn save_all(&self, users: &Users) -> Result<(), StoreError>;

    /// Single-record read.
    ///
    /// # Errors
    /// Propagates `load_all` failures.
    fn get(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.load_all()?.remove(username))
    }

    /// # Errors
    /// Propagates `load_all` failures.
    fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.load_all()?.contains_key(username))
    }

    /// Insert or replace one record.
    ///
    /// # Errors
    /// Propagates snapshot read/write failures.
    fn put(&self, username: &str, record: UserRecord) -> Result<(), StoreError> {
        let mut users = self.load_all()?;
        users.insert(username.to_string(), record);
        self.save_all(&users)
    }
}

/// Normalize a username before any lookup: case-fold and strip whitespace.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Validity check for provisioning, applied after normalization.
#[must_use]
pub fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && Regex::new(r"^[a-z0-9\-]+$").is_ok_and(|regex| regex.is_match(username))
}
