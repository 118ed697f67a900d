//! JSON-file snapshot of the credential store.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use super::{StoreError, UserStore, Users};

/// `users.json` on disk.
///
/// Reads tolerate a missing file (empty store); writes replace the whole
/// snapshot. The internal lock keeps individual reads and writes from
/// interleaving; multi-step read-modify-write sequences are serialized by
/// the caller.
pub struct JsonUserStore {
    path: PathBuf,
    file_lock: Mutex<()>,
}

impl JsonUserStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UserStore for JsonUserStore {
    fn load_all(&self) -> Result<Users, StoreError> {
        let _guard = self
            .file_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Users::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save_all(&self, users: &Users) -> Result<(), StoreError> {
        let _guard = self
            .file_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(users)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
