//! Keeping credentials around between runs.
//!
//! Only the two credentials are ever written. The user's profile stays in
//! memory so a stale copy can't outlive the account it describes.

use crate::{AccessCredential, RefreshCredential};
use serde_derive::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

/// The persisted part of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(rename = "access_token")]
    pub access: AccessCredential,
    #[serde(rename = "refresh_token")]
    pub refresh: RefreshCredential,
}

/// Somewhere the [`SessionManager`](crate::SessionManager) can seed itself
/// from at start-up.
///
/// The session manager is the only thing which should touch a store. It
/// reads once during rehydration and afterwards only writes.
pub trait CredentialStore: Send + Sync + 'static {
    /// Read previously saved credentials, if any.
    fn load(&self) -> Result<Option<StoredCredentials>, StoreError>;
    fn save(&self, credentials: &StoredCredentials) -> Result<(), StoreError>;
    /// Forget everything. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unable to access \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        inner: io::Error,
    },
    #[error("\"{}\" doesn't contain valid credentials", path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        inner: serde_json::Error,
    },
}

/// An in-memory [`CredentialStore`].
///
/// Clones share the same underlying storage, so you can hand one copy to a
/// [`SessionManager`](crate::SessionManager) and inspect it through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    credentials: Arc<Mutex<Option<StoredCredentials>>>,
}

impl MemoryStore {
    pub fn new() -> Self { MemoryStore::default() }

    /// Create a store which already contains some credentials.
    pub fn with_credentials(credentials: StoredCredentials) -> Self {
        MemoryStore {
            credentials: Arc::new(Mutex::new(Some(credentials))),
        }
    }

    /// Peek at the current contents.
    pub fn get(&self) -> Option<StoredCredentials> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool { self.get().is_none() }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StoreError> {
        Ok(self.get())
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), StoreError> {
        *self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

/// A [`CredentialStore`] backed by a JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_error(&self, inner: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            inner,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<StoredCredentials>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&raw).map(Some).map_err(|inner| {
            StoreError::Corrupted {
                path: self.path.clone(),
                inner,
            }
        })
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<(), StoreError> {
        let serialized = serde_json::to_vec_pretty(credentials).map_err(
            |inner| StoreError::Corrupted {
                path: self.path.clone(),
                inner,
            },
        )?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        // write to a sibling file and rename it into place
        let temp = self.temp_path();
        let written = write_private(&temp, &serialized)
            .and_then(|()| fs::rename(&temp, &self.path));

        if let Err(e) = written {
            let _ = fs::remove_file(&temp);
            return Err(self.io_error(e));
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Write `contents` to a fresh file only the current user can read.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {},
        Err(e) if e.kind() == io::ErrorKind::NotFound => {},
        Err(e) => return Err(e),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut f = options.open(path)?;
    f.write_all(contents)?;
    f.sync_all()
}
