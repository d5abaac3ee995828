use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::error::{ClientError, ClientResult};

const TOKEN_FILE: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub username: String,
    pub email: String,
}

/// Bearer token plus whatever identity the last login reported.
///
/// A user is only ever attached to a token; the constructors are the only
/// way to build one so that invariant cannot be broken from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<UserIdentity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(token: impl Into<String>, user: Option<UserIdentity>) -> Self {
        Self {
            token: Some(token.into()),
            user,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Durable home for the bearer token. Only the token survives a restart.
pub trait TokenStorage: Send + Sync {
    fn read(&self) -> ClientResult<Option<String>>;
    fn write(&self, token: &str) -> ClientResult<()>;
    fn remove(&self) -> ClientResult<()>;
}

#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    #[instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join(TOKEN_FILE);
        info!(token_file = %path.display(), "opened token storage");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, err: impl std::fmt::Display) -> ClientError {
        ClientError::Storage(format!("{}: {err}", self.path.display()))
    }
}

impl TokenStorage for FileTokenStorage {
    fn read(&self) -> ClientResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(non_blank(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.storage_error(err)),
        }
    }

    fn write(&self, token: &str) -> ClientResult<()> {
        debug!(file = %self.path.display(), "persisting token atomically");
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        // NamedTempFile is created owner-only, so the token never sits in a
        // world-readable file.
        let mut temp = NamedTempFile::new_in(dir).map_err(|err| self.storage_error(err))?;
        temp.write_all(token.as_bytes())
            .and_then(|()| temp.flush())
            .map_err(|err| self.storage_error(err))?;
        temp.persist(&self.path)
            .map_err(|err| self.storage_error(err))?;
        Ok(())
    }

    fn remove(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.storage_error(err)),
        }
    }
}

/// Keeps the token in memory only; used for throwaway sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn read(&self) -> ClientResult<Option<String>> {
        Ok(self.slot.lock().as_deref().and_then(non_blank))
    }

    fn write(&self, token: &str) -> ClientResult<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> ClientResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    state: RwLock<Session>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self {
            storage,
            state: RwLock::new(Session::anonymous()),
        }
    }

    /// Rehydrates the in-memory session from durable storage. The user is
    /// never stored, so a loaded session carries a token only.
    #[instrument(skip(self))]
    pub fn load(&self) -> ClientResult<Session> {
        let token = self.storage.read()?;
        let session = match token {
            Some(token) => Session::authenticated(token, None),
            None => Session::anonymous(),
        };
        debug!(authenticated = session.is_authenticated(), "loaded session");
        *self.state.write() = session.clone();
        Ok(session)
    }

    #[instrument(skip(self, token, user), fields(username = user.as_ref().map(|u| u.username.as_str())))]
    pub fn save(&self, token: &str, user: Option<UserIdentity>) -> ClientResult<()> {
        let Some(token) = non_blank(token) else {
            return Err(ClientError::Storage(
                "refusing to save an empty session token".to_string(),
            ));
        };
        self.storage.write(&token)?;
        *self.state.write() = Session::authenticated(token, user);
        info!("session saved");
        Ok(())
    }

    /// Forgets the session. The in-memory state is reset even when the
    /// durable copy cannot be removed.
    #[instrument(skip(self))]
    pub fn clear(&self) -> ClientResult<()> {
        *self.state.write() = Session::anonymous();
        self.storage.remove()?;
        info!("session cleared");
        Ok(())
    }

    pub fn current(&self) -> Session {
        self.state.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{FileTokenStorage, MemoryTokenStorage, SessionStore, TokenStorage, UserIdentity};

    fn alice() -> UserIdentity {
        UserIdentity {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
        }
    }

    #[test]
    fn save_then_load_returns_same_token_across_instances() {
        let temp = tempdir().expect("tempdir");

        let first = SessionStore::new(Box::new(
            FileTokenStorage::open(temp.path()).expect("open storage"),
        ));
        first.save("t1", Some(alice())).expect("save session");
        assert_eq!(first.current().user(), Some(&alice()));

        let second = SessionStore::new(Box::new(
            FileTokenStorage::open(temp.path()).expect("reopen storage"),
        ));
        let loaded = second.load().expect("load session");
        assert_eq!(loaded.token(), Some("t1"));
        assert!(loaded.user().is_none(), "identity is not persisted");
    }

    #[test]
    fn blank_or_missing_token_loads_unauthenticated() {
        let temp = tempdir().expect("tempdir");
        let storage = FileTokenStorage::open(temp.path()).expect("open storage");
        std::fs::write(storage.path(), "   \n").expect("write blank token");

        let store = SessionStore::new(Box::new(storage));
        assert!(!store.load().expect("load").is_authenticated());

        let empty = SessionStore::new(Box::new(MemoryTokenStorage::new()));
        assert!(!empty.load().expect("load").is_authenticated());
    }

    #[test]
    fn clear_removes_token_and_user() {
        let store = SessionStore::new(Box::new(MemoryTokenStorage::with_token("t0")));
        store.load().expect("load");
        store.save("t1", Some(alice())).expect("save");

        store.clear().expect("clear");
        assert!(store.current().user().is_none());
        assert!(store.token().is_none());
        assert!(!store.load().expect("reload").is_authenticated());

        // clearing twice is harmless
        store.clear().expect("clear again");
    }

    #[test]
    fn empty_token_is_rejected() {
        let storage = MemoryTokenStorage::new();
        let store = SessionStore::new(Box::new(storage));
        assert!(store.save("  ", None).is_err());
        assert!(store.token().is_none());
    }

    #[test]
    fn file_storage_remove_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let storage = FileTokenStorage::open(temp.path()).expect("open storage");
        storage.remove().expect("remove missing file");
        storage.write("abc").expect("write");
        assert_eq!(storage.read().expect("read"), Some("abc".to_string()));
        storage.remove().expect("remove");
        assert_eq!(storage.read().expect("read"), None);
    }
}
