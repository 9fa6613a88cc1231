use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AuthError;
use crate::types::{PendingLogin, SessionRecord};

/// Single owner of persisted auth state.
///
/// Everything the flow stores — the pending state/verifier for an in-flight
/// login and the token record for an established session — goes through this
/// trait. Consumers (cart gating, admin gating, navbar) never touch storage
/// directly; they read through [`AuthSession`](crate::context::AuthSession).
pub trait SessionStore: Send + Sync {
    fn pending(&self) -> Option<PendingLogin>;
    fn set_pending(&self, pending: PendingLogin) -> Result<(), AuthError>;
    fn clear_pending(&self);

    fn session(&self) -> Option<SessionRecord>;
    fn set_session(&self, record: SessionRecord) -> Result<(), AuthError>;
    fn clear_session(&self);
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredState {
    pending: Option<PendingLogin>,
    session: Option<SessionRecord>,
}

/// In-memory store scoped to one logical session, the equivalent of one
/// browser tab's `sessionStorage`.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<StoredState>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoredState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn pending(&self) -> Option<PendingLogin> {
        self.lock().pending.clone()
    }

    fn set_pending(&self, pending: PendingLogin) -> Result<(), AuthError> {
        self.lock().pending = Some(pending);
        Ok(())
    }

    fn clear_pending(&self) {
        self.lock().pending = None;
    }

    fn session(&self) -> Option<SessionRecord> {
        self.lock().session.clone()
    }

    fn set_session(&self, record: SessionRecord) -> Result<(), AuthError> {
        self.lock().session = Some(record);
        Ok(())
    }

    fn clear_session(&self) {
        self.lock().session = None;
    }
}

/// File-backed store for the CLI flow, one JSON document under the user's
/// config directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store under the default per-user config directory.
    #[must_use]
    pub fn new() -> Self {
        let dir = directories::ProjectDirs::from("org", "gearshop", "gearshop")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".gearshop"));
        Self::with_dir(dir)
    }

    /// Store under an explicit directory.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("session.json"),
        }
    }

    fn read(&self) -> StoredState {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return StoredState::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, path = %self.path.display(), "discarding unreadable session file");
            StoredState::default()
        })
    }

    fn write(&self, state: &StoredState) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        let raw =
            serde_json::to_string_pretty(state).map_err(|e| AuthError::Storage(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn update(
        &self,
        mutate: impl FnOnce(&mut StoredState),
    ) -> Result<(), AuthError> {
        let mut state = self.read();
        mutate(&mut state);
        self.write(&state)
    }

    fn clear_with(&self, mutate: impl FnOnce(&mut StoredState)) {
        if let Err(e) = self.update(mutate) {
            warn!(error = %e, "failed to clear session state");
        }
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for FileSessionStore {
    fn pending(&self) -> Option<PendingLogin> {
        self.read().pending
    }

    fn set_pending(&self, pending: PendingLogin) -> Result<(), AuthError> {
        self.update(|state| state.pending = Some(pending))
    }

    fn clear_pending(&self) {
        self.clear_with(|state| state.pending = None);
    }

    fn session(&self) -> Option<SessionRecord> {
        self.read().session
    }

    fn set_session(&self, record: SessionRecord) -> Result<(), AuthError> {
        self.update(|state| state.session = Some(record))
    }

    fn clear_session(&self) {
        self.clear_with(|state| state.session = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str) -> SessionRecord {
        SessionRecord {
            access_token: token.into(),
            refresh_token: None,
            id_token: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_memory_pending_roundtrip() {
        let store = MemorySessionStore::new();
        assert!(store.pending().is_none());

        store
            .set_pending(PendingLogin {
                state: "s1".into(),
                verifier: "v1".into(),
            })
            .unwrap();
        let pending = store.pending().unwrap();
        assert_eq!(pending.state, "s1");
        assert_eq!(pending.verifier, "v1");

        store.clear_pending();
        assert!(store.pending().is_none());
    }

    #[test]
    fn test_memory_session_roundtrip() {
        let store = MemorySessionStore::new();
        store.set_session(record("tok")).unwrap();
        assert_eq!(store.session().unwrap().access_token, "tok");

        store.clear_session();
        assert!(store.session().is_none());
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());

        store
            .set_pending(PendingLogin {
                state: "s1".into(),
                verifier: "v1".into(),
            })
            .unwrap();
        store.set_session(record("tok")).unwrap();

        // A second handle over the same directory sees the persisted state.
        let reopened = FileSessionStore::with_dir(dir.path());
        assert_eq!(reopened.pending().unwrap().state, "s1");
        assert_eq!(reopened.session().unwrap().access_token, "tok");

        reopened.clear_pending();
        assert!(store.pending().is_none());
        assert_eq!(store.session().unwrap().access_token, "tok");
    }

    #[test]
    fn test_file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::with_dir(dir.path());
        std::fs::write(dir.path().join("session.json"), "not json").unwrap();

        assert!(store.session().is_none());
        store.set_session(record("tok")).unwrap();
        assert_eq!(store.session().unwrap().access_token, "tok");
    }
}
