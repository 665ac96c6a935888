use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::error::SessionError;
use crate::models::user::{TokenClaims, UserIdentity};

/// Durable home of the raw bearer token.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn save(&self, token: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<String>, SessionError> {
        (**self).load()
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<(), SessionError> {
        (**self).clear()
    }
}

pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStorage {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<(), SessionError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Decodes the identity carried in the middle segment of a bearer token.
/// The signature is not checked; the backend is the trust boundary.
pub fn decode_token(token: &str) -> Result<UserIdentity, SessionError> {
    let token = token.trim();
    let payload = token
        .split('.')
        .nth(1)
        .map(|segment| segment.trim_end_matches('='))
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SessionError::MalformedToken("missing payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| SessionError::MalformedToken(format!("payload is not base64: {}", e)))?;

    let claims: TokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedToken(format!("payload is not valid claims: {}", e)))?;

    Ok(UserIdentity::from_claims(claims, token.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Anonymous,
    Restored(UserIdentity),
    /// A stored token could not be decoded and the session was logged out.
    Invalidated(String),
}

/// Process-wide session. The store is the only writer; everyone else reads
/// through [`SessionStore::subscribe`].
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    identity: watch::Sender<Option<UserIdentity>>,
}

impl SessionStore {
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            storage: Box::new(storage),
            identity,
        }
    }

    /// Rehydrates the session from storage at startup.
    pub fn restore(&self) -> RestoreOutcome {
        let token = match self.storage.load() {
            Ok(Some(token)) => token,
            Ok(None) => return RestoreOutcome::Anonymous,
            Err(e) => {
                log::warn!("Could not read stored session: {}", e);
                return RestoreOutcome::Anonymous;
            }
        };

        match decode_token(&token) {
            Ok(identity) => {
                log::info!("Restored session for {} ({})", identity.email, identity.role);
                self.identity.send_replace(Some(identity.clone()));
                RestoreOutcome::Restored(identity)
            }
            Err(e) => {
                log::error!("Invalid or expired session, logging out: {}", e);
                self.logout();
                RestoreOutcome::Invalidated(e.to_string())
            }
        }
    }

    /// Decodes, persists and publishes a fresh token. A token that does not
    /// decode ends the session.
    pub fn login(&self, token: &str) -> Result<UserIdentity, SessionError> {
        let identity = match decode_token(token) {
            Ok(identity) => identity,
            Err(e) => {
                log::error!("Login failed, invalid token: {}", e);
                self.logout();
                return Err(e);
            }
        };

        self.storage.save(&identity.token)?;
        log::info!("Signed in as {} ({})", identity.email, identity.role);
        self.identity.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    pub fn logout(&self) {
        if let Err(e) = self.storage.clear() {
            log::warn!("Failed to clear stored token: {}", e);
        }
        let previous = self.identity.send_replace(None);
        if let Some(user) = previous {
            log::info!("Signed out {}", user.email);
        }
    }

    pub fn current(&self) -> Option<UserIdentity> {
        self.identity.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.identity.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::user::Role;
    use serde_json::json;
    use std::sync::Arc;

    pub(crate) fn make_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_decode_token_claims() {
        let token = make_token(json!({"sub": "owner@example.com", "role": "OWNER", "id": 42}));
        let identity = decode_token(&token).unwrap();

        assert_eq!(identity.email, "owner@example.com");
        assert_eq!(identity.role, Role::Owner);
        assert_eq!(identity.id.as_deref(), Some("42"));
        assert_eq!(identity.token, token);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_token("not-a-token").is_err());
        assert!(decode_token("a.!!!.c").is_err());
        let no_role = make_token(json!({"sub": "x@example.com"}));
        assert!(decode_token(&no_role).is_err());
    }

    #[test]
    fn test_malformed_stored_token_forces_logout() {
        let storage = Arc::new(MemoryTokenStorage::with_token("garbage.token"));
        let store = SessionStore::new(storage.clone());

        let outcome = store.restore();

        assert!(matches!(outcome, RestoreOutcome::Invalidated(_)));
        assert_eq!(store.current(), None);
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn test_restore_valid_token() {
        let token = make_token(json!({"sub": "m@example.com", "role": "MEMBER", "id": "7"}));
        let store = SessionStore::new(MemoryTokenStorage::with_token(&token));

        match store.restore() {
            RestoreOutcome::Restored(identity) => assert_eq!(identity.role, Role::Member),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_login_publishes_and_logout_clears() {
        let storage = Arc::new(MemoryTokenStorage::default());
        let store = SessionStore::new(storage.clone());
        let receiver = store.subscribe();

        let token = make_token(json!({"sub": "s@example.com", "role": "SECRETARY", "id": 3}));
        store.login(&token).unwrap();

        assert_eq!(receiver.borrow().as_ref().map(|u| u.role), Some(Role::Secretary));
        assert_eq!(storage.load().unwrap(), Some(token));

        store.logout();
        assert!(receiver.borrow().is_none());
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn test_bad_login_token_ends_existing_session() {
        let token = make_token(json!({"sub": "u@example.com", "role": "USER", "id": 1}));
        let store = SessionStore::new(MemoryTokenStorage::default());
        store.login(&token).unwrap();

        assert!(store.login("bad").is_err());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("nested").join("token"));

        assert_eq!(storage.load().unwrap(), None);
        storage.save("abc.def.ghi").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("abc.def.ghi"));
        storage.clear().unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
