//! Token pair storage and claims decoding. The store is an injected service
//! backed by a [`TokenStorage`] implementation; the in-memory backend covers
//! the session-scoped lifetime the client needs, fakes cover tests.
//!
//! Expiry checks fail safe: a token that cannot be decoded is expired, full
//! stop. Nothing in this module returns an error.

use crate::role::Role;
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims recovered from the access token's payload segment. Only ever used
/// for client-side gating; the server remains the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default, alias = "userId")]
    sub: Option<String>,
    #[serde(default, alias = "type")]
    role: Option<String>,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    /// Role claim, if present and recognized.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|value| value.parse().ok())
    }
}

/// Storage backend for the access/refresh token pair.
///
/// Implementations must keep each operation a single fast synchronous step;
/// the client relies on that for write atomicity under concurrent use.
pub trait TokenStorage: Send + Sync {
    fn access(&self) -> Option<String>;
    fn set_access(&self, token: String);
    fn refresh(&self) -> Option<SecretString>;
    fn set_refresh(&self, token: SecretString);
    fn clear(&self);
}

/// Session-scoped in-memory backend. Tokens live until cleared or the
/// process ends, the analogue of tab-session storage.
#[derive(Default)]
pub struct MemoryTokenStorage {
    inner: Mutex<StoredPair>,
}

#[derive(Default)]
struct StoredPair {
    access: Option<String>,
    refresh: Option<SecretString>,
}

impl MemoryTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn access(&self) -> Option<String> {
        self.inner.lock().map_or(None, |pair| pair.access.clone())
    }

    fn set_access(&self, token: String) {
        if let Ok(mut pair) = self.inner.lock() {
            pair.access = Some(token);
        }
    }

    fn refresh(&self) -> Option<SecretString> {
        self.inner.lock().map_or(None, |pair| pair.refresh.clone())
    }

    fn set_refresh(&self, token: SecretString) {
        if let Ok(mut pair) = self.inner.lock() {
            pair.refresh = Some(token);
        }
    }

    fn clear(&self) {
        if let Ok(mut pair) = self.inner.lock() {
            pair.access = None;
            pair.refresh = None;
        }
    }
}

/// Handle over a [`TokenStorage`] adding expiry and claims logic. Cheap to
/// clone; clones share the same backend.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_storage(Arc::new(MemoryTokenStorage::new()))
    }

    #[must_use]
    pub fn with_storage(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn access(&self) -> Option<String> {
        self.storage.access()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.storage.refresh()
    }

    /// Stores a new access/refresh pair. A later write always wins, so stale
    /// responses arriving after navigation are applied idempotently.
    pub fn set_pair(&self, access: &str, refresh: &str) {
        self.storage.set_access(access.to_string());
        self.storage.set_refresh(SecretString::from(refresh.to_string()));
    }

    pub fn clear(&self) {
        self.storage.clear();
    }

    /// Decodes the payload segment of a token. `None` on any malformed input.
    #[must_use]
    pub fn decode_claims(token: &str) -> Option<Claims> {
        let payload = token.split('.').nth(1)?;
        let bytes = Base64UrlUnpadded::decode_vec(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Whether a token's `exp` is in the past. Fails safe: any decode error
    /// reads as expired.
    #[must_use]
    pub fn is_expired(token: &str) -> bool {
        Self::decode_claims(token).is_none_or(|claims| claims.exp <= now_unix())
    }

    /// The stored access token, only when present and not expired.
    #[must_use]
    pub fn valid_access(&self) -> Option<String> {
        self.access().filter(|token| !Self::is_expired(token))
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.valid_access().is_some()
    }

    /// Role claim of the stored token; `None` on missing, expired or
    /// undecodable tokens.
    #[must_use]
    pub fn current_role(&self) -> Option<Role> {
        self.valid_access()
            .and_then(|token| Self::decode_claims(&token))
            .and_then(|claims| claims.role())
    }

    /// Subject claim of the stored token; same absence rules as
    /// [`Self::current_role`].
    #[must_use]
    pub fn current_user_id(&self) -> Option<String> {
        self.valid_access()
            .and_then(|token| Self::decode_claims(&token))
            .and_then(|claims| claims.user_id().map(str::to_string))
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
