//! Anti-forgery token store.
//!
//! The token is an opaque 32-character alphanumeric string, generated the
//! first time it is needed and persisted in the durable client store. It is
//! never regenerated while present.

use std::fmt;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::persist::{KeyValueStore, StoreError};

/// Durable store key holding the token.
pub const CSRF_STORE_KEY: &str = "csrf_token";

/// Token length in characters.
pub const CSRF_TOKEN_LENGTH: usize = 32;

const CSRF_ALLOWED_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// An anti-forgery token.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token = (0..CSRF_TOKEN_LENGTH)
            .map(|_| CSRF_ALLOWED_CHARS[rng.gen_range(0..CSRF_ALLOWED_CHARS.len())] as char)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(***)")
    }
}

/// Read-or-create access to the persisted token.
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-then-create so two callers never mint two tokens.
    lock: Mutex<()>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Return the persisted token, creating it on first use.
    pub fn token(&self) -> Result<CsrfToken, StoreError> {
        let _guard = self.lock.lock().expect("token store mutex poisoned");

        if let Some(existing) = self.store.get(CSRF_STORE_KEY)? {
            if !existing.is_empty() {
                return Ok(CsrfToken(existing));
            }
        }

        let token = CsrfToken::generate();
        self.store.set(CSRF_STORE_KEY, token.as_str())?;
        tracing::info!("Generated new anti-forgery token");
        Ok(token)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
