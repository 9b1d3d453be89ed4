//! Hosted backend collaborator.
//!
//! # Data Flow
//! ```text
//! SessionGuard   → AuthApi    (current session, sign in/out)
//!                → TableApi   (profile reactivation)
//! RetryLoader    → TableApi   (probe + read)
//! UploadPipeline → StorageApi (primary object storage)
//!                → TableApi   (inline-encoded fallback)
//! ```
//!
//! # Design Decisions
//! - The backend is opaque: components only see these three traits
//! - `rest.rs` speaks the hosted service's REST dialect over the
//!   outbound middleware chain; tests substitute in-process fakes

pub mod query;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GuardResult;

pub use self::query::{Filter, Order, Query, Row};
pub use self::rest::RestBackend;

/// User profiles.
pub const PROFILES: &str = "profiles";
/// Submitted user reports.
pub const REPORTS: &str = "reports";
/// Marketing campaigns.
pub const CAMPAIGNS: &str = "campaigns";
/// Per-user earnings.
pub const EARNINGS: &str = "earnings";

/// Server-issued proof of an authenticated identity.
///
/// A session is either complete or absent: [`Session::new`] refuses to build
/// one without a subject id and an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    subject_id: String,
    email: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Option<Self> {
        let subject_id = subject_id.into();
        let email = email.into();
        if subject_id.trim().is_empty() || email.trim().is_empty() {
            return None;
        }
        Some(Self {
            subject_id,
            email,
            issued_at,
            expires_at,
        })
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Sign-in credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    /// Passwordless: the backend mails a one-time link.
    MagicLink,
}

/// Result of a sign-in request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn(Session),
    LinkSent,
}

/// Authentication capability group.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// The caller's session, if any.
    async fn current_session(&self) -> GuardResult<Option<Session>>;

    async fn sign_in(&self, email: &str, credential: &Credential) -> GuardResult<SignInOutcome>;

    async fn sign_out(&self) -> GuardResult<()>;
}

/// Keyed row storage over named collections.
#[async_trait]
pub trait TableApi: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> GuardResult<Vec<Row>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Row) -> GuardResult<Row>;

    /// Patch every row matching `query`; returns the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Row) -> GuardResult<Vec<Row>>;
}

/// Object storage.
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Store bytes under `path` in `bucket`; returns the stored object path.
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> GuardResult<String>;

    /// Public locator for a stored object.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
