//! Page gating.
//!
//! # Algorithm
//! ```text
//! location is the login page      → Inert
//! no session / fetch failed       → DeniedRedirect(login)
//! session expired                 → DeniedRedirect(login)
//! require_admin && !admin         → DeniedRedirect(dashboard)
//! otherwise                       → Granted(identity)
//! ```
//!
//! Resolution never fails: every error path ends in a redirect decision.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::backend::{AuthApi, Credential, Query, Row, Session, SignInOutcome, TableApi, PROFILES};
use crate::config::AuthConfig;
use crate::error::{GuardResult, ValidationError};
use crate::observability::metrics;
use crate::persist::KeyValueStore;
use crate::security::sanitize::validate_email;

/// Per-session marker set once a page is granted; cleared on logout.
pub const SESSION_MARKER_KEY: &str = "session.subject";

/// Static allow-list of administrator addresses.
#[derive(Debug, Clone, Default)]
pub struct AdminRoster {
    emails: HashSet<String>,
}

impl AdminRoster {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails.into_iter().map(|e| e.as_ref().to_lowercase()).collect(),
        }
    }

    /// Case-insensitive membership.
    pub fn is_admin(&self, email: &str) -> bool {
        self.emails.contains(&email.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Resolved caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub is_admin: bool,
}

/// Where a redirect leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Login,
    Dashboard,
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    SessionExpired,
    /// The session could not be fetched. Still redirects to login.
    BackendUnavailable,
    NotAdmin,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NoSession => "no_session",
            DenyReason::SessionExpired => "session_expired",
            DenyReason::BackendUnavailable => "backend_unavailable",
            DenyReason::NotAdmin => "not_admin",
        }
    }
}

/// Navigation the hosting shell should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: Destination,
    pub location: String,
    /// Settling delay before navigating. Zero navigates immediately.
    pub delay: Duration,
}

/// Result of gating a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted(Identity),
    DeniedRedirect { redirect: Redirect, reason: DenyReason },
    /// Already on the login page; do nothing.
    Inert,
}

impl AccessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AccessOutcome::Granted(_) => "granted",
            AccessOutcome::DeniedRedirect { .. } => "denied",
            AccessOutcome::Inert => "inert",
        }
    }
}

/// Decides, before protected content renders, who the caller is.
///
/// One guard serves one page: the session is fetched at most once and
/// reused for every later decision until `logout` drops it.
pub struct SessionGuard {
    auth: Arc<dyn AuthApi>,
    tables: Arc<dyn TableApi>,
    session_store: Arc<dyn KeyValueStore>,
    roster: AdminRoster,
    config: AuthConfig,
    /// `None` until fetched; `Some(None)` once known to be signed out.
    session: Mutex<Option<Option<Session>>>,
}

impl SessionGuard {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        tables: Arc<dyn TableApi>,
        session_store: Arc<dyn KeyValueStore>,
        config: AuthConfig,
    ) -> Self {
        let roster = AdminRoster::new(&config.admin_emails);
        Self {
            auth,
            tables,
            session_store,
            roster,
            config,
            session: Mutex::new(None),
        }
    }

    pub fn roster(&self) -> &AdminRoster {
        &self.roster
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.roster.is_admin(email)
    }

    fn redirect(&self, target: Destination) -> Redirect {
        let location = match target {
            Destination::Login => self.config.login_path.clone(),
            Destination::Dashboard => self.config.dashboard_path.clone(),
        };
        Redirect {
            target,
            location,
            delay: Duration::from_millis(self.config.redirect_delay_ms),
        }
    }

    fn deny(&self, target: Destination, reason: DenyReason) -> AccessOutcome {
        tracing::info!(reason = reason.as_str(), ?target, "Access denied");
        AccessOutcome::DeniedRedirect {
            redirect: self.redirect(target),
            reason,
        }
    }

    /// Fetch the session once. Failures are not cached.
    async fn session(&self) -> GuardResult<Option<Session>> {
        let mut cached = self.session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok(session.clone());
        }
        let session = self.auth.current_session().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    /// Gate the page at `location`.
    pub async fn resolve_access(&self, location: &str, require_admin: bool) -> AccessOutcome {
        let outcome = self.decide(location, require_admin).await;
        metrics::record_access_decision(outcome.label());
        outcome
    }

    async fn decide(&self, location: &str, require_admin: bool) -> AccessOutcome {
        if location.contains(&self.config.login_path) {
            tracing::debug!(location, "On login page, guard inert");
            return AccessOutcome::Inert;
        }

        let session = match self.session().await {
            Ok(Some(session)) => session,
            Ok(None) => return self.deny(Destination::Login, DenyReason::NoSession),
            Err(e) => {
                tracing::warn!(error = %e, "Session fetch failed, treating as signed out");
                return self.deny(Destination::Login, DenyReason::BackendUnavailable);
            }
        };

        if session.is_expired_at(Utc::now()) {
            return self.deny(Destination::Login, DenyReason::SessionExpired);
        }

        let identity = Identity {
            subject_id: session.subject_id().to_string(),
            email: session.email().to_string(),
            is_admin: self.roster.is_admin(session.email()),
        };

        if require_admin && !identity.is_admin {
            return self.deny(Destination::Dashboard, DenyReason::NotAdmin);
        }

        self.spawn_reactivation(&identity.subject_id);

        if let Err(e) = self.session_store.set(SESSION_MARKER_KEY, &identity.subject_id) {
            tracing::warn!(error = %e, "Failed to record session marker");
        }
        tracing::info!(subject = %identity.subject_id, admin = identity.is_admin, "Access granted");
        AccessOutcome::Granted(identity)
    }

    fn spawn_reactivation(&self, subject_id: &str) {
        let tables = self.tables.clone();
        let subject_id = subject_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = reactivate_if_deleted(tables.as_ref(), &subject_id).await {
                tracing::warn!(subject = %subject_id, error = %e, "Profile reactivation failed");
            }
        });
    }

    /// Validate the address locally, then ask the backend to sign in.
    pub async fn sign_in(&self, email: &str, credential: &Credential) -> GuardResult<SignInOutcome> {
        let email = email.trim();
        if !validate_email(email) {
            return Err(ValidationError::InvalidEmail(email.to_string()).into());
        }
        if let Credential::Password(password) = credential {
            if password.is_empty() {
                return Err(ValidationError::InvalidInput("password must not be empty".to_string()).into());
            }
        }
        self.auth.sign_in(email, credential).await
    }

    /// End the session. Always yields the logged-out login redirect.
    pub async fn logout(&self) -> Redirect {
        if let Err(e) = self.auth.sign_out().await {
            tracing::warn!(error = %e, "Backend sign-out failed");
        }
        *self.session.lock().await = Some(None);
        if let Err(e) = self.session_store.clear() {
            tracing::warn!(error = %e, "Failed to clear session store");
        }
        tracing::info!("Logged out");

        let mut redirect = self.redirect(Destination::Login);
        redirect.location = format!("{}?logout=true", self.config.login_path);
        redirect
    }
}

/// Flip a `deleted` profile back to `active`. Returns whether it did.
pub async fn reactivate_if_deleted(tables: &dyn TableApi, subject_id: &str) -> GuardResult<bool> {
    let rows = tables
        .select(PROFILES, &Query::by_id(subject_id).select("status"))
        .await?;
    let deleted = rows
        .first()
        .and_then(|row| row.get("status"))
        .and_then(Value::as_str)
        == Some("deleted");
    if !deleted {
        return Ok(false);
    }

    let mut patch = Row::new();
    patch.insert("status".to_string(), Value::from("active"));
    patch.insert("updated_at".to_string(), Value::from(Utc::now().to_rfc3339()));
    tables.update(PROFILES, &Query::by_id(subject_id), patch).await?;

    tracing::info!(subject = %subject_id, "Reactivated deleted profile");
    Ok(true)
}
