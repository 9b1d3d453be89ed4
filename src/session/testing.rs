//! In-process collaborators for session unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;

use crate::backend::{AuthApi, Credential, Query, Row, Session, SignInOutcome, TableApi, PROFILES};
use crate::error::{GuardError, GuardResult};

pub(crate) struct StaticAuth {
    session: Option<Session>,
    failure: Option<String>,
    fail_sign_out: AtomicBool,
    session_calls: AtomicU32,
    sign_in_calls: AtomicU32,
    sign_out_calls: AtomicU32,
}

impl StaticAuth {
    fn build(session: Option<Session>, failure: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            session,
            failure,
            fail_sign_out: AtomicBool::new(false),
            session_calls: AtomicU32::new(0),
            sign_in_calls: AtomicU32::new(0),
            sign_out_calls: AtomicU32::new(0),
        })
    }

    pub(crate) fn with_session(session: Option<Session>) -> Arc<Self> {
        Self::build(session, None)
    }

    pub(crate) fn signed_in(subject_id: &str, email: &str) -> Arc<Self> {
        let now = Utc::now();
        Self::with_session(Session::new(subject_id, email, now, now + Duration::hours(1)))
    }

    pub(crate) fn failing(message: &str) -> Arc<Self> {
        Self::build(None, Some(message.to_string()))
    }

    pub(crate) fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    pub(crate) fn session_calls(&self) -> u32 {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> u32 {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthApi for StaticAuth {
    async fn current_session(&self) -> GuardResult<Option<Session>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(GuardError::TransientBackend(message.clone())),
            None => Ok(self.session.clone()),
        }
    }

    async fn sign_in(&self, _email: &str, credential: &Credential) -> GuardResult<SignInOutcome> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        match (credential, &self.session) {
            (Credential::MagicLink, _) => Ok(SignInOutcome::LinkSent),
            (Credential::Password(_), Some(session)) => Ok(SignInOutcome::SignedIn(session.clone())),
            (Credential::Password(_), None) => Err(GuardError::AuthFailure("Invalid login credentials".into())),
        }
    }

    async fn sign_out(&self) -> GuardResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(GuardError::TransientBackend("sign-out unreachable".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct StaticTables {
    rows: Mutex<HashMap<String, Vec<Row>>>,
}

impl StaticTables {
    pub(crate) fn with_profile(subject_id: &str, status: &str) -> Self {
        let tables = Self::default();
        let mut row = Row::new();
        row.insert("id".into(), Value::from(subject_id));
        row.insert("status".into(), Value::from(status));
        tables.rows.lock().unwrap().insert(PROFILES.to_string(), vec![row]);
        tables
    }

    pub(crate) fn profile_status(&self, subject_id: &str) -> Option<String> {
        let rows = self.rows.lock().unwrap();
        rows.get(PROFILES)?
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(subject_id))
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl TableApi for StaticTables {
    async fn select(&self, table: &str, query: &Query) -> GuardResult<Vec<Row>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(table).map(|r| query.apply(r)).unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Row) -> GuardResult<Row> {
        self.rows.lock().unwrap().entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Row) -> GuardResult<Vec<Row>> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = Vec::new();
        for row in rows.entry(table.to_string()).or_default().iter_mut() {
            if query.matches(row) {
                row.extend(patch.clone());
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}
