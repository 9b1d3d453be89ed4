//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dashguard::backend::{AuthApi, Credential, Query, Row, Session, SignInOutcome, StorageApi, TableApi};
use dashguard::error::{GuardError, GuardResult};

/// Scriptable in-process backend with call counters and failure injection.
#[derive(Default)]
pub struct MockBackend {
    session: Mutex<Option<Session>>,
    session_unreachable: AtomicBool,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    missing_tables: Mutex<HashSet<String>>,
    storage_error: Mutex<Option<String>>,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing_selects: AtomicU32,

    pub session_calls: AtomicU32,
    pub selects: AtomicU32,
    pub inserts: AtomicU32,
    pub updates: AtomicU32,
    pub puts: AtomicU32,
    pub sign_ins: AtomicU32,
    pub sign_outs: AtomicU32,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(subject_id: &str, email: &str) -> Arc<Self> {
        let backend = Self::new();
        backend.set_session(subject_id, email);
        backend
    }

    pub fn set_session(&self, subject_id: &str, email: &str) {
        let now = Utc::now();
        *self.session.lock().unwrap() = Session::new(subject_id, email, now, now + ChronoDuration::hours(1));
    }

    pub fn make_session_unreachable(&self) {
        self.session_unreachable.store(true, Ordering::SeqCst);
    }

    /// Fail the next `n` selects with a transient error.
    pub fn fail_next_selects(&self, n: u32) {
        self.failing_selects.store(n, Ordering::SeqCst);
    }

    pub fn fail_storage(&self, message: &str) {
        *self.storage_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn drop_table(&self, table: &str) {
        self.missing_tables.lock().unwrap().insert(table.to_string());
    }

    pub fn seed(&self, table: &str, row: Value) {
        let row = row.as_object().cloned().unwrap();
        self.rows.lock().unwrap().entry(table.to_string()).or_default().push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.rows.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Every call that would have crossed the network.
    pub fn network_calls(&self) -> u32 {
        [
            &self.session_calls,
            &self.selects,
            &self.inserts,
            &self.updates,
            &self.puts,
            &self.sign_ins,
            &self.sign_outs,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    fn check_table(&self, table: &str) -> GuardResult<()> {
        if self.missing_tables.lock().unwrap().contains(table) {
            return Err(GuardError::Backend {
                status: 404,
                message: format!("relation \"{}\" does not exist", table),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for MockBackend {
    async fn current_session(&self) -> GuardResult<Option<Session>> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if self.session_unreachable.load(Ordering::SeqCst) {
            return Err(GuardError::TransientBackend("auth service unreachable".into()));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn sign_in(&self, email: &str, credential: &Credential) -> GuardResult<SignInOutcome> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        match credential {
            Credential::MagicLink => Ok(SignInOutcome::LinkSent),
            Credential::Password(_) => {
                self.set_session("u-signed-in", email);
                let session = self.session.lock().unwrap().clone();
                session
                    .map(SignInOutcome::SignedIn)
                    .ok_or_else(|| GuardError::AuthFailure("Invalid login credentials".into()))
            }
        }
    }

    async fn sign_out(&self) -> GuardResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl TableApi for MockBackend {
    async fn select(&self, table: &str, query: &Query) -> GuardResult<Vec<Row>> {
        let n = self.selects.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.failing_selects.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_selects.store(remaining - 1, Ordering::SeqCst);
            return Err(GuardError::TransientBackend(format!("connection reset (call {})", n)));
        }
        self.check_table(table)?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(table).map(|r| query.apply(r)).unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Row) -> GuardResult<Row> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.check_table(table)?;
        self.rows.lock().unwrap().entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Row) -> GuardResult<Vec<Row>> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.check_table(table)?;
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

#[async_trait]
impl StorageApi for MockBackend {
    async fn put(&self, bucket: &str, path: &str, bytes: Vec<u8>, _content_type: &str) -> GuardResult<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.storage_error.lock().unwrap().clone() {
            return Err(GuardError::StorageUnavailable(message));
        }
        self.objects.lock().unwrap().insert(format!("{}/{}", bucket, path), bytes);
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{}/{}", bucket, path)
    }
}

/// A request as seen by the programmable server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(SeenRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Start a programmable HTTP server on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
