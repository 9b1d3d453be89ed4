//! Page gating against an in-process backend.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashguard::backend::{Credential, PROFILES};
use dashguard::config::GuardConfig;
use dashguard::notice::NoticeQueue;
use dashguard::persist::{KeyValueStore, MemoryStore};
use dashguard::session::{AccessOutcome, DenyReason, Destination, SESSION_MARKER_KEY};
use dashguard::AppContext;
use serde_json::json;

mod common;
use common::MockBackend;

fn context(backend: Arc<MockBackend>) -> AppContext {
    let mut config = GuardConfig::default();
    config.auth.admin_emails = vec!["Owner@Dash.io".into(), "ops@dash.io".into()];
    AppContext::new(config, backend, Arc::new(MemoryStore::new()), Arc::new(NoticeQueue::default()))
}

fn denied_target(outcome: &AccessOutcome) -> Option<(Destination, DenyReason)> {
    match outcome {
        AccessOutcome::DeniedRedirect { redirect, reason } => Some((redirect.target, *reason)),
        _ => None,
    }
}

#[tokio::test]
async fn test_admin_match_ignores_case() {
    let ctx = context(MockBackend::new());
    let guard = ctx.session_guard();

    for email in ["owner@dash.io", "OWNER@DASH.IO", "Owner@Dash.io", "oWnEr@dAsH.iO", "OPS@dash.io"] {
        assert!(guard.is_admin(email), "{} should be admin", email);
    }
    for email in ["owner@dash.iox", "user@dash.io", ""] {
        assert!(!guard.is_admin(email), "{} should not be admin", email);
    }
}

#[tokio::test]
async fn test_login_location_always_inert() {
    let backends = [
        MockBackend::new(),
        MockBackend::signed_in("u1", "user@dash.io"),
        MockBackend::signed_in("a1", "owner@dash.io"),
    ];
    backends[0].make_session_unreachable();

    for backend in backends {
        let ctx = context(backend.clone());
        for require_admin in [false, true] {
            let outcome = ctx.session_guard().resolve_access("https://app/login.html", require_admin).await;
            assert_eq!(outcome, AccessOutcome::Inert);
        }
        assert_eq!(backend.session_calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_no_session_redirects_to_login() {
    let ctx = context(MockBackend::new());

    let outcome = ctx.session_guard().resolve_access("reports.html", false).await;
    assert_eq!(denied_target(&outcome), Some((Destination::Login, DenyReason::NoSession)));
}

#[tokio::test]
async fn test_unreachable_auth_redirects_to_login() {
    let backend = MockBackend::signed_in("u1", "user@dash.io");
    backend.make_session_unreachable();
    let ctx = context(backend);

    let outcome = ctx.session_guard().resolve_access("reports.html", false).await;
    assert_eq!(
        denied_target(&outcome),
        Some((Destination::Login, DenyReason::BackendUnavailable))
    );
}

#[tokio::test]
async fn test_non_admin_never_granted_admin_page() {
    let ctx = context(MockBackend::signed_in("u1", "user@dash.io"));
    let guard = ctx.session_guard();

    let outcome = guard.resolve_access("admin.html", true).await;
    assert_eq!(denied_target(&outcome), Some((Destination::Dashboard, DenyReason::NotAdmin)));
    match outcome {
        AccessOutcome::DeniedRedirect { redirect, .. } => assert_eq!(redirect.location, "dashboard.html"),
        other => panic!("unexpected {:?}", other),
    }

    // The same user may still open ordinary pages.
    assert!(matches!(
        guard.resolve_access("dashboard.html", false).await,
        AccessOutcome::Granted(_)
    ));
    assert_eq!(
        ctx.session_store().get(SESSION_MARKER_KEY).unwrap().as_deref(),
        Some("u1")
    );
}

#[tokio::test]
async fn test_admin_granted_with_mixed_case_address() {
    let ctx = context(MockBackend::signed_in("a1", "OWNER@dash.io"));

    match ctx.session_guard().resolve_access("admin.html", true).await {
        AccessOutcome::Granted(identity) => assert!(identity.is_admin),
        other => panic!("expected grant, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deleted_profile_reactivated_in_background() {
    let backend = MockBackend::signed_in("u1", "user@dash.io");
    backend.seed(PROFILES, json!({"id": "u1", "status": "deleted"}));
    let ctx = context(backend.clone());

    assert!(matches!(
        ctx.session_guard().resolve_access("dashboard.html", false).await,
        AccessOutcome::Granted(_)
    ));

    tokio::time::timeout(Duration::from_secs(2), async {
        while backend.rows(PROFILES)[0]["status"] != "active" {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("profile was not reactivated");
}

#[tokio::test]
async fn test_denied_admin_page_leaves_deleted_profile_alone() {
    let backend = MockBackend::signed_in("u1", "user@dash.io");
    backend.seed(PROFILES, json!({"id": "u1", "status": "deleted"}));
    let ctx = context(backend.clone());

    let outcome = ctx.session_guard().resolve_access("admin.html", true).await;
    assert_eq!(denied_target(&outcome), Some((Destination::Dashboard, DenyReason::NotAdmin)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.rows(PROFILES)[0]["status"], "deleted");
    assert_eq!(backend.updates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reactivation_failure_never_blocks_outcome() {
    let backend = MockBackend::signed_in("u1", "user@dash.io");
    backend.drop_table(PROFILES);
    let ctx = context(backend);

    assert!(matches!(
        ctx.session_guard().resolve_access("dashboard.html", false).await,
        AccessOutcome::Granted(_)
    ));
}

#[tokio::test]
async fn test_sign_in_and_logout_round() {
    let backend = MockBackend::new();
    let ctx = context(backend.clone());
    let guard = ctx.session_guard();

    assert!(guard
        .sign_in("bad address", &Credential::Password("pw".into()))
        .await
        .is_err());
    assert_eq!(backend.network_calls(), 0);

    guard
        .sign_in("user@dash.io", &Credential::Password("pw".into()))
        .await
        .unwrap();
    assert_eq!(backend.sign_ins.load(Ordering::SeqCst), 1);

    ctx.session_store().set(SESSION_MARKER_KEY, "u-signed-in").unwrap();
    let redirect = guard.logout().await;
    assert_eq!(redirect.location, "login.html?logout=true");
    assert_eq!(backend.sign_outs.load(Ordering::SeqCst), 1);
    assert!(ctx.session_store().get(SESSION_MARKER_KEY).unwrap().is_none());

    let outcome = ctx.session_guard().resolve_access("dashboard.html", false).await;
    assert_eq!(denied_target(&outcome), Some((Destination::Login, DenyReason::NoSession)));
}
