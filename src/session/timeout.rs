//! Inactivity timeout.
//!
//! # Responsibilities
//! - Record the most recent user interaction
//! - Periodically compare idle time against the configured timeout
//! - Force a logout and notify the user once it is exceeded

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::config::SessionTimeoutConfig;
use crate::notice::{Notice, Notifier};
use crate::observability::metrics;
use crate::session::guard::{Redirect, SessionGuard};

/// Message shown when the session ends for inactivity.
pub const INACTIVITY_NOTICE: &str = "Your session has expired due to inactivity. Please log in again.";

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityEvent {
    Click,
    MouseMove,
    KeyPress,
    Scroll,
    TouchStart,
}

impl ActivityEvent {
    pub const ALL: [ActivityEvent; 5] = [
        ActivityEvent::Click,
        ActivityEvent::MouseMove,
        ActivityEvent::KeyPress,
        ActivityEvent::Scroll,
        ActivityEvent::TouchStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::Click => "click",
            ActivityEvent::MouseMove => "mousemove",
            ActivityEvent::KeyPress => "keypress",
            ActivityEvent::Scroll => "scroll",
            ActivityEvent::TouchStart => "touchstart",
        }
    }
}

impl FromStr for ActivityEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityEvent::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("not an activity event: {}", s))
    }
}

/// Time of the last user interaction, shared by the whole page.
#[derive(Debug)]
pub struct ActivityClock {
    last_activity: Mutex<Instant>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self, event: ActivityEvent) {
        tracing::trace!(event = event.as_str(), "User activity");
        *self.last_activity.lock().expect("activity clock mutex poisoned") = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().expect("activity clock mutex poisoned")
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }
}

/// Background monitor that logs the user out after inactivity.
pub struct SessionTimeout {
    guard: Arc<SessionGuard>,
    clock: Arc<ActivityClock>,
    notifier: Arc<dyn Notifier>,
    config: SessionTimeoutConfig,
}

impl SessionTimeout {
    pub fn new(
        guard: Arc<SessionGuard>,
        clock: Arc<ActivityClock>,
        notifier: Arc<dyn Notifier>,
        config: SessionTimeoutConfig,
    ) -> Self {
        Self {
            guard,
            clock,
            notifier,
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_minutes.saturating_mul(60))
    }

    /// One poll. Returns the logout redirect if the session was ended.
    pub async fn check(&self) -> Option<Redirect> {
        let idle = self.clock.idle_for();
        if idle <= self.timeout() {
            return None;
        }

        tracing::warn!(idle_secs = idle.as_secs(), "Session idle past timeout, logging out");
        metrics::record_forced_logout();
        self.notifier.notify(Notice::warning(INACTIVITY_NOTICE));
        Some(self.guard.logout().await)
    }

    /// Poll until a forced logout happens or the page is torn down.
    pub async fn run(self, mut teardown: broadcast::Receiver<()>) -> Option<Redirect> {
        if !self.config.enabled {
            tracing::info!("Session timeout disabled");
            return None;
        }

        tracing::info!(
            timeout_minutes = self.config.timeout_minutes,
            interval = self.config.check_interval_secs,
            "Session timeout monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.check_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(redirect) = self.check().await {
                        return Some(redirect);
                    }
                }
                _ = teardown.recv() => {
                    tracing::info!("Session timeout received teardown signal, exiting loop");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::notice::NoticeQueue;
    use crate::persist::MemoryStore;
    use crate::session::testing::{StaticAuth, StaticTables};

    fn monitor(auth: Arc<StaticAuth>) -> (SessionTimeout, Arc<ActivityClock>, Arc<NoticeQueue>) {
        let guard = Arc::new(SessionGuard::new(
            auth,
            Arc::new(StaticTables::default()),
            Arc::new(MemoryStore::new()),
            AuthConfig::default(),
        ));
        let clock = Arc::new(ActivityClock::new());
        let notices = Arc::new(NoticeQueue::default());
        let timeout = SessionTimeout::new(guard, clock.clone(), notices.clone(), SessionTimeoutConfig::default());
        (timeout, clock, notices)
    }

    #[test]
    fn test_event_names() {
        for event in ActivityEvent::ALL {
            assert_eq!(event.as_str().parse::<ActivityEvent>(), Ok(event));
        }
        assert!("blur".parse::<ActivityEvent>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_idle() {
        let auth = StaticAuth::signed_in("u1", "user@example.com");
        let (timeout, clock, _) = monitor(auth.clone());

        time::advance(Duration::from_secs(29 * 60)).await;
        assert!(timeout.check().await.is_none());

        clock.touch(ActivityEvent::KeyPress);
        time::advance(Duration::from_secs(29 * 60)).await;
        assert!(timeout.check().await.is_none());
        assert_eq!(auth.sign_out_calls(), 0);

        time::advance(Duration::from_secs(2 * 60)).await;
        let redirect = timeout.check().await.unwrap();
        assert_eq!(redirect.location, "login.html?logout=true");
        assert_eq!(auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forces_logout_after_timeout() {
        let auth = StaticAuth::signed_in("u1", "user@example.com");
        let (timeout, _clock, notices) = monitor(auth.clone());
        let (_tx, rx) = broadcast::channel(1);
        let start = Instant::now();

        let redirect = timeout.run(rx).await;

        assert!(redirect.is_some());
        assert_eq!(start.elapsed(), Duration::from_secs(31 * 60));
        assert_eq!(notices.notices(), vec![Notice::warning(INACTIVITY_NOTICE)]);
        assert_eq!(auth.sign_out_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_monitor() {
        let auth = StaticAuth::signed_in("u1", "user@example.com");
        let (timeout, _clock, notices) = monitor(auth.clone());
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(timeout.run(rx));
        time::advance(Duration::from_secs(5 * 60)).await;
        tx.send(()).unwrap();

        assert!(handle.await.unwrap().is_none());
        assert!(notices.notices().is_empty());
        assert_eq!(auth.sign_out_calls(), 0);
    }
}
