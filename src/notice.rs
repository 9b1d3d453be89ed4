//! User-visible notifications.
//!
//! Failures that the user must see (rate limiting, forced logout, upload
//! errors) are published as transient [`Notice`]s. The hosting shell decides
//! how to display them; stack traces never reach this channel.

use std::sync::Mutex;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, human-readable notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Sink for user-visible notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Emits notices as log events only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "User notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message, "User notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(notice = %notice.message, "User notice")
            }
        }
    }
}

/// Buffers notices until the shell drains them.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    pending: Mutex<Vec<Notice>>,
}

impl NoticeQueue {
    /// Snapshot of queued notices.
    pub fn notices(&self) -> Vec<Notice> {
        self.pending.lock().expect("notice queue mutex poisoned").clone()
    }

    /// Take every queued notice.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.pending.lock().expect("notice queue mutex poisoned"))
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, notice = %notice.message, "Queued user notice");
        self.pending.lock().expect("notice queue mutex poisoned").push(notice);
    }
}
