//! Notification bridge
//!
//! Decouples whoever produces a user-facing notice (HTTP client, services,
//! poller) from the single sink that renders it. Until a sink registers,
//! every call is a no-op.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Error,
    Warn,
    Info,
}

impl NotificationKind {
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Error => "Error",
            Self::Warn => "Warning",
            Self::Info => "Info",
        }
    }

    /// How long the notice stays on screen unless dismissed.
    pub fn life(&self) -> Duration {
        match self {
            Self::Error => Duration::from_secs(5),
            _ => Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// Renders notifications. Implemented by the host (terminal, UI toast, ...).
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn show(&self, notification: Notification) {
        self(notification)
    }
}

/// Handle to the bridge. Clones share the same registered sink.
#[derive(Clone, Default)]
pub struct Notifier {
    sink: Arc<RwLock<Option<Arc<dyn NotificationSink>>>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the sink, replacing any previous one.
    pub fn register(&self, sink: Arc<dyn NotificationSink>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn unregister(&self) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_registered(&self) -> bool {
        self.sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>, title: Option<&str>) {
        // Clone the Arc out so the sink runs without the lock held.
        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sink) = sink else {
            return;
        };

        let notification = Notification {
            kind,
            title: title.unwrap_or(kind.default_title()).to_string(),
            message: message.into(),
        };
        tracing::debug!(kind = ?notification.kind, title = %notification.title, message = %notification.message, "notification");
        sink.show(notification);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Success, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Error, message, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Warn, message, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationKind::Info, message, None);
    }
}
