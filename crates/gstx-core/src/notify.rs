//! # Notification Sink
//!
//! Outbound notification channels (chat webhooks, email) are external
//! collaborators. The pipeline only needs a `send(kind, title, payload)`
//! surface; the default sink forwards to the tracing subscriber.

use serde_json::Value;

use crate::domain::Severity;

/// A destination for operator-facing notifications.
pub trait NotificationSink: Send + Sync {
    /// Dispatch one notification. Implementations must not panic; delivery
    /// failures are their own concern to log.
    fn send(&self, kind: Severity, title: &str, payload: &Value);
}

/// Default sink: structured log lines via `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, kind: Severity, title: &str, payload: &Value) {
        match kind {
            Severity::Critical | Severity::Error => {
                tracing::error!(kind = %kind, title, %payload, "notification")
            }
            Severity::Warning => {
                tracing::warn!(kind = %kind, title, %payload, "notification")
            }
            Severity::Info => {
                tracing::info!(kind = %kind, title, %payload, "notification")
            }
        }
    }
}
