mod announcer;
mod whatsapp;

pub use announcer::{Announcer, BroadcastAnnouncer};
pub use whatsapp::WhatsAppNotifier;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::observability::metrics::Metrics;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification rejected with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Push-message sender. Best-effort: callers never block a status
/// transition on the outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError>;
}

/// Stand-in when no messaging backend is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, phone: &str, text: &str) -> Result<(), NotifyError> {
        debug!(phone, text, "notifier not configured; message dropped");
        Ok(())
    }
}

/// Digits only, country code prepended when absent.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with(country_code) {
        digits
    } else {
        format!("{country_code}{digits}")
    }
}

/// Fire-and-forget send. Failures are logged and counted, never propagated;
/// the courier's queue state stays authoritative even when the message is
/// lost.
pub fn send_best_effort(notifier: Arc<dyn Notifier>, metrics: Metrics, phone: String, text: String) {
    tokio::spawn(async move {
        match notifier.send(&phone, &text).await {
            Ok(()) => {
                metrics
                    .notifications_total
                    .with_label_values(&["success"])
                    .inc();
            }
            Err(err) => {
                metrics
                    .notifications_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(phone, error = %err, "notification send failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::normalize_phone;

    #[test]
    fn strips_formatting_and_prepends_country_code() {
        assert_eq!(normalize_phone("(11) 99999-0000", "55"), "5511999990000");
    }

    #[test]
    fn keeps_existing_country_code() {
        assert_eq!(normalize_phone("5511999990000", "55"), "5511999990000");
    }
}
