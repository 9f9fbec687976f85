use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::state::QueueEvent;

/// Text-to-speech surface. `speak` never fails the caller; a display client
/// that cannot announce simply drops the event.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Publishes announcements on the queue-event channel; TV/ws clients render
/// them (on-device speech synthesis lives with the display, not here).
pub struct BroadcastAnnouncer {
    tx: broadcast::Sender<QueueEvent>,
}

impl BroadcastAnnouncer {
    pub fn new(tx: broadcast::Sender<QueueEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Announcer for BroadcastAnnouncer {
    async fn speak(&self, text: &str) {
        if self
            .tx
            .send(QueueEvent::Announcement {
                text: text.to_string(),
            })
            .is_err()
        {
            debug!(text, "no announcement listeners connected");
        }
    }
}
