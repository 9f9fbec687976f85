use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::engine::ordering::available_queue;
use crate::engine::timers::TimerRegistry;
use crate::models::courier::{BagType, Courier, CourierStatus, ShiftWindow, Unit};
use crate::notify::{Announcer, BroadcastAnnouncer, Notifier};
use crate::observability::metrics::Metrics;
use crate::store::CourierStore;

/// Everything a display client needs in one payload: the ordered available
/// queue plus whoever is mid-flow.
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub unit: Unit,
    pub available: Vec<Courier>,
    pub called: Vec<Courier>,
    pub delivering: Vec<Courier>,
    pub refreshed_at: DateTime<Utc>,
}

impl QueueView {
    /// Called/delivering couriers bypass eligibility; they are mid-flow
    /// regardless of shift window.
    pub fn compose(
        unit: Unit,
        couriers: &[Courier],
        now_local: NaiveDateTime,
        default_shift: &ShiftWindow,
    ) -> Self {
        let available = available_queue(couriers, now_local, default_shift);
        let called = couriers
            .iter()
            .filter(|c| c.status == CourierStatus::Called)
            .cloned()
            .collect();
        let delivering = couriers
            .iter()
            .filter(|c| c.status == CourierStatus::Delivering)
            .cloned()
            .collect();

        Self {
            unit,
            available,
            called,
            delivering,
            refreshed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    CourierCalled {
        unit: Unit,
        courier_id: Uuid,
        name: String,
        bag_type: BagType,
    },
    CourierDeparted {
        unit: Unit,
        courier_id: Uuid,
        name: String,
    },
    CourierReturned {
        unit: Unit,
        courier_id: Uuid,
        name: String,
        forced: bool,
    },
    QueueReordered {
        unit: Unit,
    },
    Announcement {
        text: String,
    },
}

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CourierStore>,
    pub notifier: Arc<dyn Notifier>,
    pub announcer: Arc<dyn Announcer>,
    pub timers: TimerRegistry,
    pub queue_cache: DashMap<Unit, QueueView>,
    pub queue_events_tx: broadcast::Sender<QueueEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn CourierStore>, notifier: Arc<dyn Notifier>) -> Self {
        let (queue_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let announcer = Arc::new(BroadcastAnnouncer::new(queue_events_tx.clone()));

        Self {
            config,
            store,
            notifier,
            announcer,
            timers: TimerRegistry::new(),
            queue_cache: DashMap::new(),
            queue_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Wall-clock time for eligibility checks; shift windows are local.
    pub fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    pub fn publish(&self, event: QueueEvent) {
        let _ = self.queue_events_tx.send(event);
    }
}
