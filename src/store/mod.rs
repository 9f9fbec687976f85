mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::courier::{BagType, Courier, CourierStatus, Unit, Workdays};
use crate::models::delivery::DeliveryEvent;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("courier {0} not found")]
    NotFound(Uuid),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CourierFilter {
    pub unit: Option<Unit>,
    pub status: Option<CourierStatus>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewCourier {
    pub name: String,
    pub phone: String,
    pub unit: Unit,
    pub workdays: Workdays,
    pub use_default_shift: bool,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
}

/// Partial update; `None` leaves the field untouched. Nullable fields use a
/// nested `Option` so they can be explicitly cleared.
#[derive(Debug, Clone, Default)]
pub struct CourierPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<CourierStatus>,
    pub active: Option<bool>,
    pub queue_position: Option<DateTime<Utc>>,
    pub workdays: Option<Workdays>,
    pub use_default_shift: Option<bool>,
    pub shift_start: Option<Option<NaiveTime>>,
    pub shift_end: Option<Option<NaiveTime>>,
    pub departure_time: Option<Option<DateTime<Utc>>>,
    pub bag_type: Option<BagType>,
}

/// Persistence boundary for couriers and delivery events. The store is the
/// single source of truth; callers re-read rather than trusting local state.
#[async_trait]
pub trait CourierStore: Send + Sync {
    async fn list(&self, filter: CourierFilter) -> Result<Vec<Courier>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Courier>, StoreError>;

    async fn create(&self, new: NewCourier) -> Result<Courier, StoreError>;

    async fn update(&self, id: Uuid, patch: CourierPatch) -> Result<Courier, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn create_event(&self, event: DeliveryEvent) -> Result<DeliveryEvent, StoreError>;

    /// Events with a departure timestamp inside `[from, to)`.
    async fn list_events(
        &self,
        unit: Unit,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, StoreError>;

    /// Stamp the return timestamp on the courier's most recent open event.
    /// No-op when there is none.
    async fn close_open_event(
        &self,
        courier_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Delete events departed strictly before `cutoff`, returning the count.
    async fn purge_events_before(&self, unit: Unit, cutoff: DateTime<Utc>)
        -> Result<u64, StoreError>;
}
