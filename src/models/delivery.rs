use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::{BagType, Unit};

/// Append-only record of a courier being sent out. Created once per call;
/// the only later mutation is the return timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub unit: Unit,
    pub departure_timestamp: DateTime<Utc>,
    pub return_timestamp: Option<DateTime<Utc>>,
    pub bag_type: BagType,
}
