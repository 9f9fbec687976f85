use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{CourierFilter, CourierPatch, CourierStore, NewCourier, StoreError};
use crate::models::courier::{BagType, Courier, CourierStatus, Unit};
use crate::models::delivery::DeliveryEvent;

/// In-memory store. Authoritative for tests and single-node deploys; all
/// state is lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    couriers: DashMap<Uuid, Courier>,
    events: DashMap<Uuid, DeliveryEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(courier: &Courier, filter: &CourierFilter) -> bool {
    if let Some(unit) = filter.unit {
        if courier.unit != unit {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if courier.status != status {
            return false;
        }
    }
    if let Some(active) = filter.active {
        if courier.active != active {
            return false;
        }
    }
    true
}

#[async_trait]
impl CourierStore for InMemoryStore {
    async fn list(&self, filter: CourierFilter) -> Result<Vec<Courier>, StoreError> {
        Ok(self
            .couriers
            .iter()
            .filter(|entry| matches(entry.value(), &filter))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Courier>, StoreError> {
        Ok(self.couriers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, new: NewCourier) -> Result<Courier, StoreError> {
        let now = Utc::now();
        let courier = Courier {
            id: Uuid::new_v4(),
            name: new.name,
            phone: new.phone,
            unit: new.unit,
            status: CourierStatus::Available,
            active: true,
            queue_position: now,
            workdays: new.workdays,
            use_default_shift: new.use_default_shift,
            shift_start: new.shift_start,
            shift_end: new.shift_end,
            departure_time: None,
            bag_type: BagType::Normal,
            updated_at: now,
        };

        self.couriers.insert(courier.id, courier.clone());
        Ok(courier)
    }

    async fn update(&self, id: Uuid, patch: CourierPatch) -> Result<Courier, StoreError> {
        let mut courier = self.couriers.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if let Some(name) = patch.name {
            courier.name = name;
        }
        if let Some(phone) = patch.phone {
            courier.phone = phone;
        }
        if let Some(status) = patch.status {
            courier.status = status;
        }
        if let Some(active) = patch.active {
            courier.active = active;
        }
        if let Some(queue_position) = patch.queue_position {
            courier.queue_position = queue_position;
        }
        if let Some(workdays) = patch.workdays {
            courier.workdays = workdays;
        }
        if let Some(use_default_shift) = patch.use_default_shift {
            courier.use_default_shift = use_default_shift;
        }
        if let Some(shift_start) = patch.shift_start {
            courier.shift_start = shift_start;
        }
        if let Some(shift_end) = patch.shift_end {
            courier.shift_end = shift_end;
        }
        if let Some(departure_time) = patch.departure_time {
            courier.departure_time = departure_time;
        }
        if let Some(bag_type) = patch.bag_type {
            courier.bag_type = bag_type;
        }
        courier.updated_at = Utc::now();

        Ok(courier.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.couriers
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn create_event(&self, event: DeliveryEvent) -> Result<DeliveryEvent, StoreError> {
        self.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_events(
        &self,
        unit: Unit,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DeliveryEvent>, StoreError> {
        Ok(self
            .events
            .iter()
            .filter(|entry| {
                let event = entry.value();
                event.unit == unit
                    && event.departure_timestamp >= from
                    && event.departure_timestamp < to
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn close_open_event(
        &self,
        courier_id: Uuid,
        returned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let open = self
            .events
            .iter()
            .filter(|entry| {
                let event = entry.value();
                event.courier_id == courier_id && event.return_timestamp.is_none()
            })
            .max_by_key(|entry| entry.value().departure_timestamp)
            .map(|entry| entry.value().id);

        if let Some(id) = open {
            if let Some(mut event) = self.events.get_mut(&id) {
                event.return_timestamp = Some(returned_at);
            }
        }

        Ok(())
    }

    async fn purge_events_before(
        &self,
        unit: Unit,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let stale: Vec<Uuid> = self
            .events
            .iter()
            .filter(|entry| {
                let event = entry.value();
                event.unit == unit && event.departure_timestamp < cutoff
            })
            .map(|entry| entry.value().id)
            .collect();

        let count = stale.len() as u64;
        for id in stale {
            self.events.remove(&id);
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::courier::Workdays;

    fn new_courier(name: &str, unit: Unit) -> NewCourier {
        NewCourier {
            name: name.to_string(),
            phone: "11999990000".to_string(),
            unit,
            workdays: Workdays::default(),
            use_default_shift: true,
            shift_start: None,
            shift_end: None,
        }
    }

    #[tokio::test]
    async fn create_defaults_to_available_and_active() {
        let store = InMemoryStore::new();
        let courier = store.create(new_courier("Alice", Unit::Poa)).await.unwrap();

        assert_eq!(courier.status, CourierStatus::Available);
        assert!(courier.active);
        assert!(courier.departure_time.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_unit_status_and_active() {
        let store = InMemoryStore::new();
        let a = store
            .create(new_courier("Alice", Unit::Itaqua))
            .await
            .unwrap();
        store.create(new_courier("Bob", Unit::Poa)).await.unwrap();

        store
            .update(
                a.id,
                CourierPatch {
                    status: Some(CourierStatus::Delivering),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let delivering = store
            .list(CourierFilter {
                unit: Some(Unit::Itaqua),
                status: Some(CourierStatus::Delivering),
                active: Some(true),
            })
            .await
            .unwrap();

        assert_eq!(delivering.len(), 1);
        assert_eq!(delivering[0].id, a.id);
    }

    #[tokio::test]
    async fn update_unknown_courier_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .update(Uuid::new_v4(), CourierPatch::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn close_open_event_stamps_latest_open() {
        let store = InMemoryStore::new();
        let courier_id = Uuid::new_v4();
        let now = Utc::now();

        for offset in [2, 1] {
            store
                .create_event(DeliveryEvent {
                    id: Uuid::new_v4(),
                    courier_id,
                    unit: Unit::Suzano,
                    departure_timestamp: now - Duration::hours(offset),
                    return_timestamp: None,
                    bag_type: BagType::Normal,
                })
                .await
                .unwrap();
        }

        store.close_open_event(courier_id, now).await.unwrap();

        let events = store
            .list_events(Unit::Suzano, now - Duration::days(1), now + Duration::days(1))
            .await
            .unwrap();
        let closed: Vec<_> = events
            .iter()
            .filter(|e| e.return_timestamp.is_some())
            .collect();

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].departure_timestamp, now - Duration::hours(1));
    }

    #[tokio::test]
    async fn purge_removes_only_older_events_for_unit() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        for (unit, hours_ago) in [(Unit::Poa, 30), (Unit::Poa, 1), (Unit::Suzano, 30)] {
            store
                .create_event(DeliveryEvent {
                    id: Uuid::new_v4(),
                    courier_id: Uuid::new_v4(),
                    unit,
                    departure_timestamp: now - Duration::hours(hours_ago),
                    return_timestamp: None,
                    bag_type: BagType::Normal,
                })
                .await
                .unwrap();
        }

        let purged = store
            .purge_events_before(Unit::Poa, now - Duration::hours(12))
            .await
            .unwrap();

        assert_eq!(purged, 1);

        let remaining_poa = store
            .list_events(Unit::Poa, now - Duration::days(2), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(remaining_poa.len(), 1);
    }
}
