use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{BagType, Courier, CourierStatus};
use crate::models::delivery::DeliveryEvent;
use crate::store::{CourierPatch, CourierStore, StoreError};

/// Result of a guarded transition. `Stale` means the persisted status no
/// longer matched the expected source state; callers treat it as a silent
/// no-op, never as an error. Timers and concurrent operators make stale
/// preconditions routine.
#[derive(Debug)]
pub enum TransitionOutcome {
    Applied(Courier),
    Stale,
}

impl TransitionOutcome {
    pub fn applied(self) -> Option<Courier> {
        match self {
            TransitionOutcome::Applied(courier) => Some(courier),
            TransitionOutcome::Stale => None,
        }
    }
}

/// Available → Called. Sets the bag type and records the delivery event;
/// exactly one event is created per call.
pub async fn mark_called(
    store: &dyn CourierStore,
    id: Uuid,
    bag_type: BagType,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, StoreError> {
    let Some(current) = store.get(id).await? else {
        return Ok(TransitionOutcome::Stale);
    };
    if !current.active || current.status != CourierStatus::Available {
        return Ok(TransitionOutcome::Stale);
    }

    let updated = store
        .update(
            id,
            CourierPatch {
                status: Some(CourierStatus::Called),
                bag_type: Some(bag_type),
                ..Default::default()
            },
        )
        .await?;

    store
        .create_event(DeliveryEvent {
            id: Uuid::new_v4(),
            courier_id: id,
            unit: current.unit,
            departure_timestamp: now,
            return_timestamp: None,
            bag_type,
        })
        .await?;

    Ok(TransitionOutcome::Applied(updated))
}

/// Called → Delivering. Timer-driven; the timer's view is not
/// authoritative, so the persisted status is re-checked here.
pub async fn mark_delivering(
    store: &dyn CourierStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, StoreError> {
    let Some(current) = store.get(id).await? else {
        return Ok(TransitionOutcome::Stale);
    };
    if current.status != CourierStatus::Called {
        return Ok(TransitionOutcome::Stale);
    }

    let updated = store
        .update(
            id,
            CourierPatch {
                status: Some(CourierStatus::Delivering),
                departure_time: Some(Some(now)),
                ..Default::default()
            },
        )
        .await?;

    Ok(TransitionOutcome::Applied(updated))
}

/// Delivering → Available. Re-entry goes to the tail of the queue: the
/// position is reset to now, never restored.
pub async fn mark_returned(
    store: &dyn CourierStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, StoreError> {
    let Some(current) = store.get(id).await? else {
        return Ok(TransitionOutcome::Stale);
    };
    if current.status != CourierStatus::Delivering {
        return Ok(TransitionOutcome::Stale);
    }

    let updated = store
        .update(
            id,
            CourierPatch {
                status: Some(CourierStatus::Available),
                queue_position: Some(now),
                departure_time: Some(None),
                ..Default::default()
            },
        )
        .await?;

    store.close_open_event(id, now).await?;

    Ok(TransitionOutcome::Applied(updated))
}

/// Check-in: first entry of a work period. Couriers mid-flow cannot check
/// in again; that would double-enter the queue.
pub async fn check_in(
    store: &dyn CourierStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Courier, AppError> {
    let courier = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

    if matches!(
        courier.status,
        CourierStatus::Called | CourierStatus::Delivering
    ) {
        return Err(AppError::Conflict(format!(
            "courier {} is mid-delivery and cannot check in",
            courier.name
        )));
    }

    let updated = store
        .update(
            id,
            CourierPatch {
                active: Some(true),
                status: Some(CourierStatus::Available),
                queue_position: Some(now),
                ..Default::default()
            },
        )
        .await?;

    Ok(updated)
}

/// Toggle the active flag. Activation re-enters at the tail; deactivation
/// leaves the status untouched but removes the courier from every view.
pub async fn set_active(
    store: &dyn CourierStore,
    id: Uuid,
    active: bool,
    now: DateTime<Utc>,
) -> Result<Courier, AppError> {
    if store.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    let patch = if active {
        CourierPatch {
            active: Some(true),
            queue_position: Some(now),
            ..Default::default()
        }
    } else {
        CourierPatch {
            active: Some(false),
            ..Default::default()
        }
    };

    Ok(store.update(id, patch).await?)
}

/// Skip turn: administrative deferral to the tail without a status change.
pub async fn skip_turn(
    store: &dyn CourierStore,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Courier, AppError> {
    if store.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    Ok(store
        .update(
            id,
            CourierPatch {
                queue_position: Some(now),
                ..Default::default()
            },
        )
        .await?)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::courier::{Unit, Workdays};
    use crate::store::{InMemoryStore, NewCourier};

    async fn seeded(store: &InMemoryStore, name: &str) -> Courier {
        store
            .create(NewCourier {
                name: name.to_string(),
                phone: "11999990000".to_string(),
                unit: Unit::Itaqua,
                workdays: Workdays::default(),
                use_default_shift: true,
                shift_start: None,
                shift_end: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn call_creates_event_and_sets_bag() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let now = Utc::now();

        let outcome = mark_called(&store, courier.id, BagType::Large, now)
            .await
            .unwrap();
        let called = outcome.applied().expect("transition applies");

        assert_eq!(called.status, CourierStatus::Called);
        assert_eq!(called.bag_type, BagType::Large);

        let events = store
            .list_events(Unit::Itaqua, now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].courier_id, courier.id);
        assert!(events[0].return_timestamp.is_none());
    }

    #[tokio::test]
    async fn call_on_non_available_courier_is_stale() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let now = Utc::now();

        mark_called(&store, courier.id, BagType::Normal, now)
            .await
            .unwrap();
        let second = mark_called(&store, courier.id, BagType::Normal, now)
            .await
            .unwrap();

        assert!(second.applied().is_none());

        // exactly one event despite the double call
        let events = store
            .list_events(Unit::Itaqua, now - Duration::hours(1), now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn auto_advance_noops_when_status_changed_externally() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let now = Utc::now();

        mark_called(&store, courier.id, BagType::Normal, now)
            .await
            .unwrap();

        // manual override back to available before the timer fires
        store
            .update(
                courier.id,
                CourierPatch {
                    status: Some(CourierStatus::Available),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = mark_delivering(&store, courier.id, Utc::now()).await.unwrap();
        assert!(outcome.applied().is_none());

        let current = store.get(courier.id).await.unwrap().unwrap();
        assert_eq!(current.status, CourierStatus::Available);
        assert!(current.departure_time.is_none());
    }

    #[tokio::test]
    async fn delivering_sets_departure_and_return_clears_it() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let called_at = Utc::now();

        mark_called(&store, courier.id, BagType::Normal, called_at)
            .await
            .unwrap();
        let delivering = mark_delivering(&store, courier.id, Utc::now())
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert!(delivering.departure_time.is_some());

        let returned_at = Utc::now();
        let returned = mark_returned(&store, courier.id, returned_at)
            .await
            .unwrap()
            .applied()
            .unwrap();

        assert_eq!(returned.status, CourierStatus::Available);
        assert!(returned.departure_time.is_none());
        assert_eq!(returned.queue_position, returned_at);

        let events = store
            .list_events(
                Unit::Itaqua,
                called_at - Duration::hours(1),
                called_at + Duration::hours(1),
            )
            .await
            .unwrap();
        assert_eq!(events[0].return_timestamp, Some(returned_at));
    }

    #[tokio::test]
    async fn reentry_position_is_monotonic() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let first_position = courier.queue_position;

        mark_called(&store, courier.id, BagType::Normal, Utc::now())
            .await
            .unwrap();
        mark_delivering(&store, courier.id, Utc::now()).await.unwrap();
        let returned = mark_returned(&store, courier.id, Utc::now())
            .await
            .unwrap()
            .applied()
            .unwrap();

        assert!(returned.queue_position >= first_position);
    }

    #[tokio::test]
    async fn checkin_rejected_while_mid_flow() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;

        mark_called(&store, courier.id, BagType::Normal, Utc::now())
            .await
            .unwrap();

        let err = check_in(&store, courier.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn checkin_reactivates_at_tail() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;

        store
            .update(
                courier.id,
                CourierPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let before = Utc::now();
        let checked_in = check_in(&store, courier.id, before).await.unwrap();

        assert!(checked_in.active);
        assert_eq!(checked_in.status, CourierStatus::Available);
        assert_eq!(checked_in.queue_position, before);
    }

    #[tokio::test]
    async fn deactivate_keeps_status() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;

        mark_called(&store, courier.id, BagType::Normal, Utc::now())
            .await
            .unwrap();
        let deactivated = set_active(&store, courier.id, false, Utc::now())
            .await
            .unwrap();

        assert!(!deactivated.active);
        assert_eq!(deactivated.status, CourierStatus::Called);
    }

    #[tokio::test]
    async fn skip_turn_resets_position_only() {
        let store = InMemoryStore::new();
        let courier = seeded(&store, "Alice").await;
        let later = Utc::now() + Duration::seconds(30);

        let skipped = skip_turn(&store, courier.id, later).await.unwrap();

        assert_eq!(skipped.queue_position, later);
        assert_eq!(skipped.status, CourierStatus::Available);
    }
}
