use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::engine::ordering::available_queue;
use crate::engine::transition::{TransitionOutcome, mark_called, mark_delivering};
use crate::error::AppError;
use crate::models::courier::{BagType, Courier, Unit};
use crate::notify::send_best_effort;
use crate::state::{AppState, QueueEvent};
use crate::store::CourierFilter;

/// How many times a stale head triggers a recompute before giving up.
const MAX_CALL_ATTEMPTS: u32 = 3;

/// Call the next courier in the unit's rotation: pick head-of-queue,
/// persist the transition, notify, arm the auto-advance timer, and give the
/// runner-up a heads-up. A head that is no longer available means another
/// operator won the race; recompute instead of acting on stale data.
pub async fn call_next(
    state: &Arc<AppState>,
    unit: Unit,
    bag_type: BagType,
    deliveries: u32,
) -> Result<Courier, AppError> {
    for _ in 0..MAX_CALL_ATTEMPTS {
        let couriers = state
            .store
            .list(CourierFilter {
                unit: Some(unit),
                active: Some(true),
                ..Default::default()
            })
            .await?;
        let queue = available_queue(&couriers, state.now_local(), &state.config.default_shift);

        let Some(head) = queue.first() else {
            state.metrics.calls_total.with_label_values(&["empty"]).inc();
            return Err(AppError::EmptyQueue);
        };

        match mark_called(state.store.as_ref(), head.id, bag_type, Utc::now()).await? {
            TransitionOutcome::Stale => continue,
            TransitionOutcome::Applied(courier) => {
                state.metrics.calls_total.with_label_values(&["success"]).inc();
                info!(
                    courier = %courier.name,
                    %unit,
                    deliveries,
                    "courier called"
                );

                state.publish(QueueEvent::CourierCalled {
                    unit,
                    courier_id: courier.id,
                    name: courier.name.clone(),
                    bag_type,
                });
                state
                    .announcer
                    .speak(&format!("{}, dirija-se ao balcão", courier.name))
                    .await;
                send_best_effort(
                    state.notifier.clone(),
                    state.metrics.clone(),
                    courier.phone.clone(),
                    call_message(unit, deliveries, bag_type),
                );

                arm_auto_advance(state, unit, courier.id);

                if let Some(standby) = queue.get(1) {
                    schedule_standby_notice(state, unit, standby.id);
                }

                return Ok(courier);
            }
        }
    }

    state.metrics.calls_total.with_label_values(&["stale"]).inc();
    Err(AppError::Conflict(
        "queue changed while calling; try again".to_string(),
    ))
}

fn call_message(unit: Unit, deliveries: u32, bag_type: BagType) -> String {
    let bag = match bag_type {
        BagType::Normal => "bolsa normal",
        BagType::Large => "bolsa grande",
    };
    format!("🍕 Sua vez na unidade {unit}! {deliveries} entrega(s), {bag}. Vá ao balcão.")
}

/// Arm the fixed-delay Called → Delivering timer. Not cancellable from the
/// operator surface once armed; it no-ops on its own when the persisted
/// status moved on.
pub fn arm_auto_advance(state: &Arc<AppState>, unit: Unit, courier_id: Uuid) {
    let delay = Duration::from_secs(state.config.auto_advance_secs);
    let task_state = state.clone();

    let handle = tokio::spawn(async move {
        sleep(delay).await;

        match mark_delivering(task_state.store.as_ref(), courier_id, Utc::now()).await {
            Ok(TransitionOutcome::Applied(courier)) => {
                info!(courier = %courier.name, %unit, "courier departed");
                task_state.publish(QueueEvent::CourierDeparted {
                    unit,
                    courier_id,
                    name: courier.name,
                });
            }
            Ok(TransitionOutcome::Stale) => {
                debug!(%courier_id, "auto-advance skipped: status changed externally");
            }
            Err(err) => {
                error!(%courier_id, error = %err, "auto-advance persistence failed");
            }
        }

        task_state.timers.forget(courier_id);
    });

    state.timers.arm(courier_id, handle);
}

/// Best-effort "you're next, stand by" for the runner-up, after an
/// independent delay. Skipped when the courier is no longer next by the
/// time the delay elapses.
fn schedule_standby_notice(state: &Arc<AppState>, unit: Unit, courier_id: Uuid) {
    let delay = Duration::from_secs(state.config.standby_delay_secs);
    let task_state = state.clone();

    tokio::spawn(async move {
        sleep(delay).await;

        let couriers = match task_state
            .store
            .list(CourierFilter {
                unit: Some(unit),
                active: Some(true),
                ..Default::default()
            })
            .await
        {
            Ok(couriers) => couriers,
            Err(err) => {
                debug!(error = %err, "standby notice skipped: fetch failed");
                return;
            }
        };

        let queue = available_queue(
            &couriers,
            task_state.now_local(),
            &task_state.config.default_shift,
        );

        match queue.first() {
            Some(head) if head.id == courier_id => {
                send_best_effort(
                    task_state.notifier.clone(),
                    task_state.metrics.clone(),
                    head.phone.clone(),
                    format!("Prepare-se! Você é o próximo da fila na unidade {unit}."),
                );
            }
            _ => debug!(%courier_id, "standby notice skipped: courier no longer next"),
        }
    });
}
