use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{Duration, interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::transition::{TransitionOutcome, mark_returned};
use crate::models::courier::{CourierStatus, Unit};
use crate::state::{AppState, QueueEvent, QueueView};
use crate::store::CourierFilter;

const CACHE_SWEEP_SECS: u64 = 3600;

/// Periodic reconciliation loop. The store is the source of truth: each
/// cycle re-fetches, re-derives eligibility and ordering, applies the
/// overtime failsafe, and reconciles local timers against persisted state.
/// A separate hourly tick drops the cached queue views to bound staleness.
pub async fn run_poll_driver(state: Arc<AppState>) {
    info!(
        interval_secs = state.config.poll_interval_secs,
        "poll driver started"
    );

    let mut poll = interval(Duration::from_secs(state.config.poll_interval_secs));
    let mut cache_sweep = interval(Duration::from_secs(CACHE_SWEEP_SECS));

    loop {
        tokio::select! {
            _ = poll.tick() => poll_cycle(&state).await,
            _ = cache_sweep.tick() => {
                state.queue_cache.clear();
                debug!("queue view cache invalidated");
            }
        }
    }
}

/// One pass over every unit.
pub async fn poll_cycle(state: &Arc<AppState>) {
    let started = Instant::now();
    let overtime = chrono::Duration::seconds(state.config.overtime_secs);
    let mut pending_called: HashSet<Uuid> = HashSet::new();

    for unit in Unit::ALL {
        let filter = CourierFilter {
            unit: Some(unit),
            active: Some(true),
            ..Default::default()
        };

        let mut couriers = match state.store.list(filter).await {
            Ok(couriers) => couriers,
            Err(err) => {
                error!(%unit, error = %err, "poll fetch failed");
                continue;
            }
        };

        // Overtime failsafe, re-derived from departure_time every cycle.
        // One-shot timers would be lost with the client that armed them.
        let now = Utc::now();
        let mut forced_any = false;
        for courier in couriers
            .iter()
            .filter(|c| c.status == CourierStatus::Delivering)
        {
            let Some(departed) = courier.departure_time else {
                continue;
            };
            if now - departed < overtime {
                continue;
            }

            match mark_returned(state.store.as_ref(), courier.id, Utc::now()).await {
                Ok(TransitionOutcome::Applied(returned)) => {
                    forced_any = true;
                    state.metrics.overtime_returns_total.inc();
                    warn!(
                        courier = %returned.name,
                        %unit,
                        "overtime failsafe returned courier to queue"
                    );
                    state.publish(QueueEvent::CourierReturned {
                        unit,
                        courier_id: returned.id,
                        name: returned.name,
                        forced: true,
                    });
                }
                Ok(TransitionOutcome::Stale) => {}
                Err(err) => {
                    error!(courier_id = %courier.id, error = %err, "overtime return failed");
                }
            }
        }

        if forced_any {
            couriers = match state.store.list(filter).await {
                Ok(couriers) => couriers,
                Err(err) => {
                    error!(%unit, error = %err, "poll refetch failed");
                    continue;
                }
            };
        }

        pending_called.extend(
            couriers
                .iter()
                .filter(|c| c.status == CourierStatus::Called)
                .map(|c| c.id),
        );

        let view = QueueView::compose(unit, &couriers, state.now_local(), &state.config.default_shift);
        state
            .metrics
            .couriers_available
            .with_label_values(&[&unit.to_string()])
            .set(view.available.len() as i64);
        state.queue_cache.insert(unit, view);
    }

    state.timers.reconcile(&pending_called);
    state.metrics.poll_cycles_total.inc();
    state
        .metrics
        .poll_duration_seconds
        .observe(started.elapsed().as_secs_f64());
}
