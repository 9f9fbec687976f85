use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use chrono::{DateTime, Duration, Local, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{ShiftWindow, Unit};
use crate::state::AppState;
use crate::store::CourierFilter;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/units/:unit/history", get(get_history).delete(purge_history))
}

/// The current work period in local wall-clock terms, derived from the
/// default shift. An overnight shift that started yesterday is still "the
/// current period" until its end passes; between periods the previous one
/// is shown.
pub fn current_shift_period(
    now: NaiveDateTime,
    shift: &ShiftWindow,
) -> (NaiveDateTime, NaiveDateTime) {
    let today = now.date();
    let time = now.time();

    if shift.end < shift.start {
        // overnight window
        if time <= shift.end {
            (
                (today - Duration::days(1)).and_time(shift.start),
                today.and_time(shift.end),
            )
        } else if time >= shift.start {
            (
                today.and_time(shift.start),
                (today + Duration::days(1)).and_time(shift.end),
            )
        } else {
            (
                (today - Duration::days(1)).and_time(shift.start),
                today.and_time(shift.end),
            )
        }
    } else if time < shift.start {
        (
            (today - Duration::days(1)).and_time(shift.start),
            (today - Duration::days(1)).and_time(shift.end),
        )
    } else {
        (today.and_time(shift.start), today.and_time(shift.end))
    }
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

#[derive(Serialize)]
pub struct CourierDeliveries {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub deliveries: usize,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub unit: Unit,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total: usize,
    pub couriers: Vec<CourierDeliveries>,
}

/// Per-courier departure counts for the current work period. Simple
/// counting only; anything deeper belongs to an external reporting tool.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
) -> Result<Json<HistoryResponse>, AppError> {
    let (start, end) = current_shift_period(state.now_local(), &state.config.default_shift);
    let (period_start, period_end) = (local_to_utc(start), local_to_utc(end));

    let events = state.store.list_events(unit, period_start, period_end).await?;

    let mut per_courier: HashMap<Uuid, usize> = HashMap::new();
    for event in &events {
        *per_courier.entry(event.courier_id).or_default() += 1;
    }

    let couriers = state
        .store
        .list(CourierFilter {
            unit: Some(unit),
            ..Default::default()
        })
        .await?;

    let mut rows: Vec<CourierDeliveries> = couriers
        .into_iter()
        .map(|c| CourierDeliveries {
            deliveries: per_courier.get(&c.id).copied().unwrap_or(0),
            id: c.id,
            name: c.name,
            phone: c.phone,
        })
        .collect();
    rows.sort_by(|a, b| b.deliveries.cmp(&a.deliveries));

    Ok(Json(HistoryResponse {
        unit,
        period_start,
        period_end,
        total: events.len(),
        couriers: rows,
    }))
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub purged: u64,
}

/// Time-gated bulk purge of the previous period's events. Locked until the
/// configured local hour so the night crew's numbers survive the morning.
async fn purge_history(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
) -> Result<Json<PurgeResponse>, AppError> {
    let unlock_hour = state.config.history_purge_unlock_hour;
    if Local::now().hour() < unlock_hour {
        return Err(AppError::Conflict(format!(
            "history purge allowed only after {unlock_hour}:00"
        )));
    }

    let (start, _) = current_shift_period(state.now_local(), &state.config.default_shift);
    let cutoff = local_to_utc(start);

    let purged = state.store.purge_events_before(unit, cutoff).await?;
    info!(%unit, purged, "purged previous period history");

    Ok(Json(PurgeResponse { purged }))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, NaiveTime};

    use super::current_shift_period;
    use crate::models::courier::ShiftWindow;

    fn shift(start: &str, end: &str) -> ShiftWindow {
        ShiftWindow {
            start: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        }
    }

    fn at(datetime: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn before_overnight_end_period_started_yesterday() {
        let (start, end) = current_shift_period(at("2025-06-03 01:00"), &shift("16:00", "02:00"));

        assert_eq!(start, at("2025-06-02 16:00"));
        assert_eq!(end, at("2025-06-03 02:00"));
    }

    #[test]
    fn after_overnight_start_period_ends_tomorrow() {
        let (start, end) = current_shift_period(at("2025-06-02 20:00"), &shift("16:00", "02:00"));

        assert_eq!(start, at("2025-06-02 16:00"));
        assert_eq!(end, at("2025-06-03 02:00"));
    }

    #[test]
    fn daytime_gap_shows_previous_period() {
        let (start, end) = current_shift_period(at("2025-06-03 10:00"), &shift("16:00", "02:00"));

        assert_eq!(start, at("2025-06-02 16:00"));
        assert_eq!(end, at("2025-06-03 02:00"));
    }

    #[test]
    fn same_day_window_stays_on_today_once_started() {
        let (start, end) = current_shift_period(at("2025-06-02 12:00"), &shift("09:00", "18:00"));

        assert_eq!(start, at("2025-06-02 09:00"));
        assert_eq!(end, at("2025-06-02 18:00"));
    }

    #[test]
    fn same_day_window_before_start_shows_yesterday() {
        let (start, end) = current_shift_period(at("2025-06-02 07:00"), &shift("09:00", "18:00"));

        assert_eq!(start, at("2025-06-01 09:00"));
        assert_eq!(end, at("2025-06-01 18:00"));
    }
}
