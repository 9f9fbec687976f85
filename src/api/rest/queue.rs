use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ordering::{available_queue, position_of, reorder_positions};
use crate::engine::rotation;
use crate::engine::transition::{self, TransitionOutcome};
use crate::error::AppError;
use crate::models::courier::{BagType, Courier, CourierStatus, Unit};
use crate::notify::normalize_phone;
use crate::state::{AppState, QueueEvent, QueueView};
use crate::store::{CourierFilter, CourierPatch};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/units/:unit/queue", get(get_queue))
        .route("/units/:unit/queue/order", put(reorder_queue))
        .route("/units/:unit/call-next", post(call_next))
        .route("/units/:unit/checkin", get(list_checkin_candidates))
        .route("/units/:unit/lookup", get(lookup))
        .route("/couriers/:id/return", post(mark_return))
        .route("/couriers/:id/skip", post(skip_turn))
        .route("/couriers/:id/checkin", post(check_in))
}

async fn unit_couriers(state: &AppState, unit: Unit) -> Result<Vec<Courier>, AppError> {
    Ok(state
        .store
        .list(CourierFilter {
            unit: Some(unit),
            active: Some(true),
            ..Default::default()
        })
        .await?)
}

async fn compose_view(state: &AppState, unit: Unit) -> Result<QueueView, AppError> {
    let couriers = unit_couriers(state, unit).await?;
    let view = QueueView::compose(unit, &couriers, state.now_local(), &state.config.default_shift);
    state.queue_cache.insert(unit, view.clone());
    Ok(view)
}

async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
) -> Result<Json<QueueView>, AppError> {
    Ok(Json(compose_view(&state, unit).await?))
}

#[derive(Deserialize)]
pub struct CallNextRequest {
    #[serde(default)]
    pub bag_type: BagType,
    #[serde(default = "default_deliveries")]
    pub deliveries: u32,
}

fn default_deliveries() -> u32 {
    1
}

async fn call_next(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
    Json(payload): Json<CallNextRequest>,
) -> Result<Json<Courier>, AppError> {
    let courier = rotation::call_next(&state, unit, payload.bag_type, payload.deliveries).await?;
    Ok(Json(courier))
}

/// Operator marks a courier back from delivery. A stale precondition (the
/// courier is not delivering anymore) is a silent no-op, not an error.
async fn mark_return(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    match transition::mark_returned(state.store.as_ref(), id, Utc::now()).await? {
        TransitionOutcome::Applied(courier) => {
            state.publish(QueueEvent::CourierReturned {
                unit: courier.unit,
                courier_id: courier.id,
                name: courier.name.clone(),
                forced: false,
            });
            Ok(Json(courier))
        }
        TransitionOutcome::Stale => {
            let courier = state
                .store
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;
            Ok(Json(courier))
        }
    }
}

async fn skip_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    let courier = transition::skip_turn(state.store.as_ref(), id, Utc::now()).await?;
    state.publish(QueueEvent::QueueReordered { unit: courier.unit });

    Ok(Json(courier))
}

/// Couriers that may check in: anyone not currently mid-flow.
async fn list_checkin_candidates(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
) -> Result<Json<Vec<Courier>>, AppError> {
    let couriers = state
        .store
        .list(CourierFilter {
            unit: Some(unit),
            ..Default::default()
        })
        .await?;

    let candidates = couriers
        .into_iter()
        .filter(|c| {
            !matches!(
                c.status,
                CourierStatus::Called | CourierStatus::Delivering
            )
        })
        .collect();

    Ok(Json(candidates))
}

async fn check_in(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    let courier = transition::check_in(state.store.as_ref(), id, Utc::now()).await?;
    state.publish(QueueEvent::QueueReordered { unit: courier.unit });

    Ok(Json(courier))
}

#[derive(Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

/// Full-queue position rewrite: every courier in the new order gets a fresh
/// strictly increasing position anchored at now.
async fn reorder_queue(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<QueueView>, AppError> {
    if payload.ids.is_empty() {
        return Err(AppError::BadRequest("ids cannot be empty".to_string()));
    }

    for id in &payload.ids {
        let courier = state
            .store
            .get(*id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;
        if courier.unit != unit {
            return Err(AppError::BadRequest(format!(
                "courier {id} does not belong to unit {unit}"
            )));
        }
    }

    for (id, position) in reorder_positions(&payload.ids, Utc::now()) {
        state
            .store
            .update(
                id,
                CourierPatch {
                    queue_position: Some(position),
                    ..Default::default()
                },
            )
            .await?;
    }

    state.publish(QueueEvent::QueueReordered { unit });

    Ok(Json(compose_view(&state, unit).await?))
}

#[derive(Deserialize)]
pub struct LookupQuery {
    pub phone: String,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub name: String,
    pub status: CourierStatus,
    /// 1-based place in the available queue; absent when the courier is
    /// mid-flow or outside the rotation.
    pub position: Option<usize>,
}

/// Self-service lookup by phone number; the phone is the dedup key.
async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(unit): Path<Unit>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<LookupResponse>, AppError> {
    let wanted = normalize_phone(&query.phone, &state.config.country_code);
    // inactive couriers still resolve; they just have no position
    let couriers = state
        .store
        .list(CourierFilter {
            unit: Some(unit),
            ..Default::default()
        })
        .await?;

    let courier = couriers
        .iter()
        .find(|c| normalize_phone(&c.phone, &state.config.country_code) == wanted)
        .ok_or_else(|| AppError::NotFound("courier not found for phone".to_string()))?;

    let queue = available_queue(&couriers, state.now_local(), &state.config.default_shift);

    Ok(Json(LookupResponse {
        name: courier.name.clone(),
        status: courier.status,
        position: position_of(&queue, courier.id),
    }))
}
