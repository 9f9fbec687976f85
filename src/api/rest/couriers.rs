use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::{NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::transition;
use crate::error::AppError;
use crate::models::courier::{Courier, Unit, Workdays};
use crate::state::AppState;
use crate::store::{CourierFilter, CourierPatch, NewCourier};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route(
            "/couriers/:id",
            get(get_courier).patch(update_courier).delete(delete_courier),
        )
        .route("/couriers/:id/active", patch(set_active))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub phone: String,
    pub unit: Unit,
    #[serde(default)]
    pub workdays: Workdays,
    #[serde(default = "default_true")]
    pub use_default_shift: bool,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub unit: Option<Unit>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateCourierRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub workdays: Option<Workdays>,
    pub use_default_shift: Option<bool>,
    pub shift_start: Option<NaiveTime>,
    pub shift_end: Option<NaiveTime>,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < 10 {
        return Err(AppError::BadRequest(
            "phone must have at least 10 digits".to_string(),
        ));
    }
    Ok(())
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    validate_name(&payload.name)?;
    validate_phone(&payload.phone)?;

    let courier = state
        .store
        .create(NewCourier {
            name: payload.name,
            phone: payload.phone,
            unit: payload.unit,
            workdays: payload.workdays,
            use_default_shift: payload.use_default_shift,
            shift_start: payload.shift_start,
            shift_end: payload.shift_end,
        })
        .await?;

    Ok(Json(courier))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Courier>>, AppError> {
    let couriers = state
        .store
        .list(CourierFilter {
            unit: query.unit,
            active: query.active,
            ..Default::default()
        })
        .await?;

    Ok(Json(couriers))
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, AppError> {
    let courier = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

    Ok(Json(courier))
}

async fn update_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    if let Some(name) = &payload.name {
        validate_name(name)?;
    }
    if let Some(phone) = &payload.phone {
        validate_phone(phone)?;
    }
    if state.store.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    let courier = state
        .store
        .update(
            id,
            CourierPatch {
                name: payload.name,
                phone: payload.phone,
                workdays: payload.workdays,
                use_default_shift: payload.use_default_shift,
                shift_start: payload.shift_start.map(Some),
                shift_end: payload.shift_end.map(Some),
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(courier))
}

async fn delete_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(), AppError> {
    if state.store.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    state.store.delete(id).await?;
    state.timers.disarm(id);

    Ok(())
}

async fn set_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<Courier>, AppError> {
    let courier =
        transition::set_active(state.store.as_ref(), id, payload.active, Utc::now()).await?;

    Ok(Json(courier))
}
