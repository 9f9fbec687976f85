pub mod couriers;
pub mod history;
pub mod queue;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::models::courier::CourierStatus;
use crate::state::AppState;
use crate::store::CourierFilter;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(couriers::router())
        .merge(queue::router())
        .merge(history::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .fallback_service(ServeDir::new("static"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    couriers: usize,
    available: usize,
    delivering: usize,
    timers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let couriers = state.store.list(CourierFilter::default()).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        couriers: couriers.len(),
        available: couriers
            .iter()
            .filter(|c| c.active && c.status == CourierStatus::Available)
            .count(),
        delivering: couriers
            .iter()
            .filter(|c| c.status == CourierStatus::Delivering)
            .count(),
        timers: state.timers.len(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
