use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use festbook_core::{EventInfo, SeatType};
use festbook_engine::Promotion;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/events", post(create_event))
        .route("/v1/admin/events/{event_id}/promotions", post(create_promotion))
}

#[derive(Debug, Deserialize)]
struct CreateEventRequest {
    name: String,
    venue: String,
    starts_at: DateTime<Utc>,
    base_price: f64,
    seats: Vec<SeatAllocation>,
}

#[derive(Debug, Deserialize)]
struct SeatAllocation {
    seat_type: SeatType,
    total: u32,
}

#[derive(Debug, Serialize)]
struct CreateEventResponse {
    event: EventInfo,
}

/// Publish an event into the catalog. Inventory counters are opened lazily
/// on the first availability lookup or session start.
async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<CreateEventResponse>, AppError> {
    if req.base_price < 0.0 {
        return Err(AppError::BadRequest("base price must be non-negative".to_string()));
    }
    if req.seats.is_empty() {
        return Err(AppError::BadRequest("event needs at least one seat type".to_string()));
    }

    let seats: Vec<(SeatType, u32)> = req.seats.iter().map(|s| (s.seat_type, s.total)).collect();
    let event = EventInfo::with_base_price(&req.name, &req.venue, req.starts_at, req.base_price, &seats);
    state.catalog.insert(event.clone());

    tracing::info!(event_id = %event.id, name = %event.name, "event published");
    Ok(Json(CreateEventResponse { event }))
}

#[derive(Debug, Deserialize)]
struct CreatePromotionRequest {
    code: String,
    discount_percent: f64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    #[serde(default)]
    seat_types: Vec<SeatType>,
    #[serde(default)]
    min_quantity: u32,
}

#[derive(Debug, Serialize)]
struct CreatePromotionResponse {
    code: String,
    event_id: Uuid,
}

async fn create_promotion(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<Json<CreatePromotionResponse>, AppError> {
    if !(0.0..=100.0).contains(&req.discount_percent) {
        return Err(AppError::BadRequest("discount percent must be within 0..=100".to_string()));
    }

    let code = req.code.trim().to_ascii_uppercase();
    state.engine.register_promotion(Promotion {
        code: code.clone(),
        event_id,
        discount_percent: req.discount_percent,
        valid_from: req.valid_from,
        valid_until: req.valid_until,
        seat_types: req.seat_types,
        min_quantity: req.min_quantity.max(1),
        is_active: true,
    });

    tracing::info!(%event_id, %code, "promotion registered");
    Ok(Json(CreatePromotionResponse { code, event_id }))
}
