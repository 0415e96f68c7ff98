use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use festbook_core::SeatType;
use festbook_engine::Availability;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/v1/events/{event_id}/availability/{seat_type}",
        get(get_availability),
    )
}

/// Read-only projection of the ledger counters for display. Clients must
/// treat this as advisory; the ledger re-checks at reservation time.
async fn get_availability(
    State(state): State<AppState>,
    Path((event_id, seat_type)): Path<(Uuid, String)>,
) -> Result<Json<Availability>, AppError> {
    let seat_type: SeatType = seat_type.parse().map_err(AppError::BadRequest)?;
    let availability = state.engine.availability(event_id, seat_type).await?;
    Ok(Json(availability))
}
