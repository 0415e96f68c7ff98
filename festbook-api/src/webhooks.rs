use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use festbook_core::Booking;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(handle_payment_webhook))
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub hold_id: Uuid,
    pub payment_reference: String,
    pub verified_amount: f64,
}

/// POST /v1/webhooks/payments
/// Payment-confirmation callback from the external payment collaborator.
/// Delivery may be duplicated; finalization is idempotent so replays resolve
/// to the original booking.
async fn handle_payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Booking>, AppError> {
    tracing::info!(
        hold_id = %payload.hold_id,
        reference = %payload.payment_reference,
        "received payment confirmation"
    );

    let booking = state
        .engine
        .payment_callback(payload.hold_id, &payload.payment_reference, payload.verified_amount)
        .await?;

    tracing::info!(booking_id = %booking.id, "payment webhook finalized booking");
    Ok(Json(booking))
}
