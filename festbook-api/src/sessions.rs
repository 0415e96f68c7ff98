use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use festbook_core::{Booking, BookingSession, ContactInfo, SeatType};
use festbook_engine::PricingQuote;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(start_session))
        .route("/v1/sessions/{session_id}", get(get_session))
        .route("/v1/sessions/{session_id}/seats", post(select_seats))
        .route("/v1/sessions/{session_id}/details", post(submit_details))
        .route("/v1/sessions/{session_id}/extend", post(extend_hold))
        .route("/v1/sessions/{session_id}/payment", post(confirm_payment))
        .route("/v1/sessions/{session_id}/cancel", post(cancel_session))
        .route("/v1/bookings/{booking_id}", get(get_booking))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel_booking))
}

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    event_id: Uuid,
}

#[derive(Debug, Serialize)]
struct StartSessionResponse {
    session_id: Uuid,
    event_id: Uuid,
    step: &'static str,
}

async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    let session = state.engine.start_session(req.event_id).await?;
    Ok(Json(StartSessionResponse {
        session_id: session.id,
        event_id: session.event_id,
        step: session.step.name(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<BookingSession>, AppError> {
    state
        .engine
        .session(session_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("session not found: {}", session_id)))
}

#[derive(Debug, Deserialize)]
struct SelectSeatsRequest {
    seat_type: SeatType,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct SelectSeatsResponse {
    hold_id: Uuid,
    /// Epoch seconds; the client countdown is a projection of this, the
    /// server enforces it regardless.
    expires_at: i64,
}

async fn select_seats(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SelectSeatsRequest>,
) -> Result<Json<SelectSeatsResponse>, AppError> {
    let hold = state
        .engine
        .select_seats(session_id, req.seat_type, req.quantity)
        .await?;
    Ok(Json(SelectSeatsResponse {
        hold_id: hold.id,
        expires_at: hold.expires_at.timestamp(),
    }))
}

#[derive(Debug, Deserialize)]
struct SubmitDetailsRequest {
    contact_info: ContactInfo,
    promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitDetailsResponse {
    quote: PricingQuote,
}

async fn submit_details(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitDetailsRequest>,
) -> Result<Json<SubmitDetailsResponse>, AppError> {
    let quote = state
        .engine
        .submit_details(session_id, req.contact_info, req.promo_code)
        .await?;
    Ok(Json(SubmitDetailsResponse { quote }))
}

#[derive(Debug, Serialize)]
struct ExtendHoldResponse {
    hold_id: Uuid,
    expires_at: i64,
}

async fn extend_hold(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ExtendHoldResponse>, AppError> {
    let hold = state.engine.extend_session_hold(session_id)?;
    Ok(Json(ExtendHoldResponse {
        hold_id: hold.id,
        expires_at: hold.expires_at.timestamp(),
    }))
}

#[derive(Debug, Deserialize)]
struct ConfirmPaymentRequest {
    payment_reference: String,
    verified_amount: f64,
}

async fn confirm_payment(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .engine
        .confirm_payment(session_id, &req.payment_reference, req.verified_amount)
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Serialize)]
struct CancelSessionResponse {
    status: &'static str,
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<CancelSessionResponse>, AppError> {
    state.engine.cancel_session(session_id)?;
    Ok(Json(CancelSessionResponse { status: "CANCELLED" }))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    state
        .engine
        .booking(booking_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("booking not found: {}", booking_id)))
}

#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    #[serde(default)]
    refund: bool,
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.cancel_booking(booking_id, req.refund).await?;
    Ok(Json(booking))
}
