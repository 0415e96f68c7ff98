use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use festbook_engine::{EngineError, FinalizeError, SessionError};

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    ValidationError(String),
    NotFound(String),
    Conflict(String),
    Gone(String),
    PaymentRequired(String),
    Internal(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ValidationError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match &err {
            // Capacity: recoverable, the client should re-fetch availability.
            EngineError::InsufficientSeats { .. } => AppError::Conflict(err.to_string()),

            // Temporal: recoverable by restarting the session.
            EngineError::HoldExpired => AppError::Gone(err.to_string()),

            // Fraud signal: no auto-retry with a different amount.
            EngineError::AmountMismatch { .. } => AppError::PaymentRequired(err.to_string()),

            EngineError::Session(SessionError::NotFound(_)) => AppError::NotFound(err.to_string()),
            EngineError::Session(SessionError::InvalidTransition { .. }) => {
                AppError::Conflict(err.to_string())
            }

            EngineError::Contact(_) | EngineError::Promo(_) => {
                AppError::ValidationError(err.to_string())
            }
            EngineError::EventNotBookable(_)
            | EngineError::UnknownSeatType { .. }
            | EngineError::TooManyTickets { .. }
            | EngineError::Pricing(_) => AppError::BadRequest(err.to_string()),

            EngineError::Catalog(festbook_core::CatalogError::NotFound(_)) => {
                AppError::NotFound(err.to_string())
            }

            EngineError::Finalize(FinalizeError::BookingNotFound(_)) => {
                AppError::NotFound(err.to_string())
            }
            EngineError::Finalize(FinalizeError::BookingNotCancellable(_)) => {
                AppError::Conflict(err.to_string())
            }

            // Integrity faults: logged loudly, surfaced opaquely.
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
