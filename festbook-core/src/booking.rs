use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::catalog::SeatType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Refunded,
}

/// The permanent artifact of a finalized hold. Immutable except for status
/// transitions driven by later cancellation or refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Human-facing reference code (BK + base36 timestamp + random suffix).
    pub reference: String,
    pub hold_id: Uuid,
    pub event_id: Uuid,
    pub user_email: String,
    pub seat_type: SeatType,
    pub quantity: u32,
    pub total_amount: f64,
    pub currency: String,
    pub payment_reference: String,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}
