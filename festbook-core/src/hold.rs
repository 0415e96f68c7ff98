use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::catalog::SeatType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    Active,
    Extended,
    Consumed,
    Expired,
    Released,
}

impl HoldState {
    /// A live hold still owns its seats in the ledger.
    pub fn is_live(&self) -> bool {
        matches!(self, HoldState::Active | HoldState::Extended)
    }
}

/// A time-bounded reservation of seats against an event's inventory.
/// Owned by exactly one booking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seat_type: SeatType,
    pub quantity: u32,
    pub owner_session: Uuid,
    pub state: HoldState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
