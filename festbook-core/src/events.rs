use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::SeatType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldEventKind {
    Created,
    Extended,
    Consumed,
    Released,
    Expired,
}

/// Broadcast whenever a hold changes state. The session-expiry listener and
/// any UI push surface subscribe to these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldEvent {
    pub hold_id: Uuid,
    pub event_id: Uuid,
    pub seat_type: SeatType,
    pub quantity: u32,
    pub owner_session: Uuid,
    pub kind: HoldEventKind,
    pub at: i64,
}
