use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Seat tiers sold for an event. Unit prices are derived from the event's
/// base price via fixed multipliers when the catalog is seeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SeatType {
    General,
    Vip,
    Premium,
}

impl SeatType {
    pub fn all() -> [SeatType; 3] {
        [SeatType::General, SeatType::Vip, SeatType::Premium]
    }

    /// Price multiplier over the event's base ticket price.
    pub fn price_multiplier(&self) -> f64 {
        match self {
            SeatType::General => 1.0,
            SeatType::Vip => 1.5,
            SeatType::Premium => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::General => "general",
            SeatType::Vip => "vip",
            SeatType::Premium => "premium",
        }
    }
}

impl std::str::FromStr for SeatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "general" => Ok(SeatType::General),
            "vip" => Ok(SeatType::Vip),
            "premium" => Ok(SeatType::Premium),
            other => Err(format!("unknown seat type: {}", other)),
        }
    }
}

impl std::fmt::Display for SeatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Published,
    Completed,
    Cancelled,
}

/// Per-tier capacity and pricing as supplied by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatTypeInfo {
    pub seat_type: SeatType,
    pub unit_price: f64,
    pub total_seats: u32,
}

/// Read model of an event as seen by the booking engine. The catalog is an
/// external collaborator; the engine never mutates events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub id: Uuid,
    pub name: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub status: EventStatus,
    pub seat_types: Vec<SeatTypeInfo>,
}

impl EventInfo {
    /// Seed an event from a base ticket price, applying the tier multipliers.
    pub fn with_base_price(
        name: &str,
        venue: &str,
        starts_at: DateTime<Utc>,
        base_price: f64,
        seats_per_type: &[(SeatType, u32)],
    ) -> Self {
        let seat_types = seats_per_type
            .iter()
            .map(|(seat_type, total)| SeatTypeInfo {
                seat_type: *seat_type,
                unit_price: base_price * seat_type.price_multiplier(),
                total_seats: *total,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            venue: venue.to_string(),
            starts_at,
            status: EventStatus::Published,
            seat_types,
        }
    }

    pub fn seat_type_info(&self, seat_type: SeatType) -> Option<&SeatTypeInfo> {
        self.seat_types.iter().find(|s| s.seat_type == seat_type)
    }

    /// Bookable means published and not yet started.
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Published && self.starts_at > now
    }
}
