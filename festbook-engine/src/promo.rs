use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use festbook_core::SeatType;

/// A promotion declared for one event. Empty `seat_types` means the code
/// applies to every tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub code: String,
    pub event_id: Uuid,
    pub discount_percent: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub seat_types: Vec<SeatType>,
    pub min_quantity: u32,
    pub is_active: bool,
}

impl Promotion {
    fn applies_to(&self, seat_type: SeatType) -> bool {
        self.seat_types.is_empty() || self.seat_types.contains(&seat_type)
    }
}

/// Validates promo codes against an event's active promotions. A code is
/// never accepted outside its declared event/seat-type/quantity scope.
pub struct PromoRegistry {
    promotions: RwLock<HashMap<(Uuid, String), Promotion>>,
}

impl PromoRegistry {
    pub fn new() -> Self {
        Self {
            promotions: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, promo: Promotion) {
        let mut promotions = self.promotions.write().unwrap();
        promotions.insert((promo.event_id, promo.code.to_ascii_uppercase()), promo);
    }

    /// Returns the discount percent, or the reason the code is rejected.
    /// Checked against the live quantity and seat type, since a code valid
    /// for one combination need not be valid for another.
    pub fn validate(
        &self,
        code: &str,
        event_id: Uuid,
        seat_type: SeatType,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<f64, PromoError> {
        let normalized = code.trim().to_ascii_uppercase();
        if !is_well_formed(&normalized) {
            return Err(PromoError::Invalid(code.to_string()));
        }

        let promotions = self.promotions.read().unwrap();
        let promo = promotions
            .get(&(event_id, normalized.clone()))
            .ok_or_else(|| PromoError::Invalid(normalized.clone()))?;

        if !promo.is_active {
            return Err(PromoError::Invalid(normalized.clone()));
        }
        if now < promo.valid_from || now > promo.valid_until {
            return Err(PromoError::Expired(normalized.clone()));
        }
        if !promo.applies_to(seat_type) {
            return Err(PromoError::NotApplicable {
                code: normalized,
                reason: format!("not valid for {} seats", seat_type),
            });
        }
        if quantity < promo.min_quantity {
            return Err(PromoError::NotApplicable {
                code: normalized,
                reason: format!("requires at least {} tickets", promo.min_quantity),
            });
        }

        Ok(promo.discount_percent)
    }
}

impl Default for PromoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Uppercase alphanumeric, 4 to 20 characters.
fn is_well_formed(code: &str) -> bool {
    (4..=20).contains(&code.len()) && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[derive(Debug, thiserror::Error)]
pub enum PromoError {
    #[error("invalid promo code: {0}")]
    Invalid(String),

    #[error("promo code expired: {0}")]
    Expired(String),

    #[error("promo code {code} not applicable: {reason}")]
    NotApplicable { code: String, reason: String },
}
