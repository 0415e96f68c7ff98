use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::catalog::SeatType;

/// Customer contact details collected at the DETAILS step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContactError {
    #[error("name must be at least 2 characters")]
    InvalidName,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("phone must be 10 digits")]
    InvalidPhone,
}

impl ContactInfo {
    /// Field-level validation, mirroring what the booking form enforces.
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().len() < 2 {
            return Err(ContactError::InvalidName);
        }

        let email = self.email.trim();
        let at = email.find('@');
        match at {
            Some(pos) if pos > 0 && email[pos + 1..].contains('.') && !email.ends_with('.') => {}
            _ => return Err(ContactError::InvalidEmail),
        }

        let digits: String = self.phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() != 10 {
            return Err(ContactError::InvalidPhone);
        }

        Ok(())
    }
}

/// Step-tagged session state. Step-specific data lives on the variant so
/// illegal transitions (e.g. paying from SELECTING) are unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStep {
    Selecting,
    Details {
        hold_id: Uuid,
    },
    Payment {
        hold_id: Uuid,
        contact: ContactInfo,
        promo_code: Option<String>,
        discount_percent: f64,
    },
    Confirmed {
        booking_id: Uuid,
    },
    Expired,
    Cancelled,
}

impl SessionStep {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStep::Selecting => "SELECTING",
            SessionStep::Details { .. } => "DETAILS",
            SessionStep::Payment { .. } => "PAYMENT",
            SessionStep::Confirmed { .. } => "CONFIRMED",
            SessionStep::Expired => "EXPIRED",
            SessionStep::Cancelled => "CANCELLED",
        }
    }

    pub fn hold_id(&self) -> Option<Uuid> {
        match self {
            SessionStep::Details { hold_id } => Some(*hold_id),
            SessionStep::Payment { hold_id, .. } => Some(*hold_id),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStep::Confirmed { .. } | SessionStep::Expired | SessionStep::Cancelled
        )
    }
}

/// One customer's trip through the booking flow. Private to that customer;
/// all cross-session coordination happens through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSession {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seat_type: Option<SeatType>,
    pub quantity: u32,
    pub step: SessionStep,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingSession {
    pub fn new(event_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            seat_type: None,
            quantity: 0,
            step: SessionStep::Selecting,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, email: &str, phone: &str) -> ContactInfo {
        ContactInfo {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn test_contact_validation() {
        assert!(contact("Priya Sharma", "priya@college.edu", "9876543210").validate().is_ok());
        assert_eq!(
            contact("P", "priya@college.edu", "9876543210").validate(),
            Err(ContactError::InvalidName)
        );
        assert_eq!(
            contact("Priya", "not-an-email", "9876543210").validate(),
            Err(ContactError::InvalidEmail)
        );
        assert_eq!(
            contact("Priya", "priya@college.edu", "12345").validate(),
            Err(ContactError::InvalidPhone)
        );
    }

    #[test]
    fn test_step_tagging() {
        let session = BookingSession::new(Uuid::new_v4());
        assert_eq!(session.step.name(), "SELECTING");
        assert!(session.step.hold_id().is_none());
        assert!(!session.step.is_terminal());
    }
}
