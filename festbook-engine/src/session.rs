use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use festbook_core::{BookingSession, ContactInfo, SeatType, SessionStep};

/// Drives each customer's booking session through its steps. Session fields
/// are private to one customer; the only cross-session state is the ledger.
pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, BookingSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn start(&self, event_id: Uuid) -> BookingSession {
        let session = BookingSession::new(event_id);
        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, session_id: Uuid) -> Option<BookingSession> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&session_id).cloned()
    }

    /// Drop back to SELECTING before a (re-)selection, handing back the hold
    /// that must be released. Terminal sessions cannot re-enter the flow.
    pub fn begin_selection(&self, session_id: Uuid) -> Result<Option<Uuid>, SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound(session_id))?;

        if session.step.is_terminal() {
            return Err(SessionError::invalid(&session.step, "SELECTING"));
        }

        let old_hold = session.step.hold_id();
        session.step = SessionStep::Selecting;
        session.updated_at = Utc::now();
        Ok(old_hold)
    }

    /// SELECTING -> DETAILS once a hold has been acquired.
    pub fn attach_hold(
        &self,
        session_id: Uuid,
        hold_id: Uuid,
        seat_type: SeatType,
        quantity: u32,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound(session_id))?;

        if !matches!(session.step, SessionStep::Selecting) {
            return Err(SessionError::invalid(&session.step, "DETAILS"));
        }

        session.seat_type = Some(seat_type);
        session.quantity = quantity;
        session.step = SessionStep::Details { hold_id };
        session.updated_at = Utc::now();
        Ok(())
    }

    /// DETAILS -> PAYMENT with validated contact info and the discount as a
    /// percent. Resubmitting from PAYMENT is allowed (the user went back).
    pub fn record_details(
        &self,
        session_id: Uuid,
        contact: ContactInfo,
        promo_code: Option<String>,
        discount_percent: f64,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound(session_id))?;

        let hold_id = match &session.step {
            SessionStep::Details { hold_id } => *hold_id,
            SessionStep::Payment { hold_id, .. } => *hold_id,
            other => return Err(SessionError::invalid(other, "PAYMENT")),
        };

        session.step = SessionStep::Payment {
            hold_id,
            contact,
            promo_code,
            discount_percent,
        };
        session.updated_at = Utc::now();
        Ok(())
    }

    /// PAYMENT -> CONFIRMED, driven only by a positive finalization result.
    pub fn mark_confirmed(&self, session_id: Uuid, booking_id: Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound(session_id))?;

        if !matches!(session.step, SessionStep::Payment { .. }) {
            return Err(SessionError::invalid(&session.step, "CONFIRMED"));
        }

        session.step = SessionStep::Confirmed { booking_id };
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Hold-expiry callback: any live session bound to this hold becomes
    /// EXPIRED. Terminal; re-entering the flow means a fresh session.
    pub fn mark_expired_by_hold(&self, hold_id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        for session in sessions.values_mut() {
            if session.step.hold_id() == Some(hold_id) && !session.step.is_terminal() {
                session.step = SessionStep::Expired;
                session.updated_at = Utc::now();
                return true;
            }
        }
        false
    }

    /// Reconciliation after the hold event channel dropped messages: every
    /// non-terminal session whose hold is reported dead becomes EXPIRED.
    pub fn expire_dead_holds(&self, hold_is_dead: impl Fn(Uuid) -> bool) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let mut expired = 0;
        for session in sessions.values_mut() {
            if session.step.is_terminal() {
                continue;
            }
            if let Some(hold_id) = session.step.hold_id() {
                if hold_is_dead(hold_id) {
                    session.step = SessionStep::Expired;
                    session.updated_at = Utc::now();
                    expired += 1;
                }
            }
        }
        expired
    }

    /// Drop terminal sessions older than the retention window.
    pub fn sweep_terminal(&self, retain: chrono::Duration) -> usize {
        let cutoff = Utc::now() - retain;
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, session| !session.step.is_terminal() || session.updated_at > cutoff);
        before - sessions.len()
    }

    /// Explicit cancellation. Returns the hold that must be released.
    /// Already-terminal sessions are left alone.
    pub fn cancel(&self, session_id: Uuid) -> Result<Option<Uuid>, SessionError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound(session_id))?;

        if session.step.is_terminal() {
            return Ok(None);
        }

        let hold_id = session.step.hold_id();
        session.step = SessionStep::Cancelled;
        session.updated_at = Utc::now();
        Ok(hold_id)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(Uuid),

    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

impl SessionError {
    fn invalid(from: &SessionStep, to: &'static str) -> Self {
        SessionError::InvalidTransition { from: from.name(), to }
    }
}
