use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use festbook_core::{
    Booking, BookingStatus, BookingStore, CatalogError, EventCatalog, SeatType, SessionStep,
    StoreError,
};

use crate::holds::{HoldError, HoldManager};
use crate::pricing::{compute_quote, PricingError};
use crate::session::SessionManager;

const PERSIST_ATTEMPTS: u32 = 3;

/// Converts a hold plus a verified payment into a permanent booking, exactly
/// once. Payment verification itself happens upstream; this service only
/// checks the verified amount against an independently recomputed quote.
pub struct FinalizationService {
    holds: Arc<HoldManager>,
    sessions: Arc<SessionManager>,
    catalog: Arc<dyn EventCatalog>,
    store: Arc<dyn BookingStore>,
    tax_rate: f64,
    service_fee: f64,
    amount_tolerance: f64,
}

impl FinalizationService {
    pub fn new(
        holds: Arc<HoldManager>,
        sessions: Arc<SessionManager>,
        catalog: Arc<dyn EventCatalog>,
        store: Arc<dyn BookingStore>,
        tax_rate: f64,
        service_fee: f64,
        amount_tolerance: f64,
    ) -> Self {
        Self {
            holds,
            sessions,
            catalog,
            store,
            tax_rate,
            service_fee,
            amount_tolerance,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub async fn finalize(
        &self,
        hold_id: Uuid,
        payment_reference: &str,
        verified_amount: f64,
    ) -> Result<Booking, FinalizeError> {
        // Duplicate gateway callback: resolve to the original booking. This
        // runs before the hold lookup so late webhook retries still replay
        // after the hold record has been swept.
        if let Some(existing) = self.store.find_by_hold(hold_id).await? {
            tracing::debug!(%hold_id, booking_id = %existing.id, "finalize replay resolved to existing booking");
            return Ok(existing);
        }

        let hold = self.holds.get(hold_id).ok_or(FinalizeError::HoldNotFound(hold_id))?;

        let session = self
            .sessions
            .get(hold.owner_session)
            .ok_or(FinalizeError::SessionNotReady(hold.owner_session))?;

        let (contact, discount_percent) = match &session.step {
            SessionStep::Payment { contact, discount_percent, .. } => {
                (contact.clone(), *discount_percent)
            }
            _ => return Err(FinalizeError::SessionNotReady(session.id)),
        };

        // Recompute the total from the hold's own quantity and seat type; the
        // client-supplied amount is never trusted.
        let event = self.catalog.get_event(hold.event_id).await?;
        let seat_info = event
            .seat_type_info(hold.seat_type)
            .ok_or(FinalizeError::MissingSeatType(hold.seat_type))?;
        let quote = compute_quote(
            seat_info.unit_price,
            hold.quantity,
            discount_percent,
            self.tax_rate,
            self.service_fee,
        )?;

        if (quote.total - verified_amount).abs() > self.amount_tolerance {
            // Possible fraud signal; the hold is left untouched and the
            // caller must re-initiate explicitly, never auto-retry.
            tracing::warn!(
                %hold_id,
                expected = quote.total,
                received = verified_amount,
                "payment amount mismatch, finalization aborted"
            );
            return Err(FinalizeError::AmountMismatch {
                expected: quote.total,
                received: verified_amount,
            });
        }

        // Consume wins or loses against expiry atomically; the seats move
        // from held to confirmed inside the same critical section.
        let consumed = match self.holds.consume_hold(hold_id) {
            Ok(h) => h,
            Err(HoldError::NotFound(id)) => return Err(FinalizeError::HoldNotFound(id)),
            Err(HoldError::Expired(id)) | Err(HoldError::Released(id)) => {
                return Err(FinalizeError::HoldExpired(id))
            }
            Err(err) => return Err(FinalizeError::Hold(err)),
        };

        let booking = Booking {
            id: Uuid::new_v4(),
            reference: booking_reference(),
            hold_id,
            event_id: consumed.event_id,
            user_email: contact.email,
            seat_type: consumed.seat_type,
            quantity: consumed.quantity,
            total_amount: quote.total,
            currency: "INR".to_string(),
            payment_reference: payment_reference.to_string(),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };

        // Seats are confirmed by now; a persistence failure is a bookkeeping
        // fault we retry, never a reason to un-confirm. If every attempt
        // fails, the gateway's retry will re-enter through the consumed-hold
        // path above and persist again. The insert is keyed by hold, so when
        // a duplicate delivery raced us past the replay check the store hands
        // back whichever booking won and this one is discarded.
        let mut attempt: u32 = 0;
        let booking = loop {
            attempt += 1;
            match self.store.insert(&booking).await {
                Ok(stored) => break stored,
                Err(err) if attempt < PERSIST_ATTEMPTS => {
                    tracing::error!(%hold_id, attempt, %err, "failed to persist booking, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(err) => return Err(FinalizeError::Store(err)),
            }
        };

        tracing::info!(
            booking_id = %booking.id,
            reference = %booking.reference,
            %hold_id,
            total = booking.total_amount,
            "booking finalized"
        );
        Ok(booking)
    }

    /// Post-finalization cancellation or refund: flips the booking status and
    /// returns its seats to the available pool.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        refund: bool,
        ledger: &crate::ledger::SeatLedger,
    ) -> Result<Booking, FinalizeError> {
        let mut booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(FinalizeError::BookingNotFound(booking_id))?;

        if booking.status != BookingStatus::Confirmed {
            return Err(FinalizeError::BookingNotCancellable(booking_id));
        }

        let status = if refund { BookingStatus::Refunded } else { BookingStatus::Cancelled };
        self.store.update_status(booking_id, status).await?;
        ledger.release_confirmed(booking.event_id, booking.seat_type, booking.quantity)?;

        booking.status = status;
        tracing::info!(%booking_id, ?status, quantity = booking.quantity, "booking cancelled, seats returned");
        Ok(booking)
    }
}

/// Human-facing reference: BK + base36 timestamp + random suffix.
fn booking_reference() -> String {
    let millis = Utc::now().timestamp_millis() as u64;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("BK{}{}", to_base36(millis), suffix).to_uppercase()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("hold not found: {0}")]
    HoldNotFound(Uuid),

    #[error("hold expired: {0}")]
    HoldExpired(Uuid),

    #[error("session {0} has not reached the payment step")]
    SessionNotReady(Uuid),

    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: f64, received: f64 },

    #[error("event has no {0} seat type")]
    MissingSeatType(SeatType),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("booking {0} is not in a cancellable state")]
    BookingNotCancellable(Uuid),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error(transparent)]
    Hold(HoldError),
}
