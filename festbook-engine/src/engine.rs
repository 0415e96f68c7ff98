use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use festbook_core::{
    Booking, BookingSession, BookingStore, CatalogError, ContactError, ContactInfo, EventCatalog,
    EventInfo, Hold, HoldEvent, HoldEventKind, HoldState, SeatType, SessionStep,
};

use crate::finalize::{FinalizationService, FinalizeError};
use crate::holds::{HoldError, HoldManager};
use crate::ledger::{Availability, LedgerError, SeatLedger};
use crate::pricing::{compute_quote, PricingError, PricingQuote};
use crate::promo::{PromoError, PromoRegistry};
use crate::session::{SessionError, SessionManager};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Tunable business rules, loaded from config by the API layer.
#[derive(Debug, Clone)]
pub struct EngineRules {
    pub hold_ttl_seconds: u64,
    pub tax_rate: f64,
    pub service_fee: f64,
    pub amount_tolerance: f64,
    pub max_tickets_per_session: u32,
    /// How long terminal holds and sessions are kept before the retention
    /// sweep drops them. Bounds the webhook-replay window.
    pub retention_seconds: u64,
}

impl Default for EngineRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: 900,
            tax_rate: crate::pricing::DEFAULT_TAX_RATE,
            service_fee: crate::pricing::DEFAULT_SERVICE_FEE,
            amount_tolerance: 0.01,
            max_tickets_per_session: 10,
            retention_seconds: 3600,
        }
    }
}

/// Facade over the ledger, hold manager, session machine, pricing and
/// finalization. One instance serves all concurrent sessions.
pub struct BookingEngine {
    rules: EngineRules,
    catalog: Arc<dyn EventCatalog>,
    ledger: Arc<SeatLedger>,
    holds: Arc<HoldManager>,
    sessions: Arc<SessionManager>,
    promos: Arc<PromoRegistry>,
    finalizer: FinalizationService,
}

impl BookingEngine {
    pub fn new(
        catalog: Arc<dyn EventCatalog>,
        store: Arc<dyn BookingStore>,
        promos: Arc<PromoRegistry>,
        rules: EngineRules,
    ) -> Arc<Self> {
        let ledger = Arc::new(SeatLedger::new());
        let holds = HoldManager::new(Arc::clone(&ledger));
        let sessions = Arc::new(SessionManager::new());
        let finalizer = FinalizationService::new(
            Arc::clone(&holds),
            Arc::clone(&sessions),
            Arc::clone(&catalog),
            store,
            rules.tax_rate,
            rules.service_fee,
            rules.amount_tolerance,
        );

        let engine = Arc::new(Self {
            rules,
            catalog,
            ledger,
            holds,
            sessions,
            promos,
            finalizer,
        });
        engine.spawn_expiry_listener();
        engine.spawn_retention_sweeper();
        engine
    }

    /// A hold expiry must take its session to EXPIRED even when no client is
    /// connected, so the engine listens on the hold event channel itself.
    /// When the channel drops events, sessions are reconciled against the
    /// actual hold states instead of trusting the stream.
    fn spawn_expiry_listener(&self) {
        let mut rx = self.holds.subscribe();
        let sessions = Arc::clone(&self.sessions);
        let holds = Arc::clone(&self.holds);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.kind == HoldEventKind::Expired => {
                        sessions.mark_expired_by_hold(event.hold_id);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let expired = sessions.expire_dead_holds(|hold_id| {
                            // A swept record counts as dead; a consumed hold
                            // belongs to a finalization in flight and is not.
                            holds.get(hold_id).map_or(true, |h| {
                                matches!(h.state, HoldState::Expired | HoldState::Released)
                            })
                        });
                        tracing::warn!(skipped, expired, "hold event listener lagged, sessions reconciled");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Periodic janitor dropping terminal holds and sessions past the
    /// retention window so long-running processes do not accumulate them.
    fn spawn_retention_sweeper(&self) {
        let holds = Arc::clone(&self.holds);
        let sessions = Arc::clone(&self.sessions);
        let retain = chrono::Duration::seconds(self.rules.retention_seconds as i64);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept_holds = holds.sweep_terminal(retain);
                let swept_sessions = sessions.sweep_terminal(retain);
                if swept_holds > 0 || swept_sessions > 0 {
                    tracing::debug!(swept_holds, swept_sessions, "retention sweep");
                }
            }
        });
    }

    pub fn subscribe_hold_events(&self) -> broadcast::Receiver<HoldEvent> {
        self.holds.subscribe()
    }

    pub fn session(&self, session_id: Uuid) -> Option<BookingSession> {
        self.sessions.get(session_id)
    }

    pub fn hold(&self, hold_id: Uuid) -> Option<Hold> {
        self.holds.get(hold_id)
    }

    pub async fn booking(&self, booking_id: Uuid) -> Result<Option<Booking>, EngineError> {
        Ok(self.finalizer.store().get(booking_id).await.map_err(FinalizeError::Store)?)
    }

    async fn bookable_event(&self, event_id: Uuid) -> Result<EventInfo, EngineError> {
        let event = self.catalog.get_event(event_id).await?;
        if !event.is_bookable(Utc::now()) {
            return Err(EngineError::EventNotBookable(event_id));
        }
        Ok(event)
    }

    /// Seed ledger entries for every seat type of a published event.
    fn ensure_inventory(&self, event: &EventInfo) {
        for info in &event.seat_types {
            self.ledger.open(event.id, info.seat_type, info.total_seats);
        }
    }

    /// Current counts for display. Seeds the ledger from the catalog on the
    /// first lookup of an event.
    pub async fn availability(&self, event_id: Uuid, seat_type: SeatType) -> Result<Availability, EngineError> {
        match self.ledger.availability(event_id, seat_type) {
            Ok(avail) => Ok(avail),
            Err(LedgerError::UnknownKey { .. }) => {
                let event = self.catalog.get_event(event_id).await?;
                event
                    .seat_type_info(seat_type)
                    .ok_or(EngineError::UnknownSeatType { event_id, seat_type })?;
                self.ensure_inventory(&event);
                Ok(self.ledger.availability(event_id, seat_type)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn start_session(&self, event_id: Uuid) -> Result<BookingSession, EngineError> {
        let event = self.bookable_event(event_id).await?;
        self.ensure_inventory(&event);
        Ok(self.sessions.start(event_id))
    }

    /// Leave SELECTING by acquiring a hold for the chosen type and quantity.
    /// A previous hold (the user went back and changed selection) is released
    /// first; on InsufficientSeats the session stays in SELECTING and the
    /// caller should re-fetch availability before retrying.
    pub async fn select_seats(
        &self,
        session_id: Uuid,
        seat_type: SeatType,
        quantity: u32,
    ) -> Result<Hold, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::Session(SessionError::NotFound(session_id)))?;

        if quantity == 0 || quantity > self.rules.max_tickets_per_session {
            return Err(EngineError::TooManyTickets {
                max: self.rules.max_tickets_per_session,
            });
        }

        let event = self.bookable_event(session.event_id).await?;
        event
            .seat_type_info(seat_type)
            .ok_or(EngineError::UnknownSeatType { event_id: event.id, seat_type })?;
        self.ensure_inventory(&event);

        let replaced = self.sessions.begin_selection(session_id)?;
        if let Some(old_hold) = replaced {
            if let Err(err) = self.holds.release_hold(old_hold) {
                tracing::error!(%old_hold, %err, "failed to release replaced hold");
            }
        }

        let hold = self.holds.create_hold(
            session.event_id,
            seat_type,
            quantity,
            self.rules.hold_ttl_seconds,
            session_id,
        )?;
        // A concurrent call on the same session may have moved it past
        // SELECTING in the meantime; the orphaned hold is released rather
        // than left to tie up seats until its TTL.
        if let Err(err) = self.sessions.attach_hold(session_id, hold.id, seat_type, quantity) {
            if let Err(release_err) = self.holds.release_hold(hold.id) {
                tracing::error!(hold_id = %hold.id, %release_err, "failed to release unattached hold");
            }
            return Err(err.into());
        }
        Ok(hold)
    }

    /// DETAILS step: validate contact info, check the promo code against the
    /// live quantity and seat type, and move to PAYMENT with a fresh quote.
    pub async fn submit_details(
        &self,
        session_id: Uuid,
        contact: ContactInfo,
        promo_code: Option<String>,
    ) -> Result<PricingQuote, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::Session(SessionError::NotFound(session_id)))?;

        let hold_id = session.step.hold_id().ok_or(EngineError::Session(
            SessionError::InvalidTransition { from: session.step.name(), to: "PAYMENT" },
        ))?;

        contact.validate()?;

        let hold = self.holds.get(hold_id).ok_or(EngineError::HoldExpired)?;
        if !hold.state.is_live() {
            return Err(EngineError::HoldExpired);
        }

        let discount_percent = match &promo_code {
            Some(code) => {
                self.promos
                    .validate(code, hold.event_id, hold.seat_type, hold.quantity, Utc::now())?
            }
            None => 0.0,
        };

        let quote = self.quote_for_hold(&hold, discount_percent).await?;
        self.sessions
            .record_details(session_id, contact, promo_code, discount_percent)?;
        Ok(quote)
    }

    /// Grant a session more time, e.g. while the user re-checks details.
    pub fn extend_session_hold(&self, session_id: Uuid) -> Result<Hold, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::Session(SessionError::NotFound(session_id)))?;
        let hold_id = session.step.hold_id().ok_or(EngineError::HoldExpired)?;
        Ok(self.holds.extend_hold(hold_id, self.rules.hold_ttl_seconds)?)
    }

    /// PAYMENT -> CONFIRMED, only through finalization. The promo code is
    /// re-validated at quote time: a code that lapsed between DETAILS and
    /// PAYMENT fails the payment rather than silently changing the price.
    pub async fn confirm_payment(
        &self,
        session_id: Uuid,
        payment_reference: &str,
        verified_amount: f64,
    ) -> Result<Booking, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::Session(SessionError::NotFound(session_id)))?;

        let (hold_id, contact, promo_code, stored_discount) = match &session.step {
            SessionStep::Payment { hold_id, contact, promo_code, discount_percent } => {
                (*hold_id, contact.clone(), promo_code.clone(), *discount_percent)
            }
            other => {
                return Err(EngineError::Session(SessionError::InvalidTransition {
                    from: other.name(),
                    to: "CONFIRMED",
                }))
            }
        };

        if let Some(code) = &promo_code {
            let hold = self.holds.get(hold_id).ok_or(EngineError::HoldExpired)?;
            let fresh = self
                .promos
                .validate(code, hold.event_id, hold.seat_type, hold.quantity, Utc::now())?;
            if fresh != stored_discount {
                self.sessions
                    .record_details(session_id, contact, promo_code.clone(), fresh)?;
            }
        }

        let booking = self
            .finalizer
            .finalize(hold_id, payment_reference, verified_amount)
            .await?;

        // The webhook path may have confirmed the session already.
        if let Err(err) = self.sessions.mark_confirmed(session_id, booking.id) {
            tracing::debug!(%session_id, %err, "session already past payment");
        }
        Ok(booking)
    }

    /// External payment-confirmation callback, keyed by hold.
    pub async fn payment_callback(
        &self,
        hold_id: Uuid,
        payment_reference: &str,
        verified_amount: f64,
    ) -> Result<Booking, EngineError> {
        let owner = self.holds.get(hold_id).map(|h| h.owner_session);
        let booking = self
            .finalizer
            .finalize(hold_id, payment_reference, verified_amount)
            .await?;
        if let Some(session_id) = owner {
            if let Err(err) = self.sessions.mark_confirmed(session_id, booking.id) {
                tracing::debug!(%session_id, %err, "session already past payment");
            }
        }
        Ok(booking)
    }

    /// Explicit cancellation: release the hold, then mark the session.
    pub fn cancel_session(&self, session_id: Uuid) -> Result<(), EngineError> {
        let hold_id = self.sessions.cancel(session_id)?;
        if let Some(hold_id) = hold_id {
            if let Err(err) = self.holds.release_hold(hold_id) {
                tracing::error!(%hold_id, %err, "failed to release hold on cancellation");
            }
        }
        Ok(())
    }

    /// Post-finalization cancellation or refund; returns seats to the pool.
    pub async fn cancel_booking(&self, booking_id: Uuid, refund: bool) -> Result<Booking, EngineError> {
        Ok(self.finalizer.cancel_booking(booking_id, refund, &self.ledger).await?)
    }

    pub fn register_promotion(&self, promo: crate::promo::Promotion) {
        self.promos.register(promo);
    }

    async fn quote_for_hold(&self, hold: &Hold, discount_percent: f64) -> Result<PricingQuote, EngineError> {
        let event = self.catalog.get_event(hold.event_id).await?;
        let seat_info = event.seat_type_info(hold.seat_type).ok_or(EngineError::UnknownSeatType {
            event_id: hold.event_id,
            seat_type: hold.seat_type,
        })?;
        Ok(compute_quote(
            seat_info.unit_price,
            hold.quantity,
            discount_percent,
            self.rules.tax_rate,
            self.rules.service_fee,
        )?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("event not open for booking: {0}")]
    EventNotBookable(Uuid),

    #[error("event {event_id} does not sell {seat_type} seats")]
    UnknownSeatType { event_id: Uuid, seat_type: SeatType },

    #[error("quantity must be between 1 and {max}")]
    TooManyTickets { max: u32 },

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("hold has expired; restart the booking")]
    HoldExpired,

    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: f64, received: f64 },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Contact(#[from] ContactError),

    #[error(transparent)]
    Promo(#[from] PromoError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Hold(HoldError),

    #[error(transparent)]
    Finalize(FinalizeError),
}

impl From<HoldError> for EngineError {
    fn from(err: HoldError) -> Self {
        match err {
            HoldError::Expired(_) | HoldError::Released(_) => EngineError::HoldExpired,
            HoldError::Ledger(LedgerError::InsufficientSeats { requested, available }) => {
                EngineError::InsufficientSeats { requested, available }
            }
            other => EngineError::Hold(other),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientSeats { requested, available } => {
                EngineError::InsufficientSeats { requested, available }
            }
            other => EngineError::Hold(HoldError::Ledger(other)),
        }
    }
}

impl From<FinalizeError> for EngineError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::AmountMismatch { expected, received } => {
                EngineError::AmountMismatch { expected, received }
            }
            FinalizeError::HoldExpired(_) => EngineError::HoldExpired,
            other => EngineError::Finalize(other),
        }
    }
}
