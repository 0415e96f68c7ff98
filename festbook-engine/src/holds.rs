use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use festbook_core::{Hold, HoldEvent, HoldEventKind, HoldState, SeatType};

use crate::ledger::{LedgerError, SeatLedger};

struct HoldRecord {
    hold: Hold,
    /// Bumped on every extension; a scheduled expiry only fires if its
    /// captured epoch still matches, so stale timers are no-ops.
    expiry_epoch: u64,
    /// When the hold left the live states; the retention sweep keys off it.
    terminal_at: Option<DateTime<Utc>>,
}

/// Creates, extends, consumes and expires holds against the ledger. Expiry
/// is server-authoritative: every hold gets a spawned timer task that fires
/// whether or not any client is still connected.
pub struct HoldManager {
    ledger: Arc<SeatLedger>,
    holds: Mutex<HashMap<Uuid, HoldRecord>>,
    events: broadcast::Sender<HoldEvent>,
    self_ref: Weak<HoldManager>,
}

impl HoldManager {
    pub fn new(ledger: Arc<SeatLedger>) -> Arc<Self> {
        let (events, _) = broadcast::channel(100);
        Arc::new_cyclic(|self_ref| Self {
            ledger,
            holds: Mutex::new(HashMap::new()),
            events,
            self_ref: self_ref.clone(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldEvent> {
        self.events.subscribe()
    }

    pub fn get(&self, hold_id: Uuid) -> Option<Hold> {
        let holds = self.holds.lock().unwrap();
        holds.get(&hold_id).map(|r| r.hold.clone())
    }

    /// Reserve seats and schedule the expiry timer. Fails without side
    /// effects when the ledger rejects the reservation.
    pub fn create_hold(
        &self,
        event_id: Uuid,
        seat_type: SeatType,
        quantity: u32,
        ttl_seconds: u64,
        owner_session: Uuid,
    ) -> Result<Hold, HoldError> {
        if quantity == 0 {
            return Err(HoldError::ZeroQuantity);
        }

        self.ledger.try_reserve(event_id, seat_type, quantity)?;

        let now = Utc::now();
        let hold = Hold {
            id: Uuid::new_v4(),
            event_id,
            seat_type,
            quantity,
            owner_session,
            state: HoldState::Active,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds as i64),
        };

        {
            let mut holds = self.holds.lock().unwrap();
            holds.insert(
                hold.id,
                HoldRecord { hold: hold.clone(), expiry_epoch: 0, terminal_at: None },
            );
        }

        self.schedule_expiry(hold.id, 0, ttl_seconds);
        self.publish(&hold, HoldEventKind::Created);

        tracing::debug!(hold_id = %hold.id, %event_id, %seat_type, quantity, ttl_seconds, "hold created");
        Ok(hold)
    }

    /// Re-arm the expiry timer for a live hold. The previous timer is
    /// invalidated by bumping the epoch rather than cancelled.
    pub fn extend_hold(&self, hold_id: Uuid, ttl_seconds: u64) -> Result<Hold, HoldError> {
        let (hold, epoch) = {
            let mut holds = self.holds.lock().unwrap();
            let record = holds.get_mut(&hold_id).ok_or(HoldError::NotFound(hold_id))?;

            match record.hold.state {
                HoldState::Active | HoldState::Extended => {}
                HoldState::Expired => return Err(HoldError::Expired(hold_id)),
                HoldState::Released => return Err(HoldError::Released(hold_id)),
                HoldState::Consumed => return Err(HoldError::AlreadyConsumed(hold_id)),
            }

            record.hold.state = HoldState::Extended;
            record.hold.expires_at = Utc::now() + chrono::Duration::seconds(ttl_seconds as i64);
            record.expiry_epoch += 1;
            (record.hold.clone(), record.expiry_epoch)
        };

        self.schedule_expiry(hold_id, epoch, ttl_seconds);
        self.publish(&hold, HoldEventKind::Extended);
        Ok(hold)
    }

    /// The only transition into CONSUMED; moves the seats from held to
    /// confirmed in the same critical section. Idempotent: a repeat call for
    /// an already-consumed hold returns it again without touching the ledger,
    /// so duplicate payment callbacks are harmless.
    pub fn consume_hold(&self, hold_id: Uuid) -> Result<Hold, HoldError> {
        let mut holds = self.holds.lock().unwrap();
        let record = holds.get_mut(&hold_id).ok_or(HoldError::NotFound(hold_id))?;

        match record.hold.state {
            HoldState::Consumed => return Ok(record.hold.clone()),
            HoldState::Expired => return Err(HoldError::Expired(hold_id)),
            HoldState::Released => return Err(HoldError::Released(hold_id)),
            HoldState::Active | HoldState::Extended => {}
        }

        self.ledger
            .confirm(record.hold.event_id, record.hold.seat_type, record.hold.quantity)?;
        record.hold.state = HoldState::Consumed;
        record.terminal_at = Some(Utc::now());

        let hold = record.hold.clone();
        drop(holds);

        self.publish(&hold, HoldEventKind::Consumed);
        tracing::info!(%hold_id, quantity = hold.quantity, "hold consumed");
        Ok(hold)
    }

    /// Explicit release (user cancelled, or the hold was replaced by a new
    /// selection). Already-terminal holds are left alone so a late release
    /// can never double-free seats.
    pub fn release_hold(&self, hold_id: Uuid) -> Result<(), HoldError> {
        let mut holds = self.holds.lock().unwrap();
        let record = holds.get_mut(&hold_id).ok_or(HoldError::NotFound(hold_id))?;

        match record.hold.state {
            HoldState::Expired | HoldState::Released => return Ok(()),
            HoldState::Consumed => return Err(HoldError::AlreadyConsumed(hold_id)),
            HoldState::Active | HoldState::Extended => {}
        }

        self.ledger
            .release(record.hold.event_id, record.hold.seat_type, record.hold.quantity)?;
        record.hold.state = HoldState::Released;
        record.expiry_epoch += 1;
        record.terminal_at = Some(Utc::now());

        let hold = record.hold.clone();
        drop(holds);

        self.publish(&hold, HoldEventKind::Released);
        tracing::debug!(%hold_id, "hold released");
        Ok(())
    }

    fn schedule_expiry(&self, hold_id: Uuid, epoch: u64, ttl_seconds: u64) {
        let Some(manager) = self.self_ref.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(ttl_seconds)).await;
            manager.expire(hold_id, epoch);
        });
    }

    /// Timer callback. Competes with consume/release under the holds lock;
    /// exactly one of them wins the transition out of the live states.
    fn expire(&self, hold_id: Uuid, epoch: u64) {
        let mut holds = self.holds.lock().unwrap();
        let record = match holds.get_mut(&hold_id) {
            Some(r) => r,
            None => return,
        };

        if record.expiry_epoch != epoch || !record.hold.state.is_live() {
            return;
        }

        if let Err(err) =
            self.ledger
                .release(record.hold.event_id, record.hold.seat_type, record.hold.quantity)
        {
            tracing::error!(%hold_id, %err, "failed to release seats on hold expiry");
            return;
        }
        record.hold.state = HoldState::Expired;
        record.terminal_at = Some(Utc::now());

        let hold = record.hold.clone();
        drop(holds);

        self.publish(&hold, HoldEventKind::Expired);
        tracing::info!(%hold_id, quantity = hold.quantity, "hold expired, seats released");
    }

    /// Drop terminal hold records older than the retention window. Consumed
    /// holds are retained for the window so late payment-gateway retries can
    /// still resolve; live holds are never touched.
    pub fn sweep_terminal(&self, retain: chrono::Duration) -> usize {
        let cutoff = Utc::now() - retain;
        let mut holds = self.holds.lock().unwrap();
        let before = holds.len();
        holds.retain(|_, record| match record.terminal_at {
            Some(at) => at > cutoff,
            None => true,
        });
        before - holds.len()
    }

    fn publish(&self, hold: &Hold, kind: HoldEventKind) {
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.events.send(HoldEvent {
            hold_id: hold.id,
            event_id: hold.event_id,
            seat_type: hold.seat_type,
            quantity: hold.quantity,
            owner_session: hold.owner_session,
            kind,
            at: Utc::now().timestamp(),
        });
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("hold not found: {0}")]
    NotFound(Uuid),

    #[error("hold expired: {0}")]
    Expired(Uuid),

    #[error("hold released: {0}")]
    Released(Uuid),

    #[error("hold already consumed: {0}")]
    AlreadyConsumed(Uuid),

    #[error("hold quantity must be at least 1")]
    ZeroQuantity,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
