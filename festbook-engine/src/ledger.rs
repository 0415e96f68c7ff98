use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use festbook_core::SeatType;

/// Seat counters for one (event, seat type) pair.
/// Invariant: confirmed + held <= total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub total: u32,
    pub confirmed: u32,
    pub held: u32,
    pub available: u32,
}

#[derive(Debug, Default)]
struct SeatCounts {
    total: u32,
    confirmed: u32,
    held: u32,
}

impl SeatCounts {
    fn available(&self) -> u32 {
        self.total - self.confirmed - self.held
    }
}

/// The authoritative seat-count bookkeeping. Locking is per
/// (event_id, seat_type) key, so unrelated events never contend; the outer
/// map lock is only taken for entry lookup and seeding.
pub struct SeatLedger {
    entries: Mutex<HashMap<(Uuid, SeatType), Arc<Mutex<SeatCounts>>>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create the counters for a published event's seat type. A no-op if the
    /// entry already exists, so re-seeding from the catalog is safe.
    pub fn open(&self, event_id: Uuid, seat_type: SeatType, total: u32) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry((event_id, seat_type)).or_insert_with(|| {
            Arc::new(Mutex::new(SeatCounts {
                total,
                confirmed: 0,
                held: 0,
            }))
        });
    }

    /// Drop the counters for an event that was deleted from the catalog.
    pub fn close_event(&self, event_id: Uuid) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(eid, _), _| *eid != event_id);
    }

    fn entry(&self, event_id: Uuid, seat_type: SeatType) -> Result<Arc<Mutex<SeatCounts>>, LedgerError> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&(event_id, seat_type))
            .cloned()
            .ok_or(LedgerError::UnknownKey { event_id, seat_type })
    }

    /// Atomically reserve seats: checks availability and increments the held
    /// count in one critical section, or fails without mutating anything.
    pub fn try_reserve(&self, event_id: Uuid, seat_type: SeatType, quantity: u32) -> Result<(), LedgerError> {
        let entry = self.entry(event_id, seat_type)?;
        let mut counts = entry.lock().unwrap();

        let available = counts.available();
        if quantity > available {
            return Err(LedgerError::InsufficientSeats {
                requested: quantity,
                available,
            });
        }

        counts.held += quantity;
        Ok(())
    }

    /// Return held seats to the available pool (expiry or cancellation).
    /// An underflow means a double-release upstream and is surfaced loudly,
    /// never clamped.
    pub fn release(&self, event_id: Uuid, seat_type: SeatType, quantity: u32) -> Result<(), LedgerError> {
        let entry = self.entry(event_id, seat_type)?;
        let mut counts = entry.lock().unwrap();

        if counts.held < quantity {
            tracing::error!(
                %event_id, %seat_type, held = counts.held, quantity,
                "ledger integrity fault: release would drive held count negative"
            );
            return Err(LedgerError::HeldUnderflow {
                held: counts.held,
                requested: quantity,
            });
        }

        counts.held -= quantity;
        Ok(())
    }

    /// Move held seats into confirmed (successful finalization).
    pub fn confirm(&self, event_id: Uuid, seat_type: SeatType, quantity: u32) -> Result<(), LedgerError> {
        let entry = self.entry(event_id, seat_type)?;
        let mut counts = entry.lock().unwrap();

        if counts.held < quantity {
            tracing::error!(
                %event_id, %seat_type, held = counts.held, quantity,
                "ledger integrity fault: confirm exceeds held count"
            );
            return Err(LedgerError::HeldUnderflow {
                held: counts.held,
                requested: quantity,
            });
        }

        counts.held -= quantity;
        counts.confirmed += quantity;
        Ok(())
    }

    /// Return confirmed seats to the available pool (booking cancelled or
    /// refunded after finalization).
    pub fn release_confirmed(&self, event_id: Uuid, seat_type: SeatType, quantity: u32) -> Result<(), LedgerError> {
        let entry = self.entry(event_id, seat_type)?;
        let mut counts = entry.lock().unwrap();

        if counts.confirmed < quantity {
            tracing::error!(
                %event_id, %seat_type, confirmed = counts.confirmed, quantity,
                "ledger integrity fault: refund exceeds confirmed count"
            );
            return Err(LedgerError::ConfirmedUnderflow {
                confirmed: counts.confirmed,
                requested: quantity,
            });
        }

        counts.confirmed -= quantity;
        Ok(())
    }

    pub fn availability(&self, event_id: Uuid, seat_type: SeatType) -> Result<Availability, LedgerError> {
        let entry = self.entry(event_id, seat_type)?;
        let counts = entry.lock().unwrap();
        Ok(Availability {
            total: counts.total,
            confirmed: counts.confirmed,
            held: counts.held,
            available: counts.available(),
        })
    }
}

impl Default for SeatLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no inventory for event {event_id} seat type {seat_type}")]
    UnknownKey { event_id: Uuid, seat_type: SeatType },

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },

    #[error("held count underflow: held {held}, requested {requested}")]
    HeldUnderflow { held: u32, requested: u32 },

    #[error("confirmed count underflow: confirmed {confirmed}, requested {requested}")]
    ConfirmedUnderflow { confirmed: u32, requested: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_confirm_lifecycle() {
        let ledger = SeatLedger::new();
        let event_id = Uuid::new_v4();
        ledger.open(event_id, SeatType::General, 100);

        ledger.try_reserve(event_id, SeatType::General, 10).unwrap();
        let avail = ledger.availability(event_id, SeatType::General).unwrap();
        assert_eq!(avail.held, 10);
        assert_eq!(avail.available, 90);

        ledger.confirm(event_id, SeatType::General, 10).unwrap();
        let avail = ledger.availability(event_id, SeatType::General).unwrap();
        assert_eq!(avail.held, 0);
        assert_eq!(avail.confirmed, 10);
        assert_eq!(avail.available, 90);
    }

    #[test]
    fn test_reserve_rejects_when_short() {
        let ledger = SeatLedger::new();
        let event_id = Uuid::new_v4();
        ledger.open(event_id, SeatType::Vip, 5);

        ledger.try_reserve(event_id, SeatType::Vip, 3).unwrap();
        let err = ledger.try_reserve(event_id, SeatType::Vip, 3).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientSeats { requested: 3, available: 2 }
        ));

        // Failed reservation must not have mutated anything.
        let avail = ledger.availability(event_id, SeatType::Vip).unwrap();
        assert_eq!(avail.held, 3);
        assert_eq!(avail.available, 2);
    }

    #[test]
    fn test_double_release_surfaces_underflow() {
        let ledger = SeatLedger::new();
        let event_id = Uuid::new_v4();
        ledger.open(event_id, SeatType::General, 10);

        ledger.try_reserve(event_id, SeatType::General, 2).unwrap();
        ledger.release(event_id, SeatType::General, 2).unwrap();

        let err = ledger.release(event_id, SeatType::General, 2).unwrap_err();
        assert!(matches!(err, LedgerError::HeldUnderflow { held: 0, requested: 2 }));

        // No clamping: counts are untouched by the failed release.
        let avail = ledger.availability(event_id, SeatType::General).unwrap();
        assert_eq!(avail.available, 10);
    }

    #[test]
    fn test_release_confirmed_returns_seats() {
        let ledger = SeatLedger::new();
        let event_id = Uuid::new_v4();
        ledger.open(event_id, SeatType::Premium, 8);

        ledger.try_reserve(event_id, SeatType::Premium, 4).unwrap();
        ledger.confirm(event_id, SeatType::Premium, 4).unwrap();
        ledger.release_confirmed(event_id, SeatType::Premium, 4).unwrap();

        let avail = ledger.availability(event_id, SeatType::Premium).unwrap();
        assert_eq!(avail.confirmed, 0);
        assert_eq!(avail.available, 8);
    }

    #[test]
    fn test_keys_are_independent() {
        let ledger = SeatLedger::new();
        let event_id = Uuid::new_v4();
        ledger.open(event_id, SeatType::General, 10);
        ledger.open(event_id, SeatType::Vip, 4);

        ledger.try_reserve(event_id, SeatType::General, 10).unwrap();
        // Exhausting general leaves vip untouched.
        assert_eq!(ledger.availability(event_id, SeatType::Vip).unwrap().available, 4);
    }
}
