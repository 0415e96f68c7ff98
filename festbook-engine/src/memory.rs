use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use festbook_core::{
    Booking, BookingStatus, BookingStore, CatalogError, EventCatalog, EventInfo, StoreError,
};

/// In-memory event catalog (will sit behind the real catalog service later).
pub struct InMemoryCatalog {
    events: RwLock<HashMap<Uuid, EventInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, event: EventInfo) {
        let mut events = self.events.write().unwrap();
        events.insert(event.id, event);
    }

    pub fn remove(&self, event_id: Uuid) -> Option<EventInfo> {
        let mut events = self.events.write().unwrap();
        events.remove(&event_id)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventCatalog for InMemoryCatalog {
    async fn get_event(&self, event_id: Uuid) -> Result<EventInfo, CatalogError> {
        let events = self.events.read().unwrap();
        events.get(&event_id).cloned().ok_or(CatalogError::NotFound(event_id))
    }
}

/// In-memory booking store keyed by booking id, with a hold index for
/// idempotent finalization lookups.
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
    by_hold: RwLock<HashMap<Uuid, Uuid>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(HashMap::new()),
            by_hold: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.write().unwrap();
        let mut by_hold = self.by_hold.write().unwrap();

        // First writer for a hold wins; a duplicate gets the original back.
        if let Some(existing) = by_hold.get(&booking.hold_id).and_then(|id| bookings.get(id)) {
            return Ok(existing.clone());
        }

        bookings.insert(booking.id, booking.clone());
        by_hold.insert(booking.hold_id, booking.id);
        Ok(booking.clone())
    }

    async fn get(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let bookings = self.bookings.read().unwrap();
        Ok(bookings.get(&booking_id).cloned())
    }

    async fn find_by_hold(&self, hold_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let by_hold = self.by_hold.read().unwrap();
        let bookings = self.bookings.read().unwrap();
        Ok(by_hold.get(&hold_id).and_then(|id| bookings.get(id)).cloned())
    }

    async fn update_status(&self, booking_id: Uuid, status: BookingStatus) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().unwrap();
        let booking = bookings.get_mut(&booking_id).ok_or(StoreError::NotFound(booking_id))?;
        booking.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use festbook_core::SeatType;

    fn booking(hold_id: Uuid) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            reference: "BKTEST123".to_string(),
            hold_id,
            event_id: Uuid::new_v4(),
            user_email: "test@college.edu".to_string(),
            seat_type: SeatType::General,
            quantity: 2,
            total_amount: 286.0,
            currency: "INR".to_string(),
            payment_reference: "pay_123".to_string(),
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_store_roundtrip_and_hold_index() {
        let store = InMemoryBookingStore::new();
        let hold_id = Uuid::new_v4();
        let b = booking(hold_id);

        store.insert(&b).await.unwrap();
        assert_eq!(store.get(b.id).await.unwrap().unwrap().reference, "BKTEST123");
        assert_eq!(store.find_by_hold(hold_id).await.unwrap().unwrap().id, b.id);

        store.update_status(b.id, BookingStatus::Refunded).await.unwrap();
        assert_eq!(store.get(b.id).await.unwrap().unwrap().status, BookingStatus::Refunded);
    }

    #[tokio::test]
    async fn test_insert_is_first_writer_wins_per_hold() {
        let store = InMemoryBookingStore::new();
        let hold_id = Uuid::new_v4();

        let first = store.insert(&booking(hold_id)).await.unwrap();
        let second = store.insert(&booking(hold_id)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.get(first.id).await.unwrap().unwrap().id, first.id);
    }
}
