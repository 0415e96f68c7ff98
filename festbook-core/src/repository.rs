use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::catalog::EventInfo;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("event not found: {0}")]
    NotFound(Uuid),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only event lookup. Supplies unit prices and capacities; the engine
/// never writes through this seam.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    async fn get_event(&self, event_id: Uuid) -> Result<EventInfo, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("booking not found: {0}")]
    NotFound(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for finalized bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert-if-absent keyed by `hold_id`: at most one booking may ever
    /// exist per hold, and the stored record is returned either way.
    /// Concurrent duplicate finalizations serialize here.
    async fn insert(&self, booking: &Booking) -> Result<Booking, StoreError>;

    async fn get(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Lookup by originating hold, used for idempotent finalization.
    async fn find_by_hold(&self, hold_id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn update_status(&self, booking_id: Uuid, status: BookingStatus) -> Result<(), StoreError>;
}
