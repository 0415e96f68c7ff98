pub mod booking;
pub mod catalog;
pub mod events;
pub mod hold;
pub mod repository;
pub mod session;

pub use booking::{Booking, BookingStatus};
pub use catalog::{EventInfo, EventStatus, SeatType, SeatTypeInfo};
pub use events::{HoldEvent, HoldEventKind};
pub use hold::{Hold, HoldState};
pub use repository::{BookingStore, CatalogError, EventCatalog, StoreError};
pub use session::{BookingSession, ContactError, ContactInfo, SessionStep};
