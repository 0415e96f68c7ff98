pub mod engine;
pub mod finalize;
pub mod holds;
pub mod ledger;
pub mod memory;
pub mod pricing;
pub mod promo;
pub mod session;

pub use engine::{BookingEngine, EngineError, EngineRules};
pub use finalize::{FinalizationService, FinalizeError};
pub use holds::{HoldError, HoldManager};
pub use ledger::{Availability, LedgerError, SeatLedger};
pub use memory::{InMemoryBookingStore, InMemoryCatalog};
pub use pricing::{compute_quote, PricingError, PricingQuote};
pub use promo::{PromoError, PromoRegistry, Promotion};
pub use session::{SessionError, SessionManager};
