use std::sync::Arc;

use festbook_engine::{BookingEngine, InMemoryCatalog};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    /// The admin surface writes events here; the engine reads them through
    /// the EventCatalog trait.
    pub catalog: Arc<InMemoryCatalog>,
}
