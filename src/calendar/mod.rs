//! Calendar resolution and the upsert reconciler.

pub mod resolve;
pub mod store;
pub mod upsert;

pub use resolve::resolve_calendar;
pub use store::{CalendarRecord, EventRecord, EventStore, MemoryStore};
pub use upsert::upsert_event;
