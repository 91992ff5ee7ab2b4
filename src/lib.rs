//! Bridge runtime between an embedded webmail client and host capabilities.
//!
//! The embedded context cannot reach host file or calendar storage directly
//! (origin isolation), so every capability crosses a shared message channel
//! as a correlated request/response pair:
//!
//! - [`client::BridgeClient`] runs in the embedded context and exposes the
//!   typed call surface (pick/save files, share links, calendars).
//! - [`dispatch::HostDispatcher`] runs in the trusted context, routes
//!   requests by action, and answers each with exactly one response.
//! - [`calendar`] holds the identity-scoped calendar resolution and the
//!   upsert reconciler that heals orphaned (soft-deleted) event records.
//!
//! Wire types live in the `mailbridge-core` crate.

pub mod calendar;
pub mod capabilities;
pub mod channel;
pub mod client;
pub mod dispatch;
pub mod pending;

pub use mailbridge_core::{BridgeError, BridgeResult};
