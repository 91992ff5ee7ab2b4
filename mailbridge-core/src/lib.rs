//! Core types for the mailbridge workspace.
//!
//! This crate provides the pieces shared by both sides of the bridge:
//! - `protocol` module for the channel request/response envelope
//! - `error` module for the bridge-wide error taxonomy
//! - `ics` module for calendar document normalization
//! - `encoding` module for the base64 helpers binary payloads cross with

pub mod encoding;
pub mod error;
pub mod ics;
pub mod protocol;

pub use error::{BridgeError, BridgeResult};
