//! Calendar reference parsing and identity-scoped resolution.
//!
//! A caller may name a calendar by its bare name (`personal`) or by a full
//! hierarchical path whose grammar is `.../calendars/<owner>/<name>/`. The
//! embedded owner segment is informational only: resolution is always keyed
//! by the authenticated identity, never by what the path claims.

use mailbridge_core::{BridgeError, BridgeResult};

use crate::calendar::store::{CalendarRecord, EventStore};

/// Extract the calendar name from a reference.
///
/// After stripping one trailing separator: a path matching the grammar
/// yields its final segment; a reference without any separator is the bare
/// name; everything else is malformed.
pub fn calendar_name_from_reference(reference: &str) -> BridgeResult<&str> {
    let trimmed = reference.strip_suffix('/').unwrap_or(reference);

    let segments: Vec<&str> = trimmed.split('/').collect();
    let n = segments.len();
    if n >= 4 && segments[n - 3] == "calendars" {
        let owner = segments[n - 2];
        let name = segments[n - 1];
        if !owner.is_empty() && !name.is_empty() {
            return Ok(name);
        }
    }

    if !trimmed.contains('/') && !trimmed.is_empty() {
        return Ok(trimmed);
    }

    Err(BridgeError::InvalidReference(reference.to_string()))
}

/// Resolve a reference to one of `owner`'s own calendars.
pub async fn resolve_calendar(
    store: &dyn EventStore,
    owner: &str,
    reference: &str,
) -> BridgeResult<CalendarRecord> {
    let name = calendar_name_from_reference(reference)?;
    store
        .calendar_by_name(owner, name)
        .await
        .map_err(|e| BridgeError::StoreFailure(e.to_string()))?
        .ok_or_else(|| BridgeError::NotFound(name.to_string()))
}
