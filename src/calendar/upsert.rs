//! Idempotent event upsert with orphan healing.
//!
//! The store soft-deletes events, and a soft-deleted row still reserves its
//! `(calendar_id, uid)` slot. A naive insert against such a uid either fails
//! on the uniqueness constraint or silently duplicates; this reconciler
//! purges the orphan first and then performs a plain create-or-update.

use mailbridge_core::ics;
use mailbridge_core::protocol::UpsertOutcome;
use mailbridge_core::{BridgeError, BridgeResult};
use tracing::{debug, error};

use crate::calendar::store::EventStore;

fn store_failure(e: crate::calendar::store::StoreError) -> BridgeError {
    BridgeError::StoreFailure(e.to_string())
}

/// Reconcile a calendar document into `calendar_id`.
///
/// 1. Normalize the document (drop `METHOD:` lines, guarantee a UID).
/// 2. Look up the live record for the uid; remember its storage key.
/// 3. Independently look up an orphaned record for the uid and purge it.
///    `updated` is true when either lookup hit.
/// 4. Update in place when a live record existed, else create at `<uid>.ics`.
///
/// The purge is not rolled back when the write fails; a retry simply
/// re-creates the record, so the whole operation is idempotent-safe.
pub async fn upsert_event(
    store: &dyn EventStore,
    calendar_id: i64,
    document: &str,
) -> BridgeResult<UpsertOutcome> {
    let (document, uid) = ics::normalize(document);

    let existing = store
        .find_live(calendar_id, &uid)
        .await
        .map_err(store_failure)?;
    let mut updated = existing.is_some();

    if let Some(orphan) = store
        .find_orphaned(calendar_id, &uid)
        .await
        .map_err(store_failure)?
    {
        debug!(
            calendar_id,
            uid = %uid,
            object_id = orphan.object_id,
            "purging orphaned calendar event"
        );
        store.purge(orphan.object_id).await.map_err(store_failure)?;
        updated = true;
    }

    let write = match &existing {
        Some(record) => store.update_object(calendar_id, &record.uri, &document).await,
        None => {
            let uri = format!("{uid}.ics");
            store.create_object(calendar_id, &uri, &uid, &document).await
        }
    };

    if let Err(e) = write {
        error!(calendar_id, uid = %uid, error = %e, "failed to save calendar event");
        return Err(BridgeError::StoreFailure(e.to_string()));
    }

    Ok(UpsertOutcome { updated, uid })
}
