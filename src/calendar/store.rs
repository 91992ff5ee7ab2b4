//! Event store interface and records.
//!
//! The real store is an external backend; the bridge only depends on this
//! trait. Records mirror the backend's calendar-object rows: a unique
//! `(calendar_id, uid)` constraint spans live *and* soft-deleted rows, which
//! is exactly why the reconciler has to purge orphans before writing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailbridge_core::protocol::CalendarDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error detail surfaced by the backing store.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct StoreError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;

/// A calendar owned by one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarRecord {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub display_name: String,
    pub color: Option<String>,
}

impl CalendarRecord {
    /// Wire descriptor for `getCalendars`.
    pub fn descriptor(&self) -> CalendarDescriptor {
        CalendarDescriptor {
            url: format!("/remote/dav/calendars/{}/{}/", self.owner, self.name),
            display_name: self.display_name.clone(),
            color: self.color.clone(),
        }
    }
}

/// An event row. `deleted_at: Some(_)` marks a soft-deleted (orphaned)
/// record that still reserves its uid slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub object_id: i64,
    pub calendar_id: i64,
    pub uid: String,
    /// Storage key, derived from the uid at creation.
    pub uri: String,
    pub etag: String,
    pub data: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EventRecord {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Create/update-by-key and query-by-filter operations of the event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// A calendar with this name owned by `owner`, if any. Lookups are
    /// always owner-scoped; there is no cross-identity query.
    async fn calendar_by_name(&self, owner: &str, name: &str)
        -> StoreResult<Option<CalendarRecord>>;

    /// All calendars visible to `owner`.
    async fn calendars_for(&self, owner: &str) -> StoreResult<Vec<CalendarRecord>>;

    /// The live record for `(calendar_id, uid)`, if any.
    async fn find_live(&self, calendar_id: i64, uid: &str) -> StoreResult<Option<EventRecord>>;

    /// The soft-deleted record for `(calendar_id, uid)`, if any. Mutually
    /// exclusive with `find_live` for a given uid at any instant.
    async fn find_orphaned(&self, calendar_id: i64, uid: &str)
        -> StoreResult<Option<EventRecord>>;

    /// Hard-delete a record and its property rows. An absent id is a no-op:
    /// two reconciliations racing on the same uid may both purge.
    async fn purge(&self, object_id: i64) -> StoreResult<()>;

    /// Insert a new record. Fails if any row (live or soft-deleted) already
    /// holds `(calendar_id, uid)`.
    async fn create_object(
        &self,
        calendar_id: i64,
        uri: &str,
        uid: &str,
        data: &str,
    ) -> StoreResult<EventRecord>;

    /// Replace the document at an existing storage key, refreshing its etag.
    async fn update_object(
        &self,
        calendar_id: i64,
        uri: &str,
        data: &str,
    ) -> StoreResult<EventRecord>;
}

#[derive(Default)]
struct MemoryInner {
    calendars: Vec<CalendarRecord>,
    objects: Vec<EventRecord>,
    props: HashMap<i64, Vec<(String, String)>>,
    next_id: i64,
    fail_writes: bool,
}

/// In-process store for tests and self-contained embeddings.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_calendar(&self, owner: &str, name: &str, display_name: &str) -> CalendarRecord {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let record = CalendarRecord {
            id: inner.next_id,
            owner: owner.to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            color: None,
        };
        inner.calendars.push(record.clone());
        record
    }

    /// Soft-delete a record, turning it into an orphan.
    pub fn soft_delete(&self, object_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.objects.iter_mut().find(|r| r.object_id == object_id) {
            record.deleted_at = Some(Utc::now());
        }
    }

    pub fn set_prop(&self, object_id: i64, name: &str, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .props
            .entry(object_id)
            .or_default()
            .push((name.to_string(), value.to_string()));
    }

    pub fn props(&self, object_id: i64) -> Vec<(String, String)> {
        self.inner
            .lock()
            .unwrap()
            .props
            .get(&object_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every record (live or not) holding `(calendar_id, uid)`.
    pub fn records(&self, calendar_id: i64, uid: &str) -> Vec<EventRecord> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|r| r.calendar_id == calendar_id && r.uid == uid)
            .cloned()
            .collect()
    }

    /// Make subsequent create/update calls fail, to exercise error paths.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn calendar_by_name(
        &self,
        owner: &str,
        name: &str,
    ) -> StoreResult<Option<CalendarRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .calendars
            .iter()
            .find(|c| c.owner == owner && c.name == name)
            .cloned())
    }

    async fn calendars_for(&self, owner: &str) -> StoreResult<Vec<CalendarRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .calendars
            .iter()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect())
    }

    async fn find_live(&self, calendar_id: i64, uid: &str) -> StoreResult<Option<EventRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|r| r.calendar_id == calendar_id && r.uid == uid && r.is_live())
            .cloned())
    }

    async fn find_orphaned(
        &self,
        calendar_id: i64,
        uid: &str,
    ) -> StoreResult<Option<EventRecord>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .objects
            .iter()
            .find(|r| r.calendar_id == calendar_id && r.uid == uid && !r.is_live())
            .cloned())
    }

    async fn purge(&self, object_id: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.objects.retain(|r| r.object_id != object_id);
        inner.props.remove(&object_id);
        Ok(())
    }

    async fn create_object(
        &self,
        calendar_id: i64,
        uri: &str,
        uid: &str,
        data: &str,
    ) -> StoreResult<EventRecord> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(StoreError("simulated write failure".to_string()));
        }
        if inner
            .objects
            .iter()
            .any(|r| r.calendar_id == calendar_id && r.uid == uid)
        {
            return Err(StoreError(format!(
                "unique constraint violation for uid '{uid}' in calendar {calendar_id}"
            )));
        }
        inner.next_id += 1;
        let record = EventRecord {
            object_id: inner.next_id,
            calendar_id,
            uid: uid.to_string(),
            uri: uri.to_string(),
            etag: Uuid::new_v4().to_string(),
            data: data.to_string(),
            deleted_at: None,
        };
        inner.objects.push(record.clone());
        Ok(record)
    }

    async fn update_object(
        &self,
        calendar_id: i64,
        uri: &str,
        data: &str,
    ) -> StoreResult<EventRecord> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(StoreError("simulated write failure".to_string()));
        }
        let record = inner
            .objects
            .iter_mut()
            .find(|r| r.calendar_id == calendar_id && r.uri == uri && r.is_live())
            .ok_or_else(|| StoreError(format!("no live object at '{uri}'")))?;
        record.data = data.to_string();
        record.etag = Uuid::new_v4().to_string();
        Ok(record.clone())
    }
}
