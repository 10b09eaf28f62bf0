use crate::columns::EntryFields;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A tracked car entry as held by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub created_at: DateTime<Utc>,

    /// Sheet row holding this entry's mirrored copy, once the append succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_row: Option<u32>,

    #[serde(flatten)]
    pub fields: EntryFields,
}

/// Receives the full entry list, newest first.
pub type Listener = Box<dyn Fn(&[Entry]) + Send + Sync>;

type ListenerMap = StdMutex<HashMap<u64, Listener>>;

/// Handle returned by `subscribe`. Listeners stay attached until
/// `unsubscribe` is called, even if the handle is dropped.
pub struct Subscription {
    id: u64,
    listeners: Weak<ListenerMap>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock_listeners(&listeners).remove(&self.id);
        }
    }
}

/// The authoritative record database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new entry without a sheet row; assigns id and timestamp.
    async fn insert(&self, fields: EntryFields) -> StoreResult<Entry>;

    async fn get(&self, id: &str) -> StoreResult<Option<Entry>>;

    /// All entries, newest first.
    async fn list(&self) -> StoreResult<Vec<Entry>>;

    /// Replace the sixteen attributes, keeping id, timestamp and sheet row.
    async fn update_fields(&self, id: &str, fields: EntryFields) -> StoreResult<Entry>;

    async fn set_sheet_row(&self, id: &str, row: u32) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Deliver the current snapshot now and after every change.
    async fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Entry store kept in memory and, when opened on a path, rewritten to a
/// JSON document after every mutation.
pub struct EntryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    path: Option<PathBuf>,
    listeners: Arc<ListenerMap>,
    next_listener: AtomicU64,
}

impl EntryStore {
    pub fn in_memory() -> Self {
        EntryStore {
            entries: Mutex::new(BTreeMap::new()),
            path: None,
            listeners: Arc::new(StdMutex::new(HashMap::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Open (or create) the store file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries: BTreeMap<String, Entry> = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, b"{}").await?;
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        log::info!("loaded {} entries from {}", entries.len(), path.display());

        Ok(EntryStore {
            entries: Mutex::new(entries),
            path: Some(path),
            ..Self::in_memory()
        })
    }

    /// Persist and notify. Called with the entry lock held so listeners see
    /// snapshots in mutation order.
    async fn commit(&self, entries: &BTreeMap<String, Entry>) -> StoreResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(entries)?;
            tokio::fs::write(path, json).await?;
        }

        let snapshot = newest_first(entries);
        for listener in lock_listeners(&self.listeners).values() {
            listener(&snapshot);
        }
        Ok(())
    }
}

fn newest_first(entries: &BTreeMap<String, Entry>) -> Vec<Entry> {
    let mut list: Vec<Entry> = entries.values().cloned().collect();
    list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    list
}

fn lock_listeners(listeners: &ListenerMap) -> std::sync::MutexGuard<'_, HashMap<u64, Listener>> {
    listeners.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl RecordStore for EntryStore {
    async fn insert(&self, fields: EntryFields) -> StoreResult<Entry> {
        let mut entries = self.entries.lock().await;
        let entry = Entry {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            sheet_row: None,
            fields,
        };
        entries.insert(entry.id.clone(), entry.clone());
        if let Err(e) = self.commit(&entries).await {
            entries.remove(&entry.id);
            return Err(e);
        }
        Ok(entry)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Entry>> {
        Ok(self.entries.lock().await.get(id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Entry>> {
        Ok(newest_first(&*self.entries.lock().await))
    }

    async fn update_fields(&self, id: &str, fields: EntryFields) -> StoreResult<Entry> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut entry.fields, fields);
        let updated = entry.clone();
        if let Err(e) = self.commit(&entries).await {
            if let Some(entry) = entries.get_mut(id) {
                entry.fields = previous;
            }
            return Err(e);
        }
        Ok(updated)
    }

    async fn set_sheet_row(&self, id: &str, row: u32) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = entry.sheet_row.replace(row);
        if let Err(e) = self.commit(&entries).await {
            if let Some(entry) = entries.get_mut(id) {
                entry.sheet_row = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        let removed = entries
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Err(e) = self.commit(&entries).await {
            entries.insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }

    async fn subscribe(&self, listener: Listener) -> Subscription {
        // Registered under the entry lock: a writer either finished before
        // the snapshot or notifies this listener after it.
        let entries = self.entries.lock().await;
        listener(&newest_first(&entries));

        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        lock_listeners(&self.listeners).insert(id, listener);
        drop(entries);
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }
}
