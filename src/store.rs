//! Document store the views read from and write to.
//!
//! [`TrackerStore`] is the contract the rest of the crate depends on: live
//! snapshots per tracker, partial writes, create and delete. [`MemoryStore`]
//! implements it in-process, optionally mirroring every write into a gzip
//! snapshot file so a server restart keeps its documents.

use chrono::{NaiveDate, Utc};
use futures::{FutureExt, Stream};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::key::TrackerKey;
use crate::saving;
use crate::tracker::{Entries, Tracker, TrackerIcon};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracker '{0}' not found")]
    NotFound(String),

    #[error("tracker name cannot be empty")]
    InvalidName,

    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot codec error: {0}")]
    Codec(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Subset of tracker fields a single write touches.
///
/// Mirrors the three shapes the views produce: one day (`entries.<date>`),
/// the whole key list, or the key list together with the whole entry map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerUpdate {
    pub entry: Option<(NaiveDate, Option<String>)>,
    pub keys: Option<Vec<TrackerKey>>,
    pub entries: Option<Entries>,
}

impl TrackerUpdate {
    pub fn entry(date: NaiveDate, key_id: Option<String>) -> Self {
        TrackerUpdate {
            entry: Some((date, key_id)),
            ..Default::default()
        }
    }

    pub fn keys(keys: Vec<TrackerKey>) -> Self {
        TrackerUpdate {
            keys: Some(keys),
            ..Default::default()
        }
    }

    pub fn with_entries(mut self, entries: Entries) -> Self {
        self.entries = Some(entries);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none() && self.keys.is_none() && self.entries.is_none()
    }

    /// Write the touched fields into `tracker`, leaving the rest alone.
    pub fn apply_to(&self, tracker: &mut Tracker) {
        if let Some(keys) = &self.keys {
            tracker.keys = keys.clone();
        }
        if let Some(entries) = &self.entries {
            tracker.entries = entries.clone();
        }
        if let Some((date, key_id)) = &self.entry {
            tracker.entries.set(*date, key_id.clone());
        }
    }
}

/// Live feed of one document (or one query result).
///
/// The first emission is whatever value is current when it is first polled.
/// Dropping the subscription releases the channel.
pub struct Subscription<T: Clone> {
    topic: String,
    primed: bool,
    rx: watch::Receiver<T>,
}

pub type TrackerSubscription = Subscription<Option<Tracker>>;
pub type OwnerSubscription = Subscription<Vec<Tracker>>;

impl<T: Clone> Subscription<T> {
    pub fn new(topic: impl Into<String>, rx: watch::Receiver<T>) -> Self {
        Subscription {
            topic: topic.into(),
            primed: true,
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Latest value without marking it seen.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Next emission that has already arrived, if any.
    pub fn try_next(&mut self) -> Option<T> {
        if std::mem::take(&mut self.primed) {
            return Some(self.rx.borrow_and_update().clone());
        }
        match self.rx.changed().now_or_never() {
            Some(Ok(())) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Wait for the next emission; `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<T> {
        if !std::mem::take(&mut self.primed) {
            self.rx.changed().await.ok()?;
        }
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}

    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send + Sync + 'static,
    {
        futures::stream::unfold(self, |mut sub| async move {
            let value = sub.next().await?;
            Some((value, sub))
        })
    }
}

impl<T: Clone> Drop for Subscription<T> {
    fn drop(&mut self) {
        debug!("unsubscribed from {}", self.topic);
    }
}

/// Contract with the document store.
pub trait TrackerStore: Send + Sync {
    fn subscribe(&self, tracker_id: &str) -> StoreResult<TrackerSubscription>;

    /// Live list of one owner's trackers, oldest first.
    fn subscribe_owner(&self, owner_id: &str) -> OwnerSubscription;

    fn get(&self, tracker_id: &str) -> StoreResult<Tracker>;

    fn list(&self, owner_id: &str) -> Vec<Tracker>;

    fn persist(&self, tracker_id: &str, update: TrackerUpdate) -> StoreResult<()>;

    fn create_tracker(&self, owner_id: &str, name: &str, icon: TrackerIcon) -> StoreResult<String>;

    fn delete_tracker(&self, tracker_id: &str) -> StoreResult<()>;
}

struct Document {
    tracker: Tracker,
    tx: watch::Sender<Option<Tracker>>,
}

/// In-process [`TrackerStore`].
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    owners: RwLock<HashMap<String, watch::Sender<Vec<Tracker>>>>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store that lives only as long as the process.
    pub fn new() -> Self {
        MemoryStore {
            docs: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Store backed by a snapshot file, loading it when it already exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut docs = HashMap::new();

        if path.exists() {
            let trackers = saving::load_trackers(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    StoreError::Codec(e.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;
            debug!("loaded {} trackers from {}", trackers.len(), path.display());
            for tracker in trackers {
                let (tx, _) = watch::channel(Some(tracker.clone()));
                docs.insert(tracker.id.clone(), Document { tracker, tx });
            }
        }

        Ok(MemoryStore {
            docs: RwLock::new(docs),
            owners: RwLock::new(HashMap::new()),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every document regardless of owner, oldest first.
    pub fn all(&self) -> Vec<Tracker> {
        let mut trackers: Vec<Tracker> = self.read_docs().values().map(|d| d.tracker.clone()).collect();
        trackers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        trackers
    }

    fn read_docs(&self) -> RwLockReadGuard<'_, HashMap<String, Document>> {
        self.docs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_docs(&self) -> RwLockWriteGuard<'_, HashMap<String, Document>> {
        self.docs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, docs: &HashMap<String, Document>) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut trackers: Vec<Tracker> = docs.values().map(|d| d.tracker.clone()).collect();
        trackers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        saving::save_trackers(&trackers, path).map_err(|e| {
            warn!("failed to write snapshot {}: {}", path.display(), e);
            StoreError::Io(e)
        })
    }

    fn owner_list(docs: &HashMap<String, Document>, owner_id: &str) -> Vec<Tracker> {
        let mut trackers: Vec<Tracker> = docs
            .values()
            .filter(|d| d.tracker.owner_id == owner_id)
            .map(|d| d.tracker.clone())
            .collect();
        trackers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        trackers
    }

    fn publish_owner(&self, docs: &HashMap<String, Document>, owner_id: &str) {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = owners.get(owner_id) {
            tx.send_replace(Self::owner_list(docs, owner_id));
        }
        // Channels whose subscribers are all gone are dropped.
        owners.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl TrackerStore for MemoryStore {
    fn subscribe(&self, tracker_id: &str) -> StoreResult<TrackerSubscription> {
        let docs = self.read_docs();
        let doc = docs
            .get(tracker_id)
            .ok_or_else(|| StoreError::NotFound(tracker_id.to_string()))?;
        debug!("subscribed to tracker {}", tracker_id);
        Ok(Subscription::new(
            format!("tracker {}", tracker_id),
            doc.tx.subscribe(),
        ))
    }

    fn subscribe_owner(&self, owner_id: &str) -> OwnerSubscription {
        let docs = self.read_docs();
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        let tx = owners
            .entry(owner_id.to_string())
            .or_insert_with(|| watch::channel(Self::owner_list(&docs, owner_id)).0);
        debug!("subscribed to trackers of {}", owner_id);
        Subscription::new(format!("owner {}", owner_id), tx.subscribe())
    }

    fn get(&self, tracker_id: &str) -> StoreResult<Tracker> {
        self.read_docs()
            .get(tracker_id)
            .map(|d| d.tracker.clone())
            .ok_or_else(|| StoreError::NotFound(tracker_id.to_string()))
    }

    fn list(&self, owner_id: &str) -> Vec<Tracker> {
        Self::owner_list(&self.read_docs(), owner_id)
    }

    fn persist(&self, tracker_id: &str, update: TrackerUpdate) -> StoreResult<()> {
        let mut docs = self.write_docs();
        let doc = docs
            .get_mut(tracker_id)
            .ok_or_else(|| StoreError::NotFound(tracker_id.to_string()))?;

        let previous = doc.tracker.clone();
        update.apply_to(&mut doc.tracker);

        if let Err(e) = self.save(&docs) {
            if let Some(doc) = docs.get_mut(tracker_id) {
                doc.tracker = previous;
            }
            return Err(e);
        }

        let Some(doc) = docs.get(tracker_id) else {
            return Err(StoreError::NotFound(tracker_id.to_string()));
        };
        doc.tx.send_replace(Some(doc.tracker.clone()));
        let owner_id = doc.tracker.owner_id.clone();
        self.publish_owner(&docs, &owner_id);
        debug!("persisted update to tracker {}", tracker_id);
        Ok(())
    }

    fn create_tracker(&self, owner_id: &str, name: &str, icon: TrackerIcon) -> StoreResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidName);
        }

        let id = Uuid::new_v4().simple().to_string();
        let tracker = Tracker::create(id.clone(), owner_id, name, icon, Utc::now());
        let (tx, _) = watch::channel(Some(tracker.clone()));

        let mut docs = self.write_docs();
        docs.insert(id.clone(), Document { tracker, tx });
        if let Err(e) = self.save(&docs) {
            docs.remove(&id);
            return Err(e);
        }

        self.publish_owner(&docs, owner_id);
        debug!("created tracker {} for {}", id, owner_id);
        Ok(id)
    }

    fn delete_tracker(&self, tracker_id: &str) -> StoreResult<()> {
        let mut docs = self.write_docs();
        let doc = docs
            .remove(tracker_id)
            .ok_or_else(|| StoreError::NotFound(tracker_id.to_string()))?;

        if let Err(e) = self.save(&docs) {
            docs.insert(tracker_id.to_string(), doc);
            return Err(e);
        }

        doc.tx.send_replace(None);
        self.publish_owner(&docs, &doc.tracker.owner_id);
        debug!("deleted tracker {}", tracker_id);
        Ok(())
    }
}
