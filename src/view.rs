//! Dashboard and tracker screens.
//!
//! Views never apply their own writes. They persist the change computed by
//! the mutation layer and wait for the store to push the new snapshot back,
//! so what a view shows is always the last snapshot it received.

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;
use std::sync::Arc;

use crate::grid::{MonthRow, PixelGrid};
use crate::key::KeyColor;
use crate::key_manager::KeyManager;
use crate::mutation::Change;
use crate::store::{OwnerSubscription, StoreError, TrackerStore, TrackerSubscription};
use crate::tracker::{ProgressBand, Tracker, TrackerIcon, days_in_year};

/// Number of key swatches shown on a dashboard card.
pub const CARD_KEY_SWATCHES: usize = 5;

/// Transient message for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    fn success(message: &str) -> Self {
        Notice::Success(message.to_string())
    }

    fn error(message: &str) -> Self {
        Notice::Error(message.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Ready,
    /// The tracker is gone; go back to the list.
    NotFound,
    /// The tracker belongs to someone else; go back to the list.
    Forbidden,
}

impl ViewState {
    pub fn should_leave(&self) -> bool {
        matches!(self, ViewState::NotFound | ViewState::Forbidden)
    }
}

pub struct TrackerView<S: TrackerStore + ?Sized> {
    store: Arc<S>,
    owner_id: String,
    tracker_id: String,
    subscription: Option<TrackerSubscription>,
    tracker: Option<Tracker>,
    state: ViewState,
    keys: KeyManager,
    notices: Vec<Notice>,
}

impl<S: TrackerStore + ?Sized> TrackerView<S> {
    pub fn open(store: Arc<S>, owner_id: &str, tracker_id: &str) -> Self {
        let mut view = TrackerView {
            store,
            owner_id: owner_id.to_string(),
            tracker_id: tracker_id.to_string(),
            subscription: None,
            tracker: None,
            state: ViewState::Loading,
            keys: KeyManager::new(),
            notices: Vec::new(),
        };

        match view.store.subscribe(tracker_id) {
            Ok(sub) => view.subscription = Some(sub),
            Err(StoreError::NotFound(_)) => view.leave(ViewState::NotFound),
            Err(e) => {
                warn!("failed to subscribe to tracker {}: {}", tracker_id, e);
                view.notices.push(Notice::error("Failed to load tracker"));
                view.leave(ViewState::NotFound);
            }
        }
        view
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn tracker(&self) -> Option<&Tracker> {
        self.tracker.as_ref()
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    pub fn key_manager_mut(&mut self) -> &mut KeyManager {
        &mut self.keys
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Apply every snapshot that has already arrived.
    pub fn refresh(&mut self) -> ViewState {
        while let Some(snapshot) = self.subscription.as_mut().and_then(|s| s.try_next()) {
            self.apply_snapshot(snapshot);
        }
        self.state
    }

    /// Wait for the next snapshot and apply it.
    pub async fn next_update(&mut self) -> ViewState {
        let snapshot = match self.subscription.as_mut() {
            Some(sub) => sub.next().await,
            None => return self.state,
        };
        match snapshot {
            Some(snapshot) => self.apply_snapshot(snapshot),
            None => self.leave(ViewState::NotFound),
        }
        self.state
    }

    fn apply_snapshot(&mut self, snapshot: Option<Tracker>) {
        match snapshot {
            None => {
                self.notices.push(Notice::error("Tracker not found"));
                self.leave(ViewState::NotFound);
            }
            Some(tracker) if tracker.owner_id != self.owner_id => {
                self.leave(ViewState::Forbidden);
            }
            Some(tracker) => {
                self.keys.sync(&tracker);
                self.tracker = Some(tracker);
                self.state = ViewState::Ready;
            }
        }
    }

    fn leave(&mut self, state: ViewState) {
        self.tracker = None;
        self.state = state;
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
    }

    pub fn grid(&self, today: NaiveDate) -> Option<Vec<MonthRow>> {
        let tracker = self.tracker.as_ref()?;
        Some(PixelGrid::current(today).months(&tracker.entries, &tracker.keys))
    }

    fn persist(&mut self, change: Change, failure: &str) -> bool {
        match self.store.persist(&self.tracker_id, change.update) {
            Ok(()) => true,
            Err(e) => {
                warn!("write to tracker {} failed: {}", self.tracker_id, e);
                self.notices.push(Notice::error(failure));
                false
            }
        }
    }

    /// Paint or clear `date` with the selected key. Returns whether a write
    /// was issued and accepted.
    pub fn click_day(&mut self, date: NaiveDate, today: NaiveDate) -> bool {
        let Some(tracker) = self.tracker.as_ref() else {
            return false;
        };
        let grid = PixelGrid::current(today);
        let Some(change) = grid.click(date, tracker, self.keys.active_key(tracker)) else {
            return false;
        };
        self.persist(change, "Failed to update pixel")
    }

    /// Store the key described by the key manager's draft.
    pub fn add_key(&mut self) -> bool {
        let Some(tracker) = self.tracker.as_ref() else {
            return false;
        };
        let Some(change) = self.keys.submit(tracker) else {
            return false;
        };
        let Some(added) = change.tracker.keys.last().cloned() else {
            return false;
        };
        if !self.persist(change, "Failed to add key") {
            return false;
        }
        self.keys.key_added(&added);
        self.notices.push(Notice::success("Key added!"));
        true
    }

    pub fn delete_key(&mut self, key_id: &str) -> bool {
        let Some(tracker) = self.tracker.as_ref() else {
            return false;
        };
        let Some(change) = self.keys.delete(tracker, key_id) else {
            return false;
        };
        let remaining = change.tracker.keys.clone();
        if !self.persist(change, "Failed to delete key") {
            return false;
        }
        self.keys.key_deleted(key_id, &remaining);
        self.notices.push(Notice::success("Key deleted"));
        true
    }

    pub fn close(self) {}
}

/// One card on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSummary {
    pub id: String,
    pub name: String,
    pub icon: TrackerIcon,
    pub icon_label: &'static str,
    pub filled_days: usize,
    pub days_in_year: u32,
    pub progress: u32,
    pub band: ProgressBand,
    pub key_colors: Vec<KeyColor>,
    pub extra_keys: usize,
}

impl TrackerSummary {
    pub fn of(tracker: &Tracker, year: i32) -> Self {
        let progress = tracker.progress(year);
        TrackerSummary {
            id: tracker.id.clone(),
            name: tracker.name.clone(),
            icon: tracker.icon,
            icon_label: tracker.icon.label(),
            filled_days: tracker.filled_days(year),
            days_in_year: days_in_year(year),
            progress,
            band: ProgressBand::from_percent(progress),
            key_colors: tracker
                .keys
                .iter()
                .take(CARD_KEY_SWATCHES)
                .map(|k| k.color)
                .collect(),
            extra_keys: tracker.keys.len().saturating_sub(CARD_KEY_SWATCHES),
        }
    }
}

pub fn greeting(tracker_count: usize) -> String {
    match tracker_count {
        0 => "Create your first tracker and start filling pixels!".to_string(),
        1 => "You have 1 tracker. Keep going!".to_string(),
        n => format!("You have {} trackers. Keep going!", n),
    }
}

pub struct Dashboard<S: TrackerStore + ?Sized> {
    store: Arc<S>,
    owner_id: String,
    subscription: OwnerSubscription,
    trackers: Vec<Tracker>,
    loading: bool,
    notices: Vec<Notice>,
}

impl<S: TrackerStore + ?Sized> Dashboard<S> {
    pub fn open(store: Arc<S>, owner_id: &str) -> Self {
        let subscription = store.subscribe_owner(owner_id);
        Dashboard {
            store,
            owner_id: owner_id.to_string(),
            subscription,
            trackers: Vec::new(),
            loading: true,
            notices: Vec::new(),
        }
    }

    pub fn refresh(&mut self) {
        while let Some(trackers) = self.subscription.try_next() {
            self.trackers = trackers;
            self.loading = false;
        }
    }

    pub async fn next_update(&mut self) -> bool {
        match self.subscription.next().await {
            Some(trackers) => {
                self.trackers = trackers;
                self.loading = false;
                true
            }
            None => false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn trackers(&self) -> &[Tracker] {
        &self.trackers
    }

    pub fn summaries(&self, year: i32) -> Vec<TrackerSummary> {
        self.trackers
            .iter()
            .map(|t| TrackerSummary::of(t, year))
            .collect()
    }

    pub fn greeting(&self) -> String {
        greeting(self.trackers.len())
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Create a tracker; blank names are ignored without a write.
    pub fn create(&mut self, name: &str, icon: TrackerIcon) -> Option<String> {
        if name.trim().is_empty() {
            return None;
        }
        match self.store.create_tracker(&self.owner_id, name, icon) {
            Ok(id) => {
                self.notices.push(Notice::success("Tracker created!"));
                Some(id)
            }
            Err(e) => {
                warn!("failed to create tracker for {}: {}", self.owner_id, e);
                self.notices.push(Notice::error("Failed to create tracker"));
                None
            }
        }
    }

    pub fn delete(&mut self, tracker_id: &str) -> bool {
        if !self.trackers.iter().any(|t| t.id == tracker_id) {
            return false;
        }
        match self.store.delete_tracker(tracker_id) {
            Ok(()) => {
                self.notices.push(Notice::success("Tracker deleted"));
                true
            }
            Err(e) => {
                warn!("failed to delete tracker {}: {}", tracker_id, e);
                self.notices.push(Notice::error("Failed to delete tracker"));
                false
            }
        }
    }
}
