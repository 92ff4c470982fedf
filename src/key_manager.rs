use crate::key::{KeyColor, TrackerKey};
use crate::mutation::{self, Change};
use crate::tracker::Tracker;

/// Per-view state of the key palette: which key the next click paints with
/// and the "new key" form. None of it is stored with the tracker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyManager {
    selected: Option<String>,
    adding: bool,
    draft_name: String,
    draft_color: KeyColor,
}

impl KeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Selection, but only while its key still exists in `tracker`.
    pub fn active_key<'a>(&'a self, tracker: &Tracker) -> Option<&'a str> {
        self.selected
            .as_deref()
            .filter(|id| tracker.has_key(id))
    }

    pub fn select(&mut self, tracker: &Tracker, key_id: &str) -> bool {
        if !tracker.has_key(key_id) {
            return false;
        }
        self.selected = Some(key_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Reconcile with a fresh snapshot.
    pub fn sync(&mut self, tracker: &Tracker) {
        if let Some(id) = &self.selected {
            if !tracker.has_key(id) {
                self.selected = None;
            }
        }
        if self.selected.is_none() {
            self.selected = tracker.keys.first().map(|k| k.id.clone());
        }
    }

    pub fn is_adding(&self) -> bool {
        self.adding
    }

    pub fn draft_name(&self) -> &str {
        &self.draft_name
    }

    pub fn draft_color(&self) -> KeyColor {
        self.draft_color
    }

    pub fn begin_add(&mut self) {
        self.adding = true;
    }

    pub fn cancel_add(&mut self) {
        self.adding = false;
        self.draft_name.clear();
    }

    pub fn set_draft_name(&mut self, name: impl Into<String>) {
        self.draft_name = name.into();
    }

    pub fn set_draft_color(&mut self, color: KeyColor) {
        self.draft_color = color;
    }

    pub fn can_submit(&self) -> bool {
        !self.draft_name.trim().is_empty()
    }

    /// Build the key described by the draft. The draft is kept until the
    /// write lands; see [`KeyManager::key_added`].
    pub fn submit(&self, tracker: &Tracker) -> Option<Change> {
        mutation::add_key(tracker, &self.draft_name, self.draft_color)
    }

    /// The new key was stored: select it and reset the form.
    pub fn key_added(&mut self, key: &TrackerKey) {
        self.selected = Some(key.id.clone());
        self.adding = false;
        self.draft_name.clear();
        self.draft_color = KeyColor::random();
    }

    pub fn delete(&self, tracker: &Tracker, key_id: &str) -> Option<Change> {
        mutation::delete_key(tracker, key_id)
    }

    /// A key was removed: move the selection to the first remaining key if
    /// it pointed at the deleted one.
    pub fn key_deleted(&mut self, key_id: &str, remaining: &[TrackerKey]) {
        self.selected = mutation::reselect_after_delete(self.selected.as_deref(), key_id, remaining);
    }
}
