//! Pure state transitions over a tracker's keys and entries.
//!
//! Every operation takes the current document and returns the next one
//! together with the partial update the caller should persist. `None` means
//! the input was rejected and nothing should be written.

use chrono::{Datelike, NaiveDate};

use crate::key::{KeyColor, TrackerKey, generate_key_id};
use crate::store::TrackerUpdate;
use crate::tracker::Tracker;

/// Next state of a tracker plus the write that produces it.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub tracker: Tracker,
    pub update: TrackerUpdate,
}

/// A user action on a tracker.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    ToggleDay {
        date: NaiveDate,
        active_key: Option<String>,
    },
    AddKey {
        name: String,
        color: KeyColor,
    },
    DeleteKey {
        key_id: String,
    },
}

impl Command {
    pub fn apply(&self, tracker: &Tracker, today: NaiveDate) -> Option<Change> {
        match self {
            Command::ToggleDay { date, active_key } => {
                toggle_day(tracker, *date, active_key.as_deref(), today)
            }
            Command::AddKey { name, color } => add_key(tracker, name, *color),
            Command::DeleteKey { key_id } => delete_key(tracker, key_id),
        }
    }
}

/// Whether `date` may be written when the current day is `today`.
///
/// Only days of the current year up to and including today are trackable.
pub fn is_trackable(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date <= today
}

/// Mark `date` with `active_key`, or clear it when it already holds that key.
pub fn toggle_day(
    tracker: &Tracker,
    date: NaiveDate,
    active_key: Option<&str>,
    today: NaiveDate,
) -> Option<Change> {
    let active_key = active_key?;
    if !tracker.has_key(active_key) || !is_trackable(date, today) {
        return None;
    }

    let value = if tracker.entries.get(date) == Some(active_key) {
        None
    } else {
        Some(active_key.to_string())
    };

    let update = TrackerUpdate::entry(date, value);
    let mut next = tracker.clone();
    update.apply_to(&mut next);
    Some(Change {
        tracker: next,
        update,
    })
}

/// Append a key named `name` (trimmed) to the palette.
pub fn add_key(tracker: &Tracker, name: &str, color: KeyColor) -> Option<Change> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let key = TrackerKey::create(generate_key_id(&tracker.keys), name, color);
    let mut keys = tracker.keys.clone();
    keys.push(key);

    let update = TrackerUpdate::keys(keys);
    let mut next = tracker.clone();
    update.apply_to(&mut next);
    Some(Change {
        tracker: next,
        update,
    })
}

/// Remove a key and clear every day that was marked with it.
pub fn delete_key(tracker: &Tracker, key_id: &str) -> Option<Change> {
    if !tracker.has_key(key_id) {
        return None;
    }

    let keys: Vec<TrackerKey> = tracker
        .keys
        .iter()
        .filter(|k| k.id != key_id)
        .cloned()
        .collect();
    let mut entries = tracker.entries.clone();
    entries.clear_key(key_id);

    let update = TrackerUpdate::keys(keys).with_entries(entries);
    let mut next = tracker.clone();
    update.apply_to(&mut next);
    Some(Change {
        tracker: next,
        update,
    })
}

/// Selection to use once `deleted` is gone from the palette.
pub fn reselect_after_delete(
    selected: Option<&str>,
    deleted: &str,
    remaining: &[TrackerKey],
) -> Option<String> {
    match selected {
        Some(id) if id == deleted => remaining.first().map(|k| k.id.clone()),
        Some(id) => Some(id.to_string()),
        None => None,
    }
}
