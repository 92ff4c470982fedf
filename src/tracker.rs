use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::key::TrackerKey;

/// A user's named year-long habit or mood log.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub icon: TrackerIcon,
    #[serde(default)]
    pub keys: Vec<TrackerKey>,
    #[serde(default)]
    pub entries: Entries,
    pub created_at: DateTime<Utc>,
}

/// Icon shown next to a tracker's name
///
/// Unknown ids read back from storage become the default so a stray value
/// never makes a document unreadable.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum TrackerIcon {
    Droplets,
    Dumbbell,
    Book,
    Brain,
    Palette,
    Moon,
    Heart,
    #[default]
    Star,
    Zap,
    Coffee,
    Music,
    Camera,
}

impl TrackerIcon {
    pub const ALL: [TrackerIcon; 12] = [
        TrackerIcon::Droplets,
        TrackerIcon::Dumbbell,
        TrackerIcon::Book,
        TrackerIcon::Brain,
        TrackerIcon::Palette,
        TrackerIcon::Moon,
        TrackerIcon::Heart,
        TrackerIcon::Star,
        TrackerIcon::Zap,
        TrackerIcon::Coffee,
        TrackerIcon::Music,
        TrackerIcon::Camera,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            TrackerIcon::Droplets => "droplets",
            TrackerIcon::Dumbbell => "dumbbell",
            TrackerIcon::Book => "book",
            TrackerIcon::Brain => "brain",
            TrackerIcon::Palette => "palette",
            TrackerIcon::Moon => "moon",
            TrackerIcon::Heart => "heart",
            TrackerIcon::Star => "star",
            TrackerIcon::Zap => "zap",
            TrackerIcon::Coffee => "coffee",
            TrackerIcon::Music => "music",
            TrackerIcon::Camera => "camera",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackerIcon::Droplets => "Water",
            TrackerIcon::Dumbbell => "Gym",
            TrackerIcon::Book => "Reading",
            TrackerIcon::Brain => "Mental",
            TrackerIcon::Palette => "Creative",
            TrackerIcon::Moon => "Sleep",
            TrackerIcon::Heart => "Health",
            TrackerIcon::Star => "Goals",
            TrackerIcon::Zap => "Energy",
            TrackerIcon::Coffee => "Habits",
            TrackerIcon::Music => "Music",
            TrackerIcon::Camera => "Photos",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|icon| icon.id() == id)
    }
}

impl From<String> for TrackerIcon {
    fn from(value: String) -> Self {
        TrackerIcon::from_id(&value).unwrap_or_default()
    }
}

impl From<TrackerIcon> for String {
    fn from(icon: TrackerIcon) -> Self {
        icon.id().to_string()
    }
}

/// Mapping of calendar days to the id of the key they are marked with
///
/// A cleared day is not stored at all, so "absent" and "null" are one state.
/// On the wire the map may carry `null` values; they are dropped when read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entries(BTreeMap<NaiveDate, String>);

impl Entries {
    pub fn new() -> Self {
        Entries(BTreeMap::new())
    }

    pub fn get(&self, date: NaiveDate) -> Option<&str> {
        self.0.get(&date).map(String::as_str)
    }

    /// Set or clear a single day.
    pub fn set(&mut self, date: NaiveDate, key_id: Option<String>) {
        match key_id {
            Some(id) => {
                self.0.insert(date, id);
            }
            None => {
                self.0.remove(&date);
            }
        }
    }

    /// Clear every day marked with `key_id`, returning how many were cleared.
    pub fn clear_key(&mut self, key_id: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|_, v| v != key_id);
        before - self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.0.iter().map(|(d, k)| (*d, k.as_str()))
    }

    pub fn in_year(&self, year: i32) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.iter().filter(move |(d, _)| d.year() == year)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(NaiveDate, String)> for Entries {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, String)>>(iter: I) -> Self {
        Entries(iter.into_iter().collect())
    }
}

impl Serialize for Entries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(d, k)| (d, Some(k))))
    }
}

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<NaiveDate, Option<String>>::deserialize(deserializer)?;
        Ok(raw.into_iter().filter_map(|(d, k)| k.map(|k| (d, k))).collect())
    }
}

impl Tracker {
    pub fn create(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        name: impl Into<String>,
        icon: TrackerIcon,
        created_at: DateTime<Utc>,
    ) -> Self {
        Tracker {
            id: id.into(),
            owner_id: owner_id.into(),
            name: name.into(),
            icon,
            keys: Vec::new(),
            entries: Entries::new(),
            created_at,
        }
    }

    pub fn key(&self, key_id: &str) -> Option<&TrackerKey> {
        self.keys.iter().find(|k| k.id == key_id)
    }

    pub fn has_key(&self, key_id: &str) -> bool {
        self.key(key_id).is_some()
    }

    /// The key a day is marked with, if it still exists.
    pub fn entry_key(&self, date: NaiveDate) -> Option<&TrackerKey> {
        self.entries.get(date).and_then(|id| self.key(id))
    }

    /// True when every entry points at a key that is still in `keys`.
    pub fn is_consistent(&self) -> bool {
        self.entries.iter().all(|(_, id)| self.has_key(id))
    }

    pub fn filled_days(&self, year: i32) -> usize {
        self.entries.in_year(year).count()
    }

    /// Share of `year` that has been filled in, as a whole percentage.
    pub fn progress(&self, year: i32) -> u32 {
        let total = days_in_year(year) as f64;
        let filled = self.filled_days(year) as f64;
        (100.0 * filled / total).round() as u32
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Coarse bucket used to color a progress bar.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBand {
    Low,
    Fair,
    Good,
    Great,
}

impl ProgressBand {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            0..=24 => ProgressBand::Low,
            25..=49 => ProgressBand::Fair,
            50..=74 => ProgressBand::Good,
            _ => ProgressBand::Great,
        }
    }
}
