//! Year-in-pixels layout.
//!
//! A [`PixelGrid`] enumerates every day of one year, grouped by month, and
//! resolves each day to the color of the key it is marked with. It only reads
//! the dates it enumerates itself, so entries belonging to other years are
//! neither shown nor touched.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::key::{KeyColor, TrackerKey};
use crate::mutation::{self, Change};
use crate::tracker::{Entries, Tracker, days_in_year};

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Fill of a single pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PixelColor {
    #[default]
    Empty,
    Key(KeyColor),
}

impl PixelColor {
    pub fn hex(&self) -> Option<&'static str> {
        match self {
            PixelColor::Empty => None,
            PixelColor::Key(color) => Some(color.hex()),
        }
    }
}

impl Serialize for PixelColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.hex() {
            Some(hex) => serializer.serialize_str(hex),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCell {
    pub date: NaiveDate,
    /// Zero-based month.
    pub month_index: u32,
    pub day_of_month: u32,
    pub is_today: bool,
    pub is_future: bool,
    /// Whether a click on this day can change it.
    pub interactive: bool,
    pub color: PixelColor,
    pub key_name: Option<String>,
}

/// Hover text for a pixel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub title: String,
    pub detail: String,
}

impl DayCell {
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn tooltip(&self) -> Tooltip {
        let title = self.date.format("%A, %B %-d").to_string();
        let detail = match (&self.key_name, self.is_future) {
            (Some(name), _) => name.clone(),
            (None, true) => "Future date".to_string(),
            (None, false) => "No entry".to_string(),
        };
        Tooltip { title, detail }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthRow {
    pub index: u32,
    pub name: &'static str,
    pub cells: Vec<DayCell>,
}

/// Every date of one calendar year in order.
#[derive(Clone, Debug)]
pub struct YearDays {
    year: i32,
    next: Option<NaiveDate>,
}

impl YearDays {
    pub fn new(year: i32) -> Self {
        YearDays {
            year,
            next: NaiveDate::from_ymd_opt(year, 1, 1),
        }
    }
}

impl Iterator for YearDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| d.year() == self.year);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            Some(d) => (days_in_year(self.year) - d.ordinal0()) as usize,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for YearDays {}

/// Layout of one year as seen on `today`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelGrid {
    year: i32,
    today: NaiveDate,
}

impl PixelGrid {
    pub fn new(year: i32, today: NaiveDate) -> Self {
        PixelGrid { year, today }
    }

    /// Grid of the year `today` falls in.
    pub fn current(today: NaiveDate) -> Self {
        Self::new(today.year(), today)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn days(&self) -> YearDays {
        YearDays::new(self.year)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year
    }

    /// Describe one day of this grid; `None` for dates of other years.
    pub fn cell(&self, date: NaiveDate, entries: &Entries, keys: &[TrackerKey]) -> Option<DayCell> {
        if !self.contains(date) {
            return None;
        }
        let key = entries
            .get(date)
            .and_then(|id| keys.iter().find(|k| k.id == id));

        Some(DayCell {
            date,
            month_index: date.month0(),
            day_of_month: date.day(),
            is_today: date == self.today,
            is_future: date > self.today,
            interactive: mutation::is_trackable(date, self.today),
            color: key.map(|k| PixelColor::Key(k.color)).unwrap_or_default(),
            key_name: key.map(|k| k.name.clone()),
        })
    }

    pub fn cells<'a>(
        self,
        entries: &'a Entries,
        keys: &'a [TrackerKey],
    ) -> impl Iterator<Item = DayCell> + 'a {
        self.days().filter_map(move |d| self.cell(d, entries, keys))
    }

    pub fn months(&self, entries: &Entries, keys: &[TrackerKey]) -> Vec<MonthRow> {
        let mut rows: Vec<MonthRow> = MONTH_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| MonthRow {
                index: i as u32,
                name: *name,
                cells: Vec::with_capacity(31),
            })
            .collect();

        for cell in self.cells(entries, keys) {
            rows[cell.month_index as usize].cells.push(cell);
        }
        rows
    }

    /// Dispatch a click on `date`. Days outside this grid or after today do
    /// nothing, and neither does a click with no key selected.
    pub fn click(&self, date: NaiveDate, tracker: &Tracker, active_key: Option<&str>) -> Option<Change> {
        if !self.contains(date) || date > self.today {
            return None;
        }
        mutation::toggle_day(tracker, date, active_key, self.today)
    }
}
