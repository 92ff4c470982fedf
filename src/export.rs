//! Exports of one tracker year: a CSV listing, a terminal rendering and a
//! PNG of the pixel grid.

use crate::grid::PixelGrid;
use crate::tracker::Tracker;

/// Side of one pixel in the PNG export.
pub const PNG_CELL: u32 = 16;
/// Space between pixels.
pub const PNG_GAP: u32 = 2;
pub const PNG_MARGIN: u32 = 8;

/// One row per day of `year`: `date,key,color`, with the last two empty for
/// unmarked days.
pub fn to_csv(tracker: &Tracker, year: i32) -> String {
    let grid = PixelGrid::new(year, chrono::NaiveDate::MAX);
    let mut csv = String::from("date,key,color\n");

    for cell in grid.cells(&tracker.entries, &tracker.keys) {
        csv.push_str(&cell.date.format("%Y-%m-%d").to_string());
        csv.push(',');
        if let Some(name) = &cell.key_name {
            csv.push_str(&escape(name));
        }
        csv.push(',');
        if let Some(hex) = cell.color.hex() {
            csv.push_str(hex);
        }
        csv.push('\n');
    }
    csv
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Terminal rendering: one line per month, one character per day.
///
/// Unmarked days print as `.`, marked ones as the first letter of the key
/// name and days after `today` as a blank. A legend follows the grid.
pub fn to_text(tracker: &Tracker, year: i32, today: chrono::NaiveDate) -> String {
    let grid = PixelGrid::new(year, today);
    let mut out = String::new();

    for row in grid.months(&tracker.entries, &tracker.keys) {
        out.push_str(&format!("{:<4}", row.name));
        for cell in &row.cells {
            let c = match (&cell.key_name, cell.is_future) {
                (_, true) => ' ',
                (Some(name), false) => name.chars().next().unwrap_or('#'),
                (None, false) => '.',
            };
            out.push(c);
        }
        out.push('\n');
    }

    if !tracker.keys.is_empty() {
        out.push('\n');
        for key in &tracker.keys {
            let letter = key.name.chars().next().unwrap_or('#');
            out.push_str(&format!("  {} {} ({})\n", letter, key.name, key.color));
        }
    }
    out
}

/// Pixel size of the PNG export: 31 columns by 12 rows.
pub fn png_size() -> (u32, u32) {
    let step = PNG_CELL + PNG_GAP;
    (
        PNG_MARGIN * 2 + step * 31 - PNG_GAP,
        PNG_MARGIN * 2 + step * 12 - PNG_GAP,
    )
}

/// Render `year` as a PNG, one row per month and one square per day.
#[cfg(feature = "web")]
pub fn render_png(tracker: &Tracker, year: i32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use crate::grid::PixelColor;
    use chrono::Datelike;
    use plotters::prelude::*;

    let grid = PixelGrid::new(year, chrono::NaiveDate::MAX);
    let filename = std::env::temp_dir().join(format!("pixels-{}.png", uuid::Uuid::new_v4().simple()));
    {
        let root = BitMapBackend::new(&filename, png_size()).into_drawing_area();
        root.fill(&WHITE)?;

        let empty = RGBColor(229, 231, 235);
        let step = (PNG_CELL + PNG_GAP) as i32;
        for cell in grid.cells(&tracker.entries, &tracker.keys) {
            let x = PNG_MARGIN as i32 + step * (cell.date.day0() as i32);
            let y = PNG_MARGIN as i32 + step * (cell.month_index as i32);
            let fill = match cell.color {
                PixelColor::Key(color) => {
                    let (r, g, b) = color.rgb();
                    RGBColor(r, g, b)
                }
                PixelColor::Empty => empty,
            };
            root.draw(&Rectangle::new(
                [(x, y), (x + PNG_CELL as i32, y + PNG_CELL as i32)],
                fill.filled(),
            ))?;
        }

        root.present()?;
    }

    let buffer = std::fs::read(&filename)?;
    std::fs::remove_file(&filename)?;
    Ok(buffer)
}
