use pixels::export;
use pixels::store::{MemoryStore, TrackerStore};
use pixels::tracker::Tracker;

use chrono::{Datelike, Local};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 4 {
        eprintln!("Usage: {} <snapshot-file> [tracker-id] [year]", args[0]);
        return Ok(());
    }

    let store = MemoryStore::open(&args[1])?;
    let today = Local::now().date_naive();
    let year = match args.get(3) {
        Some(y) => y.parse::<i32>().map_err(|_| format!("invalid year '{}'", y))?,
        None => today.year(),
    };

    match args.get(2) {
        None => list(&store, year),
        Some(id) => {
            let tracker = store.get(id)?;
            println!("{} ({}), {}", tracker.name, tracker.icon.label(), year);
            println!(
                "{} / {} days, {}%",
                tracker.filled_days(year),
                pixels::tracker::days_in_year(year),
                tracker.progress(year)
            );
            println!();
            print!("{}", export::to_text(&tracker, year, today));
        }
    }

    Ok(())
}

fn list(store: &MemoryStore, year: i32) {
    let mut trackers: Vec<Tracker> = store.all();
    if trackers.is_empty() {
        println!("No trackers");
        return;
    }
    trackers.sort_by(|a, b| a.owner_id.cmp(&b.owner_id).then(a.created_at.cmp(&b.created_at)));

    println!("{:<34} {:<12} {:<24} {:<10} {:>8}", "id", "owner", "name", "icon", "progress");
    for t in &trackers {
        println!(
            "{:<34} {:<12} {:<24} {:<10} {:>7}%",
            t.id,
            t.owner_id,
            t.name,
            t.icon.id(),
            t.progress(year)
        );
    }
}
