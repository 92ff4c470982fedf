/*!
# Year in Pixels

A habit and mood tracker that shows a whole year as a grid of day pixels.

## Overview

Users create named trackers. Each tracker carries a small palette of keys
(a label and a color) and a map from dates to keys. Clicking a day paints it
with the selected key; clicking it again with the same key clears it. The
percentage of filled days gives a rough measure of progress for the year.

## Architecture

### Domain Layer
- **key**: `TrackerKey`, the closed `KeyColor` palette and key id generation
- **tracker**: `Tracker` documents, the `TrackerIcon` set, the `Entries` map and progress
- **mutation**: pure toggle / add key / delete key transitions returning the partial write
- **grid**: day enumeration for one year, month rows, pixel colors and click dispatch
- **key_manager**: selection and "new key" form state for one open tracker

### Store Layer
- **store**: the `TrackerStore` contract, live `Subscription`s and the in-process `MemoryStore`
- **saving**: gzip + bincode snapshot files backing `MemoryStore`

### Presentation Layer
- **view**: dashboard and tracker screens over a store, with user notices
- **export**: CSV listing and PNG rendering of a tracker year
- **app**: axum server with the JSON API, server-sent snapshot events and HTML pages
- **config**: runtime settings read from the environment

## Binaries

- `pixels [addr]` runs the web server (feature `web`)
- `pixels-cli <snapshot-file> [tracker-id] [year]` prints trackers from a snapshot file

## REST API Endpoints

- `GET /api/trackers`, `POST /api/trackers` - list and create
- `GET /api/events` - the owner's tracker summaries as server-sent events
- `GET /api/trackers/:id`, `DELETE /api/trackers/:id` - read and delete
- `GET /api/trackers/:id/grid?year=` - month rows of day cells
- `POST /api/trackers/:id/toggle` - paint or clear a day
- `POST /api/trackers/:id/keys`, `DELETE /api/trackers/:id/keys/:key_id` - edit keys
- `GET /api/trackers/:id/events` - live snapshots as server-sent events
- `GET /api/trackers/:id/export.csv`, `GET /api/trackers/:id/export.png` - downloads
*/

pub mod config;
pub mod export;
pub mod grid;
pub mod key;
pub mod key_manager;
pub mod mutation;
pub mod saving;
pub mod store;
pub mod tracker;
pub mod view;

#[cfg(feature = "web")]
pub mod app;

pub use config::Config;
pub use grid::{DayCell, MonthRow, PixelColor, PixelGrid};
pub use key::{KeyColor, TrackerKey};
pub use key_manager::KeyManager;
pub use mutation::{Change, Command};
pub use store::{MemoryStore, StoreError, Subscription, TrackerStore, TrackerUpdate};
pub use tracker::{Entries, ProgressBand, Tracker, TrackerIcon};
pub use view::{Dashboard, Notice, TrackerSummary, TrackerView, ViewState};
