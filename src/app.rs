//! HTTP surface: JSON API, live snapshot events and the two HTML pages.
//!
//! Owner identity arrives in the `uid` cookie set by the external auth
//! provider. Every tracker route answers 404 for documents owned by someone
//! else so ids of other users' trackers cannot be discovered.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Datelike, Local, NaiveDate};
use futures::{Stream, StreamExt};
use handlebars::Handlebars;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::export;
use crate::grid::{MonthRow, PixelGrid};
use crate::key::{KeyColor, TrackerKey};
use crate::key_manager::KeyManager;
use crate::mutation::{self, Change};
use crate::store::{MemoryStore, StoreError, TrackerStore};
use crate::tracker::{ProgressBand, Tracker, TrackerIcon, days_in_year};
use crate::view::{TrackerSummary, greeting};

/// Cookie carrying the authenticated owner id.
pub const OWNER_COOKIE: &str = "uid";

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct AppState {
    store: Arc<dyn TrackerStore>,
    pages: Handlebars<'static>,
    clock: Clock,
}

impl AppState {
    pub fn new(store: Arc<dyn TrackerStore>) -> Result<Self, handlebars::TemplateError> {
        let mut pages = Handlebars::new();
        pages.register_template_string("dashboard", include_str!("./templates/dashboard.hbs"))?;
        pages.register_template_string("tracker", include_str!("./templates/tracker.hbs"))?;
        Ok(AppState {
            store,
            pages,
            clock: Arc::new(|| Local::now().date_naive()),
        })
    }

    /// Replace the source of "today".
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn TrackerStore> {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// The tracker, provided `owner_id` owns it.
    fn owned(&self, owner_id: &str, tracker_id: &str) -> Result<Tracker, ApiError> {
        let tracker = self.store.get(tracker_id)?;
        if tracker.owner_id != owner_id {
            return Err(ApiError::NotFound);
        }
        Ok(tracker)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not signed in")]
    Unauthorized,

    #[error("tracker not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            StoreError::InvalidName => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(message) => {
                warn!("request failed: {}", message);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(json!({ "status": "error", "message": self.to_string() })),
        )
            .into_response()
    }
}

/// Reply of every mutating endpoint.
#[derive(Debug, Serialize, Default)]
struct MutationResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<TrackerKey>,
}

impl MutationResponse {
    fn ok() -> Self {
        MutationResponse {
            status: "ok",
            ..Default::default()
        }
    }

    fn noop(message: &str) -> Self {
        MutationResponse {
            status: "noop",
            message: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTracker {
    name: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest {
    date: NaiveDate,
    #[serde(default)]
    key_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddKeyRequest {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

/// Key the tracker page should open with selected.
#[derive(Deserialize)]
struct PageQuery {
    key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GridResponse {
    year: i32,
    today: NaiveDate,
    filled_days: usize,
    days_in_year: u32,
    progress: u32,
    band: ProgressBand,
    months: Vec<MonthRow>,
}

fn owner(jar: &CookieJar) -> Result<String, ApiError> {
    jar.get(OWNER_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthorized)
}

fn year_param(query: &YearQuery, today: NaiveDate) -> Result<i32, ApiError> {
    match query.year {
        None => Ok(today.year()),
        Some(year) if (1..=9999).contains(&year) => Ok(year),
        Some(year) => Err(ApiError::BadRequest(format!("year {} out of range", year))),
    }
}

fn persist(state: &AppState, tracker_id: &str, change: Change, failure: &str) -> Result<(), ApiError> {
    state.store.persist(tracker_id, change.update).map_err(|e| match e {
        StoreError::NotFound(_) => ApiError::NotFound,
        other => {
            warn!("write to tracker {} failed: {}", tracker_id, other);
            ApiError::Internal(failure.to_string())
        }
    })
}

pub fn router(state: Arc<AppState>, static_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/tracker/:id", get(tracker_page))
        .route("/api/events", get(owner_events))
        .route("/api/trackers", get(list_trackers).post(create_tracker))
        .route("/api/trackers/:id", get(get_tracker).delete(delete_tracker))
        .route("/api/trackers/:id/grid", get(get_grid))
        .route("/api/trackers/:id/toggle", post(toggle_day))
        .route("/api/trackers/:id/keys", post(add_key))
        .route("/api/trackers/:id/keys/:key_id", delete(delete_key))
        .route("/api/trackers/:id/events", get(tracker_events))
        .route("/api/trackers/:id/export.csv", get(export_csv))
        .route("/api/trackers/:id/export.png", get(export_png))
        .nest_service("/static", ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn TrackerStore> = match &config.data {
        Some(path) => {
            let store = MemoryStore::open(path)?;
            info!("using snapshot file {}", path.display());
            Arc::new(store)
        }
        None => {
            info!("no snapshot file configured, trackers live in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(AppState::new(store)?);
    let app = router(state, &config.static_dir);

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn dashboard_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Html<String>, ApiError> {
    let owner_id = owner(&jar)?;
    let year = state.today().year();
    let trackers = state.store.list(&owner_id);
    let summaries: Vec<TrackerSummary> = trackers.iter().map(|t| TrackerSummary::of(t, year)).collect();

    let icons: Vec<_> = TrackerIcon::ALL
        .iter()
        .map(|i| json!({ "id": i.id(), "label": i.label() }))
        .collect();

    let page = state
        .pages
        .render(
            "dashboard",
            &json!({
                "greeting": greeting(trackers.len()),
                "year": year,
                "trackers": summaries,
                "icons": icons,
            }),
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Html(page))
}

async fn tracker_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let owner_id = owner(&jar)?;
    let tracker = state.owned(&owner_id, &id)?;
    let today = state.today();
    let year = today.year();
    let months = PixelGrid::current(today).months(&tracker.entries, &tracker.keys);

    // A requested key that no longer exists falls back to the first key.
    let mut selection = KeyManager::new();
    if let Some(key_id) = query.key.as_deref() {
        selection.select(&tracker, key_id);
    }
    selection.sync(&tracker);
    let keys: Vec<_> = tracker
        .keys
        .iter()
        .map(|k| {
            json!({
                "id": k.id,
                "name": k.name,
                "color": k.color,
                "selected": selection.selected() == Some(k.id.as_str()),
            })
        })
        .collect();

    let palette: Vec<&str> = KeyColor::ALL.iter().map(|c| c.hex()).collect();
    let page = state
        .pages
        .render(
            "tracker",
            &json!({
                "tracker": tracker,
                "keys": keys,
                "iconLabel": tracker.icon.label(),
                "year": year,
                "filledDays": tracker.filled_days(year),
                "daysInYear": days_in_year(year),
                "progress": tracker.progress(year),
                "months": months,
                "palette": palette,
            }),
        )
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Html(page))
}

async fn list_trackers(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<TrackerSummary>>, ApiError> {
    let owner_id = owner(&jar)?;
    let year = year_param(&query, state.today())?;
    let summaries = state
        .store
        .list(&owner_id)
        .iter()
        .map(|t| TrackerSummary::of(t, year))
        .collect();
    Ok(Json(summaries))
}

async fn create_tracker(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<CreateTracker>, JsonRejection>,
) -> Result<Response, ApiError> {
    let owner_id = owner(&jar)?;
    let Json(request) = payload?;

    let icon = match request.icon.as_deref() {
        None | Some("") => TrackerIcon::default(),
        Some(id) => TrackerIcon::from_id(id)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown icon '{}'", id)))?,
    };
    if request.name.trim().is_empty() {
        return Ok(Json(MutationResponse::noop("Tracker name cannot be empty")).into_response());
    }

    let id = state
        .store
        .create_tracker(&owner_id, &request.name, icon)
        .map_err(|e| {
            warn!("failed to create tracker for {}: {}", owner_id, e);
            ApiError::Internal("Failed to create tracker".to_string())
        })?;
    info!("created tracker {} for {}", id, owner_id);

    let response = MutationResponse {
        id: Some(id),
        ..MutationResponse::ok()
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn get_tracker(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<Tracker>, ApiError> {
    let owner_id = owner(&jar)?;
    Ok(Json(state.owned(&owner_id, &id)?))
}

async fn delete_tracker(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, ApiError> {
    let owner_id = owner(&jar)?;
    state.owned(&owner_id, &id)?;
    state.store.delete_tracker(&id).map_err(|e| match e {
        StoreError::NotFound(_) => ApiError::NotFound,
        other => {
            warn!("failed to delete tracker {}: {}", id, other);
            ApiError::Internal("Failed to delete tracker".to_string())
        }
    })?;
    info!("deleted tracker {}", id);
    Ok(Json(MutationResponse::ok()))
}

async fn get_grid(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Json<GridResponse>, ApiError> {
    let owner_id = owner(&jar)?;
    let tracker = state.owned(&owner_id, &id)?;
    let today = state.today();
    let year = year_param(&query, today)?;
    let progress = tracker.progress(year);

    Ok(Json(GridResponse {
        year,
        today,
        filled_days: tracker.filled_days(year),
        days_in_year: days_in_year(year),
        progress,
        band: ProgressBand::from_percent(progress),
        months: PixelGrid::new(year, today).months(&tracker.entries, &tracker.keys),
    }))
}

async fn toggle_day(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    payload: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let owner_id = owner(&jar)?;
    let Json(request) = payload?;
    let tracker = state.owned(&owner_id, &id)?;

    let grid = PixelGrid::current(state.today());
    let Some(change) = grid.click(request.date, &tracker, request.key_id.as_deref()) else {
        return Ok(Json(MutationResponse::noop("Nothing to change")));
    };
    persist(&state, &id, change, "Failed to update pixel")?;
    Ok(Json(MutationResponse::ok()))
}

async fn add_key(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    payload: Result<Json<AddKeyRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let owner_id = owner(&jar)?;
    let Json(request) = payload?;
    let tracker = state.owned(&owner_id, &id)?;

    let color = match request.color.as_deref() {
        None | Some("") => KeyColor::default(),
        Some(value) => KeyColor::parse(value)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown key color '{}'", value)))?,
    };
    let Some(change) = mutation::add_key(&tracker, &request.name, color) else {
        return Ok(Json(MutationResponse::noop("Key name cannot be empty")));
    };
    let added = change.tracker.keys.last().cloned();
    persist(&state, &id, change, "Failed to add key")?;

    Ok(Json(MutationResponse {
        message: Some("Key added!".to_string()),
        key: added,
        ..MutationResponse::ok()
    }))
}

async fn delete_key(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((id, key_id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let owner_id = owner(&jar)?;
    let tracker = state.owned(&owner_id, &id)?;

    let Some(change) = mutation::delete_key(&tracker, &key_id) else {
        return Ok(Json(MutationResponse::noop("Unknown key")));
    };
    persist(&state, &id, change, "Failed to delete key")?;
    Ok(Json(MutationResponse {
        message: Some("Key deleted".to_string()),
        ..MutationResponse::ok()
    }))
}

/// Live dashboard feed: the owner's tracker summaries after every change.
async fn owner_events(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let owner_id = owner(&jar)?;
    let subscription = state.store.subscribe_owner(&owner_id);

    let stream = subscription.into_stream().map(move |trackers| {
        let year = state.today().year();
        let summaries: Vec<TrackerSummary> = trackers.iter().map(|t| TrackerSummary::of(t, year)).collect();
        Event::default().event("trackers").json_data(&summaries)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn tracker_events(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let owner_id = owner(&jar)?;
    state.owned(&owner_id, &id)?;
    let subscription = state.store.subscribe(&id)?;

    let stream = subscription.into_stream().map(move |snapshot| match snapshot {
        Some(tracker) => Event::default().event("tracker").json_data(&tracker),
        None => Ok(Event::default().event("deleted").data(id.clone())),
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn attachment_name(tracker: &Tracker, year: i32, extension: &str) -> String {
    let slug: String = tracker
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "tracker" } else { slug };
    format!("attachment; filename=\"{}-{}.{}\"", slug, year, extension)
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Response, ApiError> {
    let owner_id = owner(&jar)?;
    let tracker = state.owned(&owner_id, &id)?;
    let year = year_param(&query, state.today())?;

    let csv = export::to_csv(&tracker, year);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment_name(&tracker, year, "csv")),
        ],
        csv,
    )
        .into_response())
}

async fn export_png(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
    Query(query): Query<YearQuery>,
) -> Result<Response, ApiError> {
    let owner_id = owner(&jar)?;
    let tracker = state.owned(&owner_id, &id)?;
    let year = year_param(&query, state.today())?;
    let disposition = attachment_name(&tracker, year, "png");

    let png = tokio::task::spawn_blocking(move || {
        export::render_png(&tracker, year).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(ApiError::Internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    )
        .into_response())
}
