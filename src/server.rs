//! HTTP surface over the ledger.
//!
//! This module provides an HTTP server that:
//! - Serves running totals, the 7-day history and per-app leaderboards
//! - Accepts trusted overwrites of the totals and explicit per-app saves
//! - Ingests batches of host events through the scroll service
//!
//! # Architecture
//!
//! ```text
//! Presentation ──→ GET/PUT /totals, /weekly, /leaderboard ──→ Ledger
//! Host bridge  ──→ POST /events ──→ ScrollService ──→ Ledger ──→ Sink
//! ```
//!
//! Ledger access is blocking file I/O, so every handler hops onto
//! `spawn_blocking`.

use crate::collector::types::HostEvent;
use crate::error::LedgerError;
use crate::ledger::{
    AppDistance, DailyTotal, DayKey, LeaderboardPeriod, Ledger, LedgerTotals, RestoreRequest,
};
use crate::service::{EventOutcome, ScrollService};
use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    ledger: Arc<Ledger>,
    /// Event ingest runs one batch at a time through the same extractor
    service: Mutex<ScrollService>,
}

impl ServerState {
    pub fn new(service: ScrollService) -> Self {
        Self {
            ledger: Arc::clone(service.ledger()),
            service: Mutex::new(service),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Generic acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    /// First day of the window; the current week's Monday when omitted
    pub start: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// Sum the week starting here instead of reporting today
    pub week_start: Option<String>,
}

/// Body of POST /apps
#[derive(Debug, Serialize, Deserialize)]
pub struct AppSaveRequest {
    pub app_id: String,
    pub distance: f64,
    #[serde(default)]
    pub date_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppSaveResponse {
    pub saved: bool,
}

/// Response from POST /events
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IngestResponse {
    pub events: usize,
    pub samples: usize,
    pub persist_failures: usize,
    /// Meters recorded by this batch
    pub distance: f64,
}

fn error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
        }),
    )
}

fn ledger_error(e: LedgerError) -> ApiError {
    match e {
        LedgerError::InvalidSample(_) | LedgerError::InvalidDateKey(_) => {
            error(StatusCode::BAD_REQUEST, "INVALID_INPUT", e.to_string())
        }
        _ => {
            tracing::error!("Ledger write failed: {e}");
            error(StatusCode::INTERNAL_SERVER_ERROR, "PERSIST_ERROR", e.to_string())
        }
    }
}

fn parse_day(raw: Option<&str>) -> Result<Option<DayKey>, ApiError> {
    raw.map(|s| s.parse::<DayKey>())
        .transpose()
        .map_err(|e| error(StatusCode::BAD_REQUEST, "INVALID_DATE", e.to_string()))
}

async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!("Blocking task failed: {e}");
        error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", e.to_string())
    })?
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /totals
async fn totals(State(state): State<Arc<ServerState>>) -> ApiResult<LedgerTotals> {
    let ledger = Arc::clone(&state.ledger);
    blocking(move || Ok(ledger.totals())).await.map(Json)
}

/// PUT /totals
async fn restore(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RestoreRequest>,
) -> ApiResult<StatusResponse> {
    let ledger = Arc::clone(&state.ledger);
    blocking(move || ledger.restore(&request).map_err(ledger_error)).await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// GET /weekly?start=Y-M-D
async fn weekly(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<WeeklyQuery>,
) -> ApiResult<Vec<DailyTotal>> {
    let start = parse_day(query.start.as_deref())?;
    let ledger = Arc::clone(&state.ledger);
    blocking(move || {
        let start = start.unwrap_or_else(|| ledger.today().week_start());
        Ok(ledger.weekly(start))
    })
    .await
    .map(Json)
}

/// GET /leaderboard[?week_start=Y-M-D]
async fn leaderboard(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<AppDistance>> {
    let period = match parse_day(query.week_start.as_deref())? {
        Some(start) => LeaderboardPeriod::Week(start),
        None => LeaderboardPeriod::Today,
    };
    let ledger = Arc::clone(&state.ledger);
    blocking(move || Ok(ledger.leaderboard(period))).await.map(Json)
}

/// POST /apps
async fn save_app(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AppSaveRequest>,
) -> ApiResult<AppSaveResponse> {
    let day = parse_day(request.date_key.as_deref())?;
    let ledger = Arc::clone(&state.ledger);
    let saved = blocking(move || {
        ledger
            .record_app_distance(&request.app_id, request.distance, day)
            .map_err(ledger_error)
    })
    .await?;
    Ok(Json(AppSaveResponse { saved }))
}

/// POST /events
///
/// Events in one batch are processed in order; a persistence failure on one
/// event does not stop the rest.
async fn ingest(
    State(state): State<Arc<ServerState>>,
    Json(events): Json<Vec<HostEvent>>,
) -> ApiResult<IngestResponse> {
    blocking(move || {
        let mut service = state
            .service
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut response = IngestResponse::default();

        for event in &events {
            response.events += 1;
            match service.handle_event(event) {
                EventOutcome::Recorded { sample, .. } => {
                    response.samples += 1;
                    response.distance += sample.distance_m;
                }
                EventOutcome::PersistFailed { .. } => response.persist_failures += 1,
                EventOutcome::NoSample => {}
            }
        }
        Ok(response)
    })
    .await
    .map(Json)
}

/// Build the router without binding.
pub fn router(service: ScrollService) -> Router {
    let state = Arc::new(ServerState::new(service));

    Router::new()
        .route("/health", get(health))
        .route("/totals", get(totals).put(restore))
        .route("/weekly", get(weekly))
        .route("/leaderboard", get(leaderboard))
        .route("/apps", post(save_app))
        .route("/events", post(ingest))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    service: ScrollService,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(service);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Odometer server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
