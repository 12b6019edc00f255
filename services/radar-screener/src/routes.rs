//! HTTP routes for the radar service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::SymbolInfo;
use crate::radar::RadarEntry;
use crate::screener::{
    AggregateReport, HealthReport, ScreenOutcome, ScreenerError, ScreeningResult, SchedulerStatus,
};
use crate::store::StoreError;
use crate::RadarState;

// ============================================================================
// Errors
// ============================================================================

/// JSON error body with a mapped status code.
#[derive(Debug)]
pub struct ApiError(radar_common::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<radar_common::Error> for ApiError {
    fn from(e: radar_common::Error) -> Self {
        Self(e)
    }
}

impl From<ScreenerError> for ApiError {
    fn from(e: ScreenerError) -> Self {
        Self(e.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(radar_common::Error::External(e.to_string()))
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    #[serde(flatten)]
    pub details: HealthReport,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub use_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub count: usize,
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub count: usize,
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ScreenStockRequest {
    pub symbol: String,
}

#[derive(Debug, Serialize)]
pub struct ScreenStockResponse {
    #[serde(flatten)]
    pub result: ScreeningResult,
    pub added_to_radar: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScreenAllRequest {
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RadarResponse {
    pub count: usize,
    pub entries: Vec<RadarEntry>,
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatusResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SchedulerStatus>,
    pub history: Vec<AggregateReport>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<RadarState>>) -> Json<HealthResponse> {
    let details = state.screener.health().await;
    Json(HealthResponse {
        status: if details.store_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "radar-screener".to_string(),
        details,
    })
}

/// Fetch and store the symbol universe.
pub async fn initialize_stocks(
    State(state): State<Arc<RadarState>>,
    body: Option<Json<InitializeRequest>>,
) -> ApiResult<InitializeResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let symbols = state.screener.initialize_universe(request.use_fallback).await?;
    Ok(Json(InitializeResponse {
        count: symbols.len(),
        symbols,
    }))
}

pub async fn list_stocks(State(state): State<Arc<RadarState>>) -> ApiResult<SymbolsResponse> {
    let symbols = state.screener.universe().await?;
    Ok(Json(SymbolsResponse {
        count: symbols.len(),
        symbols,
    }))
}

/// Screen a single symbol now.
pub async fn screen_stock(
    State(state): State<Arc<RadarState>>,
    Json(request): Json<ScreenStockRequest>,
) -> ApiResult<ScreenStockResponse> {
    let symbol = request.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(radar_common::Error::InvalidInput("symbol is required".into()).into());
    }

    match state.screener.screen_one(&symbol).await {
        ScreenOutcome::Screened {
            result,
            added_to_radar,
        } => Ok(Json(ScreenStockResponse {
            result,
            added_to_radar,
        })),
        ScreenOutcome::NoData { symbol } => Err(radar_common::Error::NotFound(format!(
            "No price data for {}",
            symbol
        ))
        .into()),
        ScreenOutcome::Failed {
            symbol, message, ..
        } => Err(radar_common::Error::Internal(format!(
            "Screening {} failed: {}",
            symbol, message
        ))
        .into()),
    }
}

/// Start a full run in the background.
pub async fn screen_all(
    State(state): State<Arc<RadarState>>,
    body: Option<Json<ScreenAllRequest>>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let max_concurrent = request
        .max_concurrent
        .unwrap_or(state.screener.settings().max_concurrent);

    let claim = state.screener.claim_run()?;
    if state.screener.universe().await?.is_empty() {
        return Err(ScreenerError::UniverseEmpty.into());
    }

    let screener = state.screener.clone();
    let token = state.shutdown.child_token();
    tokio::spawn(async move {
        if let Err(e) = screener
            .screen_all_claimed(claim, max_concurrent, token)
            .await
        {
            tracing::error!(error = %e, "Background screening run failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "started",
            "max_concurrent": max_concurrent,
        })),
    ))
}

/// Run a full screening and wait for the report.
pub async fn screen_all_sync(
    State(state): State<Arc<RadarState>>,
    body: Option<Json<ScreenAllRequest>>,
) -> ApiResult<AggregateReport> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let max_concurrent = request
        .max_concurrent
        .unwrap_or(state.screener.settings().max_concurrent);

    let report = state
        .screener
        .screen_all_with_cancel(max_concurrent, state.shutdown.child_token())
        .await?;
    Ok(Json(report))
}

pub async fn get_radar(State(state): State<Arc<RadarState>>) -> ApiResult<RadarResponse> {
    let entries = state.screener.radar().list_all().await?;
    Ok(Json(RadarResponse {
        count: entries.len(),
        entries,
    }))
}

pub async fn remove_from_radar(
    State(state): State<Arc<RadarState>>,
    Path(symbol): Path<String>,
) -> ApiResult<serde_json::Value> {
    let symbol = symbol.to_uppercase();
    if !state.screener.radar().remove(&symbol).await? {
        return Err(radar_common::Error::NotFound(format!("{} is not on the radar", symbol)).into());
    }
    Ok(Json(serde_json::json!({
        "removed": symbol,
    })))
}

/// Last cached screening result for a symbol.
pub async fn get_stock(
    State(state): State<Arc<RadarState>>,
    Path(symbol): Path<String>,
) -> ApiResult<ScreeningResult> {
    let symbol = symbol.to_uppercase();
    state
        .screener
        .cached_result(&symbol)
        .await?
        .map(Json)
        .ok_or_else(|| {
            radar_common::Error::NotFound(format!("No screening result for {}", symbol)).into()
        })
}

pub async fn clear_data(State(state): State<Arc<RadarState>>) -> ApiResult<serde_json::Value> {
    let deleted = state.screener.clear_all().await?;
    Ok(Json(serde_json::json!({
        "deleted_keys": deleted,
    })))
}

pub async fn scheduler_status(
    State(state): State<Arc<RadarState>>,
) -> Json<SchedulerStatusResponse> {
    match &state.scheduler {
        Some(scheduler) => Json(SchedulerStatusResponse {
            enabled: true,
            status: Some(scheduler.status().await),
            history: scheduler.history(10).await,
        }),
        None => Json(SchedulerStatusResponse {
            enabled: false,
            status: None,
            history: Vec::new(),
        }),
    }
}
