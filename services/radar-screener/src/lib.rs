//! Breakout Radar Library
//!
//! Screens a universe of NSE/BSE equities for technical breakouts and keeps
//! a deduplicated radar of flagged symbols.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   radar-screener (Rust Service)                     │
//! │                           :4480                                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Price Provider │  │  Indicator      │  │  Classifier     │     │
//! │  │  + RateLimiter  │  │  Engine         │  │  (AI/fallback)  │     │
//! │  └────────┬────────┘  └────────┬────────┘  └────────┬────────┘     │
//! │           └──────────── Screener ───────────────────┘              │
//! │                            │                                        │
//! │               ┌────────────┴────────────┐                          │
//! │               │  Store  ◀──  RadarQueue │                          │
//! │               └─────────────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Breakout verdict
//! - Produced by a remote chat-completions model when configured
//! - Degrades to rule-based scoring on any failure, tagged `source = fallback`
//!
//! ## Radar
//! - A symbol appears at most once; re-adding is a no-op
//! - Membership is a set, enumeration order is a list

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod classifier;
pub mod data;
pub mod indicators;
pub mod radar;
pub mod routes;
pub mod screener;
pub mod store;

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use radar_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::screener::{Screener, ScreenerScheduler};

/// Radar service state
pub struct RadarState {
    /// Configuration
    pub config: Config,
    /// Screening context shared by every handler
    pub screener: Screener,
    /// Cron scheduler, when enabled
    pub scheduler: Option<Arc<ScreenerScheduler>>,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl RadarState {
    /// Create state around an existing screener.
    pub fn new(config: Config, screener: Screener) -> Result<Self> {
        let shutdown = CancellationToken::new();

        let scheduler = if config.schedule.enabled {
            Some(Arc::new(ScreenerScheduler::new(
                screener.clone(),
                &config.schedule,
                shutdown.child_token(),
            )?))
        } else {
            None
        };

        Ok(Self {
            config,
            screener,
            scheduler,
            shutdown,
        })
    }

    /// Wire the production collaborators from config.
    pub async fn from_config(config: Config) -> Result<Self> {
        let screener = Screener::from_config(&config).await?;
        Self::new(config, screener)
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<RadarState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/stocks/initialize", post(routes::initialize_stocks))
        .route("/api/v1/stocks/list", get(routes::list_stocks))
        .route("/api/v1/screen/stock", post(routes::screen_stock))
        .route("/api/v1/screen/all", post(routes::screen_all))
        .route("/api/v1/screen/all/sync", post(routes::screen_all_sync))
        .route("/api/v1/radar", get(routes::get_radar))
        .route("/api/v1/radar/:symbol", delete(routes::remove_from_radar))
        .route("/api/v1/stock/:symbol", get(routes::get_stock))
        .route("/api/v1/data/clear", delete(routes::clear_data))
        .route("/api/v1/scheduler/status", get(routes::scheduler_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Main radar service
pub struct RadarService {
    state: Arc<RadarState>,
}

impl RadarService {
    /// Create a new radar service
    pub async fn new(config: Config) -> Result<Self> {
        let state = Arc::new(RadarState::from_config(config).await?);
        Ok(Self { state })
    }

    /// Start the radar service
    pub async fn start(self) -> Result<()> {
        let app = build_router(self.state.clone());

        // Start the cron scheduler
        if let Some(scheduler) = self.state.scheduler.clone() {
            tokio::spawn(async move {
                if let Err(e) = scheduler.run().await {
                    tracing::error!(error = %e, "Screener scheduler failed");
                }
            });
        }

        // Start HTTP server
        let addr: SocketAddr = self.state.config.bind_address().parse()?;
        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            })
            .await?;

        Ok(())
    }
}
