//! Screener scheduler.
//!
//! Runs full-universe screening on a cron schedule and supports manual
//! triggers. Runs never overlap: a trigger while a run is in progress is
//! refused with `ScreenerError::AlreadyRunning`. The reported state is read
//! from the screener's run lock, so runs started elsewhere show as running.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use radar_common::config::ScheduleConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AggregateReport, Screener, ScreenerError};

/// Completed reports kept in memory.
const HISTORY_LIMIT: usize = 50;

// ============================================================================
// Scheduler State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Scheduler status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cron: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_report: Option<AggregateReport>,
    pub last_error: Option<String>,
}

// ============================================================================
// Screener Scheduler
// ============================================================================

/// Bookkeeping for completed runs.
#[derive(Debug, Default)]
struct RunLog {
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    last_report: Option<AggregateReport>,
    last_error: Option<String>,
}

pub struct ScreenerScheduler {
    screener: Screener,
    schedule: Schedule,
    cron: String,
    max_concurrent: usize,
    log: Arc<RwLock<RunLog>>,
    history: Arc<RwLock<VecDeque<AggregateReport>>>,
    shutdown: CancellationToken,
}

impl ScreenerScheduler {
    /// Create a scheduler. Fails if the cron expression does not parse.
    pub fn new(
        screener: Screener,
        config: &ScheduleConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(&config.cron)
            .with_context(|| format!("Invalid schedule cron: {}", config.cron))?;
        let max_concurrent = config
            .max_concurrent
            .unwrap_or(screener.settings().max_concurrent);

        Ok(Self {
            screener,
            schedule,
            cron: config.cron.clone(),
            max_concurrent,
            log: Arc::new(RwLock::new(RunLog::default())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            shutdown,
        })
    }

    pub async fn status(&self) -> SchedulerStatus {
        let log = self.log.read().await;
        SchedulerStatus {
            state: self.state(),
            cron: self.cron.clone(),
            last_run_at: log.last_run_at,
            next_run_at: log.next_run_at,
            last_report: log.last_report.clone(),
            last_error: log.last_error.clone(),
        }
    }

    /// Stopped once the token fires; otherwise follows the run lock.
    pub fn state(&self) -> SchedulerState {
        if self.shutdown.is_cancelled() {
            SchedulerState::Stopped
        } else if self.screener.is_running() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Most recent reports first.
    pub async fn history(&self, limit: usize) -> Vec<AggregateReport> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    /// Next fire time after now.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// Run a full screening now.
    pub async fn trigger(&self) -> Result<AggregateReport, ScreenerError> {
        let claim = self.screener.claim_run()?;
        info!(max_concurrent = self.max_concurrent, "Scheduled screening triggered");

        let result = self
            .screener
            .screen_all_claimed(claim, self.max_concurrent, self.shutdown.child_token())
            .await;

        let mut log = self.log.write().await;
        match &result {
            Ok(report) => {
                log.last_run_at = Some(Utc::now());
                log.last_report = Some(report.clone());
                log.last_error = None;
                drop(log);

                let mut history = self.history.write().await;
                history.push_back(report.clone());
                while history.len() > HISTORY_LIMIT {
                    history.pop_front();
                }
            }
            Err(e) => {
                log.last_error = Some(e.to_string());
            }
        }

        result
    }

    /// Fire on the cron schedule until the shutdown token is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!(cron = %self.cron, "Screener scheduler started");

        while let Some(next) = self.next_run() {
            self.log.write().await.next_run_at = Some(next);
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match self.trigger().await {
                Ok(_) => {}
                Err(ScreenerError::AlreadyRunning) => {
                    warn!("Previous screening still running, skipping this tick");
                }
                Err(e) => {
                    warn!(error = %e, "Scheduled screening failed");
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        // An exhausted schedule also counts as stopped.
        self.shutdown.cancel();
        self.log.write().await.next_run_at = None;
        info!("Screener scheduler stopped");
        Ok(())
    }

    /// Stop the cron loop and cancel any run in progress.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
