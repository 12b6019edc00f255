//! Integration tests for the screening pipeline.
//!
//! Exercises single-symbol screening, full-universe runs, the radar
//! dedup invariant and cancellation against mock collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use radar_common::config::ScheduleConfig;
use tokio_util::sync::CancellationToken;

use common::{CountingBackend, Harness, MockProvider, ScriptedEngine};
use radar_screener::classifier::{BreakoutClassifier, VerdictSource};
use radar_screener::data::{SymbolInfo, UniverseSource};
use radar_screener::screener::{
    FailureKind, SchedulerState, ScreenOutcome, ScreenerError, ScreenerScheduler,
};

fn symbols(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("S{}", i)).collect()
}

fn as_refs(symbols: &[String]) -> Vec<&str> {
    symbols.iter().map(String::as_str).collect()
}

// ============================================================================
// Single symbol
// ============================================================================

#[tokio::test]
async fn test_empty_series_never_reaches_classifier_or_store() {
    let backend = CountingBackend::new(r#"{"is_breakout": true, "confidence": 90}"#);
    let harness = Harness::with_classifier(
        MockProvider::new().with_empty("ZZZZ"),
        ScriptedEngine::new(),
        BreakoutClassifier::with_backend(backend.clone()),
    );

    let outcome = harness.screener.screen_one("ZZZZ").await;

    assert_eq!(
        outcome,
        ScreenOutcome::NoData {
            symbol: "ZZZZ".into()
        }
    );
    assert_eq!(backend.calls(), 0);
    assert_eq!(harness.engine.calls(), 0);
    assert_eq!(harness.store.writes(), 0);
    assert!(harness.screener.cached_result("ZZZZ").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_symbol_is_no_data() {
    let harness = Harness::new(MockProvider::new().with_missing("DELISTED"), ScriptedEngine::new());

    let outcome = harness.screener.screen_one("DELISTED").await;
    assert!(matches!(outcome, ScreenOutcome::NoData { .. }));
    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn test_fetch_error_is_failed_outcome() {
    let harness = Harness::new(MockProvider::new().with_network_error("TCS"), ScriptedEngine::new());

    match harness.screener.screen_one("TCS").await {
        ScreenOutcome::Failed { kind, message, .. } => {
            assert_eq!(kind, FailureKind::Fetch);
            assert!(message.contains("connection reset"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_indicators_is_computation_error() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new().nothing_for("TCS"));

    match harness.screener.screen_one("TCS").await {
        ScreenOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::Computation),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn test_panic_is_contained() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new().panicking_on("TCS"));

    match harness.screener.screen_one("TCS").await {
        ScreenOutcome::Failed { kind, message, .. } => {
            assert_eq!(kind, FailureKind::Panicked);
            assert!(message.contains("indicator failure for TCS"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_breakout_is_persisted_and_enqueued() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    harness.provider.set_price("TCS", 3500.0);

    let outcome = harness.screener.screen_one("TCS").await;
    let ScreenOutcome::Screened {
        result,
        added_to_radar,
    } = outcome
    else {
        panic!("expected screened outcome");
    };

    assert!(added_to_radar);
    assert_eq!(result.latest_price, 3500.0);
    assert_eq!(result.data_points, 30);
    assert_eq!(result.verdict.source, VerdictSource::Fallback);
    assert_eq!(result.verdict.confidence, 1.0);

    let cached = harness.screener.cached_result("TCS").await.unwrap().unwrap();
    assert_eq!(cached, result);

    let radar = harness.screener.radar().list_all().await.unwrap();
    assert_eq!(radar.len(), 1);
    assert_eq!(radar[0].last_price, Some(3500.0));
}

#[tokio::test]
async fn test_ai_verdict_used_when_backend_answers() {
    let backend = CountingBackend::new(
        "```json\n{\"is_breakout\": true, \"confidence\": 85, \"signals\": [\"Volume surge\"], \"reasoning\": \"ok\"}\n```",
    );
    let harness = Harness::with_classifier(
        MockProvider::new(),
        ScriptedEngine::new(),
        BreakoutClassifier::with_backend(backend.clone()),
    );

    let ScreenOutcome::Screened {
        result,
        added_to_radar,
    } = harness.screener.screen_one("INFY").await
    else {
        panic!("expected screened outcome");
    };

    assert_eq!(backend.calls(), 1);
    assert_eq!(result.verdict.source, VerdictSource::Ai);
    assert!((result.verdict.confidence - 0.85).abs() < 1e-9);
    assert!(added_to_radar);
}

#[tokio::test]
async fn test_low_confidence_breakout_not_enqueued() {
    let backend = CountingBackend::new(r#"{"is_breakout": true, "confidence": 55}"#);
    let harness = Harness::with_classifier(
        MockProvider::new(),
        ScriptedEngine::new(),
        BreakoutClassifier::with_backend(backend),
    );

    let ScreenOutcome::Screened { added_to_radar, .. } = harness.screener.screen_one("SBIN").await
    else {
        panic!("expected screened outcome");
    };
    assert!(!added_to_radar);
    assert!(!harness.screener.radar().contains("SBIN").await.unwrap());
    assert!(harness.screener.cached_result("SBIN").await.unwrap().is_some());
}

#[tokio::test]
async fn test_rescreen_overwrites_without_duplicate_radar_entry() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());

    harness.provider.set_price("TCS", 100.0);
    let first = harness.screener.screen_one("TCS").await;
    assert!(matches!(first, ScreenOutcome::Screened { added_to_radar: true, .. }));

    harness.provider.set_price("TCS", 120.0);
    let second = harness.screener.screen_one("TCS").await;
    assert!(matches!(second, ScreenOutcome::Screened { added_to_radar: false, .. }));

    let cached = harness.screener.cached_result("TCS").await.unwrap().unwrap();
    assert_eq!(cached.latest_price, 120.0);

    let radar = harness.screener.radar();
    assert_eq!(radar.count().await.unwrap(), 1);
    // The entry keeps the price it was added with.
    assert_eq!(radar.list_all().await.unwrap()[0].last_price, Some(100.0));
}

#[tokio::test]
async fn test_persistence_failure_skips_radar() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    harness.store.fail_value_writes.store(true, Ordering::SeqCst);

    match harness.screener.screen_one("TCS").await {
        ScreenOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::Persistence),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!harness.screener.radar().contains("TCS").await.unwrap());
}

#[tokio::test]
async fn test_cancelled_before_commit_writes_nothing() {
    let harness = Harness::new(
        MockProvider::new().with_delay(Duration::from_secs(5)),
        ScriptedEngine::new(),
    );
    let token = CancellationToken::new();

    let screener = harness.screener.clone();
    let child = token.clone();
    let handle =
        tokio::spawn(async move { screener.screen_one_cancellable("TCS", &child).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let outcome = handle.await.unwrap();
    assert!(matches!(
        outcome,
        ScreenOutcome::Failed {
            kind: FailureKind::Cancelled,
            ..
        }
    ));
    assert_eq!(harness.store.writes(), 0);
}

// ============================================================================
// Full universe
// ============================================================================

#[tokio::test]
async fn test_empty_universe_fails_fast() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());

    let err = harness.screener.screen_all(5).await.unwrap_err();
    assert!(matches!(err, ScreenerError::UniverseEmpty));
    assert_eq!(harness.provider.calls(), 0);
}

#[tokio::test]
async fn test_batch_isolates_panicking_symbol() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new().panicking_on("S4"));
    let universe = symbols(10);
    harness.seed_universe(&as_refs(&universe)).await;

    let report = harness.screener.screen_all(3).await.unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.processed, 9);
    assert!(report.errors >= 1);
    assert_eq!(report.breakouts, 9);
    assert!(!report.cancelled);
    assert!(!harness.screener.radar().contains("S4").await.unwrap());
}

#[tokio::test]
async fn test_batch_folds_every_outcome() {
    let harness = Harness::new(
        MockProvider::new()
            .with_empty("S1")
            .with_network_error("S2"),
        ScriptedEngine::new().nothing_for("S3"),
    );
    let universe = symbols(6);
    harness.seed_universe(&as_refs(&universe)).await;

    let report = harness.screener.screen_all(2).await.unwrap();

    assert_eq!(report.total, 6);
    assert_eq!(report.processed, 6);
    assert_eq!(report.no_data, 1);
    assert_eq!(report.errors, 2);
    assert_eq!(report.breakouts, 3);
    assert_eq!(report.skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_cap_respected() {
    let harness = Harness::new(
        MockProvider::new().with_delay(Duration::from_millis(50)),
        ScriptedEngine::new(),
    );
    let universe = symbols(12);
    harness.seed_universe(&as_refs(&universe)).await;

    let report = harness.screener.screen_all(3).await.unwrap();

    assert_eq!(report.processed, 12);
    assert!(harness.provider.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(harness.provider.calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_returns_partial_report() {
    let harness = Harness::new(
        MockProvider::new().with_delay(Duration::from_millis(50)),
        ScriptedEngine::new(),
    );
    let universe = symbols(20);
    harness.seed_universe(&as_refs(&universe)).await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(120)).await;
        canceller.cancel();
    });

    let report = harness
        .screener
        .screen_all_with_cancel(2, token)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.processed < 20);
    assert_eq!(report.processed + report.skipped, 20);
    assert_eq!(report.errors, 0);

    // Whatever was screened is fully committed.
    let radar_count = harness.screener.radar().count().await.unwrap();
    assert_eq!(radar_count, report.breakouts);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_runs_refused() {
    let harness = Harness::new(
        MockProvider::new().with_delay(Duration::from_millis(100)),
        ScriptedEngine::new(),
    );
    let universe = symbols(4);
    harness.seed_universe(&as_refs(&universe)).await;

    let screener = harness.screener.clone();
    let first = tokio::spawn(async move { screener.screen_all(2).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(harness.screener.is_running());

    let err = harness.screener.screen_all(2).await.unwrap_err();
    assert!(matches!(err, ScreenerError::AlreadyRunning));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.processed, 4);
    assert!(!harness.screener.is_running());
}

// ============================================================================
// Radar dedup
// ============================================================================

#[tokio::test]
async fn test_radar_membership_follows_net_effect() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    let radar = harness.screener.radar();
    let verdict = match harness.screener.screen_one("A").await {
        ScreenOutcome::Screened { result, .. } => result.verdict,
        other => panic!("unexpected outcome: {:?}", other),
    };

    // screen_one already added A.
    assert!(!radar.add("A", verdict.clone(), None).await.unwrap());
    assert!(radar.contains("A").await.unwrap());
    assert_eq!(radar.count().await.unwrap(), 1);

    assert!(radar.remove("A").await.unwrap());
    assert!(!radar.contains("A").await.unwrap());

    assert!(radar.add("B", verdict.clone(), None).await.unwrap());
    assert!(radar.add("A", verdict.clone(), None).await.unwrap());
    assert!(!radar.remove("C").await.unwrap());

    let order: Vec<_> = radar
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.symbol)
        .collect();
    assert_eq!(order, vec!["B", "A"]);
}

#[tokio::test]
async fn test_concurrent_adds_insert_once() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    let verdict = match harness.screener.screen_one("X").await {
        ScreenOutcome::Screened { result, .. } => result.verdict,
        other => panic!("unexpected outcome: {:?}", other),
    };
    harness.screener.radar().clear().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let radar = harness.screener.radar().clone();
        let verdict = verdict.clone();
        handles.push(tokio::spawn(async move {
            radar.add("TCS", verdict, None).await.unwrap()
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(harness.screener.radar().count().await.unwrap(), 1);
}

// ============================================================================
// Universe initialization
// ============================================================================

struct FailingSource;

#[async_trait]
impl UniverseSource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn fetch_symbols(&self) -> anyhow::Result<Vec<SymbolInfo>> {
        Err(anyhow!("listing page unavailable"))
    }
}

struct DuplicateSource;

#[async_trait]
impl UniverseSource for DuplicateSource {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    async fn fetch_symbols(&self) -> anyhow::Result<Vec<SymbolInfo>> {
        Ok(vec![
            SymbolInfo::new("TCS", "Old Name", "IT", "NSE"),
            SymbolInfo::new("INFY", "Infosys", "IT", "NSE"),
            SymbolInfo::new("TCS", "Tata Consultancy Services", "IT", "NSE"),
        ])
    }
}

#[tokio::test]
async fn test_failing_source_uses_fallback_list() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    let screener = harness
        .screener
        .clone()
        .with_universe_source(Arc::new(FailingSource));

    let symbols = screener.initialize_universe(false).await.unwrap();
    assert_eq!(symbols.len(), 15);
}

#[tokio::test]
async fn test_reinitialize_replaces_and_dedups() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    harness.screener.initialize_universe(true).await.unwrap();

    let screener = harness
        .screener
        .clone()
        .with_universe_source(Arc::new(DuplicateSource));
    screener.initialize_universe(false).await.unwrap();

    let stored = screener.universe().await.unwrap();
    assert_eq!(stored.len(), 2);
    let tcs = stored.iter().find(|s| s.symbol == "TCS").unwrap();
    assert_eq!(tcs.display_name, "Tata Consultancy Services");
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test]
async fn test_scheduler_trigger_records_history() {
    let harness = Harness::new(MockProvider::new(), ScriptedEngine::new());
    let universe = symbols(3);
    harness.seed_universe(&as_refs(&universe)).await;

    let config = ScheduleConfig {
        enabled: true,
        cron: "0 30 16 * * Mon-Fri".into(),
        max_concurrent: Some(1),
    };
    let scheduler =
        ScreenerScheduler::new(harness.screener.clone(), &config, CancellationToken::new()).unwrap();

    let report = scheduler.trigger().await.unwrap();
    assert_eq!(report.processed, 3);

    let status = scheduler.status().await;
    assert_eq!(status.last_report, Some(report));
    assert!(status.last_run_at.is_some());
    assert!(status.last_error.is_none());
    assert_eq!(scheduler.history(10).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_reports_runs_started_elsewhere() {
    let harness = Harness::new(
        MockProvider::new().with_delay(Duration::from_millis(200)),
        ScriptedEngine::new(),
    );
    let universe = symbols(3);
    harness.seed_universe(&as_refs(&universe)).await;

    let config = ScheduleConfig {
        enabled: true,
        cron: "0 30 16 * * Mon-Fri".into(),
        max_concurrent: Some(1),
    };
    let scheduler =
        ScreenerScheduler::new(harness.screener.clone(), &config, CancellationToken::new()).unwrap();
    assert_eq!(scheduler.status().await.state, SchedulerState::Idle);

    let screener = harness.screener.clone();
    let run = tokio::spawn(async move { screener.screen_all(1).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(scheduler.status().await.state, SchedulerState::Running);

    let err = scheduler.trigger().await.unwrap_err();
    assert!(matches!(err, ScreenerError::AlreadyRunning));
    let status = scheduler.status().await;
    assert_eq!(status.state, SchedulerState::Running);
    assert!(status.last_error.is_none());

    run.await.unwrap().unwrap();
    assert_eq!(scheduler.status().await.state, SchedulerState::Idle);

    scheduler.stop();
    assert_eq!(scheduler.status().await.state, SchedulerState::Stopped);
}
