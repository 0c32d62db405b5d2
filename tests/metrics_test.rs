//! Metrics Integration Tests
//!
//! Validation, pagination, partitioning and retention.

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use common::fixtures::{metric, Storage};
use nika_observe::metrics::{MetricStatus, MetricsCollector, MetricsQuery};
use nika_observe::ObserveError;
use pretty_assertions::assert_eq;

// ═══════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_bogus_status_is_rejected_and_never_stored() {
    let storage = Storage::new();
    let err = storage
        .metrics
        .record_execution(metric("wf", "s1", "bogus", 10))
        .unwrap_err();
    assert!(matches!(err, ObserveError::ValidationError { .. }));

    storage.metrics.flush().unwrap();
    assert!(storage
        .metrics
        .get_metrics(&MetricsQuery::new())
        .unwrap()
        .is_empty());
}

#[test]
fn test_negative_duration_is_rejected() {
    let storage = Storage::new();
    assert!(storage
        .metrics
        .record_execution(metric("wf", "s1", "success", -5))
        .is_err());
}

#[test]
fn test_out_of_range_duration_is_a_validation_error() {
    let storage = Storage::new();
    let err = storage
        .metrics
        .record_execution(metric("wf", "s1", "success", i64::MAX / 2))
        .unwrap_err();
    assert!(matches!(err, ObserveError::ValidationError { .. }));
    assert_eq!(storage.metrics.pending_count(), 0);
}

// ═══════════════════════════════════════════════════════════════
// PAGINATION
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_offset_pagination_over_twenty_metrics() {
    let storage = Storage::with_flush_threshold(7);
    let base = Utc::now() - Duration::hours(1);
    for i in 0..20 {
        storage
            .metrics
            .record_execution(
                metric("wf", &format!("s{:02}", i), "success", 5)
                    .started_at(base + Duration::seconds(i)),
            )
            .unwrap();
    }

    let first = storage
        .metrics
        .get_metrics(&MetricsQuery::new().limit(5))
        .unwrap();
    let second = storage
        .metrics
        .get_metrics(&MetricsQuery::new().limit(5).offset(5))
        .unwrap();

    let first_ids: Vec<&str> = first.iter().map(|m| m.step_id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|m| m.step_id.as_str()).collect();
    assert_eq!(first_ids, vec!["s19", "s18", "s17", "s16", "s15"]);
    assert_eq!(second_ids, vec!["s14", "s13", "s12", "s11", "s10"]);
    assert!(first.iter().all(|m| !second.contains(m)));
}

#[test]
fn test_reopened_collector_paginates_from_disk() {
    let storage = Storage::with_flush_threshold(3);
    let base = Utc::now() - Duration::hours(1);
    for i in 0..9 {
        storage
            .metrics
            .record_execution(
                metric("wf", &format!("s{}", i), "failed", 5).started_at(base + Duration::seconds(i)),
            )
            .unwrap();
    }

    let reopened = MetricsCollector::new(storage.metrics_dir());
    let page = reopened
        .get_metrics(&MetricsQuery::new().status(MetricStatus::Failed).limit(2).offset(1))
        .unwrap();
    let ids: Vec<&str> = page.iter().map(|m| m.step_id.as_str()).collect();
    assert_eq!(ids, vec!["s7", "s6"]);
}

// ═══════════════════════════════════════════════════════════════
// CONCURRENCY
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_concurrent_recording_loses_nothing() {
    let storage = Storage::with_flush_threshold(4);
    let collector = Arc::new(storage.metrics.clone());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || {
                for i in 0..10 {
                    collector
                        .record_execution(metric("wf", &format!("t{}-{}", t, i), "success", 1))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    storage.metrics.flush().unwrap();

    let reopened = MetricsCollector::new(storage.metrics_dir());
    assert_eq!(reopened.get_metrics(&MetricsQuery::new()).unwrap().len(), 40);
}

// ═══════════════════════════════════════════════════════════════
// SUMMARIES
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_summary_by_skill() {
    let storage = Storage::new();
    let m = &storage.metrics;
    m.record_execution(metric("wf", "a", "success", 100).skill("rust").gate_pass(true))
        .unwrap();
    m.record_execution(metric("wf", "b", "failed", 300).skill("rust").gate_pass(false))
        .unwrap();
    m.record_execution(metric("wf", "c", "timeout", 200)).unwrap();

    let summary = m.get_summary(&MetricsQuery::new()).unwrap();
    assert_eq!(summary.total, 3);
    assert!((summary.median_duration_ms - 200.0).abs() < 0.001);
    assert_eq!(summary.gate_pass_rate, Some(50.0));

    let by_skill = m.get_summary_by_skill(&MetricsQuery::new()).unwrap();
    assert_eq!(by_skill["rust"].total, 2);
    assert_eq!(by_skill["unknown"].by_status["timeout"], 1);
}

// ═══════════════════════════════════════════════════════════════
// RETENTION
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_cleanup_deletes_only_expired_partitions() {
    let storage = Storage::new();
    let today = Utc::now().date_naive();
    fs::create_dir_all(storage.metrics_dir()).unwrap();
    for days_ago in [0, 6, 8] {
        let date = today - Duration::days(days_ago);
        fs::write(
            storage
                .metrics_dir()
                .join(format!("{}.jsonl", date.format("%Y-%m-%d"))),
            "",
        )
        .unwrap();
    }

    assert_eq!(storage.metrics.cleanup_old_metrics(7).unwrap(), 1);

    let expired = today - Duration::days(8);
    assert!(!storage
        .metrics_dir()
        .join(format!("{}.jsonl", expired.format("%Y-%m-%d")))
        .exists());
    assert_eq!(fs::read_dir(storage.metrics_dir()).unwrap().count(), 2);
}

#[test]
fn test_cleanup_with_huge_retention_keeps_everything() {
    let storage = Storage::new();
    fs::create_dir_all(storage.metrics_dir()).unwrap();
    fs::write(storage.metrics_dir().join("2000-01-01.jsonl"), "").unwrap();

    assert_eq!(storage.metrics.cleanup_old_metrics(u32::MAX).unwrap(), 0);
    assert!(storage.metrics_dir().join("2000-01-01.jsonl").exists());
}
