//! Batch processing: ordering, resilience and cancellation.

use std::sync::mpsc;
use std::thread;

use svgtrim::{
    BatchItem, BatchProgress, CancellationToken, Engine, ErrorType, OptimizationOptions,
    process_batch,
};

const VALID: &str = r#"<svg viewBox="0 0 10 10">
    <!-- a comment -->
    <rect x="1.00001" width="8" height="8" opacity="1"/>
</svg>"#;

fn items(contents: &[&str]) -> Vec<BatchItem> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| BatchItem::new(format!("{}.svg", i), *content))
        .collect()
}

#[test]
fn test_malformed_item_does_not_stop_the_batch() {
    let results = process_batch(
        &items(&[VALID, r#"<svg><circle r="1""#, VALID]),
        &OptimizationOptions::default(),
        |_| {},
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[2].success);
    assert_eq!(
        results[1].error_details.as_ref().unwrap().error_type,
        ErrorType::ParseError
    );
}

#[test]
fn test_cancel_from_progress_callback() {
    let batch = items(&[VALID; 5]);
    let cancel = CancellationToken::new();
    let n = 2;

    let results = process_batch(
        &batch,
        &OptimizationOptions::default(),
        |progress| {
            if progress.completed_files == n && progress.current_file_progress == 100.0 {
                cancel.cancel();
            }
        },
        &cancel,
    )
    .unwrap();

    assert!(results.len() <= n + 1);
    assert_eq!(results.len(), n);
}

#[test]
fn test_cancel_from_another_thread() {
    let batch = items(&[VALID; 50]);
    let cancel = CancellationToken::new();
    let (started_tx, started_rx) = mpsc::channel();

    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        started_rx.recv().unwrap();
        remote.cancel();
    });

    let mut completed = 0;
    let results = process_batch(
        &batch,
        &OptimizationOptions::default(),
        |progress| {
            if progress.current_file_progress == 100.0 {
                completed = progress.completed_files;
                if completed == 1 {
                    started_tx.send(()).unwrap();
                }
            }
        },
        &cancel,
    )
    .unwrap();
    canceller.join().unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(results.len(), completed);
    assert!(results.iter().all(|r| r.success));
}

#[test]
fn test_progress_totals_cover_successes_only() {
    let mut updates: Vec<BatchProgress> = Vec::new();
    let results = process_batch(
        &items(&[VALID, "", VALID]),
        &OptimizationOptions::default(),
        |progress| updates.push(progress.clone()),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(updates.len(), 6);
    let last = updates.last().unwrap();
    assert_eq!(last.total_files, 3);
    assert_eq!(last.completed_files, 3);
    assert_eq!(last.overall_progress, 100.0);

    let expected_reduction = results[0].size_reduction() + results[2].size_reduction();
    assert_eq!(last.total_size_reduction, expected_reduction);
    let expected_ratio = (results[0].compression_ratio + results[2].compression_ratio) / 2.0;
    assert!((last.average_compression_ratio - expected_ratio).abs() < 1e-12);

    // The failed item leaves the running totals untouched.
    assert_eq!(updates[3].total_size_reduction, updates[1].total_size_reduction);

    let json = serde_json::to_value(last).unwrap();
    assert_eq!(json["totalFiles"], 3);
    assert!(json["averageCompressionRatio"].is_number());
}

#[test]
fn test_engine_batch_logs_failures() {
    let engine = Engine::new();
    let results = engine
        .process_batch(
            &items(&[VALID, "<svg>", "", VALID]),
            &OptimizationOptions::default(),
            |_| {},
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(results.iter().filter(|r| r.success).count(), 2);
    let stats = engine.error_stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_type[&ErrorType::ParseError], 1);
    assert_eq!(stats.by_type[&ErrorType::InvalidSvg], 1);
}
