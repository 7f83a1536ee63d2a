//! Sequential multi-document optimization with progress and cancellation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::SvgError;
use crate::pipeline::{OptimizationOptions, OptimizationResult, optimize};
use crate::recovery::classify_message;

/// One named document in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub name: String,
    pub content: String,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub total_files: usize,
    pub completed_files: usize,
    pub current_file: String,
    /// 0–100 over the whole batch
    pub overall_progress: f64,
    /// 0 before the item runs, 100 after
    pub current_file_progress: f64,
    /// Bytes saved by the successful items so far
    pub total_size_reduction: i64,
    /// Mean ratio of the successful items so far, 1.0 when there are none
    pub average_compression_ratio: f64,
}

/// Cooperative, item-granular cancellation flag.
///
/// Clones share the flag, so one can be handed to another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Totals {
    succeeded: usize,
    size_reduction: i64,
    ratio_sum: f64,
}

impl Totals {
    fn add(&mut self, result: &OptimizationResult) {
        if result.success {
            self.succeeded += 1;
            self.size_reduction += result.size_reduction();
            self.ratio_sum += result.compression_ratio;
        }
    }

    fn average_ratio(&self) -> f64 {
        if self.succeeded == 0 {
            1.0
        } else {
            self.ratio_sum / self.succeeded as f64
        }
    }
}

/// Optimize `items` one after another.
///
/// Only invalid options fail the call. A failing or panicking item becomes a
/// failed entry and the batch moves on. When `cancel` is set the results
/// gathered so far are returned.
pub fn process_batch(
    items: &[BatchItem],
    options: &OptimizationOptions,
    mut on_progress: impl FnMut(&BatchProgress),
    cancel: &CancellationToken,
) -> Result<Vec<OptimizationResult>, SvgError> {
    options.validate()?;

    let total = items.len();
    let mut results = Vec::with_capacity(total);
    let mut totals = Totals::default();

    for (index, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(completed = index, total, "batch cancelled");
            break;
        }

        let mut progress = BatchProgress {
            total_files: total,
            completed_files: index,
            current_file: item.name.clone(),
            overall_progress: percent(index, total),
            current_file_progress: 0.0,
            total_size_reduction: totals.size_reduction,
            average_compression_ratio: totals.average_ratio(),
        };
        tracing::debug!(file = %item.name, index, total, "batch item starting");
        on_progress(&progress);

        let result = optimize_item(item, options);
        if result.success {
            tracing::info!(
                file = %item.name,
                original = result.original_size,
                optimized = result.optimized_size,
                "optimized"
            );
        } else {
            tracing::info!(
                file = %item.name,
                error = result.error.as_deref().unwrap_or_default(),
                "failed"
            );
        }
        totals.add(&result);
        results.push(result);

        progress.completed_files = index + 1;
        progress.overall_progress = percent(index + 1, total);
        progress.current_file_progress = 100.0;
        progress.total_size_reduction = totals.size_reduction;
        progress.average_compression_ratio = totals.average_ratio();
        on_progress(&progress);
    }

    Ok(results)
}

fn optimize_item(item: &BatchItem, options: &OptimizationOptions) -> OptimizationResult {
    let start = Instant::now();
    panic::catch_unwind(AssertUnwindSafe(|| optimize(&item.content, options))).unwrap_or_else(
        |payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "optimization panicked".to_string());
            tracing::warn!(file = %item.name, %message, "optimizer panicked");
            OptimizationResult::failed_with(
                item.content.len(),
                classify_message(&message),
                start.elapsed(),
            )
        },
    )
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}
