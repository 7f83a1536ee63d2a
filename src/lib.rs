//! svgtrim - an SVG optimization engine
//!
//! svgtrim shrinks SVG documents while keeping them visually unchanged. It
//! parses a document into a tree, runs an ordered set of passes over it and
//! serializes the result, reporting what each pass did. Around that core sit
//! a validator, a complexity analyzer, an approximate visual comparison, a
//! batch driver and best-effort repair of malformed input.
//!
//! ```
//! use svgtrim::{OptimizationOptions, optimize};
//!
//! let svg = r#"<svg viewBox="0 0 10 10"><!-- drawn by hand --><rect width="10" height="10" opacity="1"/></svg>"#;
//! let result = optimize(svg, &OptimizationOptions::default());
//! assert!(result.success);
//! assert!(result.optimized_size < result.original_size);
//! ```

mod analyze;
mod ast;
mod batch;
mod color;
mod error;
mod fingerprint;
mod parse;
mod passes;
mod path;
mod pipeline;
mod presets;
mod recovery;
mod serialize;
mod validate;

pub use analyze::*;
pub use ast::*;
pub use batch::*;
pub use color::*;
pub use error::*;
pub use fingerprint::*;
pub use parse::*;
pub use passes::*;
pub use path::*;
pub use pipeline::*;
pub use presets::*;
pub use recovery::*;
pub use serialize::*;
pub use validate::*;

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Owns a preset registry and an error log; everything else is stateless.
///
/// Engines are independent of each other, and one engine can be shared
/// between threads.
#[derive(Debug, Default)]
pub struct Engine {
    presets: PresetRegistry,
    errors: Mutex<ErrorLog>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_presets(presets: PresetRegistry) -> Self {
        Self {
            presets,
            errors: Mutex::default(),
        }
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    pub fn presets_mut(&mut self) -> &mut PresetRegistry {
        &mut self.presets
    }

    /// Optimize one document. See [`optimize`].
    pub fn optimize(&self, svg: &str, options: &OptimizationOptions) -> OptimizationResult {
        let result = optimize(svg, options);
        self.record(&result);
        result
    }

    /// Optimize with a registered preset's options.
    pub fn optimize_with_preset(
        &self,
        svg: &str,
        preset: &str,
    ) -> Result<OptimizationResult, SvgError> {
        let preset = self
            .presets
            .get(preset)
            .ok_or_else(|| SvgError::InvalidOptions(format!("unknown preset '{}'", preset)))?;
        Ok(self.optimize(svg, &preset.options))
    }

    /// Optimize under a time budget, repairing malformed input if needed.
    ///
    /// When the first attempt fails with a recoverable parse or structure
    /// error, the input is patched with [`attempt_recovery`] and optimized
    /// again within what is left of `timeout`. A result produced that way
    /// has `recovered` set.
    pub fn optimize_guarded(
        &self,
        svg: &str,
        options: &OptimizationOptions,
        timeout: Duration,
    ) -> OptimizationResult {
        let start = Instant::now();

        let outcome = match run_guarded(svg.to_string(), options.clone(), timeout) {
            Ok(done) => Ok((done, false)),
            Err(e) => {
                let remaining = timeout.saturating_sub(start.elapsed());
                retry_repaired(svg, e, options, remaining, timeout).map(|done| (done, true))
            }
        };

        let result = match outcome {
            Ok(((output, report), recovered)) => OptimizationResult {
                recovered,
                ..OptimizationResult::succeeded(svg.len(), output, report, start.elapsed())
            },
            Err(e) => OptimizationResult::failed(svg.len(), &e, start.elapsed()),
        };
        self.record(&result);
        result
    }

    /// Optimize many documents. See [`process_batch`].
    pub fn process_batch(
        &self,
        items: &[BatchItem],
        options: &OptimizationOptions,
        on_progress: impl FnMut(&BatchProgress),
        cancel: &CancellationToken,
    ) -> Result<Vec<OptimizationResult>, SvgError> {
        let results = process_batch(items, options, on_progress, cancel)?;
        for result in &results {
            self.record(result);
        }
        Ok(results)
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.log().stats()
    }

    /// Logged errors, oldest first.
    pub fn recent_errors(&self) -> Vec<ErrorDetails> {
        self.log().entries().cloned().collect()
    }

    pub fn clear_errors(&self) {
        self.log().clear();
    }

    fn record(&self, result: &OptimizationResult) {
        if let Some(details) = &result.error_details {
            self.log().record(details.clone());
        }
    }

    fn log(&self) -> std::sync::MutexGuard<'_, ErrorLog> {
        // The log holds plain data, so a panic elsewhere can't leave it torn.
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Repair `svg` and optimize it again within `remaining`.
///
/// Fails with `error` when the input can't be repaired or the repaired text
/// still fails, and with a timeout when the retry runs out of time.
fn retry_repaired(
    svg: &str,
    error: SvgError,
    options: &OptimizationOptions,
    remaining: Duration,
    budget: Duration,
) -> Result<(String, OptimizationReport), SvgError> {
    let details = classify(&error);
    let repairable = details.recoverable
        && matches!(
            details.error_type,
            ErrorType::ParseError | ErrorType::InvalidSvg
        );
    let Some(recovery) = repairable.then(|| attempt_recovery(svg)).flatten() else {
        return Err(error);
    };

    tracing::warn!(
        error = %error,
        actions = ?recovery.actions,
        "retrying with repaired input"
    );
    run_guarded(recovery.text, options.clone(), remaining).map_err(|retry| match retry {
        SvgError::Timeout(_) => SvgError::Timeout(budget),
        _ => error,
    })
}

fn run_guarded(
    svg: String,
    options: OptimizationOptions,
    timeout: Duration,
) -> Result<(String, OptimizationReport), SvgError> {
    run_with_timeout(timeout, move || optimize_document(&svg, &options))?
}
