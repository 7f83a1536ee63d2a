//! The optimization pipeline: options, reports and the `optimize` entry point.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::ast::Document;
use crate::error::SvgError;
use crate::parse::parse_svg;
use crate::passes::PASSES;
use crate::recovery::{ErrorDetails, classify, sanitize};
use crate::serialize::serialize;

/// Largest precision accepted for rounding.
pub const MAX_PRECISION: u8 = 10;

/// Documents with more nodes than this are rejected before any pass runs.
pub const MAX_NODES: usize = 200_000;

/// Named default bundle for the pass toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggressiveness {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl Aggressiveness {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggressiveness::Conservative => "conservative",
            Aggressiveness::Moderate => "moderate",
            Aggressiveness::Aggressive => "aggressive",
        }
    }

    /// The tier's default bundle, before any explicit override.
    pub fn defaults(self) -> ResolvedOptions {
        match self {
            Aggressiveness::Conservative => ResolvedOptions {
                remove_comments: false,
                remove_default_attrs: false,
                cleanup_defs: false,
                simplify_paths: false,
                precision: 5,
                optimize_colors: false,
                minify: false,
                optimize_transforms: false,
                remove_empty_containers: false,
                minify_styles: false,
                round_coordinates: true,
                preserve: Preserve::default(),
            },
            Aggressiveness::Moderate => ResolvedOptions {
                remove_comments: true,
                remove_default_attrs: true,
                cleanup_defs: true,
                simplify_paths: true,
                precision: 3,
                optimize_colors: true,
                minify: true,
                optimize_transforms: true,
                remove_empty_containers: true,
                minify_styles: false,
                round_coordinates: true,
                preserve: Preserve::default(),
            },
            Aggressiveness::Aggressive => ResolvedOptions {
                precision: 1,
                minify_styles: true,
                ..Aggressiveness::Moderate.defaults()
            },
        }
    }
}

/// Names that passes must leave alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preserve {
    /// Attribute names never removed or rewritten
    pub attributes: Vec<String>,
    /// Element names never removed
    pub elements: Vec<String>,
    /// Comment texts (compared trimmed) kept by comment removal
    pub comments: Vec<String>,
}

/// Caller-facing options: a tier plus optional per-pass overrides.
///
/// Every `Some` field wins over the tier default for that field only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationOptions {
    pub aggressiveness: Aggressiveness,
    pub remove_comments: Option<bool>,
    pub remove_default_attrs: Option<bool>,
    pub cleanup_defs: Option<bool>,
    pub simplify_paths: Option<bool>,
    /// Decimal places kept by path simplification and coordinate rounding
    pub precision: Option<u8>,
    pub optimize_colors: Option<bool>,
    pub minify: Option<bool>,
    pub optimize_transforms: Option<bool>,
    pub remove_empty_containers: Option<bool>,
    /// Drop default declarations from `style` attributes
    pub minify_styles: Option<bool>,
    pub round_coordinates: Option<bool>,
    /// Replaces the tier's preserve lists wholesale when set
    pub preserve: Option<Preserve>,
}

impl OptimizationOptions {
    pub fn new(aggressiveness: Aggressiveness) -> Self {
        Self {
            aggressiveness,
            ..Self::default()
        }
    }

    /// Reject option values no pass can honor.
    pub fn validate(&self) -> Result<(), SvgError> {
        if let Some(precision) = self.precision
            && precision > MAX_PRECISION
        {
            return Err(SvgError::InvalidOptions(format!(
                "precision {} is larger than the maximum of {}",
                precision, MAX_PRECISION
            )));
        }
        Ok(())
    }

    /// Copy the tier bundle, then overwrite it field by field.
    pub fn resolve(&self) -> ResolvedOptions {
        let mut resolved = self.aggressiveness.defaults();
        let overrides = [
            (self.remove_comments, &mut resolved.remove_comments),
            (self.remove_default_attrs, &mut resolved.remove_default_attrs),
            (self.cleanup_defs, &mut resolved.cleanup_defs),
            (self.simplify_paths, &mut resolved.simplify_paths),
            (self.optimize_colors, &mut resolved.optimize_colors),
            (self.minify, &mut resolved.minify),
            (self.optimize_transforms, &mut resolved.optimize_transforms),
            (self.remove_empty_containers, &mut resolved.remove_empty_containers),
            (self.minify_styles, &mut resolved.minify_styles),
            (self.round_coordinates, &mut resolved.round_coordinates),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if let Some(precision) = self.precision {
            resolved.precision = precision;
        }
        if let Some(preserve) = &self.preserve {
            resolved.preserve = preserve.clone();
        }
        resolved
    }

    /// Lay `other`'s explicit fields over this one's.
    pub fn merged_with(&self, other: &OptimizationOptions) -> OptimizationOptions {
        OptimizationOptions {
            aggressiveness: self.aggressiveness,
            remove_comments: other.remove_comments.or(self.remove_comments),
            remove_default_attrs: other.remove_default_attrs.or(self.remove_default_attrs),
            cleanup_defs: other.cleanup_defs.or(self.cleanup_defs),
            simplify_paths: other.simplify_paths.or(self.simplify_paths),
            precision: other.precision.or(self.precision),
            optimize_colors: other.optimize_colors.or(self.optimize_colors),
            minify: other.minify.or(self.minify),
            optimize_transforms: other.optimize_transforms.or(self.optimize_transforms),
            remove_empty_containers: other
                .remove_empty_containers
                .or(self.remove_empty_containers),
            minify_styles: other.minify_styles.or(self.minify_styles),
            round_coordinates: other.round_coordinates.or(self.round_coordinates),
            preserve: other.preserve.clone().or_else(|| self.preserve.clone()),
        }
    }
}

/// Options with every field decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOptions {
    pub remove_comments: bool,
    pub remove_default_attrs: bool,
    pub cleanup_defs: bool,
    pub simplify_paths: bool,
    pub precision: u8,
    pub optimize_colors: bool,
    pub minify: bool,
    pub optimize_transforms: bool,
    pub remove_empty_containers: bool,
    pub minify_styles: bool,
    pub round_coordinates: bool,
    pub preserve: Preserve,
}

impl ResolvedOptions {
    pub fn preserves_attr(&self, name: &str) -> bool {
        self.preserve.attributes.iter().any(|a| a == name)
    }

    pub fn preserves_element(&self, name: &str) -> bool {
        self.preserve.elements.iter().any(|e| e == name)
    }

    pub fn preserves_comment(&self, text: &str) -> bool {
        let text = text.trim();
        self.preserve.comments.iter().any(|c| c.trim() == text)
    }
}

/// What one `optimize` call changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub elements_removed: usize,
    pub attributes_removed: usize,
    pub paths_simplified: usize,
    pub coordinates_rounded: usize,
    pub colors_optimized: usize,
    pub transforms_optimized: usize,
    pub timings: Timings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub parse_ms: f64,
    pub passes: Vec<PassTiming>,
    pub serialize_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassTiming {
    pub name: String,
    pub ms: f64,
}

/// Outcome of optimizing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub success: bool,
    pub original_size: usize,
    pub optimized_size: usize,
    /// `optimized_size / original_size`
    pub compression_ratio: f64,
    pub processing_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_svg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<OptimizationReport>,
    /// The input had to be repaired before it could be optimized
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recovered: bool,
}

impl OptimizationResult {
    pub fn succeeded(
        original_size: usize,
        optimized_svg: String,
        report: OptimizationReport,
        elapsed: Duration,
    ) -> Self {
        let optimized_size = optimized_svg.len();
        Self {
            success: true,
            original_size,
            optimized_size,
            compression_ratio: ratio(original_size, optimized_size),
            processing_time_ms: millis(elapsed),
            optimized_svg: Some(optimized_svg),
            error: None,
            error_details: None,
            report: Some(report),
            recovered: false,
        }
    }

    /// A failed result. Sizes report "no change".
    pub fn failed(original_size: usize, error: &SvgError, elapsed: Duration) -> Self {
        Self::failed_with(original_size, classify(error), elapsed)
    }

    pub fn failed_with(original_size: usize, details: ErrorDetails, elapsed: Duration) -> Self {
        Self {
            success: false,
            original_size,
            optimized_size: original_size,
            compression_ratio: 1.0,
            processing_time_ms: millis(elapsed),
            optimized_svg: None,
            error: Some(sanitize(&details.message)),
            error_details: Some(details),
            report: None,
            recovered: false,
        }
    }

    /// Bytes saved; negative if the output grew.
    pub fn size_reduction(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }
}

fn ratio(original: usize, optimized: usize) -> f64 {
    if original == 0 {
        1.0
    } else {
        optimized as f64 / original as f64
    }
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Optimize one SVG document.
///
/// Never fails outward: errors are reported through
/// [`OptimizationResult::error`] and [`OptimizationResult::error_details`].
pub fn optimize(svg: &str, options: &OptimizationOptions) -> OptimizationResult {
    let start = Instant::now();
    match optimize_document(svg, options) {
        Ok((output, report)) => {
            OptimizationResult::succeeded(svg.len(), output, report, start.elapsed())
        }
        Err(e) => {
            tracing::debug!(error = %e, "optimization failed");
            OptimizationResult::failed(svg.len(), &e, start.elapsed())
        }
    }
}

/// Run the whole pipeline, returning the output text and its report.
pub fn optimize_document(
    svg: &str,
    options: &OptimizationOptions,
) -> Result<(String, OptimizationReport), SvgError> {
    options.validate()?;

    let mut report = OptimizationReport::default();

    let started = Instant::now();
    let mut doc = parse_svg(svg)?;
    report.timings.parse_ms = millis(started.elapsed());

    check_document(&doc)?;

    let resolved = options.resolve();
    run_passes(&mut doc, &resolved, &mut report)?;

    let started = Instant::now();
    let output = serialize(&doc, resolved.minify);
    report.timings.serialize_ms = millis(started.elapsed());

    Ok((output, report))
}

/// The document must have an `svg` root and stay within the node budget.
pub fn check_document(doc: &Document) -> Result<(), SvgError> {
    if !doc.root.is("svg") {
        return Err(SvgError::InvalidSvg(format!(
            "Root element must be <svg>, found <{}>",
            doc.root.name.full_name()
        )));
    }
    let nodes = doc.node_count();
    if nodes > MAX_NODES {
        return Err(SvgError::Resource(format!(
            "document has {} nodes, more than the limit of {}",
            nodes, MAX_NODES
        )));
    }
    Ok(())
}

/// Apply every enabled pass, in order.
pub fn run_passes(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    for pass in PASSES.iter().filter(|p| (p.enabled)(options)) {
        let started = Instant::now();
        (pass.run)(doc, options, report).map_err(|e| match e {
            SvgError::Optimization { .. } => e,
            other => SvgError::Optimization {
                pass: pass.name,
                message: other.to_string(),
            },
        })?;
        let ms = millis(started.elapsed());
        tracing::debug!(pass = pass.name, ms, "pass finished");
        report.timings.passes.push(PassTiming {
            name: pass.name.to_string(),
            ms,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_fields_win_over_tier() {
        let options = OptimizationOptions {
            aggressiveness: Aggressiveness::Conservative,
            remove_comments: Some(true),
            precision: Some(2),
            ..Default::default()
        };
        let resolved = options.resolve();
        assert!(resolved.remove_comments);
        assert_eq!(resolved.precision, 2);
        // untouched fields keep the tier default
        assert!(!resolved.optimize_colors);
        assert!(!resolved.minify);
    }

    #[test]
    fn test_explicit_false_disables_tier_default() {
        let options = OptimizationOptions {
            minify: Some(false),
            ..OptimizationOptions::new(Aggressiveness::Aggressive)
        };
        let resolved = options.resolve();
        assert!(!resolved.minify);
        assert_eq!(resolved.precision, 1);
        assert!(resolved.minify_styles);
    }

    #[test]
    fn test_preserve_is_replaced_wholesale() {
        let base = OptimizationOptions {
            preserve: Some(Preserve {
                attributes: vec!["id".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = OptimizationOptions {
            preserve: Some(Preserve {
                elements: vec!["title".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = base.merged_with(&overlay).resolve();
        assert!(merged.preserve.attributes.is_empty());
        assert_eq!(merged.preserve.elements, vec!["title".to_string()]);
    }

    #[test]
    fn test_rejects_excessive_precision() {
        let options = OptimizationOptions {
            precision: Some(42),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(SvgError::InvalidOptions(_))));
        let result = optimize("<svg/>", &options);
        assert!(!result.success);
    }

    #[test]
    fn test_wrong_root_fails() {
        let result = optimize("<html><body/></html>", &OptimizationOptions::default());
        assert!(!result.success);
        assert!(result.optimized_svg.is_none());
        assert!(result.error.unwrap().contains("<svg>"));
    }

    #[test]
    fn test_failed_result_reports_no_change() {
        let result = optimize("<svg><g></svg>", &OptimizationOptions::default());
        assert!(!result.success);
        assert_eq!(result.optimized_size, result.original_size);
        assert_eq!(result.compression_ratio, 1.0);
        assert!(result.report.is_none());
        assert!(result.error_details.is_some());
    }

    #[test]
    fn test_report_records_pass_timings() {
        let result = optimize(
            r#"<svg viewBox="0 0 10 10"><rect width="1"/></svg>"#,
            &OptimizationOptions::default(),
        );
        let report = result.report.unwrap();
        assert_eq!(report.timings.passes.len(), 8);
        assert_eq!(report.timings.passes[0].name, "comment removal");
        assert_eq!(report.timings.passes[7].name, "coordinate rounding");
    }

    #[test]
    fn test_conservative_keeps_layout() {
        let svg = "<svg>\n  <!-- keep -->\n  <rect width=\"10\"/>\n</svg>";
        let result = optimize(svg, &OptimizationOptions::new(Aggressiveness::Conservative));
        assert_eq!(result.optimized_svg.as_deref(), Some(svg));
    }
}
