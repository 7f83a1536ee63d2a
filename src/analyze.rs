//! Complexity scoring and aggressiveness recommendation.
//!
//! Advisory only: [`analyze`] never fails, it reports zeros for input it
//! cannot parse.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::color::{COLOR_ATTRS, is_concrete_color, normalize_color, style_property};
use crate::parse::parse_svg;
use crate::pipeline::Aggressiveness;

/// How hard the optimizer should push on a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Light,
    Moderate,
    Aggressive,
}

impl Strategy {
    /// The tier to optimize with when following this recommendation.
    pub fn aggressiveness(self) -> Aggressiveness {
        match self {
            Strategy::Light => Aggressiveness::Conservative,
            Strategy::Moderate => Aggressiveness::Moderate,
            Strategy::Aggressive => Aggressiveness::Aggressive,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    /// 0–100
    pub complexity_score: f64,
    pub element_count: usize,
    pub path_count: usize,
    /// Total length of all `d` attributes
    pub path_data_length: usize,
    /// Distinct concrete paint colors
    pub color_count: usize,
    /// 0–100, how much there is to gain
    pub optimization_potential: u32,
    pub recommended_strategy: Strategy,
    pub estimated_processing_time_ms: f64,
}

fn inter_tag_whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">\s+<").unwrap())
}

fn long_decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]*\.[0-9]{4,}").unwrap())
}

fn default_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\s(?:opacity|fill-opacity|stroke-opacity|stroke-width)\s*=\s*["']1(?:\.0+)?["']"#)
            .unwrap()
    })
}

/// Score a document and recommend a strategy.
pub fn analyze(svg: &str) -> ComplexityAnalysis {
    let Ok(doc) = parse_svg(svg) else {
        return ComplexityAnalysis::default();
    };

    let mut element_count = 0;
    let mut path_count = 0;
    let mut path_data_length = 0;
    let mut colors = HashSet::new();

    doc.for_each_element(|e| {
        element_count += 1;
        if e.is("path") {
            path_count += 1;
        }
        if let Some(d) = e.get_attr("d") {
            path_data_length += d.len();
        }
        for attr in COLOR_ATTRS {
            let value = e
                .get_attr(attr)
                .or_else(|| e.get_attr("style").and_then(|s| style_property(s, attr)));
            if let Some(value) = value
                && is_concrete_color(value)
            {
                colors.insert(normalize_color(value));
            }
        }
    });
    let color_count = colors.len();

    let complexity_score = (element_count as f64 * 3.0
        + path_count as f64 * 8.0
        + path_data_length as f64 * 0.02
        + color_count as f64 * 2.0)
        .min(100.0);

    let mut potential = 0;
    if svg.contains("<!--") {
        potential += 20;
    }
    if inter_tag_whitespace_re().is_match(svg) {
        potential += 15;
    }
    if long_decimal_re().is_match(svg) {
        potential += 25;
    }
    if default_attr_re().is_match(svg) {
        potential += 20;
    }
    if element_count > 50 {
        potential += 20;
    }

    let recommended_strategy = if complexity_score < 20.0 {
        Strategy::Light
    } else if complexity_score < 60.0 {
        Strategy::Moderate
    } else {
        Strategy::Aggressive
    };

    let estimated_processing_time_ms = (element_count as f64 * 2.0
        + path_data_length as f64 * 0.01
        + path_count as f64 * 5.0)
        .max(10.0);

    ComplexityAnalysis {
        complexity_score,
        element_count,
        path_count,
        path_data_length,
        color_count,
        optimization_potential: potential.min(100),
        recommended_strategy,
        estimated_processing_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_document_is_light() {
        let analysis = analyze(r#"<svg><rect fill="red"/></svg>"#);
        assert_eq!(analysis.element_count, 2);
        assert_eq!(analysis.color_count, 1);
        assert_eq!(analysis.complexity_score, 8.0);
        assert_eq!(analysis.recommended_strategy, Strategy::Light);
        assert_eq!(analysis.estimated_processing_time_ms, 10.0);
        assert_eq!(analysis.optimization_potential, 0);
    }

    #[test]
    fn test_medium_document_is_moderate() {
        let analysis = analyze(
            r##"<svg><path d="M0 0L10 10" fill="#f00"/><path d="M5 5" fill="red"/><circle stroke="blue"/></svg>"##,
        );
        // 4 elements, 2 paths, 14 chars of path data, 2 colors
        assert_eq!(analysis.path_count, 2);
        assert_eq!(analysis.path_data_length, 14);
        assert_eq!(analysis.color_count, 2);
        assert!((analysis.complexity_score - 32.28).abs() < 1e-9);
        assert_eq!(analysis.recommended_strategy, Strategy::Moderate);
    }

    #[test]
    fn test_thousand_circles_is_aggressive() {
        let circles = r#"<circle cx="5" cy="5" r="2"/>"#.repeat(1000);
        let analysis = analyze(&format!("<svg>{}</svg>", circles));
        assert_eq!(analysis.complexity_score, 100.0);
        assert_eq!(analysis.recommended_strategy, Strategy::Aggressive);
        assert_eq!(analysis.optimization_potential, 20);
        assert_eq!(analysis.estimated_processing_time_ms, 2002.0);
    }

    #[test]
    fn test_optimization_potential_signals() {
        let analysis = analyze(
            "<svg>\n  <!-- c -->\n  <rect x=\"1.23456\" opacity=\"1.0\"/>\n</svg>",
        );
        assert_eq!(analysis.optimization_potential, 80);
    }

    #[test]
    fn test_unparsable_input_is_all_zero() {
        let analysis = analyze("<svg><g>");
        assert_eq!(analysis, ComplexityAnalysis::default());
        assert_eq!(analysis.recommended_strategy, Strategy::Light);
    }

    #[test]
    fn test_style_colors_are_counted() {
        let analysis = analyze(r#"<svg><rect style="fill: rgb(0,0,255)"/><rect fill="none"/></svg>"#);
        assert_eq!(analysis.color_count, 1);
    }
}
