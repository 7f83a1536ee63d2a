//! Approximate visual equivalence between two SVG documents.
//!
//! Shapes are reduced to descriptors (kind, geometry, normalized fill) and
//! compared pairwise by position within each kind. This catches gross
//! regressions; it is not a rendering comparison. Reordering shapes of the
//! same kind shows up as a difference even when the picture is unchanged.

use serde::{Deserialize, Serialize};

use crate::ast::Element;
use crate::color::{normalize_color, style_property};
use crate::error::SvgError;
use crate::parse::parse_svg;
use crate::path::parse_path;

/// Relative change above which a size difference is visible.
const SIGNIFICANT_CHANGE: f64 = 0.10;
/// Relative change above which a size difference is worth mentioning.
const MINOR_CHANGE: f64 = 0.01;

const COUNT_MISMATCH_PENALTY: f64 = 50.0;
const SHAPE_SIZE_PENALTY: f64 = 15.0;
const PATH_SIZE_PENALTY: f64 = 20.0;
const COLOR_PENALTY: f64 = 25.0;
const MINOR_PENALTY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Rect,
    Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Bounds are absent when the path data can't be read.
    Path {
        bounds: Option<[f64; 4]>,
        commands: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    pub kind: ShapeKind,
    pub geometry: Geometry,
    /// Normalized fill, if the shape sets one itself
    pub color: Option<String>,
}

/// The ordered shape descriptors of one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualFingerprint {
    pub shapes: Vec<ShapeDescriptor>,
}

impl VisualFingerprint {
    fn of_kind(&self, kind: ShapeKind) -> impl Iterator<Item = &ShapeDescriptor> {
        self.shapes.iter().filter(move |s| s.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualComparison {
    pub has_visible_changes: bool,
    /// 0–100
    pub difference_score: f64,
    pub significant_differences: usize,
    pub differences: Vec<String>,
}

impl VisualComparison {
    fn significant(&mut self, penalty: f64, message: String) {
        self.difference_score += penalty;
        self.significant_differences += 1;
        self.differences.push(message);
    }

    fn minor(&mut self, message: String) {
        self.difference_score += MINOR_PENALTY;
        self.differences.push(message);
    }
}

/// Extract the shape descriptors of a document.
pub fn fingerprint(svg: &str) -> Result<VisualFingerprint, SvgError> {
    let doc = parse_svg(svg)?;
    let mut shapes = Vec::new();
    doc.for_each_element(|e| {
        if let Some(shape) = describe(e) {
            shapes.push(shape);
        }
    });
    Ok(VisualFingerprint { shapes })
}

fn describe(e: &Element) -> Option<ShapeDescriptor> {
    let num = |name: &str| {
        e.get_attr(name)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    let (kind, geometry) = match e.name.local.as_str() {
        "circle" => (
            ShapeKind::Circle,
            Geometry::Circle {
                cx: num("cx"),
                cy: num("cy"),
                r: num("r"),
            },
        ),
        "rect" => (
            ShapeKind::Rect,
            Geometry::Rect {
                x: num("x"),
                y: num("y"),
                width: num("width"),
                height: num("height"),
            },
        ),
        "path" => {
            let parsed = e.get_attr("d").map(parse_path);
            let (bounds, commands) = match parsed {
                Some(Ok(path)) => (
                    path.bounding_box()
                        .map(|b| [b.min_x, b.min_y, b.max_x, b.max_y]),
                    path.segments.len(),
                ),
                _ => (None, 0),
            };
            (ShapeKind::Path, Geometry::Path { bounds, commands })
        }
        _ => return None,
    };

    let color = e
        .get_attr("fill")
        .or_else(|| e.get_attr("style").and_then(|s| style_property(s, "fill")))
        .map(normalize_color);

    Some(ShapeDescriptor {
        kind,
        geometry,
        color,
    })
}

/// Compare two documents' fingerprints.
pub fn compare(before: &str, after: &str) -> Result<VisualComparison, SvgError> {
    Ok(compare_fingerprints(&fingerprint(before)?, &fingerprint(after)?))
}

pub fn compare_fingerprints(a: &VisualFingerprint, b: &VisualFingerprint) -> VisualComparison {
    let mut cmp = VisualComparison::default();

    if a.shapes.len() != b.shapes.len() {
        cmp.significant(
            COUNT_MISMATCH_PENALTY,
            format!("shape count changed from {} to {}", a.shapes.len(), b.shapes.len()),
        );
    }

    for kind in [ShapeKind::Circle, ShapeKind::Rect, ShapeKind::Path] {
        for (i, (sa, sb)) in a.of_kind(kind).zip(b.of_kind(kind)).enumerate() {
            compare_shapes(&mut cmp, kind, i, sa, sb);
        }
    }

    cmp.difference_score = cmp.difference_score.min(100.0);
    cmp.has_visible_changes = cmp.significant_differences > 0;
    cmp
}

fn compare_shapes(
    cmp: &mut VisualComparison,
    kind: ShapeKind,
    index: usize,
    a: &ShapeDescriptor,
    b: &ShapeDescriptor,
) {
    let label = format!("{:?} #{}", kind, index).to_lowercase();

    match (&a.geometry, &b.geometry) {
        (
            Geometry::Circle { cx, cy, r },
            Geometry::Circle {
                cx: cx2,
                cy: cy2,
                r: r2,
            },
        ) => {
            check_size(cmp, &label, "radius", *r, *r2, SHAPE_SIZE_PENALTY);
            check_position(cmp, &label, (*cx, *cy), (*cx2, *cy2), *r);
        }
        (
            Geometry::Rect {
                x,
                y,
                width,
                height,
            },
            Geometry::Rect {
                x: x2,
                y: y2,
                width: w2,
                height: h2,
            },
        ) => {
            check_size(cmp, &label, "width", *width, *w2, SHAPE_SIZE_PENALTY);
            check_size(cmp, &label, "height", *height, *h2, SHAPE_SIZE_PENALTY);
            check_position(cmp, &label, (*x, *y), (*x2, *y2), width.max(*height));
        }
        (
            Geometry::Path {
                bounds: Some(ba), ..
            },
            Geometry::Path {
                bounds: Some(bb), ..
            },
        ) => {
            check_size(cmp, &label, "width", ba[2] - ba[0], bb[2] - bb[0], PATH_SIZE_PENALTY);
            check_size(cmp, &label, "height", ba[3] - ba[1], bb[3] - bb[1], PATH_SIZE_PENALTY);
            let size = (ba[2] - ba[0]).max(ba[3] - ba[1]);
            check_position(cmp, &label, (ba[0], ba[1]), (bb[0], bb[1]), size);
        }
        (Geometry::Path { commands: ca, .. }, Geometry::Path { commands: cb, .. }) => {
            if ca != cb {
                cmp.minor(format!("{}: path data changed", label));
            }
        }
        _ => {}
    }

    let ca = a.color.as_deref().unwrap_or("#000000");
    let cb = b.color.as_deref().unwrap_or("#000000");
    if ca != cb {
        cmp.significant(COLOR_PENALTY, format!("{}: fill changed from {} to {}", label, ca, cb));
    }
}

fn relative_change(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale < f64::EPSILON {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

fn check_size(cmp: &mut VisualComparison, label: &str, what: &str, a: f64, b: f64, penalty: f64) {
    let change = relative_change(a, b);
    if change > SIGNIFICANT_CHANGE {
        cmp.significant(penalty, format!("{}: {} changed from {} to {}", label, what, a, b));
    } else if change > MINOR_CHANGE {
        cmp.minor(format!("{}: {} changed slightly", label, what));
    }
}

fn check_position(cmp: &mut VisualComparison, label: &str, a: (f64, f64), b: (f64, f64), size: f64) {
    let shift = (a.0 - b.0).abs().max((a.1 - b.1).abs());
    if shift > (size.abs() * SIGNIFICANT_CHANGE).max(1.0) {
        cmp.minor(format!("{}: moved by {}", label, shift));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = r##"<svg viewBox="0 0 100 100">
        <circle cx="50.0004" cy="50" r="40.123456" fill="rgb(255, 0, 0)"/>
        <rect x="1" y="2" width="30.5555" height="20" style="fill: blue"/>
        <path d="M 10.00001 10 L 90.33333 90.66666 Z" fill="#00F"/>
    </svg>"##;

    #[test]
    fn test_fingerprint_extracts_shapes_in_order() {
        let fp = fingerprint(ORIGINAL).unwrap();
        let kinds: Vec<_> = fp.shapes.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, [ShapeKind::Circle, ShapeKind::Rect, ShapeKind::Path]);
        assert_eq!(fp.shapes[0].color.as_deref(), Some("#ff0000"));
        assert_eq!(fp.shapes[1].color.as_deref(), Some("#0000ff"));
        assert_eq!(fp.shapes[2].color.as_deref(), Some("#0000ff"));
    }

    #[test]
    fn test_identical_documents() {
        let cmp = compare(ORIGINAL, ORIGINAL).unwrap();
        assert!(!cmp.has_visible_changes);
        assert_eq!(cmp.difference_score, 0.0);
    }

    #[test]
    fn test_color_canonicalization_is_invisible() {
        let after = ORIGINAL
            .replace("rgb(255, 0, 0)", "#ff0000")
            .replace("fill: blue", "fill:#0000ff");
        let cmp = compare(ORIGINAL, &after).unwrap();
        assert!(!cmp.has_visible_changes);
        assert!(cmp.difference_score < 5.0);
    }

    #[test]
    fn test_rounding_is_invisible() {
        let after = r##"<svg viewBox="0 0 100 100"><circle cx="50" cy="50" r="40.1" fill="#ff0000"/><rect x="1" y="2" width="30.6" height="20" style="fill:#00f"/><path d="M10 10 90.3 90.7Z" fill="blue"/></svg>"##;
        let cmp = compare(ORIGINAL, after).unwrap();
        assert!(!cmp.has_visible_changes, "{:?}", cmp.differences);
    }

    #[test]
    fn test_removed_shape_is_significant() {
        let after = ORIGINAL.replace(r#"<rect x="1" y="2" width="30.5555" height="20" style="fill: blue"/>"#, "");
        let cmp = compare(ORIGINAL, &after).unwrap();
        assert!(cmp.has_visible_changes);
        assert!(cmp.difference_score >= 50.0);
    }

    #[test]
    fn test_resized_and_recolored_shapes() {
        let after = ORIGINAL.replace("r=\"40.123456\"", "r=\"20\"").replace("#00F", "green");
        let cmp = compare(ORIGINAL, &after).unwrap();
        assert!(cmp.has_visible_changes);
        assert_eq!(cmp.significant_differences, 2);
        assert_eq!(cmp.difference_score, 40.0);
    }

    #[test]
    fn test_score_is_capped() {
        let a = r#"<svg><circle r="1" fill="red"/><circle r="1" fill="red"/><circle r="1" fill="red"/><circle r="1" fill="red"/><circle r="1" fill="red"/></svg>"#;
        let b = r#"<svg><circle r="9" fill="blue"/><circle r="9" fill="blue"/><circle r="9" fill="blue"/><circle r="9" fill="blue"/><circle r="9" fill="blue"/></svg>"#;
        let cmp = compare(a, b).unwrap();
        assert_eq!(cmp.difference_score, 100.0);
    }

    #[test]
    fn test_reordering_is_a_known_false_positive() {
        let a = r#"<svg><circle r="1" fill="red"/><circle r="5" fill="blue"/></svg>"#;
        let b = r#"<svg><circle r="5" fill="blue"/><circle r="1" fill="red"/></svg>"#;
        assert!(compare(a, b).unwrap().has_visible_changes);
    }

    #[test]
    fn test_unparsable_input_is_an_error() {
        assert!(compare("<svg>", ORIGINAL).is_err());
    }
}
