//! SVG optimization passes.
//!
//! Each pass mutates the document in place, bumps the report counters for
//! what it changed, and leaves nothing for a second run to do.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::ast::*;
use crate::color::{COLOR_ATTRS, rgb_to_hex};
use crate::error::SvgError;
use crate::path::{format_number, parse_path, round_to, serialize_path};
use crate::pipeline::{OptimizationReport, ResolvedOptions};

pub type PassFn = fn(&mut Document, &ResolvedOptions, &mut OptimizationReport) -> Result<(), SvgError>;

/// One named step of the pipeline.
pub struct Pass {
    pub name: &'static str,
    pub enabled: fn(&ResolvedOptions) -> bool,
    pub run: PassFn,
}

/// Every pass, in the order the pipeline runs them.
///
/// Rounding must come after path simplification, which needs full precision.
pub const PASSES: [Pass; 8] = [
    Pass {
        name: "comment removal",
        enabled: |o| o.remove_comments,
        run: remove_comments,
    },
    Pass {
        name: "attribute cleanup",
        enabled: |o| o.remove_default_attrs || o.minify_styles,
        run: prune_default_attrs,
    },
    Pass {
        name: "defs cleanup",
        enabled: |o| o.cleanup_defs,
        run: remove_dead_definitions,
    },
    Pass {
        name: "empty container removal",
        enabled: |o| o.remove_empty_containers,
        run: remove_empty_containers,
    },
    Pass {
        name: "color optimization",
        enabled: |o| o.optimize_colors,
        run: canonicalize_colors,
    },
    Pass {
        name: "path simplification",
        enabled: |o| o.simplify_paths,
        run: simplify_paths,
    },
    Pass {
        name: "transform optimization",
        enabled: |o| o.optimize_transforms,
        run: fold_transforms,
    },
    Pass {
        name: "coordinate rounding",
        enabled: |o| o.round_coordinates,
        run: round_coordinates,
    },
];

/// Attribute values that are no-ops for their attribute.
const DEFAULT_ATTRS: &[(&str, &[&str])] = &[
    ("opacity", &["1", "1.0", "1.00"]),
    ("fill-opacity", &["1", "1.0", "1.00"]),
    ("stroke-opacity", &["1", "1.0", "1.00"]),
    ("stroke-width", &["1", "1.0", "1.00"]),
    ("fill-rule", &["nonzero"]),
    ("clip-rule", &["nonzero"]),
    ("stroke-linecap", &["butt"]),
    ("stroke-linejoin", &["miter"]),
    ("stroke-miterlimit", &["4"]),
    ("stroke-dashoffset", &["0"]),
    ("visibility", &["visible"]),
    ("display", &["inline"]),
    ("version", &["1.1"]),
    ("baseProfile", &["full"]),
    ("preserveAspectRatio", &["xMidYMid meet"]),
];

/// Attributes holding a single coordinate or length.
const COORD_ATTRS: &[&str] = &[
    "x", "y", "cx", "cy", "x1", "y1", "x2", "y2", "r", "rx", "ry", "width", "height",
];

const TRANSFORM_ATTRS: &[&str] = &["transform", "gradientTransform", "patternTransform"];

pub fn is_default_value(attr: &str, value: &str) -> bool {
    DEFAULT_ATTRS
        .iter()
        .any(|(name, values)| *name == attr && values.contains(&value))
}

/// Remove comment nodes.
fn remove_comments(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    doc.for_each_element_mut(|elem| {
        let before = elem.children.len();
        elem.children.retain(|node| match node {
            Node::Comment(text) => options.preserves_comment(text),
            _ => true,
        });
        report.elements_removed += before - elem.children.len();
    });
    Ok(())
}

/// Remove default attribute values, and default declarations in inline
/// styles when style minification is on.
fn prune_default_attrs(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    doc.for_each_element_mut(|elem| {
        if options.remove_default_attrs {
            let before = elem.attributes.len();
            elem.attributes.retain(|attr| {
                attr.name.prefix.is_some()
                    || options.preserves_attr(&attr.name.local)
                    || !is_default_value(&attr.name.local, &attr.value)
            });
            report.attributes_removed += before - elem.attributes.len();
        }

        if options.minify_styles
            && !options.preserves_attr("style")
            && let Some(style) = elem.get_attr("style").map(str::to_string)
        {
            let minified = minify_style(&style);
            if minified.is_empty() {
                elem.remove_attr("style");
                report.attributes_removed += 1;
            } else if minified != style {
                elem.set_attr("style", minified);
            }
        }
    });
    Ok(())
}

fn minify_style(style: &str) -> String {
    let mut parts = Vec::new();

    for decl in style.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }

        match decl.split_once(':') {
            Some((prop, value)) => {
                let prop = prop.trim();
                let value = value.trim();
                if !is_default_value(prop, value) {
                    parts.push(format!("{}:{}", prop, value));
                }
            }
            None => parts.push(decl.to_string()),
        }
    }

    parts.join(";")
}

fn url_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"url\(\s*['"]?#([^'")\s]+)['"]?\s*\)"#).unwrap())
}

/// Every id referenced through `url(#id)` or an `href="#id"`, anywhere in
/// attributes or `<style>` text.
fn collect_references(doc: &Document) -> HashSet<String> {
    let re = url_reference_re();
    let mut refs = HashSet::new();

    doc.for_each_element(|elem| {
        for attr in &elem.attributes {
            if attr.name.local == "href"
                && let Some(id) = attr.value.trim().strip_prefix('#')
            {
                refs.insert(id.to_string());
            }
            for cap in re.captures_iter(&attr.value) {
                refs.insert(cap[1].to_string());
            }
        }
        if elem.is("style") {
            for child in &elem.children {
                if let Node::Text(css) | Node::CData(css) = child {
                    for cap in re.captures_iter(css) {
                        refs.insert(cap[1].to_string());
                    }
                }
            }
        }
    });

    refs
}

/// Remove unreferenced definitions, then `<defs>` left with nothing in them.
///
/// Repeats until stable: dropping one definition can orphan another that it
/// referenced.
fn remove_dead_definitions(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    loop {
        let refs = collect_references(doc);
        let mut removed = 0;

        doc.for_each_element_mut(|elem| {
            if !elem.is("defs") {
                return;
            }
            let before = elem.children.len();
            elem.children.retain(|node| match node {
                Node::Element(def) => {
                    options.preserves_element(&def.name.local)
                        || def.get_attr("id").is_none_or(|id| refs.contains(id))
                }
                _ => true,
            });
            removed += before - elem.children.len();
        });

        report.elements_removed += removed;
        if removed == 0 {
            break;
        }
    }

    doc.for_each_element_mut(|elem| {
        let before = elem.children.len();
        elem.children.retain(|node| match node {
            Node::Element(defs) if defs.is("defs") => {
                options.preserves_element("defs") || defs.child_elements().next().is_some()
            }
            _ => true,
        });
        report.elements_removed += before - elem.children.len();
    });

    Ok(())
}

/// Remove `<g>` elements with no element children and no text.
fn remove_empty_containers(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    if options.preserves_element("g") {
        return Ok(());
    }
    doc.for_each_element_post_mut(|elem| {
        let before = elem.children.len();
        elem.children.retain(|node| match node {
            Node::Element(g) if g.is("g") => !g.children.iter().all(Node::is_blank_text),
            _ => true,
        });
        report.elements_removed += before - elem.children.len();
    });
    Ok(())
}

/// Rewrite opaque `rgb()`/`rgba()` colors as `#rrggbb`.
fn canonicalize_colors(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    doc.for_each_element_mut(|elem| {
        for attr in &mut elem.attributes {
            let name = attr.name.local.as_str();
            if options.preserves_attr(name) {
                continue;
            }
            if COLOR_ATTRS.contains(&name)
                && let Some(hex) = rgb_to_hex(&attr.value)
            {
                attr.value = hex;
                report.colors_optimized += 1;
            } else if name == "style" {
                let (style, changed) = canonicalize_style_colors(&attr.value);
                if changed > 0 {
                    attr.value = style;
                    report.colors_optimized += changed;
                }
            }
        }
    });
    Ok(())
}

fn canonicalize_style_colors(style: &str) -> (String, usize) {
    let mut changed = 0;
    let decls: Vec<String> = style
        .split(';')
        .map(|decl| {
            if let Some((prop, value)) = decl.split_once(':')
                && COLOR_ATTRS.contains(&prop.trim())
                && let Some(hex) = rgb_to_hex(value)
            {
                changed += 1;
                format!("{}:{}", prop.trim(), hex)
            } else {
                decl.to_string()
            }
        })
        .collect();
    (decls.join(";"), changed)
}

fn float_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[-+]?(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?").unwrap()
    })
}

/// Round path data and drop repeated line segments.
fn simplify_paths(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    if options.preserves_attr("d") {
        return Ok(());
    }
    let mut result = Ok(());
    doc.for_each_element_mut(|elem| {
        if result.is_err() || !elem.is("path") {
            return;
        }
        let Some(d) = elem.get_attr("d").map(str::to_string) else {
            return;
        };
        match simplify_path_data(&d, options.precision) {
            Ok(simplified) => {
                if simplified != d {
                    elem.set_attr("d", simplified);
                    report.paths_simplified += 1;
                }
            }
            Err(e) => result = Err(e),
        }
    });
    result
}

/// Simplify one `d` attribute.
///
/// Path data our parser rejects still gets its float literals rounded.
pub fn simplify_path_data(d: &str, precision: u8) -> Result<String, SvgError> {
    if d.trim().is_empty() {
        return Ok(d.to_string());
    }

    let mut path = match parse_path(d) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "unparsable path data, rounding literals only");
            return round_float_literals(d, precision);
        }
    };

    path.round(precision).map_err(|e| SvgError::Optimization {
        pass: "path simplification",
        message: e.to_string(),
    })?;
    path.dedupe_lines();
    Ok(serialize_path(&path, precision))
}

fn round_float_literals(d: &str, precision: u8) -> Result<String, SvgError> {
    let mut bad = None;
    let out = float_literal_re().replace_all(d, |caps: &regex::Captures| {
        let literal = &caps[0];
        match literal.parse::<f64>() {
            Ok(n) if n.is_finite() => {
                let formatted = format_number(n, precision);
                // Keep a separator where dropping the leading zero would
                // merge this number into the previous one.
                if formatted.starts_with('.') && literal.starts_with(|c: char| c.is_ascii_digit()) {
                    format!("0{}", formatted)
                } else {
                    formatted
                }
            }
            _ => {
                bad.get_or_insert_with(|| literal.to_string());
                literal.to_string()
            }
        }
    });
    match bad {
        Some(literal) => Err(SvgError::Optimization {
            pass: "path simplification",
            message: format!("bad numeric literal `{}` in path data", literal),
        }),
        None => Ok(out.into_owned()),
    }
}

fn transform_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Za-z]+)\s*\(([^()]*)\)").unwrap())
}

/// Strip identity sub-transforms; drop the attribute if nothing is left.
fn fold_transforms(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    doc.for_each_element_mut(|elem| {
        for name in TRANSFORM_ATTRS {
            if options.preserves_attr(name) {
                continue;
            }
            let Some(value) = elem.get_attr(name).map(str::to_string) else {
                continue;
            };
            let Some(folded) = fold_transform_list(&value) else {
                continue;
            };
            if folded.is_empty() {
                elem.remove_attr(name);
                report.transforms_optimized += 1;
            } else if folded != value {
                elem.set_attr(name, folded);
                report.transforms_optimized += 1;
            }
        }
    });
    Ok(())
}

/// The transform list without identity functions, or `None` if the value
/// isn't a transform list we understand.
pub fn fold_transform_list(value: &str) -> Option<String> {
    let re = transform_fn_re();

    let leftover = re.replace_all(value, "");
    if !leftover.chars().all(|c| c.is_whitespace() || c == ',') {
        return None;
    }

    let kept: Vec<String> = re
        .captures_iter(value)
        .filter(|caps| !is_identity_transform(&caps[1], &caps[2]))
        .map(|caps| {
            let args: Vec<&str> = caps[2]
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            format!("{}({})", &caps[1], args.join(","))
        })
        .collect();
    Some(kept.join(" "))
}

fn is_identity_transform(function: &str, args: &str) -> bool {
    let Ok(args) = args
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<f64>, _>>()
    else {
        return false;
    };

    match (function, args.as_slice()) {
        ("translate", [tx]) => *tx == 0.0,
        ("translate", [tx, ty]) => *tx == 0.0 && *ty == 0.0,
        ("scale", [s]) => *s == 1.0,
        ("scale", [sx, sy]) => *sx == 1.0 && *sy == 1.0,
        ("rotate", [a]) | ("rotate", [a, _, _]) => *a == 0.0,
        ("skewX", [a]) | ("skewY", [a]) => *a == 0.0,
        ("matrix", [a, b, c, d, e, f]) => {
            *a == 1.0 && *b == 0.0 && *c == 0.0 && *d == 1.0 && *e == 0.0 && *f == 0.0
        }
        _ => false,
    }
}

/// Round plain numeric coordinate attributes.
fn round_coordinates(
    doc: &mut Document,
    options: &ResolvedOptions,
    report: &mut OptimizationReport,
) -> Result<(), SvgError> {
    let mut result = Ok(());
    doc.for_each_element_mut(|elem| {
        for attr in &mut elem.attributes {
            let name = attr.name.local.as_str();
            if attr.name.prefix.is_some()
                || !COORD_ATTRS.contains(&name)
                || options.preserves_attr(name)
            {
                continue;
            }
            let Ok(value) = attr.value.trim().parse::<f64>() else {
                continue;
            };
            if !value.is_finite() {
                if result.is_ok() {
                    result = Err(SvgError::Optimization {
                        pass: "coordinate rounding",
                        message: format!("bad numeric literal `{}` in `{}`", attr.value, name),
                    });
                }
                continue;
            }
            let formatted = format_number(value, options.precision);
            if formatted != attr.value {
                if (round_to(value, options.precision) - value).abs() > 1e-4 {
                    report.coordinates_rounded += 1;
                }
                attr.value = formatted;
            }
        }
    });
    result
}
