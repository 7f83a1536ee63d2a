//! Corpus tests - run every preset over all SVGs in the corpus directory.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use svgtrim::{Engine, compare, optimize, parse_svg, validate};

fn corpus() -> Vec<(PathBuf, String)> {
    let corpus_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/corpus");
    let mut files = Vec::new();

    for entry in WalkBuilder::new(&corpus_dir).git_ignore(false).build() {
        let entry = entry.unwrap();
        let path = entry.path();

        if path.extension().is_some_and(|e| e == "svg") {
            let rel_path = path.strip_prefix(&corpus_dir).unwrap_or(path).to_path_buf();
            files.push((rel_path, fs::read_to_string(path).unwrap()));
        }
    }

    files.sort();
    files
}

/// Every corpus file optimizes under every built-in preset, and the output
/// is still a valid document.
#[test]
fn test_corpus_optimization() {
    let files = corpus();
    assert!(!files.is_empty(), "corpus directory is empty");

    let engine = Engine::new();
    let mut failed = 0;
    let mut total_original = 0usize;
    let mut total_optimized = 0usize;

    for (rel_path, content) in &files {
        for preset in engine.presets().list() {
            let result = engine.optimize(content, &preset.options);
            let Some(optimized) = &result.optimized_svg else {
                eprintln!(
                    "  FAIL {} [{}]: {}",
                    rel_path.display(),
                    preset.name,
                    result.error.unwrap_or_default()
                );
                failed += 1;
                continue;
            };

            let validation = validate(optimized);
            if !validation.is_valid {
                eprintln!(
                    "  FAIL {} [{}]: optimized output invalid: {:?}",
                    rel_path.display(),
                    preset.name,
                    validation.errors
                );
                failed += 1;
                continue;
            }

            if preset.name == "moderate" {
                total_original += result.original_size;
                total_optimized += result.optimized_size;
            }
        }
    }

    println!(
        "\nCorpus: {} files, moderate: {} -> {} bytes",
        files.len(),
        total_original,
        total_optimized
    );
    assert_eq!(failed, 0, "{} optimizations failed", failed);
    assert!(total_optimized < total_original);
}

#[test]
fn test_corpus_is_deterministic() {
    let engine = Engine::new();
    for (rel_path, content) in corpus() {
        for preset in engine.presets().list() {
            let first = engine.optimize(&content, &preset.options);
            let second = engine.optimize(&content, &preset.options);
            assert_eq!(
                first.optimized_svg,
                second.optimized_svg,
                "{} [{}] is not deterministic",
                rel_path.display(),
                preset.name
            );
        }
    }
}

/// Optimizing the output again gains at most 1%.
#[test]
fn test_corpus_is_idempotent() {
    let engine = Engine::new();
    for (rel_path, content) in corpus() {
        for preset in engine.presets().list() {
            let once = engine.optimize(&content, &preset.options);
            let once_svg = once.optimized_svg.unwrap();
            let twice = optimize(&once_svg, &preset.options);
            assert!(twice.success);
            assert!(
                twice.optimized_size as f64 >= once.optimized_size as f64 * 0.99,
                "{} [{}]: {} -> {}",
                rel_path.display(),
                preset.name,
                once.optimized_size,
                twice.optimized_size
            );
        }
    }
}

/// The moderate preset never changes what a document looks like.
#[test]
fn test_corpus_visual_guardrail() {
    let engine = Engine::new();
    let moderate = &engine.presets().get("moderate").unwrap().options;
    for (rel_path, content) in corpus() {
        let optimized = optimize(&content, moderate).optimized_svg.unwrap();
        let comparison = compare(&content, &optimized).unwrap();
        assert!(
            !comparison.has_visible_changes,
            "{}: {:?}",
            rel_path.display(),
            comparison.differences
        );
    }
}

/// Editor metadata survives; only the removable parts go.
#[test]
fn test_inkscape_document() {
    let (_, content) = corpus()
        .into_iter()
        .find(|(path, _)| path.ends_with("inkscape.svg"))
        .unwrap();

    let result = optimize(&content, &Default::default());
    let optimized = result.optimized_svg.unwrap();

    assert!(!optimized.contains("<defs"), "empty defs not removed");
    assert!(!optimized.contains("version=\"1.1\""), "version not removed");
    assert!(optimized.contains("fill=\"#ffffff\""), "rgb() fill not rewritten");
    assert!(optimized.contains("rx=\"20.123\""));
    assert!(optimized.contains("sodipodi:namedview"));

    let doc = parse_svg(&optimized).unwrap();
    assert!(doc.root.is("svg"));
}

#[test]
fn test_chart_keeps_referenced_definitions() {
    let (_, content) = corpus()
        .into_iter()
        .find(|(path, _)| path.ends_with("bars.svg"))
        .unwrap();

    let result = optimize(&content, &Default::default());
    let optimized = result.optimized_svg.unwrap();
    let report = result.report.unwrap();

    // Referenced only from the stylesheet and through href.
    assert!(optimized.contains("id=\"hatch\""));
    assert!(optimized.contains("id=\"bar\""));
    assert!(optimized.contains("patternTransform=\"rotate(45)\""));
    assert!(optimized.contains("fill=\"#0080ff\""));
    assert!(optimized.contains("x=\"40.123\""));
    assert!(report.colors_optimized >= 2);
    assert!(report.transforms_optimized >= 1);
}
