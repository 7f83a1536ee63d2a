//! Loading presets from TOML files and optimizing with them.

use std::fs;

use svgtrim::{Engine, PresetRegistry, SvgError};

const PRESETS: &str = r#"
[presets.icons]
description = "Small UI icons"
aggressiveness = "aggressive"
precision = 2

[presets.archival]
aggressiveness = "conservative"
remove_comments = true

[presets.archival.preserve]
comments = ["Copyright 2024"]
attributes = ["data-id"]
"#;

const DOCUMENT: &str = r#"<svg viewBox="0 0 10 10"><!-- Copyright 2024 --><!-- draft --><rect x="1.23456" width="5" height="5" data-id="a"/></svg>"#;

#[test]
fn test_load_presets_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presets.toml");
    fs::write(&path, PRESETS).unwrap();

    let mut registry = PresetRegistry::new();
    assert_eq!(registry.load_file(&path).unwrap(), 2);

    let names: Vec<_> = registry.list().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        ["aggressive", "archival", "conservative", "icons", "moderate", "safe", "web"]
    );
    assert_eq!(registry.get("icons").unwrap().description, "Small UI icons");
}

#[test]
fn test_optimize_with_loaded_presets() {
    let mut engine = Engine::new();
    engine.presets_mut().load_toml(PRESETS).unwrap();

    let icons = engine.optimize_with_preset(DOCUMENT, "icons").unwrap();
    let svg = icons.optimized_svg.unwrap();
    assert!(svg.contains(r#"x="1.23""#));
    assert!(!svg.contains("<!--"));

    let archival = engine.optimize_with_preset(DOCUMENT, "archival").unwrap();
    let svg = archival.optimized_svg.unwrap();
    assert!(svg.contains("Copyright 2024"));
    assert!(!svg.contains("draft"));
    assert!(svg.contains(r#"x="1.23456""#));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = PresetRegistry::new();
    let err = registry.load_file(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, SvgError::Io(_)));
}

#[test]
fn test_malformed_file_registers_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presets.toml");
    fs::write(&path, "[presets.broken]\nprecision = \"high\"\n").unwrap();

    let mut registry = PresetRegistry::new();
    assert!(matches!(registry.load_file(&path), Err(SvgError::Config(_))));
    assert_eq!(registry.list().count(), 5);
}

#[test]
fn test_unknown_preset_is_an_error() {
    let engine = Engine::new();
    assert!(engine.optimize_with_preset(DOCUMENT, "icons").is_err());
}
