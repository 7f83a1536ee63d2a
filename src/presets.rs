//! Named option bundles.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::SvgError;
use crate::pipeline::{Aggressiveness, OptimizationOptions};

/// A named, reusable [`OptimizationOptions`] bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub description: String,
    pub options: OptimizationOptions,
    pub builtin: bool,
}

impl Preset {
    fn builtin(name: &str, description: &str, options: OptimizationOptions) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            options,
            builtin: true,
        }
    }
}

/// Built-in presets plus any registered at runtime.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: BTreeMap<String, Preset>,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    #[serde(default)]
    presets: BTreeMap<String, PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    description: Option<String>,
    #[serde(flatten)]
    options: OptimizationOptions,
}

impl PresetRegistry {
    pub fn new() -> Self {
        let builtins = [
            Preset::builtin(
                "conservative",
                "Lossless cleanup only: rounds coordinates to 5 decimals",
                OptimizationOptions::new(Aggressiveness::Conservative),
            ),
            Preset::builtin(
                "moderate",
                "Balanced size and fidelity",
                OptimizationOptions::new(Aggressiveness::Moderate),
            ),
            Preset::builtin(
                "aggressive",
                "Smallest output, 1 decimal of precision",
                OptimizationOptions::new(Aggressiveness::Aggressive),
            ),
            Preset::builtin(
                "web",
                "Moderate with 2 decimals, for icons served over the web",
                OptimizationOptions {
                    precision: Some(2),
                    ..OptimizationOptions::new(Aggressiveness::Moderate)
                },
            ),
            Preset::builtin(
                "safe",
                "Moderate, but keeps 5 decimals and every definition",
                OptimizationOptions {
                    precision: Some(5),
                    cleanup_defs: Some(false),
                    ..OptimizationOptions::new(Aggressiveness::Moderate)
                },
            ),
        ];
        Self {
            presets: builtins
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// All presets, sorted by name.
    pub fn list(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    /// Add or replace a custom preset.
    pub fn register(
        &mut self,
        name: &str,
        description: &str,
        options: OptimizationOptions,
    ) -> Result<(), SvgError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SvgError::InvalidOptions("preset name is empty".into()));
        }
        if self.presets.get(name).is_some_and(|p| p.builtin) {
            return Err(SvgError::InvalidOptions(format!(
                "cannot replace built-in preset '{}'",
                name
            )));
        }
        options.validate()?;
        self.presets.insert(
            name.to_string(),
            Preset {
                name: name.to_string(),
                description: description.to_string(),
                options,
                builtin: false,
            },
        );
        Ok(())
    }

    /// Remove a custom preset. Built-ins stay.
    pub fn remove(&mut self, name: &str) -> Option<Preset> {
        if self.presets.get(name)?.builtin {
            return None;
        }
        self.presets.remove(name)
    }

    /// Register every `[presets.<name>]` table of a TOML document.
    ///
    /// Nothing is registered unless every table is accepted.
    pub fn load_toml(&mut self, text: &str) -> Result<usize, SvgError> {
        let file: PresetFile =
            toml::from_str(text).map_err(|e| SvgError::Config(e.message().to_string()))?;

        let mut staged = self.clone();
        for (name, entry) in &file.presets {
            staged
                .register(
                    name,
                    entry.description.as_deref().unwrap_or_default(),
                    entry.options.clone(),
                )
                .map_err(|e| SvgError::Config(format!("preset '{}': {}", name, e)))?;
        }
        *self = staged;
        Ok(file.presets.len())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize, SvgError> {
        let text = std::fs::read_to_string(path)?;
        let count = self.load_toml(&text)?;
        tracing::debug!(path = %path.display(), count, "loaded presets");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_listed_sorted() {
        let registry = PresetRegistry::new();
        let names: Vec<_> = registry.list().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["aggressive", "conservative", "moderate", "safe", "web"]);
        assert!(registry.list().all(|p| p.builtin));
    }

    #[test]
    fn test_builtin_tiers_resolve() {
        let registry = PresetRegistry::new();
        assert_eq!(registry.get("web").unwrap().options.resolve().precision, 2);
        let safe = registry.get("safe").unwrap().options.resolve();
        assert_eq!(safe.precision, 5);
        assert!(!safe.cleanup_defs);
        assert!(safe.remove_comments);
    }

    #[test]
    fn test_register_and_remove() {
        let mut registry = PresetRegistry::new();
        registry
            .register("icons", "", OptimizationOptions::new(Aggressiveness::Aggressive))
            .unwrap();
        assert!(!registry.get("icons").unwrap().builtin);
        assert!(registry.remove("icons").is_some());
        assert!(registry.get("icons").is_none());
    }

    #[test]
    fn test_builtins_are_protected() {
        let mut registry = PresetRegistry::new();
        assert!(registry.register("moderate", "", OptimizationOptions::default()).is_err());
        assert!(registry.register("  ", "", OptimizationOptions::default()).is_err());
        assert!(registry.remove("moderate").is_none());
        assert!(registry.get("moderate").is_some());
    }

    #[test]
    fn test_load_toml() {
        let mut registry = PresetRegistry::new();
        let count = registry
            .load_toml(
                r#"
                [presets.print]
                description = "Keep everything a printer might need"
                aggressiveness = "conservative"
                remove_comments = true

                [presets.tiny]
                aggressiveness = "aggressive"
                precision = 0
                "#,
            )
            .unwrap();
        assert_eq!(count, 2);

        let print = registry.get("print").unwrap();
        assert_eq!(print.description, "Keep everything a printer might need");
        let resolved = print.options.resolve();
        assert!(resolved.remove_comments);
        assert!(!resolved.remove_default_attrs);

        assert_eq!(registry.get("tiny").unwrap().options.resolve().precision, 0);
    }

    #[test]
    fn test_load_toml_is_all_or_nothing() {
        let mut registry = PresetRegistry::new();
        let err = registry.load_toml(
            r#"
            [presets.ok]
            aggressiveness = "moderate"

            [presets.aggressive]
            precision = 2
            "#,
        );
        assert!(matches!(err, Err(SvgError::Config(_))));
        assert!(registry.get("ok").is_none());
    }

    #[test]
    fn test_load_toml_rejects_bad_values() {
        let mut registry = PresetRegistry::new();
        assert!(registry.load_toml("[presets.x]\nprecision = 99\n").is_err());
        assert!(registry.load_toml("[presets.x]\naggressiveness = \"extreme\"\n").is_err());
        assert!(registry.load_toml("not toml [").is_err());
    }
}
