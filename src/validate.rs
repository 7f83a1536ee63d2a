//! Structural validation with a cheap complexity smell-test.

use serde::{Deserialize, Serialize};

use crate::ast::Document;
use crate::parse::parse_svg;

const LARGE_DOCUMENT_ELEMENTS: usize = 1000;
const DEEP_NESTING: usize = 32;

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub structure: Structure,
}

/// Shape of the document tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub element_count: usize,
    pub path_count: usize,
    pub max_depth: usize,
    pub has_view_box: bool,
    /// `min(100, element_count * 2 + path_count * 5)`
    pub complexity_score: u32,
}

impl Structure {
    fn of(doc: &Document) -> Self {
        let mut element_count = 0;
        let mut path_count = 0;
        doc.for_each_element(|e| {
            element_count += 1;
            if e.is("path") {
                path_count += 1;
            }
        });
        Self {
            element_count,
            path_count,
            max_depth: doc.max_depth(),
            has_view_box: doc.root.get_attr("viewBox").is_some(),
            complexity_score: (element_count * 2 + path_count * 5).min(100) as u32,
        }
    }
}

/// Check that `svg` is a well-formed SVG document.
pub fn validate(svg: &str) -> ValidationResult {
    let doc = match parse_svg(svg) {
        Ok(doc) => doc,
        Err(e) => {
            return ValidationResult {
                is_valid: false,
                errors: vec![e.to_string()],
                ..Default::default()
            };
        }
    };

    let structure = Structure::of(&doc);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !doc.root.is("svg") {
        errors.push(format!(
            "Root element must be <svg>, found <{}>",
            doc.root.name.full_name()
        ));
    }
    if !structure.has_view_box {
        warnings.push("Missing viewBox attribute; the image may not scale".into());
    }
    if doc.root.get_attr("xmlns").is_none() {
        warnings.push("Missing xmlns attribute; standalone viewers may reject the file".into());
    }
    if structure.element_count > LARGE_DOCUMENT_ELEMENTS {
        warnings.push(format!(
            "Large document: {} elements",
            structure.element_count
        ));
    }
    if structure.max_depth > DEEP_NESTING {
        warnings.push(format!("Deeply nested document: depth {}", structure.max_depth));
    }

    let mut has_script = false;
    let mut has_external_ref = false;
    doc.for_each_element(|e| {
        has_script |= e.is("script");
        has_external_ref |= e.attributes.iter().any(|a| {
            a.name.local == "href"
                && (a.value.starts_with("http://") || a.value.starts_with("https://"))
        });
    });
    if has_script {
        warnings.push("Document contains <script> elements".into());
    }
    if has_external_ref {
        warnings.push("Document references external resources".into());
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
        structure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        let result = validate(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><path d="M0 0"/><rect/></svg>"#,
        );
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.structure.element_count, 3);
        assert_eq!(result.structure.path_count, 1);
        assert_eq!(result.structure.complexity_score, 11);
        assert_eq!(result.structure.max_depth, 2);
    }

    #[test]
    fn test_empty_input() {
        let result = validate("   ");
        assert!(!result.is_valid);
        assert_eq!(result.structure, Structure::default());
        assert!(result.errors[0].contains("empty"));
    }

    #[test]
    fn test_unclosed_input() {
        let result = validate(r#"<svg><circle r="1""#);
        assert!(!result.is_valid);
        assert_eq!(result.structure.element_count, 0);
    }

    #[test]
    fn test_wrong_root() {
        let result = validate("<html/>");
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("<html>"));
    }

    #[test]
    fn test_warnings() {
        let result = validate(
            r#"<svg><script>alert(1)</script><image href="https://example.com/a.png"/></svg>"#,
        );
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 4);
    }

    #[test]
    fn test_complexity_score_is_capped() {
        let body = "<path d=\"M0 0\"/>".repeat(30);
        let result = validate(&format!("<svg>{}</svg>", body));
        assert_eq!(result.structure.complexity_score, 100);
    }
}
