//! Error classification, message sanitization, best-effort repair of
//! malformed input, and the timeout boundary.

use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::SvgError;
use crate::parse::parse_svg;

/// Default budget for one guarded operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Longest message ever shown to a user.
pub const MAX_MESSAGE_LEN: usize = 200;

/// How many errors the log keeps.
pub const ERROR_LOG_CAPACITY: usize = 100;

/// Coarse error taxonomy surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    ParseError,
    InvalidSvg,
    OptimizationFailed,
    MemoryError,
    Timeout,
}

impl ErrorType {
    pub fn suggestion(self) -> &'static str {
        match self {
            ErrorType::ParseError => {
                "Check the file for unclosed tags or unquoted attribute values, or re-export it from your editor."
            }
            ErrorType::InvalidSvg => {
                "Make sure the file is an SVG document with a single <svg> root element."
            }
            ErrorType::OptimizationFailed => {
                "Try a more conservative preset or disable the step that failed."
            }
            ErrorType::MemoryError => {
                "The document is too large; split it or simplify it before optimizing."
            }
            ErrorType::Timeout => {
                "The document took too long to process; try a conservative preset or a smaller file."
            }
        }
    }
}

/// A classified, user-presentable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Sanitized, at most [`MAX_MESSAGE_LEN`] characters
    pub message: String,
    pub recoverable: bool,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl ErrorDetails {
    fn new(error_type: ErrorType, message: &str, recoverable: bool) -> Self {
        Self {
            error_type,
            message: sanitize(message),
            recoverable,
            suggestion: error_type.suggestion().to_string(),
            line: None,
            column: None,
        }
    }
}

/// Parse errors we know how to patch up.
const RECOVERABLE_PARSE_PATTERNS: &[&str] = &[
    "unclosed tag",
    "missing quote",
    "unexpected character",
    "invalid attribute",
];

/// Pipeline steps whose failure can be retried with that step turned off.
const SOFT_STEPS: &[&str] = &["minification", "attribute cleanup", "color optimization"];

/// Classify a pipeline error.
pub fn classify(error: &SvgError) -> ErrorDetails {
    let message = error.to_string();
    let mut details = match error {
        SvgError::Empty | SvgError::InvalidSvg(_) => {
            // A fragment with the wrong root can be wrapped; nothing can be
            // made from empty input.
            let recoverable = !matches!(error, SvgError::Empty);
            ErrorDetails::new(ErrorType::InvalidSvg, &message, recoverable)
        }
        SvgError::Parse { .. } | SvgError::Utf8(_) => ErrorDetails::new(
            ErrorType::ParseError,
            &message,
            is_recoverable_parse_error(&message),
        ),
        SvgError::Optimization { pass, .. } => ErrorDetails::new(
            ErrorType::OptimizationFailed,
            &message,
            is_recoverable_optimization_error(pass, &message),
        ),
        SvgError::InvalidPath(_) | SvgError::InvalidOptions(_) | SvgError::Config(_) => {
            ErrorDetails::new(ErrorType::OptimizationFailed, &message, false)
        }
        SvgError::Resource(_) => ErrorDetails::new(ErrorType::MemoryError, &message, false),
        SvgError::Timeout(_) => ErrorDetails::new(ErrorType::Timeout, &message, false),
        SvgError::Io(_) => ErrorDetails::new(ErrorType::ParseError, &message, false),
    };
    let (line, column) = error.position();
    details.line = line;
    details.column = column;
    details
}

/// Classify a free-form message, e.g. from a caught panic.
pub fn classify_message(message: &str) -> ErrorDetails {
    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        ErrorDetails::new(ErrorType::Timeout, message, false)
    } else if lower.contains("memory") || lower.contains("stack overflow") {
        ErrorDetails::new(ErrorType::MemoryError, message, false)
    } else if lower.contains("parse") || lower.contains("xml") || lower.contains("tag") {
        ErrorDetails::new(
            ErrorType::ParseError,
            message,
            is_recoverable_parse_error(message),
        )
    } else if lower.contains("svg") && (lower.contains("invalid") || lower.contains("root")) {
        ErrorDetails::new(ErrorType::InvalidSvg, message, true)
    } else {
        let recoverable = SOFT_STEPS
            .iter()
            .any(|step| lower.contains(step) && is_recoverable_optimization_error(step, &lower));
        ErrorDetails::new(ErrorType::OptimizationFailed, message, recoverable)
    }
}

fn is_recoverable_parse_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    RECOVERABLE_PARSE_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_recoverable_optimization_error(step: &str, message: &str) -> bool {
    let lower = message.to_lowercase();
    SOFT_STEPS.contains(&step) && !lower.contains("memory") && !lower.contains("stack overflow")
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:file|https?)://\S*").unwrap())
}

/// Strip URLs and local file paths, then cap the length.
pub fn sanitize(message: &str) -> String {
    let stripped = url_re().replace_all(message, "");
    let mut out: String = stripped.chars().take(MAX_MESSAGE_LEN).collect();
    if out.len() != out.trim_end().len() {
        out.truncate(out.trim_end().len());
    }
    out
}

/// A bounded log of classified errors, oldest dropped first.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: VecDeque<ErrorDetails>,
}

/// Aggregate view over an [`ErrorLog`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: usize,
    pub recoverable: usize,
    /// `recoverable / total`, 0 when empty
    pub recovery_rate: f64,
    pub by_type: BTreeMap<ErrorType, usize>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, details: ErrorDetails) {
        if self.entries.len() == ERROR_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(details);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entries last.
    pub fn entries(&self) -> impl Iterator<Item = &ErrorDetails> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> ErrorStats {
        let total = self.entries.len();
        let recoverable = self.entries.iter().filter(|e| e.recoverable).count();
        let mut by_type = BTreeMap::new();
        for entry in &self.entries {
            *by_type.entry(entry.error_type).or_insert(0) += 1;
        }
        ErrorStats {
            total,
            recoverable,
            recovery_rate: if total == 0 {
                0.0
            } else {
                recoverable as f64 / total as f64
            },
            by_type,
        }
    }
}

/// Repairs applied by [`attempt_recovery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    CloseTags,
    QuoteAttributes,
    WrapInSvgRoot,
}

/// A repaired document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub text: String,
    pub actions: Vec<RecoveryAction>,
}

/// Elements that are safe to self-close when their end tag is missing.
const SELF_CLOSING_ELEMENTS: &[&str] = &[
    "circle", "ellipse", "line", "path", "polygon", "polyline", "rect", "image", "use", "stop",
];

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names = SELF_CLOSING_ELEMENTS.join("|");
        Regex::new(&format!(r"<({})\b([^<>]*?)(/?)(>|<|\z)", names)).unwrap()
    })
}

/// `<svg` start tags, possibly cut off; group 1 is `/` when self-closed.
fn svg_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<svg\b[^<>]*?(/?)(?:>|<|\z)").unwrap())
}

fn start_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[A-Za-z][^<>]*>").unwrap())
}

fn bare_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\s[A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*([^\s"'<>/=]+(?:/[^\s"'<>/=]+)*)"#)
            .unwrap()
    })
}

fn xml_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*<\?xml[^>]*\?>").unwrap())
}

/// Try to repair malformed input.
///
/// Heuristics are applied cumulatively; the first patched text that parses
/// cleanly with an `<svg>` root wins. Returns `None` when nothing helps.
pub fn attempt_recovery(text: &str) -> Option<Recovery> {
    if text.trim().is_empty() {
        return None;
    }

    let steps: [(RecoveryAction, fn(&str) -> Option<String>); 3] = [
        (RecoveryAction::CloseTags, close_unclosed_tags),
        (RecoveryAction::QuoteAttributes, quote_bare_attributes),
        (RecoveryAction::WrapInSvgRoot, wrap_in_svg_root),
    ];

    let mut current = text.to_string();
    let mut actions = Vec::new();
    for (action, step) in steps {
        let Some(patched) = step(&current) else {
            continue;
        };
        current = patched;
        actions.push(action);
        if parses_as_svg(&current) {
            tracing::info!(?actions, "recovered malformed SVG");
            return Some(Recovery {
                text: current,
                actions,
            });
        }
    }

    tracing::warn!(?actions, "could not recover malformed SVG");
    None
}

fn parses_as_svg(text: &str) -> bool {
    parse_svg(text).is_ok_and(|doc| doc.root.is("svg"))
}

/// Self-close allowlisted shapes that have no end tag, and close a dangling
/// `<svg>` root.
fn close_unclosed_tags(text: &str) -> Option<String> {
    let mut patched = open_tag_re()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let attrs = caps[2].trim_end();
            let self_closed = !caps[3].is_empty();
            let terminator = &caps[4];
            let has_end_tag = text.contains(&format!("</{}>", name));
            if terminator == ">" && (self_closed || has_end_tag) {
                return caps[0].to_string();
            }
            // The `<` of the next tag was consumed by the match.
            let rest = if terminator == "<" { "<" } else { "" };
            format!("<{}{}/>{}", name, attrs, rest)
        })
        .into_owned();

    let opens = svg_start_re()
        .captures_iter(&patched)
        .filter(|caps| caps[1].is_empty())
        .count();
    let closes = patched.matches("</svg>").count();
    if opens > closes {
        // A dangling `<svg ...` with no `>` needs its start tag finished too.
        if let Some(start) = patched.rfind("<svg")
            && !patched[start..].contains('>')
        {
            patched.push('>');
        }
        for _ in closes..opens {
            patched.push_str("</svg>");
        }
    }

    (patched != text).then_some(patched)
}

/// Wrap bare attribute values in double quotes.
fn quote_bare_attributes(text: &str) -> Option<String> {
    let patched = start_tag_re()
        .replace_all(text, |tag: &Captures| {
            bare_attr_re()
                .replace_all(&tag[0], |attr: &Captures| {
                    format!("{}=\"{}\"", &attr[1], &attr[2])
                })
                .into_owned()
        })
        .into_owned();
    (patched != text).then_some(patched)
}

/// Put a fragment inside a synthetic `<svg>` root.
fn wrap_in_svg_root(text: &str) -> Option<String> {
    if let Ok(doc) = parse_svg(text)
        && doc.root.is("svg")
    {
        return None;
    }
    let body = xml_decl_re().replace(text, "");
    Some(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">{}</svg>"#,
        body.trim()
    ))
}

/// Run `job` on a worker thread and give up after `timeout`.
///
/// On timeout the worker is left to finish on its own and its result is
/// dropped.
pub fn run_with_timeout<T, F>(timeout: Duration, job: F) -> Result<T, SvgError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if timeout.is_zero() {
        tracing::warn!("no time left to run the operation");
        return Err(SvgError::Timeout(timeout));
    }

    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("svgtrim-guarded".into())
        .spawn(move || {
            // The receiver is gone if we already timed out.
            let _ = tx.send(job());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "operation timed out");
            Err(SvgError::Timeout(timeout))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SvgError::Resource(
            "worker thread stopped without a result".into(),
        )),
    }
}
