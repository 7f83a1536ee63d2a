use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SvgError {
    #[error("SVG content is empty")]
    Empty,

    #[error("XML parsing error: {message}")]
    Parse {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    #[error("Invalid SVG: {0}")]
    InvalidSvg(String),

    #[error("Invalid path data: {0}")]
    InvalidPath(String),

    #[error("Optimization failed in {pass}: {message}")]
    Optimization { pass: &'static str, message: String },

    #[error("Resource limit exceeded: {0}")]
    Resource(String),

    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SvgError {
    /// Source position for parse errors, if known.
    pub fn position(&self) -> (Option<usize>, Option<usize>) {
        match self {
            SvgError::Parse { line, column, .. } => (*line, *column),
            _ => (None, None),
        }
    }
}
