//! SVG path data parsing, rounding and compact serialization.
//!
//! SVG path syntax: https://www.w3.org/TR/SVG/paths.html

use crate::error::SvgError;

/// A parsed SVG path.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: Vec<Segment>,
}

/// One path command with its arguments, e.g. `L 10 20`.
///
/// Implicit repetitions (`L 1 2 3 4`) are split into separate segments.
/// Arc flags are stored as `0.0`/`1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub command: char,
    pub args: Vec<f64>,
}

impl Segment {
    pub fn is_relative(&self) -> bool {
        self.command.is_ascii_lowercase()
    }
}

/// Number of arguments a command takes, or `None` if it isn't a command.
fn arity(command: char) -> Option<usize> {
    match command.to_ascii_lowercase() {
        'm' | 'l' | 't' => Some(2),
        'h' | 'v' => Some(1),
        'c' => Some(6),
        's' | 'q' => Some(4),
        'a' => Some(7),
        'z' => Some(0),
        _ => None,
    }
}

/// Parse SVG path data.
pub fn parse_path(d: &str) -> Result<Path, SvgError> {
    PathParser::new(d).parse()
}

impl Path {
    /// Round every argument to `precision` decimal places.
    ///
    /// Fails on non-finite numbers such as `1e999`.
    pub fn round(&mut self, precision: u8) -> Result<(), SvgError> {
        for seg in &mut self.segments {
            for arg in &mut seg.args {
                if !arg.is_finite() {
                    return Err(SvgError::InvalidPath(format!(
                        "non-finite number in `{}` command",
                        seg.command
                    )));
                }
                *arg = round_to(*arg, precision);
            }
        }
        Ok(())
    }

    /// Drop absolute line segments that repeat the previous one exactly.
    ///
    /// Returns the number of segments removed.
    pub fn dedupe_lines(&mut self) -> usize {
        let before = self.segments.len();
        let mut prev: Option<Segment> = None;
        self.segments.retain(|seg| {
            let duplicate = seg.command == 'L' && prev.as_ref() == Some(seg);
            prev = Some(seg.clone());
            !duplicate
        });
        before - self.segments.len()
    }

    /// Axis-aligned bounds of every point the path visits, control points
    /// included. Arcs contribute their end points only.
    pub fn bounding_box(&self) -> Option<BBox> {
        let mut bbox: Option<BBox> = None;
        let (mut cx, mut cy) = (0.0, 0.0);
        let (mut start_x, mut start_y) = (0.0, 0.0);
        let mut include = |x: f64, y: f64| {
            bbox = Some(match bbox {
                None => BBox {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => BBox {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        };

        for seg in &self.segments {
            let (ox, oy) = if seg.is_relative() { (cx, cy) } else { (0.0, 0.0) };
            let a = &seg.args;
            match seg.command.to_ascii_lowercase() {
                'h' => {
                    cx = a[0] + ox;
                    include(cx, cy);
                }
                'v' => {
                    cy = a[0] + oy;
                    include(cx, cy);
                }
                'z' => {
                    cx = start_x;
                    cy = start_y;
                }
                'a' => {
                    cx = a[5] + ox;
                    cy = a[6] + oy;
                    include(cx, cy);
                }
                c => {
                    for pair in a.chunks_exact(2) {
                        include(pair[0] + ox, pair[1] + oy);
                    }
                    let n = a.len();
                    cx = a[n - 2] + ox;
                    cy = a[n - 1] + oy;
                    if c == 'm' {
                        start_x = cx;
                        start_y = cy;
                    }
                }
            }
        }

        bbox
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Serialize path data with the given precision, as compactly as the
/// grammar allows: repeated command letters are omitted and separators are
/// only written between two numbers that would otherwise merge.
pub fn serialize_path(path: &Path, precision: u8) -> String {
    let mut out = String::new();
    let mut prev_cmd: Option<char> = None;

    for seg in &path.segments {
        let implicit = match prev_cmd {
            // A repeated moveto would be read back as a lineto.
            _ if seg.command.eq_ignore_ascii_case(&'m') || seg.args.is_empty() => false,
            Some('M') => seg.command == 'L',
            Some('m') => seg.command == 'l',
            Some(prev) => prev == seg.command,
            None => false,
        };

        if !implicit {
            out.push(seg.command);
        }

        for arg in &seg.args {
            push_number(&mut out, &format_number(*arg, precision));
        }

        prev_cmd = Some(seg.command);
    }

    out
}

fn push_number(out: &mut String, formatted: &str) {
    let needs_sep = match (out.chars().last(), formatted.chars().next()) {
        (Some(last), Some(first)) => {
            (last.is_ascii_digit() || last == '.') && (first.is_ascii_digit() || first == '.')
        }
        _ => false,
    };
    if needs_sep {
        out.push(' ');
    }
    out.push_str(formatted);
}

pub(crate) fn round_to(n: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = n * factor;
    if !scaled.is_finite() {
        return n;
    }
    scaled.round() / factor
}

/// Format a number with the given precision, removing unnecessary zeros.
///
/// `n` must be finite.
pub fn format_number(n: f64, precision: u8) -> String {
    let rounded = round_to(n, precision);
    if rounded == 0.0 {
        return "0".into();
    }

    let mut buf = ryu::Buffer::new();
    let s = buf.format_finite(rounded);
    let s = s.strip_suffix(".0").unwrap_or(s);

    // 0.5 -> .5
    if let Some(rest) = s.strip_prefix("0.") {
        format!(".{}", rest)
    } else if let Some(rest) = s.strip_prefix("-0.") {
        format!("-.{}", rest)
    } else {
        s.to_string()
    }
}

struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<Path, SvgError> {
        let mut segments = Vec::new();
        let mut last_cmd: Option<char> = None;

        self.skip_whitespace();

        while !self.is_eof() {
            let cmd = match self.peek() {
                Some(c) if c.is_ascii_alphabetic() => {
                    self.next();
                    if arity(c).is_none() {
                        return Err(SvgError::InvalidPath(format!("Unknown command: {}", c)));
                    }
                    c
                }
                _ => match last_cmd {
                    // After M, implicit command is L; after m, it's l
                    Some('M') => 'L',
                    Some('m') => 'l',
                    Some(c) if c.eq_ignore_ascii_case(&'z') => {
                        return Err(SvgError::InvalidPath("Number after closepath".into()));
                    }
                    Some(c) => c,
                    None => {
                        return Err(SvgError::InvalidPath("Expected command letter".into()));
                    }
                },
            };
            last_cmd = Some(cmd);

            let args = self.parse_args(cmd)?;
            segments.push(Segment { command: cmd, args });
            self.skip_whitespace_and_comma();
        }

        Ok(Path { segments })
    }

    fn parse_args(&mut self, cmd: char) -> Result<Vec<f64>, SvgError> {
        let n = arity(cmd).unwrap_or(0);
        let is_arc = cmd.eq_ignore_ascii_case(&'a');
        let mut args = Vec::with_capacity(n);
        for i in 0..n {
            if i > 0 {
                self.skip_whitespace_and_comma();
            }
            let value = if is_arc && (i == 3 || i == 4) {
                self.parse_flag()?
            } else {
                self.parse_number()?
            };
            args.push(value);
        }
        Ok(args)
    }

    fn parse_number(&mut self) -> Result<f64, SvgError> {
        self.skip_whitespace();

        let start = self.pos;

        if matches!(self.peek(), Some('-' | '+')) {
            self.next();
        }
        self.skip_digits();
        if self.peek() == Some('.') {
            self.next();
            self.skip_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.next();
            if matches!(self.peek(), Some('-' | '+')) {
                self.next();
            }
            self.skip_digits();
        }

        let s = &self.input[start..self.pos];
        if s.is_empty() {
            return Err(SvgError::InvalidPath("Expected number".into()));
        }

        s.parse()
            .map_err(|_| SvgError::InvalidPath(format!("Invalid number: {}", s)))
    }

    fn parse_flag(&mut self) -> Result<f64, SvgError> {
        self.skip_whitespace();
        match self.next() {
            Some('0') => Ok(0.0),
            Some('1') => Ok(1.0),
            Some(c) => Err(SvgError::InvalidPath(format!(
                "Expected flag (0 or 1), got: {}",
                c
            ))),
            None => Err(SvgError::InvalidPath("Expected flag".into())),
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.next();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.next();
        }
    }

    fn skip_whitespace_and_comma(&mut self) {
        self.skip_whitespace();
        if self.peek() == Some(',') {
            self.next();
        }
        self.skip_whitespace();
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let path = parse_path("M10 20 L30 40").unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[1].args, vec![30.0, 40.0]);
    }

    #[test]
    fn test_parse_implicit_lineto() {
        let path = parse_path("m10,20 30,40").unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[1].command, 'l');
    }

    #[test]
    fn test_parse_compact_arc_flags() {
        let path = parse_path("M0 0A10 20 30 1150 50").unwrap();
        assert_eq!(path.segments[1].args, vec![10.0, 20.0, 30.0, 1.0, 1.0, 50.0, 50.0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_path("M 10 X 20").is_err());
        assert!(parse_path("10 20").is_err());
        assert!(parse_path("M 10").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0, 2), "0");
        assert_eq!(format_number(-0.001, 2), "0");
        assert_eq!(format_number(1.0, 2), "1");
        assert_eq!(format_number(1.50, 2), "1.5");
        assert_eq!(format_number(0.5, 2), ".5");
        assert_eq!(format_number(-0.5, 2), "-.5");
        assert_eq!(format_number(1.234, 2), "1.23");
        assert_eq!(format_number(100.0, 3), "100");
        assert_eq!(format_number(12.3456789, 5), "12.34568");
    }

    #[test]
    fn test_serialize_path() {
        let path = parse_path("M 10.00 20.00 L 30.00 40.00 Z").unwrap();
        assert_eq!(serialize_path(&path, 0), "M10 20 30 40Z");
    }

    #[test]
    fn test_serialize_compact() {
        let path = parse_path("M 0.5 0.5 L -0.5 -0.5").unwrap();
        assert_eq!(serialize_path(&path, 1), "M.5 .5-.5-.5");
    }

    #[test]
    fn test_serialize_keeps_repeated_moveto() {
        let path = parse_path("M0 0 M10 10").unwrap();
        let out = serialize_path(&path, 2);
        assert_eq!(out, "M0 0M10 10");
        assert_eq!(parse_path(&out).unwrap(), path);
    }

    #[test]
    fn test_dedupe_lines() {
        let mut path = parse_path("M0 0 L10 10 L10 10 L10 10 L20 0").unwrap();
        assert_eq!(path.dedupe_lines(), 2);
        assert_eq!(serialize_path(&path, 2), "M0 0 10 10 20 0");
    }

    #[test]
    fn test_round_rejects_non_finite() {
        let mut path = parse_path("M1e999 0").unwrap();
        assert!(path.round(2).is_err());
    }

    #[test]
    fn test_bounding_box_relative() {
        let path = parse_path("M10 10 l20 0 v30 h-20z").unwrap();
        let bbox = path.bounding_box().unwrap();
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 30.0);
        assert_eq!(bbox.min_x, 10.0);
    }
}
