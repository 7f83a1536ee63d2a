//! SVG parsing from XML.

use quick_xml::Reader;
use quick_xml::errors::{IllFormedError, SyntaxError};
use quick_xml::events::{BytesStart, Event};

use crate::ast::*;
use crate::error::SvgError;

/// Parse an SVG string into a Document.
///
/// The root is not required to be `<svg>` here; callers that optimize check
/// that separately so a wrong root can be reported as such.
pub fn parse_svg(svg: &str) -> Result<Document, SvgError> {
    if svg.trim().is_empty() {
        return Err(SvgError::Empty);
    }

    let mut reader = Reader::from_str(svg);

    let mut xml_declaration = None;
    let mut doctype = None;
    let mut root = None;
    // Open elements, innermost last.
    let mut open: Vec<Element> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_error(svg, reader.error_position() as usize, e))?;

        match event {
            Event::Decl(decl) if open.is_empty() => {
                xml_declaration = Some(XmlDeclaration {
                    version: decl
                        .version()
                        .map(|v| String::from_utf8_lossy(v.as_ref()).into_owned())
                        .unwrap_or_else(|_| "1.0".into()),
                    encoding: decl
                        .encoding()
                        .transpose()
                        .ok()
                        .flatten()
                        .map(|e| String::from_utf8_lossy(e.as_ref()).into_owned()),
                    standalone: decl.standalone().transpose().ok().flatten().map(|s| {
                        let s = String::from_utf8_lossy(s.as_ref());
                        s == "yes"
                    }),
                });
            }
            Event::DocType(dt) if open.is_empty() => {
                doctype = Some(String::from_utf8_lossy(&dt).into_owned());
            }
            Event::Start(start) => {
                if root.is_some() {
                    return Err(trailing_content(svg, &reader));
                }
                open.push(element_start(svg, &reader, &start)?);
            }
            Event::Empty(start) => {
                if root.is_some() {
                    return Err(trailing_content(svg, &reader));
                }
                let element = element_start(svg, &reader, &start)?;
                match open.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags.
                if let Some(element) = open.pop() {
                    match open.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
            }
            Event::Text(text) => {
                if let Some(parent) = open.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| xml_error(svg, reader.buffer_position() as usize, e))?;
                    parent.children.push(Node::Text(text.into_owned()));
                } else if root.is_some() && !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(trailing_content(svg, &reader));
                }
            }
            Event::Comment(comment) => {
                // Comments outside the root are dropped.
                if let Some(parent) = open.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = open.last_mut() {
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&cdata).into_owned()));
                }
            }
            Event::PI(pi) => {
                if let Some(parent) = open.last_mut() {
                    let content = String::from_utf8_lossy(&pi).into_owned();
                    let (target, rest) = content
                        .split_once(char::is_whitespace)
                        .map(|(t, r)| (t.to_string(), Some(r.to_string())))
                        .unwrap_or_else(|| (content, None));
                    parent
                        .children
                        .push(Node::ProcessingInstruction { target, content: rest });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        let (line, column) = line_col(svg, svg.len());
        return Err(SvgError::Parse {
            message: format!(
                "Unclosed tag <{}> at end of input",
                unclosed.name.full_name()
            ),
            line: Some(line),
            column: Some(column),
        });
    }

    let root = root.ok_or_else(|| SvgError::InvalidSvg("No root element found".into()))?;

    Ok(Document {
        xml_declaration,
        doctype,
        root,
    })
}

fn element_start(
    svg: &str,
    reader: &Reader<&[u8]>,
    start: &BytesStart,
) -> Result<Element, SvgError> {
    let name_bytes = start.name();
    let name = std::str::from_utf8(name_bytes.as_ref())?;

    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            let (line, column) = line_col(svg, reader.buffer_position() as usize);
            SvgError::Parse {
                message: format!("Invalid attribute on <{}>: {}", name, e),
                line: Some(line),
                column: Some(column),
            }
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(svg, reader.buffer_position() as usize, e))?;
        element.attributes.push(Attribute::new(key, value.into_owned()));
    }

    Ok(element)
}

fn trailing_content(svg: &str, reader: &Reader<&[u8]>) -> SvgError {
    let (line, column) = line_col(svg, reader.buffer_position() as usize);
    SvgError::Parse {
        message: "Unexpected content after the root element".into(),
        line: Some(line),
        column: Some(column),
    }
}

/// Turn a reader error into a parse error with a message that names the
/// problem in plain words.
fn xml_error(svg: &str, offset: usize, err: impl Into<quick_xml::Error>) -> SvgError {
    let err = err.into();
    let message = match &err {
        quick_xml::Error::Syntax(SyntaxError::UnclosedTag) => {
            "Unclosed tag: `>` not found before end of input".to_string()
        }
        quick_xml::Error::Syntax(e) => format!("Unexpected character in markup: {}", e),
        quick_xml::Error::IllFormed(IllFormedError::MismatchedEndTag { expected, found }) => {
            format!("Unclosed tag <{}>: found </{}> instead", expected, found)
        }
        quick_xml::Error::IllFormed(IllFormedError::UnmatchedEndTag(name)) => {
            format!("Unexpected closing tag </{}>", name)
        }
        quick_xml::Error::InvalidAttr(e) => format!("Invalid attribute: {}", e),
        other => other.to_string(),
    };
    let (line, column) = line_col(svg, offset);
    SvgError::Parse {
        message,
        line: Some(line),
        column: Some(column),
    }
}

/// 1-based line and column for a byte offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}
