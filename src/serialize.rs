//! SVG serialization back to XML text.

use crate::ast::*;

/// Elements whose text content is whitespace-significant.
const TEXT_CONTENT_ELEMENTS: &[&str] = &["text", "tspan", "textPath", "style", "script"];

/// Serialize a Document to an SVG string.
///
/// With `minify`, insignificant whitespace between tags and inside attribute
/// values is collapsed. Text inside text-content elements is kept verbatim.
pub fn serialize(doc: &Document, minify: bool) -> String {
    let mut out = String::new();

    if let Some(ref decl) = doc.xml_declaration {
        out.push_str("<?xml version=\"");
        out.push_str(&decl.version);
        out.push('"');
        if let Some(ref enc) = decl.encoding {
            out.push_str(" encoding=\"");
            out.push_str(enc);
            out.push('"');
        }
        if let Some(standalone) = decl.standalone {
            out.push_str(" standalone=\"");
            out.push_str(if standalone { "yes" } else { "no" });
            out.push('"');
        }
        out.push_str("?>");
        if !minify {
            out.push('\n');
        }
    }

    if let Some(ref dt) = doc.doctype {
        out.push_str("<!DOCTYPE ");
        out.push_str(dt);
        out.push('>');
        if !minify {
            out.push('\n');
        }
    }

    serialize_tree(&mut out, &doc.root, minify);

    out
}

enum Step<'a> {
    Open(&'a Element, bool),
    Close(&'a Element),
    Node(&'a Node, bool),
}

fn serialize_tree(out: &mut String, root: &Element, minify: bool) {
    let mut stack = vec![Step::Open(root, false)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(elem, in_text) => {
                push_start_tag(out, elem, minify);
                if elem.children.is_empty() {
                    out.push_str("/>");
                    continue;
                }
                out.push('>');
                let preserve = in_text || TEXT_CONTENT_ELEMENTS.contains(&elem.name.local.as_str());
                stack.push(Step::Close(elem));
                for child in elem.children.iter().rev() {
                    stack.push(Step::Node(child, preserve));
                }
            }
            Step::Close(elem) => {
                out.push_str("</");
                out.push_str(&elem.name.full_name());
                out.push('>');
            }
            Step::Node(node, in_text) => match node {
                Node::Element(e) => stack.push(Step::Open(e, in_text)),
                Node::Text(text) => {
                    if !minify || in_text {
                        push_escaped_text(out, text);
                    } else if !text.trim().is_empty() {
                        push_escaped_text(out, &collapse_whitespace(text));
                    }
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
                Node::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
                Node::ProcessingInstruction { target, content } => {
                    out.push_str("<?");
                    out.push_str(target);
                    if let Some(c) = content {
                        out.push(' ');
                        out.push_str(c);
                    }
                    out.push_str("?>");
                }
            },
        }
    }
}

fn push_start_tag(out: &mut String, elem: &Element, minify: bool) {
    out.push('<');
    out.push_str(&elem.name.full_name());

    for attr in &elem.attributes {
        out.push(' ');
        out.push_str(&attr.name.full_name());
        out.push_str("=\"");
        if minify {
            push_escaped_attr(out, &collapse_whitespace(attr.value.trim()));
        } else {
            push_escaped_attr(out, &attr.value);
        }
        out.push('"');
    }
}

/// Collapse every run of whitespace into a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn push_escaped_attr(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn push_escaped_text(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
