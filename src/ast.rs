//! SVG document tree

/// A complete SVG document.
#[derive(Debug, Clone)]
pub struct Document {
    /// XML declaration (e.g., `<?xml version="1.0" encoding="UTF-8"?>`)
    pub xml_declaration: Option<XmlDeclaration>,
    /// DOCTYPE declaration
    pub doctype: Option<String>,
    /// The root element
    pub root: Element,
}

/// XML declaration attributes.
#[derive(Debug, Clone)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// An SVG/XML element.
#[derive(Debug, Clone)]
pub struct Element {
    /// Element name with optional prefix (e.g., "svg", "svg:rect")
    pub name: QName,
    /// Attributes in document order
    pub attributes: Vec<Attribute>,
    /// Child nodes
    pub children: Vec<Node>,
}

/// A qualified name (possibly with namespace prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    /// Parse a qualified name from a string like "prefix:local" or just "local".
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
            },
            None => Self::new(s),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }

    /// True for `name` itself and for `prefix:name`.
    pub fn matches(&self, name: &str) -> bool {
        match name.split_once(':') {
            Some((prefix, local)) => self.prefix.as_deref() == Some(prefix) && self.local == local,
            None => self.local == name,
        }
    }
}

/// An attribute on an element.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: QName::parse(name),
            value: value.into(),
        }
    }
}

/// A node in the SVG tree.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
    /// A processing instruction (e.g., `<?xml-stylesheet ... ?>`)
    ProcessingInstruction { target: String, content: Option<String> },
}

impl Node {
    /// Whitespace-only text carries no content.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: QName::parse(name),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Get an attribute value by local name.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.local == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute value, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.name.matches(name)) {
            attr.value = value.into();
        } else {
            self.attributes.push(Attribute::new(name, value));
        }
    }

    /// Remove an attribute by name. Returns whether anything was removed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| !a.name.matches(name));
        self.attributes.len() != before
    }

    /// Check if this element has a specific local name.
    pub fn is(&self, name: &str) -> bool {
        self.name.local == name
    }

    /// Iterate over child elements only (skip text, comments, etc.).
    pub fn child_elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Iterate over child elements mutably.
    pub fn child_elements_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }
}

impl Document {
    /// Visit all elements in document order.
    ///
    /// Uses an explicit stack, so deeply nested input cannot overflow.
    pub fn for_each_element(&self, mut f: impl FnMut(&Element)) {
        let mut stack = vec![&self.root];
        while let Some(elem) = stack.pop() {
            f(elem);
            stack.extend(elem.child_elements().rev());
        }
    }

    /// Visit all elements mutably in document order.
    pub fn for_each_element_mut(&mut self, mut f: impl FnMut(&mut Element)) {
        let mut stack = vec![&mut self.root];
        while let Some(elem) = stack.pop() {
            f(elem);
            stack.extend(elem.child_elements_mut().rev());
        }
    }

    /// Visit all elements mutably, children before their parent.
    ///
    /// `f` may remove children of the element it is given; those have
    /// already been visited.
    pub fn for_each_element_post_mut(&mut self, mut f: impl FnMut(&mut Element)) {
        let mut order: Vec<Vec<usize>> = Vec::new();
        let mut stack: Vec<(Vec<usize>, &Element)> = vec![(Vec::new(), &self.root)];
        while let Some((path, elem)) = stack.pop() {
            for (i, child) in elem.children.iter().enumerate().rev() {
                if let Node::Element(e) = child {
                    let mut child_path = path.clone();
                    child_path.push(i);
                    stack.push((child_path, e));
                }
            }
            order.push(path);
        }

        for path in order.iter().rev() {
            if let Some(elem) = element_at_mut(&mut self.root, path) {
                f(elem);
            }
        }
    }

    /// Number of element nodes, root included.
    pub fn element_count(&self) -> usize {
        let mut count = 0;
        self.for_each_element(|_| count += 1);
        count
    }

    /// Number of nodes of any kind below and including the root.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.for_each_element(|e| {
            count += 1 + e.children.iter().filter(|n| !matches!(n, Node::Element(_))).count();
        });
        count
    }

    /// Deepest element nesting level; the root alone is depth 1.
    pub fn max_depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(&self.root, 1usize)];
        while let Some((elem, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(elem.child_elements().map(|c| (c, depth + 1)));
        }
        max
    }
}

fn element_at_mut<'a>(root: &'a mut Element, path: &[usize]) -> Option<&'a mut Element> {
    let mut cur = root;
    for &i in path {
        cur = match cur.children.get_mut(i) {
            Some(Node::Element(e)) => e,
            _ => return None,
        };
    }
    Some(cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_svg;

    #[test]
    fn test_walk_is_document_order() {
        let doc = parse_svg(r#"<svg><g><a/><b/></g><c/></svg>"#).unwrap();
        let mut names = Vec::new();
        doc.for_each_element(|e| names.push(e.name.local.clone()));
        assert_eq!(names, ["svg", "g", "a", "b", "c"]);
    }

    #[test]
    fn test_post_order_visits_children_first() {
        let mut doc = parse_svg(r#"<svg><g><a/></g><c/></svg>"#).unwrap();
        let mut names = Vec::new();
        doc.for_each_element_post_mut(|e| names.push(e.name.local.clone()));
        assert_eq!(names, ["c", "a", "g", "svg"]);
    }

    #[test]
    fn test_counts_and_depth() {
        let doc = parse_svg(r#"<svg><!--x--><g><g><rect/></g></g></svg>"#).unwrap();
        assert_eq!(doc.element_count(), 4);
        assert_eq!(doc.node_count(), 5);
        assert_eq!(doc.max_depth(), 4);
    }

    #[test]
    fn test_prefixed_attribute_names() {
        let mut elem = Element::new("use");
        elem.set_attr("xlink:href", "#a");
        assert_eq!(elem.get_attr("href"), Some("#a"));
        assert!(elem.remove_attr("xlink:href"));
        assert!(elem.attributes.is_empty());
    }
}
