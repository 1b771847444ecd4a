//! Rendered document fragments and their HTML serialization.

use crate::html_escape::escape_into;
use tessera_ast::{is_escapable_raw_text_element, is_raw_text_element, is_void_element};

/// A node in a rendered document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(DomElement),
    /// Text, escaped on output.
    Text(String),
    /// Trusted markup, emitted verbatim.
    Raw(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl DomElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, replacing an earlier value with the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Append a child. Inside raw-text elements consecutive text merges.
    pub fn append(&mut self, node: DomNode) {
        if is_raw_text_element(&self.tag) {
            let incoming = match &node {
                DomNode::Text(s) | DomNode::Raw(s) => Some(s.as_str()),
                _ => None,
            };
            if let (Some(text), Some(DomNode::Text(last))) = (incoming, self.children.last_mut()) {
                last.push_str(text);
                return;
            }
            if let Some(text) = incoming {
                self.children.push(DomNode::Text(text.to_string()));
                return;
            }
        }
        self.children.push(node);
    }

    pub fn append_fragment(&mut self, fragment: Fragment) {
        for node in fragment.nodes {
            self.append(node);
        }
    }
}

/// An ordered list of sibling nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    nodes: Vec<DomNode>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[DomNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: DomNode) {
        self.nodes.push(node);
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.nodes.push(DomNode::Text(text));
        }
    }

    pub fn extend(&mut self, other: Fragment) {
        self.nodes.extend(other.nodes);
    }

    /// Serialize to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(&mut out, node, false);
        }
        out
    }

    /// Concatenated text content, without markup.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            collect_text(&mut out, node);
        }
        out
    }
}

impl From<Vec<DomNode>> for Fragment {
    fn from(nodes: Vec<DomNode>) -> Self {
        Self { nodes }
    }
}

fn write_node(out: &mut String, node: &DomNode, raw_text: bool) {
    match node {
        DomNode::Text(text) if raw_text => out.push_str(text),
        DomNode::Text(text) => escape_into(out, text),
        DomNode::Raw(markup) => out.push_str(markup),
        DomNode::Comment(value) => {
            out.push_str("<!--");
            out.push_str(value);
            out.push_str("-->");
        }
        DomNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_into(out, value);
                out.push('"');
            }
            out.push('>');
            if is_void_element(&el.tag) {
                return;
            }
            let raw = is_raw_text_element(&el.tag) && !is_escapable_raw_text_element(&el.tag);
            for child in &el.children {
                write_node(out, child, raw);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

fn collect_text(out: &mut String, node: &DomNode) {
    match node {
        DomNode::Text(text) | DomNode::Raw(text) => out.push_str(text),
        DomNode::Comment(_) => {}
        DomNode::Element(el) => {
            for child in &el.children {
                collect_text(out, child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut el = DomElement::new("a");
        el.set_attribute("title", "\"quoted\" & more");
        el.append(DomNode::Text("1 < 2".to_string()));
        let fragment = Fragment::from(vec![DomNode::Element(el)]);
        assert_eq!(
            fragment.to_html(),
            "<a title=\"&quot;quoted&quot; &amp; more\">1 &lt; 2</a>"
        );
    }

    #[test]
    fn test_void_element_has_no_close_tag() {
        let mut img = DomElement::new("img");
        img.set_attribute("src", "a.png");
        let fragment = Fragment::from(vec![DomNode::Element(img)]);
        assert_eq!(fragment.to_html(), "<img src=\"a.png\">");
    }

    #[test]
    fn test_raw_text_merges_and_is_verbatim() {
        let mut script = DomElement::new("script");
        script.append(DomNode::Text("if (a < b) ".to_string()));
        script.append(DomNode::Text("{ go(); }".to_string()));
        assert_eq!(script.children.len(), 1);
        let fragment = Fragment::from(vec![DomNode::Element(script)]);
        assert_eq!(fragment.to_html(), "<script>if (a < b) { go(); }</script>");
    }

    #[test]
    fn test_title_and_textarea_text_is_escaped() {
        let mut title = DomElement::new("title");
        title.append(DomNode::Text("</title>".to_string()));
        title.append(DomNode::Raw("<script>alert(1)</script>".to_string()));
        assert_eq!(title.children.len(), 1);
        let mut textarea = DomElement::new("textarea");
        textarea.append(DomNode::Text("a & b".to_string()));
        let fragment = Fragment::from(vec![DomNode::Element(title), DomNode::Element(textarea)]);
        assert_eq!(
            fragment.to_html(),
            "<title>&lt;/title&gt;&lt;script&gt;alert(1)&lt;/script&gt;</title>\
<textarea>a &amp; b</textarea>"
        );
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut el = DomElement::new("div");
        el.set_attribute("class", "a");
        el.set_attribute("class", "b");
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attribute("class"), Some("b"));
    }

    #[test]
    fn test_raw_and_comment_output() {
        let fragment = Fragment::from(vec![
            DomNode::Raw("<b>bold</b>".to_string()),
            DomNode::Comment(" note ".to_string()),
        ]);
        assert_eq!(fragment.to_html(), "<b>bold</b><!-- note -->");
        assert_eq!(fragment.text_content(), "<b>bold</b>");
    }
}
