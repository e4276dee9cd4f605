//! HTML parsing and serialization.
//!
//! Parsing goes through html5ever's `RcDom` and converts the result into
//! detached arena nodes. Serialization covers `innerHTML`/`outerHTML`.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use super::NodeId;
use super::document::Document;
use super::node::{ElementData, Node, NodeData};
use crate::error::Result;
use crate::logging::targets;

/// Void elements (no end tag).
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Raw text elements (content is not escaped).
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

impl Document {
    /// Parse an HTML fragment into detached top-level nodes.
    ///
    /// Content the HTML parser hoists into `<head>` (such as `<style>` or
    /// `<link>` at the start of the fragment) comes first, followed by the
    /// body content. `<template>` contents become ordinary children.
    pub fn parse_fragment(&mut self, html: &str) -> Vec<NodeId> {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);

        let mut nodes = Vec::new();
        for child in dom.document.children.borrow().iter() {
            if !is_element_named(child, "html") {
                continue;
            }
            for section in child.children.borrow().iter() {
                if is_element_named(section, "head") || is_element_named(section, "body") {
                    for node in section.children.borrow().iter() {
                        if let Some(id) = self.convert(node) {
                            nodes.push(id);
                        }
                    }
                }
            }
        }
        tracing::trace!(target: targets::DOM, nodes = nodes.len(), "parsed fragment");
        nodes
    }

    /// Replace the children of `node` with parsed HTML.
    ///
    /// Returns the new top-level children.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<Vec<NodeId>> {
        self.require(node)?;
        let children = self.parse_fragment(html);
        self.replace_children(node, &children)?;
        Ok(children)
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.serialize(child, &mut out);
        }
        out
    }

    /// Serialize a node including itself.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, &mut out);
        out
    }

    fn convert(&mut self, handle: &Handle) -> Option<NodeId> {
        match &handle.data {
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.trim().is_empty() {
                    return None;
                }
                Some(self.create_text(&text))
            }
            RcNodeData::Comment { contents } => Some(self.create_comment(contents)),
            RcNodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let mut element = ElementData::new(&name.local);
                for attr in attrs.borrow().iter() {
                    element.set_attr(&attr.name.local, attr.value.to_string());
                }
                let id = self.insert_node(Node::new(NodeData::Element(element)));

                let source = template_contents
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| handle.clone());
                for child in source.children.borrow().iter() {
                    if let Some(child_id) = self.convert(child) {
                        self.link(id, child_id);
                    }
                }
                Some(id)
            }
            RcNodeData::Document
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => None,
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.data() {
            NodeData::Document | NodeData::ShadowRoot(_) => {
                for &child in node.children() {
                    self.serialize(child, out);
                }
            }
            NodeData::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    escape_text(text, out);
                }
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for attr in &element.attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_attr(&attr.value, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                for &child in node.children() {
                    self.serialize(child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }
}

fn is_element_named(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, RcNodeData::Element { name, .. } if &*name.local == tag)
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment(r#"<div id="a" class="x y"><span>hi</span></div><p>second</p>"#);
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.tag_name(nodes[0]), Some("div"));
        assert_eq!(doc.attr(nodes[0], "class"), Some("x y"));
        assert_eq!(doc.text_content(nodes[0]), "hi");
        assert_eq!(doc.parent(nodes[0]), None);
    }

    #[test]
    fn test_parse_hoisted_style() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment("<style>:host{display:block}</style><slot></slot>");
        assert_eq!(doc.tag_name(nodes[0]), Some("style"));
        assert_eq!(doc.tag_name(nodes[1]), Some("slot"));
    }

    #[test]
    fn test_parse_custom_and_template() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment("<template id=\"t\"><gs-item>one</gs-item></template>");
        assert_eq!(nodes.len(), 1);
        let children = doc.element_children(nodes[0]);
        assert_eq!(children.len(), 1);
        assert_eq!(doc.tag_name(children[0]), Some("gs-item"));
    }

    #[test]
    fn test_set_inner_html_and_serialize() {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.append_child(doc.body(), host).unwrap();
        doc.take_records();

        let nodes = doc
            .set_inner_html(host, r#"<b title="a&quot;b">x &amp; y</b><br><!--c-->"#)
            .unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(
            doc.inner_html(host),
            r#"<b title="a&quot;b">x &amp; y</b><br><!--c-->"#
        );
        assert_eq!(doc.take_records().len(), 1);
        assert!(doc.outer_html(host).starts_with("<div><b"));
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let mut doc = Document::new();
        let nodes = doc.parse_fragment("<style>a > b { color: red }</style>");
        assert_eq!(doc.outer_html(nodes[0]), "<style>a > b { color: red }</style>");
    }
}
