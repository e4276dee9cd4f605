//! DOM node storage.

use std::sync::Arc;

use slotmap::new_key_type;

use super::event::NativeListener;

new_key_type! {
    /// A stable handle to a node in a [`Document`](super::Document).
    ///
    /// Handles stay valid while the node is attached or merely detached;
    /// they become invalid once the node is released from the arena.
    pub struct NodeId;
}

impl NodeId {
    /// Convert the NodeId to a raw u64 value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }
}

/// A constructed stylesheet that can be adopted by any number of shadow roots.
#[derive(Debug, PartialEq, Eq)]
pub struct StyleSheet {
    id: String,
    css: String,
}

impl StyleSheet {
    /// Create a stylesheet from CSS text.
    pub fn new(id: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            css: css.into(),
        }
    }

    /// The cache id of this sheet.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The CSS source text.
    pub fn css(&self) -> &str {
        &self.css
    }

    /// Whether the sheet carries no CSS at all.
    pub fn is_empty(&self) -> bool {
        self.css.trim().is_empty()
    }
}

/// Element-specific data.
#[derive(Debug)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in insertion order.
    pub attrs: Vec<Attribute>,
    /// Attached shadow root, if any.
    pub shadow_root: Option<NodeId>,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            shadow_root: None,
        }
    }

    /// Get an attribute value.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, returning the previous value.
    pub(crate) fn set_attr(&mut self, name: &str, value: String) -> Option<String> {
        for attr in self.attrs.iter_mut() {
            if attr.name == name {
                return Some(std::mem::replace(&mut attr.value, value));
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value,
        });
        None
    }

    /// Remove an attribute, returning its value.
    pub(crate) fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|a| a.name == name)?;
        Some(self.attrs.remove(pos).value)
    }

    /// Whether the class attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }
}

/// A single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Shadow root data.
#[derive(Debug)]
pub struct ShadowRootData {
    /// The element hosting this shadow root.
    pub host: NodeId,
    /// Stylesheets adopted by this root, in cascade order.
    pub adopted_styles: Vec<Arc<StyleSheet>>,
}

/// Node-specific data.
#[derive(Debug)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element.
    Element(ElementData),
    /// Text content.
    Text(String),
    /// Comment.
    Comment(String),
    /// Shadow root attached to an element.
    ShadowRoot(ShadowRootData),
}

/// A node in the document arena.
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
    pub(crate) listeners: Vec<NativeListener>,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            listeners: Vec::new(),
        }
    }

    /// The parent node, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Node payload.
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Check if this is an element.
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is a shadow root.
    #[inline]
    pub fn is_shadow_root(&self) -> bool {
        matches!(self.data, NodeData::ShadowRoot(_))
    }

    /// Whether this node kind accepts children.
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(
            self.data,
            NodeData::Document | NodeData::Element(_) | NodeData::ShadowRoot(_)
        )
    }

    /// Get element data if this is an element.
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data.
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get shadow root data if this is a shadow root.
    #[inline]
    pub fn as_shadow_root(&self) -> Option<&ShadowRootData> {
        match &self.data {
            NodeData::ShadowRoot(s) => Some(s),
            _ => None,
        }
    }

    /// Get text content if this is a text node.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_attrs() {
        let mut elem = ElementData::new("DIV");
        assert_eq!(elem.tag, "div");
        assert_eq!(elem.set_attr("id", "a".into()), None);
        assert_eq!(elem.set_attr("id", "b".into()), Some("a".into()));
        assert_eq!(elem.get_attr("id"), Some("b"));
        assert_eq!(elem.remove_attr("id"), Some("b".into()));
        assert_eq!(elem.get_attr("id"), None);
    }

    #[test]
    fn test_has_class() {
        let mut elem = ElementData::new("span");
        elem.set_attr("class", "btn  btn-primary".into());
        assert!(elem.has_class("btn"));
        assert!(elem.has_class("btn-primary"));
        assert!(!elem.has_class("primary"));
    }

    #[test]
    fn test_stylesheet_empty() {
        assert!(StyleSheet::new("a", "  \n").is_empty());
        assert!(!StyleSheet::new("a", ":host{display:block}").is_empty());
    }
}
