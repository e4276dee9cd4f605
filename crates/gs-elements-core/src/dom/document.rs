//! Document - arena-backed DOM tree.

use std::sync::Arc;

use slotmap::SlotMap;

use super::event::{Callback, EventPhase, ListenerOptions, NativeListener};
use super::mutation::{MutationKind, MutationRecord};
use super::node::{ElementData, Node, NodeData, ShadowRootData, StyleSheet};
use super::NodeId;
use crate::error::{CoreError, Result};
use crate::logging::targets;

/// Where [`Document::insert_adjacent`] places a node relative to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertPosition {
    /// Before the target, as a sibling.
    BeforeBegin,
    /// Inside the target, before its first child.
    AfterBegin,
    /// Inside the target, after its last child.
    BeforeEnd,
    /// After the target, as a sibling.
    AfterEnd,
}

impl InsertPosition {
    /// Parse an `insertAdjacentElement` position name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beforebegin" => Some(Self::BeforeBegin),
            "afterbegin" => Some(Self::AfterBegin),
            "beforeend" => Some(Self::BeforeEnd),
            "afterend" => Some(Self::AfterEnd),
            _ => None,
        }
    }

    /// The canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeBegin => "beforebegin",
            Self::AfterBegin => "afterbegin",
            Self::BeforeEnd => "beforeend",
            Self::AfterEnd => "afterend",
        }
    }
}

/// An HTML document.
///
/// Nodes are stored in a slot map; [`NodeId`]s are stable handles. Removing
/// a node only detaches it; the subtree stays addressable until
/// [`release`](Self::release) frees it.
pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    records: Vec<MutationRecord>,
}

impl Document {
    /// Create a document with `<html>`, `<head>` and `<body>`.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(NodeData::Document));
        let html = nodes.insert(Node::new(NodeData::Element(ElementData::new("html"))));
        let head = nodes.insert(Node::new(NodeData::Element(ElementData::new("head"))));
        let body = nodes.insert(Node::new(NodeData::Element(ElementData::new("body"))));

        let mut document = Self {
            nodes,
            root,
            html,
            head,
            body,
            records: Vec::new(),
        };
        document.link(root, html);
        document.link(html, head);
        document.link(html, body);
        document
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        self.html
    }

    /// The `<head>` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn require(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or(CoreError::InvalidNode(id))
    }

    /// Check if a node exists in the arena.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes in the arena (attached or detached).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty. A document always has a root, so this is
    /// only true for a torn-down arena.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes
            .insert(Node::new(NodeData::Element(ElementData::new(tag))))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.nodes.insert(Node::new(NodeData::Text(text.to_string())))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.nodes
            .insert(Node::new(NodeData::Comment(text.to_string())))
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    /// Link a detached child without recording a mutation.
    pub(crate) fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get(id)
            .and_then(Node::as_element)
            .map(|e| e.tag.as_str())
    }

    /// Check if a node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(Node::is_element)
    }

    /// Check if a node is a shadow root.
    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(Node::is_shadow_root)
    }

    /// The parent node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Child nodes (empty for unknown ids).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Child elements only.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
    }

    /// The host element of a shadow root.
    pub fn host(&self, shadow: NodeId) -> Option<NodeId> {
        self.nodes
            .get(shadow)
            .and_then(Node::as_shadow_root)
            .map(|s| s.host)
    }

    /// The shadow root attached to an element.
    pub fn shadow_root(&self, element: NodeId) -> Option<NodeId> {
        self.nodes
            .get(element)
            .and_then(Node::as_element)
            .and_then(|e| e.shadow_root)
    }

    /// The parent, or the host when `id` is a shadow root.
    pub fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).or_else(|| self.host(id))
    }

    /// The topmost ancestor reachable through parent links.
    ///
    /// This is the document node for connected light-DOM nodes and the
    /// shadow root for nodes in a shadow tree.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Whether the node is part of the document, crossing shadow boundaries.
    pub fn is_connected(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut current = id;
        loop {
            let root = self.root_of(current);
            if root == self.root {
                return true;
            }
            match self.host(root) {
                Some(host) => current = host,
                None => return false,
            }
        }
    }

    /// Check if `ancestor` is `id` or one of its composed ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.composed_parent(node);
        }
        false
    }

    /// Descendants in depth-first pre-order, excluding `id`.
    ///
    /// Only the light tree is walked; shadow roots are separate trees.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        result
    }

    /// `id` followed by its descendants in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = vec![id];
        result.extend(self.descendants(id));
        result
    }

    /// `id` and its descendants, including the contents of every shadow
    /// tree hosted inside it (each shadow tree follows its host).
    pub fn composed_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev().copied());
            if let Some(shadow) = self.shadow_root(node) {
                stack.push(shadow);
            }
        }
        result
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.subtree(id) {
            if let Some(t) = self.nodes.get(node).and_then(Node::as_text) {
                text.push_str(t);
            }
        }
        text
    }

    /// Find a connected light-DOM element by its `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root).into_iter().find(|&node| {
            self.nodes
                .get(node)
                .and_then(Node::as_element)
                .and_then(|e| e.get_attr("id"))
                == Some(id)
        })
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    ///
    /// A child that is already attached elsewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        if !self.require(parent)?.is_container() {
            return Err(CoreError::hierarchy("parent cannot have children"));
        }
        match self.require(child)?.data {
            NodeData::Document | NodeData::ShadowRoot(_) => {
                return Err(CoreError::hierarchy(
                    "document and shadow root nodes cannot be inserted",
                ));
            }
            _ => {}
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(CoreError::hierarchy(
                "a node cannot be inserted into its own subtree",
            ));
        }
        let mut reference = reference;
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(CoreError::hierarchy(
                    "reference node is not a child of parent",
                ));
            }
            if r == child {
                reference = self.next_sibling(child);
            }
        }

        self.detach(child)?;

        let index = match reference {
            Some(r) => self
                .children(parent)
                .iter()
                .position(|&c| c == r)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(index, child);
        }
        self.record(
            parent,
            MutationKind::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            },
        );
        Ok(())
    }

    /// Insert `node` relative to `target`, like `insertAdjacentElement`.
    pub fn insert_adjacent(
        &mut self,
        target: NodeId,
        position: InsertPosition,
        node: NodeId,
    ) -> Result<()> {
        self.require(target)?;
        match position {
            InsertPosition::BeforeBegin => {
                let parent = self
                    .parent(target)
                    .ok_or_else(|| CoreError::hierarchy("target has no parent"))?;
                self.insert_before(parent, node, Some(target))
            }
            InsertPosition::AfterBegin => {
                let first = self.first_child(target);
                self.insert_before(target, node, first)
            }
            InsertPosition::BeforeEnd => self.append_child(target, node),
            InsertPosition::AfterEnd => {
                let parent = self
                    .parent(target)
                    .ok_or_else(|| CoreError::hierarchy("target has no parent"))?;
                let next = self.next_sibling(target);
                self.insert_before(parent, node, next)
            }
        }
    }

    /// Detach a node from its parent.
    ///
    /// Returns `true` if the node was attached.
    pub fn detach(&mut self, node: NodeId) -> Result<bool> {
        let Some(parent) = self.require(node)?.parent else {
            return Ok(false);
        };
        let root = self.root_of(parent);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = None;
        }
        self.records.push(MutationRecord {
            root,
            kind: MutationKind::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![node],
            },
        });
        Ok(true)
    }

    /// Remove `child` from `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(CoreError::hierarchy("node is not a child of parent"));
        }
        self.detach(child).map(|_| ())
    }

    /// Replace every child of `parent` with `children`, as one mutation.
    pub fn replace_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<()> {
        if !self.require(parent)?.is_container() {
            return Err(CoreError::hierarchy("parent cannot have children"));
        }
        for &child in children {
            if self.is_inclusive_ancestor(child, parent) {
                return Err(CoreError::hierarchy(
                    "a node cannot be inserted into its own subtree",
                ));
            }
            self.detach(child)?;
        }
        let removed = self
            .nodes
            .get_mut(parent)
            .map(|p| std::mem::take(&mut p.children))
            .unwrap_or_default();
        for &old in &removed {
            if let Some(n) = self.nodes.get_mut(old) {
                n.parent = None;
            }
        }
        for &child in children {
            self.link(parent, child);
        }
        if !removed.is_empty() || !children.is_empty() {
            self.record(
                parent,
                MutationKind::ChildList {
                    target: parent,
                    added: children.to_vec(),
                    removed,
                },
            );
        }
        Ok(())
    }

    /// Free a detached subtree (and any shadow trees inside it).
    ///
    /// Attached nodes, the document node and shadow roots whose host still
    /// exists are left alone. Returns the number of nodes freed.
    pub fn release(&mut self, node: NodeId) -> usize {
        let Some(n) = self.nodes.get(node) else {
            return 0;
        };
        if node == self.root || n.parent.is_some() {
            return 0;
        }
        if let Some(host) = n.as_shadow_root().map(|s| s.host) {
            if self.contains(host) {
                return 0;
            }
        }

        let mut freed = 0;
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            for id in self.subtree(current) {
                if let Some(shadow) = self.shadow_root(id) {
                    pending.push(shadow);
                }
                if self.nodes.remove(id).is_some() {
                    freed += 1;
                }
            }
        }
        tracing::trace!(target: targets::DOM, ?node, freed, "released subtree");
        freed
    }

    // =========================================================================
    // Shadow DOM
    // =========================================================================

    /// Attach a shadow root to an element, or return the existing one.
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId> {
        let element = self
            .require(host)?
            .as_element()
            .ok_or(CoreError::NotAnElement(host))?;
        if let Some(existing) = element.shadow_root {
            return Ok(existing);
        }
        let shadow = self.nodes.insert(Node::new(NodeData::ShadowRoot(ShadowRootData {
            host,
            adopted_styles: Vec::new(),
        })));
        if let Some(e) = self.nodes.get_mut(host).and_then(Node::as_element_mut) {
            e.shadow_root = Some(shadow);
        }
        Ok(shadow)
    }

    /// Stylesheets adopted by a shadow root.
    pub fn adopted_styles(&self, shadow: NodeId) -> &[Arc<StyleSheet>] {
        self.nodes
            .get(shadow)
            .and_then(Node::as_shadow_root)
            .map(|s| s.adopted_styles.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the adopted stylesheet list of a shadow root.
    pub fn set_adopted_styles(&mut self, shadow: NodeId, styles: Vec<Arc<StyleSheet>>) -> Result<()> {
        match self.nodes.get_mut(shadow).map(|n| &mut n.data) {
            Some(NodeData::ShadowRoot(data)) => {
                data.adopted_styles = styles;
                Ok(())
            }
            Some(_) => Err(CoreError::hierarchy("node is not a shadow root")),
            None => Err(CoreError::InvalidNode(shadow)),
        }
    }

    // =========================================================================
    // Mutation records
    // =========================================================================

    pub(crate) fn record(&mut self, target: NodeId, kind: MutationKind) {
        let root = self.root_of(target);
        self.records.push(MutationRecord { root, kind });
    }

    /// Drain all pending mutation records.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    /// Whether mutation records are waiting to be drained.
    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    // =========================================================================
    // Event listeners
    // =========================================================================

    /// Add an event listener.
    ///
    /// Returns `false` when the node does not exist, or when the same
    /// callback is already registered for this event and capture flag.
    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        kind: &str,
        callback: Callback,
        options: ListenerOptions,
    ) -> bool {
        let Some(n) = self.nodes.get_mut(node) else {
            return false;
        };
        let duplicate = n.listeners.iter().any(|l| {
            l.kind == kind && l.options.capture == options.capture && l.callback == callback
        });
        if duplicate {
            return false;
        }
        n.listeners.push(NativeListener {
            kind: kind.to_string(),
            callback,
            options,
        });
        true
    }

    /// Remove an event listener. Returns `true` if one was removed.
    pub fn remove_event_listener(
        &mut self,
        node: NodeId,
        kind: &str,
        callback: &Callback,
        capture: bool,
    ) -> bool {
        let Some(n) = self.nodes.get_mut(node) else {
            return false;
        };
        let before = n.listeners.len();
        n.listeners.retain(|l| {
            !(l.kind == kind && l.options.capture == capture && &l.callback == callback)
        });
        n.listeners.len() != before
    }

    /// Number of listeners registered on a node for an event type.
    pub fn listener_count(&self, node: NodeId, kind: &str) -> usize {
        self.nodes
            .get(node)
            .map(|n| n.listeners.iter().filter(|l| l.kind == kind).count())
            .unwrap_or(0)
    }

    /// Collect the callbacks to run on `node` in `phase`, dropping `once`
    /// listeners from the node as they are taken.
    pub(crate) fn take_listeners_for(
        &mut self,
        node: NodeId,
        kind: &str,
        phase: EventPhase,
    ) -> Vec<Callback> {
        let Some(n) = self.nodes.get_mut(node) else {
            return Vec::new();
        };
        let wanted = |l: &NativeListener| {
            l.kind == kind
                && match phase {
                    EventPhase::Capturing => l.options.capture,
                    EventPhase::Bubbling => !l.options.capture,
                    EventPhase::AtTarget => true,
                    EventPhase::None => false,
                }
        };
        let callbacks: Vec<Callback> = n
            .listeners
            .iter()
            .filter(|l| wanted(l))
            .map(|l| l.callback.clone())
            .collect();
        n.listeners.retain(|l| !(wanted(l) && l.options.once));
        callbacks
    }

    /// The propagation path from `target` upwards.
    ///
    /// Composed paths continue from a shadow root to its host.
    pub fn event_path(&self, target: NodeId, composed: bool) -> Vec<NodeId> {
        if !self.contains(target) {
            return Vec::new();
        }
        let mut path = vec![target];
        let mut current = target;
        loop {
            let next = match self.parent(current) {
                Some(parent) => Some(parent),
                None if composed => self.host(current),
                None => None,
            };
            match next {
                Some(node) => {
                    path.push(node);
                    current = node;
                }
                None => break,
            }
        }
        path
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("pending_records", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_structure() {
        let doc = Document::new();
        assert_eq!(doc.parent(doc.document_element()), Some(doc.root()));
        assert_eq!(doc.children(doc.document_element()), &[doc.head(), doc.body()]);
        assert!(doc.is_connected(doc.body()));
        assert!(!doc.has_pending_records());
    }

    #[test]
    fn test_append_records_mutation() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        assert!(!doc.is_connected(div));

        doc.append_child(doc.body(), div).unwrap();
        assert!(doc.is_connected(div));

        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].root, doc.root());
        assert_eq!(records[0].target(), doc.body());
        assert_eq!(records[0].added(), &[div]);
    }

    #[test]
    fn test_move_records_removal_then_addition() {
        let mut doc = Document::new();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(doc.body(), a).unwrap();
        doc.append_child(doc.body(), b).unwrap();
        doc.append_child(a, child).unwrap();
        doc.take_records();

        doc.append_child(b, child).unwrap();
        let records = doc.take_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].removed(), &[child]);
        assert_eq!(records[1].added(), &[child]);
        assert_eq!(doc.parent(child), Some(b));
        assert!(doc.children(a).is_empty());
    }

    #[test]
    fn test_cycle_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(matches!(
            doc.append_child(inner, outer),
            Err(CoreError::Hierarchy(_))
        ));
    }

    #[test]
    fn test_insert_adjacent_positions() {
        let mut doc = Document::new();
        let target = doc.create_element("section");
        let inside = doc.create_element("p");
        doc.append_child(doc.body(), target).unwrap();
        doc.append_child(target, inside).unwrap();

        let before = doc.create_element("i");
        let first = doc.create_element("b");
        let last = doc.create_element("u");
        let after = doc.create_element("s");
        doc.insert_adjacent(target, InsertPosition::BeforeBegin, before).unwrap();
        doc.insert_adjacent(target, InsertPosition::AfterBegin, first).unwrap();
        doc.insert_adjacent(target, InsertPosition::BeforeEnd, last).unwrap();
        doc.insert_adjacent(target, InsertPosition::AfterEnd, after).unwrap();

        assert_eq!(doc.children(doc.body()), &[before, target, after]);
        assert_eq!(doc.children(target), &[first, inside, last]);
    }

    #[test]
    fn test_insert_position_parse() {
        assert_eq!(InsertPosition::parse("BeforeEnd"), Some(InsertPosition::BeforeEnd));
        assert_eq!(InsertPosition::parse("middle"), None);
        assert_eq!(InsertPosition::AfterBegin.as_str(), "afterbegin");
    }

    #[test]
    fn test_shadow_root_connectedness() {
        let mut doc = Document::new();
        let host = doc.create_element("gs-widget");
        doc.append_child(doc.body(), host).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        assert_eq!(doc.attach_shadow(host).unwrap(), shadow);

        let inner = doc.create_element("div");
        doc.append_child(shadow, inner).unwrap();
        assert!(doc.is_connected(inner));
        assert_eq!(doc.root_of(inner), shadow);
        assert_eq!(doc.host(shadow), Some(host));
        assert!(doc.is_inclusive_ancestor(doc.body(), inner));

        doc.detach(host).unwrap();
        assert!(!doc.is_connected(inner));
    }

    #[test]
    fn test_composed_subtree_includes_shadow() {
        let mut doc = Document::new();
        let host = doc.create_element("gs-outer");
        let light = doc.create_element("span");
        doc.append_child(host, light).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let inner = doc.create_element("gs-inner");
        doc.append_child(shadow, inner).unwrap();

        let all = doc.composed_subtree(host);
        assert_eq!(all, vec![host, shadow, inner, light]);
        assert_eq!(doc.subtree(host), vec![host, light]);
    }

    #[test]
    fn test_release_frees_detached_subtree() {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(host, child).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let hidden = doc.create_element("b");
        doc.append_child(shadow, hidden).unwrap();

        // Shadow roots are released together with their host only.
        assert_eq!(doc.release(shadow), 0);
        // Attached nodes are never released.
        assert_eq!(doc.release(child), 0);

        assert_eq!(doc.release(host), 4);
        assert!(!doc.contains(host));
        assert!(!doc.contains(hidden));
        assert_eq!(doc.release(doc.root()), 0);
    }

    #[test]
    fn test_replace_children_single_record() {
        let mut doc = Document::new();
        let list = doc.create_element("ul");
        doc.append_child(doc.body(), list).unwrap();
        let old = doc.create_element("li");
        doc.append_child(list, old).unwrap();
        doc.take_records();

        let new_a = doc.create_element("li");
        let new_b = doc.create_element("li");
        doc.replace_children(list, &[new_a, new_b]).unwrap();

        let records = doc.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].removed(), &[old]);
        assert_eq!(records[0].added(), &[new_a, new_b]);
        assert_eq!(doc.parent(old), None);
    }

    #[test]
    fn test_listener_dedup() {
        let mut doc = Document::new();
        let cb = Callback::new(|_| {});
        let body = doc.body();
        assert!(doc.add_event_listener(body, "click", cb.clone(), ListenerOptions::default()));
        assert!(!doc.add_event_listener(body, "click", cb.clone(), ListenerOptions::default()));
        // Capture listeners are distinct registrations.
        assert!(doc.add_event_listener(body, "click", cb.clone(), ListenerOptions::capture()));
        assert_eq!(doc.listener_count(body, "click"), 2);

        assert!(doc.remove_event_listener(body, "click", &cb, false));
        assert!(!doc.remove_event_listener(body, "click", &cb, false));
        assert_eq!(doc.listener_count(body, "click"), 1);
    }

    #[test]
    fn test_event_path_composed() {
        let mut doc = Document::new();
        let host = doc.create_element("gs-widget");
        doc.append_child(doc.body(), host).unwrap();
        let shadow = doc.attach_shadow(host).unwrap();
        let inner = doc.create_element("button");
        doc.append_child(shadow, inner).unwrap();

        assert_eq!(doc.event_path(inner, false), vec![inner, shadow]);
        let composed = doc.event_path(inner, true);
        assert_eq!(composed[..3], [inner, shadow, host]);
        assert_eq!(*composed.last().unwrap(), doc.root());
    }
}
