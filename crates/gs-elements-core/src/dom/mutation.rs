//! Mutation records produced by tree and attribute changes.

use super::NodeId;

/// What changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added to or removed from `target`.
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    /// An attribute of `target` was set or removed.
    Attributes {
        target: NodeId,
        name: String,
        old_value: Option<String>,
    },
}

/// A single mutation, tagged with the tree root it happened under.
///
/// `root` is the document node for light-DOM changes and the shadow root
/// for changes inside a shadow tree, captured when the change was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub root: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    /// The node whose children or attributes changed.
    pub fn target(&self) -> NodeId {
        match &self.kind {
            MutationKind::ChildList { target, .. } | MutationKind::Attributes { target, .. } => {
                *target
            }
        }
    }

    /// Nodes added by this record.
    pub fn added(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { added, .. } => added,
            MutationKind::Attributes { .. } => &[],
        }
    }

    /// Nodes removed by this record.
    pub fn removed(&self) -> &[NodeId] {
        match &self.kind {
            MutationKind::ChildList { removed, .. } => removed,
            MutationKind::Attributes { .. } => &[],
        }
    }
}
