//! Injection plans: where a component's rendered template goes.
//!
//! The `anchor` (or `position`) attribute is parsed once into an
//! [`InjectionPlan`] of the form `<mode>[@<target>]`, and the plan plus the
//! component's `flat` flag select one [`Topology`].
//!
//! | anchor              | topology     | result                                      |
//! |---------------------|--------------|---------------------------------------------|
//! | none, not flat      | `Shadow`     | template in the element's shadow root       |
//! | none, flat / `self` | `FlatSelf`   | template replaces the element's children    |
//! | `parent`            | `FlatParent` | template appended to the element's parent   |
//! | `unwrap@…`          | `Unwrap`     | template spliced in before the target       |
//! | anything else       | `Proxy`      | template wrapped and placed at the target   |

use std::fmt;
use std::str::FromStr;

use gs_elements_core::{Document, InsertPosition, NodeId};

use crate::error::{ElementsError, Result};

/// How the rendered content is placed relative to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMode {
    /// Inside the target.
    SelfNode,
    /// Inside the target's parent.
    Parent,
    /// In place of a container, directly before the target.
    Unwrap,
    /// At an `insertAdjacentElement` position of the target.
    Adjacent(InsertPosition),
}

/// The node the mode is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionTarget {
    /// The component element itself.
    SelfNode,
    /// The component element's parent.
    Parent,
    /// The first element matching a CSS selector.
    Selector(String),
}

/// A parsed `anchor` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPlan {
    pub mode: InjectionMode,
    pub target: InjectionTarget,
}

/// The mounting topology selected for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Shadow,
    FlatSelf,
    FlatParent,
    Unwrap,
    Proxy,
}

impl Topology {
    /// Select the topology for an optional plan and the `flat` flag.
    pub fn select(plan: Option<&InjectionPlan>, flat: bool) -> Self {
        let Some(plan) = plan else {
            return if flat { Self::FlatSelf } else { Self::Shadow };
        };
        match (&plan.mode, &plan.target) {
            (InjectionMode::SelfNode, InjectionTarget::SelfNode) => Self::FlatSelf,
            (InjectionMode::Parent, InjectionTarget::SelfNode) => Self::FlatParent,
            (InjectionMode::Unwrap, _) => Self::Unwrap,
            _ => Self::Proxy,
        }
    }

    /// Whether the component renders into its own shadow root.
    pub fn is_shadow(&self) -> bool {
        matches!(self, Self::Shadow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::FlatSelf => "flat-self",
            Self::FlatParent => "flat-parent",
            Self::Unwrap => "unwrap",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InjectionPlan {
    /// Parse `<mode>[@<target>]`. The target defaults to `self`.
    ///
    /// Everything after the first `@` is the target, so selectors may
    /// contain `@` themselves.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (mode, target) = match value.split_once('@') {
            Some((mode, target)) => (mode.trim(), target.trim()),
            None => (value, ""),
        };

        let mode = match mode.to_ascii_lowercase().as_str() {
            "self" => InjectionMode::SelfNode,
            "parent" => InjectionMode::Parent,
            "unwrap" => InjectionMode::Unwrap,
            other => InjectionMode::Adjacent(InsertPosition::parse(other).ok_or_else(|| {
                ElementsError::invalid_anchor(value, format!("unknown mode '{mode}'"))
            })?),
        };

        let target = match target {
            "" | "self" => InjectionTarget::SelfNode,
            "parent" => InjectionTarget::Parent,
            selector => InjectionTarget::Selector(selector.to_string()),
        };

        Ok(Self { mode, target })
    }

    /// Read the plan from an element's `anchor` or `position` attribute.
    ///
    /// A missing or blank attribute yields `None`.
    pub fn from_element(doc: &Document, element: NodeId) -> Result<Option<Self>> {
        let value = doc
            .attr(element, crate::attrs::ANCHOR)
            .or_else(|| doc.attr(element, crate::attrs::POSITION))
            .map(str::trim)
            .filter(|v| !v.is_empty());
        value.map(Self::parse).transpose()
    }

    /// Resolve the target node for `element`.
    ///
    /// Selectors are looked up in the element's own tree first (so a
    /// component inside a shadow root can target its siblings), then in the
    /// document.
    pub fn resolve_target(&self, doc: &Document, element: NodeId) -> Option<NodeId> {
        match &self.target {
            InjectionTarget::SelfNode => Some(element),
            InjectionTarget::Parent => doc.parent(element),
            InjectionTarget::Selector(selector) => {
                let local = doc.root_of(element);
                let found = doc.query_selector(local, selector).ok().flatten();
                if found.is_some() || local == doc.root() {
                    return found;
                }
                doc.query_selector(doc.root(), selector).ok().flatten()
            }
        }
    }

    /// Place a prepared node relative to `target` according to the mode.
    ///
    /// `Unwrap` inserts before the target like `beforebegin`.
    pub fn place(&self, doc: &mut Document, target: NodeId, node: NodeId) -> Result<()> {
        match self.mode {
            InjectionMode::SelfNode => doc.append_child(target, node)?,
            InjectionMode::Parent => {
                let parent = doc.parent(target).ok_or_else(|| {
                    ElementsError::Core(gs_elements_core::CoreError::hierarchy(
                        "injection target has no parent",
                    ))
                })?;
                doc.append_child(parent, node)?;
            }
            InjectionMode::Unwrap => doc.insert_adjacent(target, InsertPosition::BeforeBegin, node)?,
            InjectionMode::Adjacent(position) => doc.insert_adjacent(target, position, node)?,
        }
        Ok(())
    }
}

impl FromStr for InjectionPlan {
    type Err = ElementsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for InjectionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            InjectionMode::SelfNode => f.write_str("self")?,
            InjectionMode::Parent => f.write_str("parent")?,
            InjectionMode::Unwrap => f.write_str("unwrap")?,
            InjectionMode::Adjacent(position) => f.write_str(position.as_str())?,
        }
        match &self.target {
            InjectionTarget::SelfNode => f.write_str("@self"),
            InjectionTarget::Parent => f.write_str("@parent"),
            InjectionTarget::Selector(selector) => write!(f, "@{selector}"),
        }
    }
}
