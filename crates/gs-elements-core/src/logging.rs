//! Logging and debugging facilities for gs-elements.
//!
//! This module provides:
//! - Target and span names for filtering `tracing` output by subsystem
//! - Debug visualization for DOM trees, including shadow roots
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! gs-elements uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("gs_elements=debug,gs_elements_core::events=trace")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```ignore
//! use gs_elements_core::logging::DomTreeDebug;
//!
//! let text = dom.with_read(|doc| DomTreeDebug::new().format_subtree(doc, doc.body()));
//! println!("{text}");
//! ```

use std::fmt::Write as FmtWrite;

use crate::dom::{Document, NodeData, NodeId};

/// Span names used throughout gs-elements for tracing.
pub mod span_names {
    /// One scheduler tick.
    pub const TICK: &str = "gs_elements::tick";
    /// Component render.
    pub const RENDER: &str = "gs_elements::render";
    /// Mutation dispatch.
    pub const MUTATION: &str = "gs_elements::mutation";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core systems target.
    pub const CORE: &str = "gs_elements_core";
    /// DOM tree and parsing target.
    pub const DOM: &str = "gs_elements_core::dom";
    /// Native event dispatch and the event registry.
    pub const EVENTS: &str = "gs_elements_core::events";
    /// Mutation dispatcher target.
    pub const MUTATION: &str = "gs_elements_core::mutation";
    /// Signal emission target.
    pub const SIGNAL: &str = "gs_elements_core::signal";
    /// Component lifecycle target.
    pub const LIFECYCLE: &str = "gs_elements::lifecycle";
    /// Component registry target.
    pub const REGISTRY: &str = "gs_elements::registry";
    /// Template loading target.
    pub const TEMPLATE: &str = "gs_elements::template";
    /// Style cache target.
    pub const STYLE: &str = "gs_elements_style";
    /// Performance spans.
    pub const PERF: &str = "gs_elements::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
}

/// Configuration for DOM tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    pub style: TreeStyle,
    /// Whether to show node ids.
    pub show_ids: bool,
    /// Whether to show element attributes.
    pub show_attributes: bool,
    /// Whether to descend into shadow roots.
    pub show_shadow: bool,
    /// Whether to show text and comment nodes.
    pub show_text: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: false,
            show_attributes: true,
            show_shadow: true,
            show_text: false,
            max_depth: None,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_ids: true,
            show_text: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output: tags only, light DOM only.
    pub fn minimal() -> Self {
        Self {
            show_attributes: false,
            show_shadow: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing DOM trees.
#[derive(Debug, Clone, Default)]
pub struct DomTreeDebug {
    options: TreeFormatOptions,
}

impl DomTreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format a subtree starting from `root`.
    pub fn format_subtree(&self, document: &Document, root: NodeId) -> String {
        let mut output = String::new();
        self.format_into(document, root, 0, &mut Vec::new(), &mut output);
        output
    }

    fn format_into(
        &self,
        document: &Document,
        id: NodeId,
        depth: usize,
        last_flags: &mut Vec<bool>,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }
        let Some(node) = document.node(id) else {
            return;
        };

        let label = match node.data() {
            NodeData::Document => "#document".to_string(),
            NodeData::ShadowRoot(_) => "#shadow-root".to_string(),
            NodeData::Text(text) if self.options.show_text => format!("#text {:?}", text),
            NodeData::Comment(text) if self.options.show_text => format!("<!--{}-->", text),
            NodeData::Text(_) | NodeData::Comment(_) => return,
            NodeData::Element(element) => {
                let mut label = format!("<{}", element.tag);
                if self.options.show_attributes {
                    for attr in &element.attrs {
                        let _ = write!(label, " {}=\"{}\"", attr.name, attr.value);
                    }
                }
                label.push('>');
                label
            }
        };

        output.push_str(&self.build_prefix(last_flags));
        output.push_str(&label);
        if self.options.show_ids {
            let _ = write!(output, " [{:?}]", id);
        }
        output.push('\n');

        let mut children: Vec<NodeId> = Vec::new();
        if self.options.show_shadow {
            children.extend(document.shadow_root(id));
        }
        children.extend(document.children(id).iter().copied().filter(|&c| {
            self.options.show_text || document.is_element(c)
        }));

        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            last_flags.push(i + 1 == count);
            self.format_into(document, child, depth + 1, last_flags, output);
            last_flags.pop();
        }
    }

    fn build_prefix(&self, last_flags: &[bool]) -> String {
        let Some((&is_last, parents)) = last_flags.split_last() else {
            return String::new();
        };
        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|   ", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}   ", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
        };

        let mut prefix = String::new();
        for &parent_last in parents {
            prefix.push_str(if parent_last { "    " } else { branch });
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
