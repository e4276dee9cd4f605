//! Error types for gs-elements core systems.

use crate::dom::NodeId;

/// The main error type for core DOM and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The node ID is invalid or the node has been released.
    #[error("Invalid or released node {0:?}")]
    InvalidNode(NodeId),

    /// The operation requires an element node.
    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    /// The requested tree change would produce an invalid hierarchy.
    #[error("Hierarchy request error: {0}")]
    Hierarchy(String),

    /// Selector parsing error.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// A value could not be serialized to JSON.
    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl CoreError {
    /// Create a hierarchy error.
    pub fn hierarchy(message: impl Into<String>) -> Self {
        Self::Hierarchy(message.into())
    }

    /// Create a selector error.
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }
}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
