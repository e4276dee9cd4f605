//! Error types for the lifecycle engine.

use std::time::Duration;

use gs_elements_core::CoreError;

/// Errors surfaced by the lifecycle engine and its registries.
///
/// Only configuration mistakes are fatal. Ineligible components and
/// unresolvable templates degrade silently and never produce an error.
#[derive(Debug, thiserror::Error)]
pub enum ElementsError {
    /// A DOM or registry operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A stylesheet failed validation.
    #[error(transparent)]
    Style(#[from] gs_elements_style::Error),

    /// The injection target of a flat component does not exist.
    #[error("Cannot inject <{tag} id=\"{id}\">: target '{target}' not found")]
    InjectionTarget {
        tag: String,
        id: String,
        target: String,
    },

    /// An `anchor`/`position` attribute could not be parsed.
    #[error("Invalid anchor '{value}': {message}")]
    InvalidAnchor { value: String, message: String },

    /// A custom element tag was defined twice.
    #[error("Custom element '{0}' is already defined")]
    AlreadyDefined(String),

    /// A custom element tag is not a valid name.
    #[error("Invalid custom element name '{0}'")]
    InvalidTagName(String),

    /// The configured base URL or a template URL is malformed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Fetching a template failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A fetcher had nothing to serve for a URL.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// A waiter gave up.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The component went offline before the operation completed.
    #[error("Component '{0}' is offline")]
    Offline(String),

    /// The engine or registry was dropped while a waiter was pending.
    #[error("Operation cancelled")]
    Cancelled,

    /// `settle` kept finding work.
    #[error("Engine did not settle within {0} ticks")]
    SettleLimit(usize),
}

impl ElementsError {
    /// Create an anchor parse error.
    pub fn invalid_anchor(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAnchor {
            value: value.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a markup/configuration mistake the engine
    /// reports loudly.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InjectionTarget { .. }
                | Self::InvalidAnchor { .. }
                | Self::AlreadyDefined(_)
                | Self::InvalidTagName(_)
        )
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ElementsError>;
