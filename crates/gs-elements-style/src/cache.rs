//! Process-wide cache of constructed stylesheets.
//!
//! Sheets are keyed by id and shared (`Arc`) by every shadow root that
//! adopts them. [`StyleCache::styles`] returns the sheets sorted by id so
//! every shadow root adopts them in the same cascade order.

use std::collections::BTreeMap;
use std::sync::Arc;

use cssparser::{ParseError as CssParseError, ParseErrorKind, Parser, ParserInput, Token};
use gs_elements_core::logging::targets;
use gs_elements_core::{Signal, StyleSheet};
use parking_lot::RwLock;

use crate::{Error, Result};

/// A change to the cache contents.
#[derive(Debug, Clone)]
pub enum StyleChange {
    Added(Arc<StyleSheet>),
    Removed(Arc<StyleSheet>),
}

impl StyleChange {
    /// The affected sheet.
    pub fn sheet(&self) -> &Arc<StyleSheet> {
        match self {
            Self::Added(sheet) | Self::Removed(sheet) => sheet,
        }
    }

    /// Id of the affected sheet.
    pub fn id(&self) -> &str {
        self.sheet().id()
    }

    /// `"added"` or `"removed"`.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Removed(_) => "removed",
        }
    }
}

/// Id to stylesheet map with change notification.
pub struct StyleCache {
    sheets: RwLock<BTreeMap<String, Arc<StyleSheet>>>,
    changed: Signal<StyleChange>,
}

impl Default for StyleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            sheets: RwLock::new(BTreeMap::new()),
            changed: Signal::new(),
        }
    }

    /// Get the sheet for `id`, creating it from `css` if absent.
    ///
    /// An existing sheet is returned unchanged. Blank CSS is never stored
    /// and yields `None` when no sheet exists yet.
    pub fn get_or_set(&self, id: &str, css: &str) -> Option<Arc<StyleSheet>> {
        if let Some(existing) = self.get(id) {
            return Some(existing);
        }
        let sheet = Arc::new(StyleSheet::new(id, css));
        if sheet.is_empty() {
            tracing::trace!(target: targets::STYLE, id, "ignoring empty stylesheet");
            return None;
        }

        {
            let mut sheets = self.sheets.write();
            if let Some(existing) = sheets.get(id) {
                return Some(existing.clone());
            }
            sheets.insert(id.to_string(), sheet.clone());
        }
        tracing::debug!(target: targets::STYLE, id, "stylesheet added");
        self.changed.emit(StyleChange::Added(sheet.clone()));
        Some(sheet)
    }

    /// Validate `css` and then behave like [`get_or_set`](Self::get_or_set).
    pub fn load(&self, id: &str, css: &str) -> Result<Option<Arc<StyleSheet>>> {
        validate_css(id, css)?;
        Ok(self.get_or_set(id, css))
    }

    /// Get a sheet by id.
    pub fn get(&self, id: &str) -> Option<Arc<StyleSheet>> {
        self.sheets.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sheets.read().contains_key(id)
    }

    /// Remove a sheet, notifying listeners.
    pub fn remove(&self, id: &str) -> Option<Arc<StyleSheet>> {
        let removed = self.sheets.write().remove(id)?;
        tracing::debug!(target: targets::STYLE, id, "stylesheet removed");
        self.changed.emit(StyleChange::Removed(removed.clone()));
        Some(removed)
    }

    /// Remove every sheet, notifying listeners once per sheet.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.sheets.write());
        for sheet in removed.into_values() {
            self.changed.emit(StyleChange::Removed(sheet));
        }
    }

    /// All sheets, sorted by id.
    pub fn styles(&self) -> Vec<Arc<StyleSheet>> {
        self.sheets.read().values().cloned().collect()
    }

    /// All ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.sheets.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.read().is_empty()
    }

    /// Signal emitted after every addition or removal.
    pub fn changed(&self) -> &Signal<StyleChange> {
        &self.changed
    }
}

impl std::fmt::Debug for StyleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleCache").field("ids", &self.ids()).finish()
    }
}

/// Check CSS text for tokenizer-level errors.
///
/// Rejects unterminated strings, malformed `url()` tokens and unbalanced
/// closing brackets. Rule semantics are not checked.
pub fn validate_css(id: &str, css: &str) -> Result<()> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    scan_tokens(&mut parser).map_err(|err| {
        let message = match err.kind {
            ParseErrorKind::Custom(message) => message,
            ParseErrorKind::Basic(kind) => format!("{kind:?}"),
        };
        Error::parse(id, message, err.location.line + 1, err.location.column)
    })
}

fn scan_tokens<'i>(parser: &mut Parser<'i, '_>) -> std::result::Result<(), CssParseError<'i, String>> {
    loop {
        let location = parser.current_source_location();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::BadString(_) => {
                return Err(location.new_custom_error("unterminated string".to_string()));
            }
            Token::BadUrl(_) => {
                return Err(location.new_custom_error("malformed url()".to_string()));
            }
            Token::CloseCurlyBracket | Token::CloseParenthesis | Token::CloseSquareBracket => {
                return Err(location.new_custom_error("unbalanced closing bracket".to_string()));
            }
            Token::CurlyBracketBlock
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::Function(_) => {
                parser.parse_nested_block(|p| scan_tokens(p))?;
            }
            _ => {}
        }
    }
}
