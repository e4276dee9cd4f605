//! Shared stylesheet cache for gs-elements.
//!
//! Components rendered into shadow roots adopt constructed stylesheets
//! instead of copying `<style>` text into every root. This crate holds the
//! process-wide set of those sheets:
//!
//! - **Cache**: id to stylesheet map that only stores non-empty sheets
//! - **Ordering**: [`StyleCache::styles`] is sorted by id, giving every
//!   shadow root the same cascade order
//! - **Notification**: additions and removals are published on
//!   [`StyleCache::changed`] so live components can re-adopt
//!
//! # Example
//!
//! ```
//! use gs_elements_style::StyleCache;
//!
//! let cache = StyleCache::new();
//! cache.changed().connect(|change| println!("{} {}", change.action(), change.id()));
//!
//! cache.get_or_set("theme", ":host { font-family: sans-serif }");
//! cache.get_or_set("grid", ".row { display: flex }");
//! assert_eq!(cache.ids(), vec!["grid", "theme"]);
//!
//! cache.remove("grid");
//! ```

mod cache;
mod error;

pub use cache::{StyleCache, StyleChange, validate_css};
pub use error::{Error, Result};
