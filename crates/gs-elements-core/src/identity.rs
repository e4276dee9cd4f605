//! Process-unique identifiers and string hash codes.
//!
//! Ids produced here are used as map keys by the event registry and as
//! auto-assigned element ids by the lifecycle engine.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default prefix for generated string ids.
pub const DEFAULT_ID_PREFIX: &str = "gs-";

/// Generator for unique numeric and string identifiers.
///
/// Each generator owns its own counter so that independent engines (and
/// tests) never observe each other's ids.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose string ids start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Get the next numeric id. Never returns 0.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Get the next string id (`<prefix><n>`).
    pub fn next_string(&self) -> String {
        format!("{}{}", self.prefix, self.next_id())
    }

    /// The prefix used for string ids.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX)
    }
}

/// Compute a 32-bit hash compatible with Java's `String.hashCode`.
///
/// Iterates UTF-16 code units computing `h = h * 31 + unit` with wrapping
/// arithmetic. The empty string hashes to 0.
pub fn hash_code(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |h, unit| (h << 5).wrapping_sub(h).wrapping_add(i32::from(unit)))
}

/// Hash the concatenation of several parts without allocating the joined string.
pub fn hash_parts(parts: &[&str]) -> i32 {
    parts
        .iter()
        .flat_map(|part| part.encode_utf16())
        .fold(0i32, |h, unit| (h << 5).wrapping_sub(h).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_code_empty() {
        assert_eq!(hash_code(""), 0);
    }

    #[test]
    fn test_hash_code_java_values() {
        assert_eq!(hash_code("a"), 97);
        assert_eq!(hash_code("hello"), 99162322);
        // Overflowing input wraps the same way the JVM does.
        assert_eq!(hash_code("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_hash_code_is_deterministic() {
        let first = hash_code("gs-12click");
        for _ in 0..10 {
            assert_eq!(hash_code("gs-12click"), first);
        }
        assert_ne!(hash_code("gs-12click"), hash_code("gs-13click"));
    }

    #[test]
    fn test_hash_code_known_collision() {
        // Java's hash has collisions; callers only rely on them being rare.
        assert_eq!(hash_code("Aa"), hash_code("BB"));
    }

    #[test]
    fn test_hash_parts_matches_concatenation() {
        assert_eq!(hash_parts(&["gs-1", "click", "7"]), hash_code("gs-1click7"));
        assert_eq!(hash_parts(&[]), 0);
    }

    #[test]
    fn test_id_generator() {
        let ids = IdGenerator::default();
        let a = ids.next_string();
        let b = ids.next_string();
        assert!(a.starts_with("gs-"));
        assert_ne!(a, b);
        assert!(ids.next_id() > 0);

        let custom = IdGenerator::new("w");
        assert_eq!(custom.next_string(), "w1");
        assert_eq!(custom.prefix(), "w");
    }
}
