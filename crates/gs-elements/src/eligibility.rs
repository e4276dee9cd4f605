//! Render gating against the simulated environment.
//!
//! A component renders only when every filter attribute it carries
//! (`environment`, `os`, `browser`, `protocol`) lists the current value.
//! Lists are comma or space separated and compared case-insensitively; an
//! absent or blank attribute matches anything.

use gs_elements_core::{Document, Environment, NodeId, Orientation};

use crate::attrs;

/// Whether `element` may render in `env`.
pub fn is_eligible(doc: &Document, element: NodeId, env: &Environment) -> bool {
    list_matches(doc.attr(element, attrs::ENVIRONMENT), env.device.as_str())
        && list_matches(doc.attr(element, attrs::OS), &env.os)
        && list_matches(doc.attr(element, attrs::BROWSER), &env.browser)
        && protocol_matches(doc.attr(element, attrs::PROTOCOL), &env.protocol)
}

/// Whether `actual` appears in a comma/space separated list.
pub fn list_matches(list: Option<&str>, actual: &str) -> bool {
    let mut entries = split_list(list).peekable();
    if entries.peek().is_none() {
        return true;
    }
    entries.any(|entry| entry.eq_ignore_ascii_case(actual))
}

/// Like [`list_matches`], ignoring a trailing `:` on either side.
pub fn protocol_matches(list: Option<&str>, actual: &str) -> bool {
    let actual = actual.trim_end_matches(':');
    let mut entries = split_list(list).peekable();
    if entries.peek().is_none() {
        return true;
    }
    entries.any(|entry| entry.trim_end_matches(':').eq_ignore_ascii_case(actual))
}

/// Whether a component restricted to `value` is visible in `current`.
///
/// Unknown values never hide the component.
pub fn orientation_matches(value: Option<&str>, current: Orientation) -> bool {
    match value.and_then(Orientation::parse) {
        Some(wanted) => wanted == current,
        None => true,
    }
}

fn split_list(list: Option<&str>) -> impl Iterator<Item = &str> {
    list.unwrap_or_default()
        .split([',', ' ', '\t', '\n'])
        .filter(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_elements_core::Device;

    #[test]
    fn test_list_matching() {
        assert!(list_matches(None, "desktop"));
        assert!(list_matches(Some("  "), "desktop"));
        assert!(list_matches(Some("mobile, Desktop"), "desktop"));
        assert!(list_matches(Some("mobile tablet"), "tablet"));
        assert!(!list_matches(Some("mobile,tablet"), "desktop"));
    }

    #[test]
    fn test_protocol_colon_optional() {
        assert!(protocol_matches(Some("https:"), "https"));
        assert!(protocol_matches(Some("http https"), "https:"));
        assert!(!protocol_matches(Some("file:"), "https"));
    }

    #[test]
    fn test_orientation() {
        assert!(orientation_matches(None, Orientation::Portrait));
        assert!(orientation_matches(Some("portrait"), Orientation::Portrait));
        assert!(!orientation_matches(Some("portrait"), Orientation::Landscape));
        assert!(orientation_matches(Some("sideways"), Orientation::Landscape));
    }

    #[test]
    fn test_element_eligibility() {
        let mut doc = Document::new();
        let el = doc.create_element("gs-widget");
        doc.set_attr(el, "environment", "mobile").unwrap();
        doc.set_attr(el, "browser", "chrome,firefox").unwrap();

        let desktop = Environment::default();
        let mobile = Environment::default().with_device(Device::Mobile);
        assert!(!is_eligible(&doc, el, &desktop));
        assert!(is_eligible(&doc, el, &mobile));

        doc.set_attr(el, "protocol", "file:").unwrap();
        assert!(!is_eligible(&doc, el, &mobile));
        assert!(is_eligible(&doc, el, &mobile.with_protocol("file:")));
    }
}
