//! Attribute names read by the lifecycle engine.

pub const ID: &str = "id";
/// Template source: `#selector`, inline HTML, namespace function or URL.
pub const TEMPLATE: &str = "template";
/// Render into the light DOM instead of a shadow root.
pub const FLAT: &str = "flat";
/// Injection directive `<mode>[@<target>]`.
pub const ANCHOR: &str = "anchor";
/// Alias of [`ANCHOR`].
pub const POSITION: &str = "position";
/// Namespace path of a ready handler.
pub const ONREADY: &str = "onready";

pub const ENVIRONMENT: &str = "environment";
pub const OS: &str = "os";
pub const BROWSER: &str = "browser";
pub const PROTOCOL: &str = "protocol";
pub const ORIENTATION: &str = "orientation";

pub const HIDDEN: &str = "hidden";

/// Back-reference from injected content to its owning component id.
pub const OWNER: &str = "data-gs-owner";
