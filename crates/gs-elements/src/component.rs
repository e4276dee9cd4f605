//! The component trait every custom element implements.

use std::sync::Arc;

use crate::context::ComponentContext;

/// Behavior of a custom element.
///
/// The engine owns the mount algorithm (gating, template resolution,
/// injection, readiness, teardown); implementations only override the
/// hooks below. Hooks take `&self`, so components that keep state use
/// interior mutability.
pub trait Component: Send + Sync + 'static {
    // =========================================================================
    // Configuration
    // =========================================================================

    /// Attributes whose changes are forwarded to
    /// [`on_attribute_changed`](Self::on_attribute_changed).
    fn observed_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    /// Template used when the element has no `template` attribute.
    ///
    /// The value is resolved like the attribute (selector, inline HTML,
    /// namespace function or URL).
    fn default_template(&self) -> Option<String> {
        None
    }

    /// Render into the light DOM when the element has no `flat` attribute.
    fn flat(&self) -> bool {
        false
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Called once, after the first render, before the `ready` event fires.
    fn on_ready(&self, _ctx: &ComponentContext) {}

    /// Called on the frame after one or more observed attributes changed.
    ///
    /// Changes made before the first render are never forwarded. Several
    /// changes to one attribute within a frame arrive as a single call with
    /// the oldest old value and the current value.
    fn on_attribute_changed(
        &self,
        _ctx: &ComponentContext,
        _name: &str,
        _old_value: Option<&str>,
        _new_value: Option<&str>,
    ) {
    }

    /// Called after teardown, once the component is offline.
    fn on_disconnected(&self, _ctx: &ComponentContext) {}
}

/// A component with no behavior of its own; renders its template.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicComponent;

impl Component for BasicComponent {}

/// Creates a component instance for each upgraded element.
pub(crate) type ComponentFactory = Arc<dyn Fn() -> Arc<dyn Component> + Send + Sync>;
