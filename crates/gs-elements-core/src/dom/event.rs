//! DOM events and listener callbacks.

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use super::NodeId;

/// Custom event fired when a component finished its first render.
pub const READY_EVENT: &str = "ready";
/// Custom event fired on `document.body` when any component becomes ready.
pub const COMPONENT_READY_EVENT: &str = "componentready";
/// Custom event fired on the document root when the style cache changes.
pub const STYLE_EVENT: &str = "gs-style";
/// Event fired on the document root when the device orientation changes.
pub const ORIENTATION_EVENT: &str = "orientationchange";

/// Phase of event propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// A DOM event.
///
/// Propagation state lives in cells so listeners can stop propagation
/// through a shared reference.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    detail: Option<Value>,
    bubbles: bool,
    composed: bool,
    target: Cell<Option<NodeId>>,
    current_target: Cell<Option<NodeId>>,
    phase: Cell<EventPhase>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

impl Event {
    /// Create a plain, non-bubbling event.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: None,
            bubbles: false,
            composed: false,
            target: Cell::new(None),
            current_target: Cell::new(None),
            phase: Cell::new(EventPhase::None),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
        }
    }

    /// Create a custom event carrying a detail payload.
    pub fn custom(kind: impl Into<String>, detail: impl Into<Value>) -> Self {
        let mut event = Self::new(kind);
        event.detail = Some(detail.into());
        event
    }

    /// Set whether the event bubbles.
    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    /// Set whether the event crosses shadow root boundaries.
    pub fn with_composed(mut self, composed: bool) -> Self {
        self.composed = composed;
        self
    }

    /// The event type name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The detail payload.
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// The detail payload when it is a string.
    pub fn detail_str(&self) -> Option<&str> {
        self.detail.as_ref().and_then(Value::as_str)
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn composed(&self) -> bool {
        self.composed
    }

    /// The node the event was dispatched to.
    pub fn target(&self) -> Option<NodeId> {
        self.target.get()
    }

    /// The node whose listener is currently running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target.get()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    /// Stop propagation to further nodes.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Stop propagation, including remaining listeners on the current node.
    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub(crate) fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub(crate) fn begin_dispatch(&self, target: NodeId) {
        self.target.set(Some(target));
        self.propagation_stopped.set(false);
        self.immediate_propagation_stopped.set(false);
    }

    pub(crate) fn enter(&self, node: NodeId, phase: EventPhase) {
        self.current_target.set(Some(node));
        self.phase.set(phase);
    }

    pub(crate) fn finish_dispatch(&self) {
        self.current_target.set(None);
        self.phase.set(EventPhase::None);
    }
}

struct CallbackInner {
    id: OnceLock<u64>,
    func: Box<dyn Fn(&Event) + Send + Sync>,
}

/// A shareable event callback with a stable identity.
///
/// Clones share identity: two clones compare equal and carry the same
/// lazily assigned id. Two callbacks built from separate closures are
/// always distinct, even if the closures have identical bodies.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackInner>,
}

impl Callback {
    /// Wrap a closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CallbackInner {
                id: OnceLock::new(),
                func: Box::new(func),
            }),
        }
    }

    /// Invoke the callback.
    pub fn call(&self, event: &Event) {
        (self.inner.func)(event)
    }

    /// The assigned id, if one has been assigned yet.
    pub fn id(&self) -> Option<u64> {
        self.inner.id.get().copied()
    }

    /// Get the id, assigning one with `init` the first time.
    pub fn id_or_init(&self, init: impl FnOnce() -> u64) -> u64 {
        *self.inner.id.get_or_init(init)
    }

    /// Whether both handles refer to the same callback.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id()).finish()
    }
}

/// Options for [`Document::add_event_listener`](super::Document::add_event_listener).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Invoke during the capture phase.
    pub capture: bool,
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            once: false,
        }
    }

    pub fn once() -> Self {
        Self {
            capture: false,
            once: true,
        }
    }
}

/// A listener attached to a node.
#[derive(Debug, Clone)]
pub(crate) struct NativeListener {
    pub kind: String,
    pub callback: Callback,
    pub options: ListenerOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callback_identity() {
        let a = Callback::new(|_| {});
        let b = Callback::new(|_| {});
        let a2 = a.clone();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(a.id(), None);
        assert_eq!(a.id_or_init(|| 7), 7);
        assert_eq!(a2.id(), Some(7));
        // Already assigned; the initializer is not used again.
        assert_eq!(a2.id_or_init(|| 99), 7);
    }

    #[test]
    fn test_callback_call() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let cb = Callback::new(move |e| {
            assert_eq!(e.kind(), "click");
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        cb.call(&Event::new("click"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_event_detail() {
        let event = Event::custom(READY_EVENT, "w1").with_bubbles(true);
        assert_eq!(event.kind(), "ready");
        assert_eq!(event.detail_str(), Some("w1"));
        assert!(event.bubbles());
        assert!(!event.composed());
    }

    #[test]
    fn test_stop_propagation() {
        let event = Event::new("x");
        assert!(!event.is_propagation_stopped());
        event.stop_immediate_propagation();
        assert!(event.is_propagation_stopped());
        assert!(event.is_immediate_propagation_stopped());
    }
}
