//! In-process DOM.
//!
//! A [`Document`] is an arena of nodes with shadow roots, attributes,
//! native event listeners and a mutation record queue. [`Dom`] is the
//! shared, lockable handle the rest of the crate passes around.
//!
//! # Locking
//!
//! Listener callbacks never run while the document lock is held. Event
//! dispatch collects the callbacks for a node under the lock, releases it,
//! and only then invokes them, so listeners are free to mutate the tree.

mod attributes;
mod document;
mod event;
mod html;
mod mutation;
mod node;
mod selector;

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::logging::targets;

pub use document::{Document, InsertPosition};
pub use event::{
    Callback, COMPONENT_READY_EVENT, Event, EventPhase, ListenerOptions, ORIENTATION_EVENT,
    READY_EVENT, STYLE_EVENT,
};
pub use mutation::{MutationKind, MutationRecord};
pub use node::{Attribute, ElementData, Node, NodeData, NodeId, ShadowRootData, StyleSheet};
pub use selector::{
    AttributeOp, AttributeSelector, Combinator, Selector, SelectorList, SelectorPart, TypeSelector,
};

/// Shared handle to a [`Document`].
#[derive(Clone, Default)]
pub struct Dom {
    inner: Arc<RwLock<Document>>,
}

impl Dom {
    /// Create a handle over a fresh document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing document.
    pub fn from_document(document: Document) -> Self {
        Self {
            inner: Arc::new(RwLock::new(document)),
        }
    }

    /// Execute a function with read access to the document.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Document) -> R,
    {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Execute a function with write access to the document.
    pub fn with_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Document) -> R,
    {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    /// Whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Dom) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the document alive.
    ///
    /// Listeners stored inside the document capture this instead of a
    /// [`Dom`] so the document does not own itself.
    pub fn downgrade(&self) -> WeakDom {
        WeakDom {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Dispatch an event to `target`.
    ///
    /// Runs capture listeners from the outermost ancestor down, then every
    /// listener on the target, then (for bubbling events) non-capture
    /// listeners back up the path. Returns the number of listeners invoked.
    pub fn dispatch_event(&self, target: NodeId, event: &Event) -> usize {
        let path = self.with_read(|doc| doc.event_path(target, event.composed()));
        if path.is_empty() {
            return 0;
        }

        event.begin_dispatch(target);
        let mut invoked = 0;

        for &node in path.iter().skip(1).rev() {
            invoked += self.invoke_listeners(node, event, EventPhase::Capturing);
            if event.is_propagation_stopped() {
                event.finish_dispatch();
                return invoked;
            }
        }

        invoked += self.invoke_listeners(target, event, EventPhase::AtTarget);

        if event.bubbles() {
            for &node in path.iter().skip(1) {
                if event.is_propagation_stopped() {
                    break;
                }
                invoked += self.invoke_listeners(node, event, EventPhase::Bubbling);
            }
        }

        event.finish_dispatch();
        tracing::trace!(
            target: targets::EVENTS,
            kind = event.kind(),
            invoked,
            "dispatched event"
        );
        invoked
    }

    fn invoke_listeners(&self, node: NodeId, event: &Event, phase: EventPhase) -> usize {
        let callbacks = self.with_write(|doc| doc.take_listeners_for(node, event.kind(), phase));
        if callbacks.is_empty() {
            return 0;
        }
        event.enter(node, phase);
        let mut invoked = 0;
        for callback in callbacks {
            if event.is_immediate_propagation_stopped() {
                break;
            }
            callback.call(event);
            invoked += 1;
        }
        invoked
    }
}

/// Non-owning counterpart of [`Dom`].
#[derive(Clone, Default)]
pub struct WeakDom {
    inner: Weak<RwLock<Document>>,
}

impl WeakDom {
    /// Get a [`Dom`] if the document still exists.
    pub fn upgrade(&self) -> Option<Dom> {
        self.inner.upgrade().map(|inner| Dom { inner })
    }
}

impl std::fmt::Debug for WeakDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakDom")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl std::fmt::Debug for Dom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dom").field(&*self.inner.read()).finish()
    }
}
