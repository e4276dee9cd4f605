//! Deduplicating event listener registry.
//!
//! Listeners are registered on behalf of an *owner* (normally a component
//! element) so the owner can drop everything it registered in one call.
//! Registrations are keyed by hash codes:
//!
//! - the *group key* hashes `element id + event name`
//! - the *specific key* hashes `element id + event name + callback id`
//!
//! Element ids are stored in the `data-gs-eid` attribute the first time an
//! element takes part; callback ids live inside the [`Callback`] itself.
//! Storage is `owner -> group key -> specific key -> record`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::dom::{Callback, Dom, ListenerOptions, NodeData, NodeId};
use crate::logging::targets;
use crate::identity::{IdGenerator, hash_parts};

/// Attribute holding an element's registry id.
pub const ELEMENT_ID_ATTR: &str = "data-gs-eid";

#[derive(Debug)]
struct ListenerRecord {
    element: NodeId,
    event: String,
    /// The callback handed to the DOM; unique per registration.
    native: Callback,
    capture: bool,
}

type GroupMap = HashMap<i32, HashMap<i32, ListenerRecord>>;

struct Inner {
    dom: Dom,
    ids: Arc<IdGenerator>,
    owners: Mutex<HashMap<NodeId, GroupMap>>,
}

/// Shared handle to an event registry.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<Inner>,
}

impl EventRegistry {
    /// Create a registry over `dom`, drawing ids from `ids`.
    pub fn new(dom: Dom, ids: Arc<IdGenerator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dom,
                ids,
                owners: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register `callback` for `event` on `element` on behalf of `owner`.
    ///
    /// Registering the same (owner, element, event, callback) again is a
    /// no-op. With `once`, the listener removes itself after its first call.
    /// Returns `false` if `element` is missing or cannot receive events.
    pub fn attach(
        &self,
        owner: NodeId,
        element: NodeId,
        event: &str,
        callback: &Callback,
        once: bool,
        capture: bool,
    ) -> bool {
        let Some(element_id) = self.element_id(element, true) else {
            tracing::trace!(
                target: targets::EVENTS,
                ?element,
                event,
                "rejected listener on missing or non-target node"
            );
            return false;
        };
        let callback_id = callback
            .id_or_init(|| self.inner.ids.next_id())
            .to_string();
        let group = hash_parts(&[&element_id, event]);
        let specific = hash_parts(&[&element_id, event, &callback_id]);

        let native = self.native_callback(owner, element, event, callback, once);
        {
            let mut owners = self.inner.owners.lock();
            let specifics = owners
                .entry(owner)
                .or_default()
                .entry(group)
                .or_default();
            if specifics.contains_key(&specific) {
                return true;
            }
            specifics.insert(
                specific,
                ListenerRecord {
                    element,
                    event: event.to_string(),
                    native: native.clone(),
                    capture,
                },
            );
        }

        self.inner.dom.with_write(|doc| {
            doc.add_event_listener(element, event, native, ListenerOptions { capture, once })
        });
        tracing::trace!(
            target: targets::EVENTS,
            ?owner,
            element = %element_id,
            event,
            group,
            specific,
            once,
            "attached listener"
        );
        true
    }

    /// Remove listeners registered by `owner` for `event` on `element`.
    ///
    /// With `callback`, only that registration is removed; without it, every
    /// callback in the element+event group goes. Returns the number removed.
    pub fn remove(
        &self,
        owner: NodeId,
        element: NodeId,
        event: &str,
        callback: Option<&Callback>,
    ) -> usize {
        let Some(element_id) = self.element_id(element, false) else {
            return 0;
        };
        let group = hash_parts(&[&element_id, event]);

        let removed: Vec<ListenerRecord> = {
            let mut owners = self.inner.owners.lock();
            let Some(groups) = owners.get_mut(&owner) else {
                return 0;
            };
            let removed = match callback {
                Some(callback) => {
                    let Some(callback_id) = callback.id() else {
                        return 0;
                    };
                    let specific = hash_parts(&[&element_id, event, &callback_id.to_string()]);
                    let record = groups.get_mut(&group).and_then(|g| g.remove(&specific));
                    if groups.get(&group).is_some_and(HashMap::is_empty) {
                        groups.remove(&group);
                    }
                    record.into_iter().collect()
                }
                None => groups
                    .remove(&group)
                    .map(|g| g.into_values().collect())
                    .unwrap_or_default(),
            };
            if groups.is_empty() {
                owners.remove(&owner);
            }
            removed
        };

        self.remove_native(&removed);
        removed.len()
    }

    /// Remove every listener registered by `owner` and forget the owner.
    pub fn detach_all(&self, owner: NodeId) -> usize {
        let removed: Vec<ListenerRecord> = self
            .inner
            .owners
            .lock()
            .remove(&owner)
            .map(|groups| groups.into_values().flat_map(HashMap::into_values).collect())
            .unwrap_or_default();
        self.remove_native(&removed);
        if !removed.is_empty() {
            tracing::trace!(
                target: targets::EVENTS,
                ?owner,
                count = removed.len(),
                "detached all listeners"
            );
        }
        removed.len()
    }

    /// Whether the owner has any registered listeners.
    pub fn has_owner(&self, owner: NodeId) -> bool {
        self.inner.owners.lock().contains_key(&owner)
    }

    /// Number of owners with at least one listener.
    pub fn owner_count(&self) -> usize {
        self.inner.owners.lock().len()
    }

    /// Number of listeners registered by `owner`.
    pub fn listener_count(&self, owner: NodeId) -> usize {
        self.inner
            .owners
            .lock()
            .get(&owner)
            .map(|groups| groups.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// The DOM this registry attaches to.
    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    /// Registry id of `element`, assigning one when `assign` is set.
    ///
    /// Document and shadow root nodes have no attributes; their id is
    /// derived from the node handle.
    fn element_id(&self, element: NodeId, assign: bool) -> Option<String> {
        self.inner.dom.with_write(|doc| {
            match doc.node(element)?.data() {
                NodeData::Element(e) => {
                    if let Some(id) = e.get_attr(ELEMENT_ID_ATTR) {
                        return Some(id.to_string());
                    }
                }
                NodeData::Document | NodeData::ShadowRoot(_) => {
                    return Some(format!("node-{}", element.as_raw()));
                }
                NodeData::Text(_) | NodeData::Comment(_) => return None,
            }
            if !assign {
                return None;
            }
            let id = self.inner.ids.next_string();
            doc.set_attr(element, ELEMENT_ID_ATTR, id.clone()).ok()?;
            Some(id)
        })
    }

    fn native_callback(
        &self,
        owner: NodeId,
        element: NodeId,
        event: &str,
        callback: &Callback,
        once: bool,
    ) -> Callback {
        let callback = callback.clone();
        if !once {
            return Callback::new(move |e| callback.call(e));
        }
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let event = event.to_string();
        Callback::new(move |e| {
            callback.call(e);
            if let Some(inner) = registry.upgrade() {
                EventRegistry { inner }.remove(owner, element, &event, Some(&callback));
            }
        })
    }

    fn remove_native(&self, records: &[ListenerRecord]) {
        if records.is_empty() {
            return;
        }
        self.inner.dom.with_write(|doc| {
            for record in records {
                doc.remove_event_listener(record.element, &record.event, &record.native, record.capture);
            }
        });
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("owners", &self.owner_count())
            .finish()
    }
}
