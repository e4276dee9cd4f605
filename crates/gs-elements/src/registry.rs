//! Registry of live components.
//!
//! Membership mirrors DOM presence: the engine adds an entry when a
//! component connects and removes it on disconnect. Entries are plain data
//! keyed by the element's [`NodeId`]; the registry never keeps a component
//! alive.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gs_elements_core::logging::targets;
use gs_elements_core::{ConnectionId, Dom, NodeId, SelectorList, Signal};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::attrs;
use crate::error::{ElementsError, Result};

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub element: NodeId,
    pub id: String,
    /// Lowercase tag name.
    pub tag: String,
    /// Rendered into the light DOM rather than a shadow root.
    pub flat: bool,
}

impl ComponentInfo {
    /// Whether `key` names this component by id or by tag.
    pub fn matches_key(&self, key: &str) -> bool {
        self.id == key || self.tag.eq_ignore_ascii_case(key)
    }
}

struct Entry {
    info: ComponentInfo,
    seq: u64,
}

struct Inner {
    dom: Dom,
    entries: RwLock<HashMap<NodeId, Entry>>,
    /// Members sharing an id, in registration order. The first one answers
    /// lookups.
    by_id: RwLock<HashMap<String, Vec<NodeId>>>,
    next_seq: Mutex<u64>,
    ready: Signal<ComponentInfo>,
}

/// Shared handle to the component registry.
#[derive(Clone)]
pub struct ComponentRegistry {
    inner: Arc<Inner>,
}

impl ComponentRegistry {
    pub fn new(dom: Dom) -> Self {
        Self {
            inner: Arc::new(Inner {
                dom,
                entries: RwLock::new(HashMap::new()),
                by_id: RwLock::new(HashMap::new()),
                next_seq: Mutex::new(0),
                ready: Signal::new(),
            }),
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a component. Returns `false` if the element is already a member.
    pub fn add(&self, info: ComponentInfo) -> bool {
        let mut entries = self.inner.entries.write();
        if entries.contains_key(&info.element) {
            return false;
        }
        let seq = {
            let mut next = self.inner.next_seq.lock();
            *next += 1;
            *next
        };
        self.inner
            .by_id
            .write()
            .entry(info.id.clone())
            .or_default()
            .push(info.element);
        tracing::trace!(target: targets::REGISTRY, id = %info.id, tag = %info.tag, "component registered");
        entries.insert(info.element, Entry { info, seq });
        true
    }

    /// Remove the component hosted by `element`.
    pub fn remove(&self, element: NodeId) -> Option<ComponentInfo> {
        let entry = self.inner.entries.write().remove(&element)?;
        unlink_id(&mut self.inner.by_id.write(), &entry.info.id, element);
        tracing::trace!(target: targets::REGISTRY, id = %entry.info.id, "component unregistered");
        Some(entry.info)
    }

    /// Move a member to a new id.
    pub fn rename(&self, element: NodeId, new_id: &str) -> bool {
        let mut entries = self.inner.entries.write();
        let Some(entry) = entries.get_mut(&element) else {
            return false;
        };
        if entry.info.id == new_id {
            return true;
        }
        let mut by_id = self.inner.by_id.write();
        unlink_id(&mut by_id, &entry.info.id, element);
        by_id.entry(new_id.to_string()).or_default().push(element);
        tracing::trace!(target: targets::REGISTRY, old = %entry.info.id, new = new_id, "component renamed");
        entry.info.id = new_id.to_string();
        true
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Look up a member by id.
    pub fn get(&self, id: &str) -> Option<ComponentInfo> {
        let element = self.inner.by_id.read().get(id)?.first().copied()?;
        self.get_by_element(element)
    }

    pub fn get_by_element(&self, element: NodeId) -> Option<ComponentInfo> {
        self.inner
            .entries
            .read()
            .get(&element)
            .map(|e| e.info.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.by_id.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Every member, in registration order.
    pub fn all(&self) -> Vec<ComponentInfo> {
        let entries = self.inner.entries.read();
        let mut all: Vec<&Entry> = entries.values().collect();
        all.sort_by_key(|e| e.seq);
        all.into_iter().map(|e| e.info.clone()).collect()
    }

    /// Members matching a tag name or CSS selector, in registration order.
    ///
    /// `flat_only` keeps light-DOM components, `shadow_only` keeps
    /// shadow-rooted ones.
    pub fn find_all(
        &self,
        tag_or_selector: &str,
        flat_only: bool,
        shadow_only: bool,
    ) -> Result<Vec<ComponentInfo>> {
        let key = tag_or_selector.trim();
        let is_tag = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let selector = if is_tag || key.is_empty() || key == "*" {
            None
        } else {
            Some(SelectorList::parse(key)?)
        };

        let candidates = self.all();
        let found = self.inner.dom.with_read(|doc| {
            candidates
                .into_iter()
                .filter(|info| !(flat_only && !info.flat) && !(shadow_only && info.flat))
                .filter(|info| match &selector {
                    Some(list) => list.matches(doc, info.element),
                    None => !is_tag || info.tag.eq_ignore_ascii_case(key),
                })
                .collect()
        });
        Ok(found)
    }

    /// Resolve the logical owner of `node`.
    ///
    /// Walks up the tree as if shadow roots were transparent (a shadow root
    /// steps to its host) and follows `data-gs-owner` back-references of
    /// injected content to the owning component. With `tag`, returns the
    /// nearest such ancestor with that tag; without, the nearest
    /// registered component.
    pub fn owner(&self, node: NodeId, tag: Option<&str>) -> Option<NodeId> {
        let members: HashSet<NodeId> = self.inner.entries.read().keys().copied().collect();
        let by_id = self.inner.by_id.read().clone();
        self.inner.dom.with_read(|doc| {
            let mut current = doc.composed_parent(node);
            let mut steps = 0usize;
            while let Some(candidate) = current {
                steps += 1;
                if steps > doc.len() {
                    break;
                }
                if doc.is_element(candidate) {
                    let hit = match tag {
                        Some(tag) => doc
                            .tag_name(candidate)
                            .is_some_and(|t| t.eq_ignore_ascii_case(tag)),
                        None => members.contains(&candidate),
                    };
                    if hit {
                        return Some(candidate);
                    }
                    let owner = doc
                        .attr(candidate, attrs::OWNER)
                        .and_then(|id| by_id.get(id).and_then(|members| members.first()).copied())
                        .filter(|&owner| owner != candidate);
                    if let Some(owner) = owner {
                        current = Some(owner);
                        continue;
                    }
                }
                current = doc.composed_parent(candidate);
            }
            None
        })
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    /// Signal emitted when a member finishes its first render.
    pub fn ready(&self) -> &Signal<ComponentInfo> {
        &self.inner.ready
    }

    /// Broadcast that `element` is ready.
    pub fn notify_ready(&self, element: NodeId) {
        if let Some(info) = self.get_by_element(element) {
            self.inner.ready.emit(info);
        }
    }

    /// Wait for a component by id or tag name.
    ///
    /// Resolves immediately when a matching component is already a member;
    /// otherwise resolves with the first matching ready broadcast. The
    /// subscription is made when this is called, not when the future is
    /// first polled, and is dropped with the future.
    pub fn wait_for(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<ComponentInfo>> + Send + 'static {
        let existing = self.all().into_iter().find(|info| info.matches_key(key));
        let (tx, rx) = oneshot::channel();
        let subscription = if existing.is_none() {
            let key = key.to_string();
            let tx = Mutex::new(Some(tx));
            let id = self.inner.ready.connect(move |info: &ComponentInfo| {
                if info.matches_key(&key) {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(info.clone());
                    }
                }
            });
            Some(Subscription {
                registry: self.clone(),
                id,
            })
        } else {
            None
        };

        async move {
            if let Some(info) = existing {
                return Ok(info);
            }
            let _subscription = subscription;
            let received = match timeout {
                Some(limit) => tokio::time::timeout(limit, rx)
                    .await
                    .map_err(|_| ElementsError::Timeout(limit))?,
                None => rx.await,
            };
            received.map_err(|_| ElementsError::Cancelled)
        }
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("len", &self.len())
            .field("ready", &self.inner.ready)
            .finish()
    }
}

fn unlink_id(by_id: &mut HashMap<String, Vec<NodeId>>, id: &str, element: NodeId) {
    if let Some(members) = by_id.get_mut(id) {
        members.retain(|&member| member != element);
        if members.is_empty() {
            by_id.remove(id);
        }
    }
}

/// Disconnects a waiter's slot when dropped.
struct Subscription {
    registry: ComponentRegistry,
    id: ConnectionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.inner.ready.disconnect(self.id);
    }
}
