//! Per-component state and the API components use at runtime.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use gs_elements_core::{Callback, Dom, Event, EventRegistry, NodeId, SelectorList};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{oneshot, watch};

use crate::attrs;
use crate::error::{ElementsError, Result};
use crate::injection::Topology;
use crate::template::TemplateLoader;

/// An attribute change waiting for the next frame.
#[derive(Debug, Clone)]
pub(crate) struct PendingChange {
    pub(crate) name: String,
    pub(crate) old_value: Option<String>,
}

/// Lifecycle state of one mounted element.
pub(crate) struct Instance {
    pub(crate) element: NodeId,
    pub(crate) tag: String,
    pub(crate) flat: bool,
    id: RwLock<String>,
    offline: watch::Sender<bool>,
    rendered: AtomicBool,
    ready: AtomicBool,
    topology: Mutex<Option<Topology>>,
    shadow: Mutex<Option<NodeId>>,
    /// Nodes placed outside the element (proxy wrapper or unwrapped
    /// content), removed at teardown.
    injected: Mutex<Vec<NodeId>>,
    pending: Mutex<Vec<PendingChange>>,
    attrs_scheduled: AtomicBool,
}

impl Instance {
    pub(crate) fn new(element: NodeId, tag: &str, id: String, flat: bool) -> Self {
        let (offline, _) = watch::channel(false);
        Self {
            element,
            tag: tag.to_string(),
            flat,
            id: RwLock::new(id),
            offline,
            rendered: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            topology: Mutex::new(None),
            shadow: Mutex::new(None),
            injected: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            attrs_scheduled: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> String {
        self.id.read().clone()
    }

    pub(crate) fn set_id(&self, id: &str) {
        *self.id.write() = id.to_string();
    }

    pub(crate) fn is_offline(&self) -> bool {
        *self.offline.borrow()
    }

    /// Mark offline. Returns `false` if it already was.
    pub(crate) fn go_offline(&self) -> bool {
        !self.offline.send_replace(true)
    }

    fn offline_watch(&self) -> watch::Receiver<bool> {
        self.offline.subscribe()
    }

    pub(crate) fn is_rendered(&self) -> bool {
        self.rendered.load(Ordering::Acquire)
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub(crate) fn topology(&self) -> Option<Topology> {
        *self.topology.lock()
    }

    pub(crate) fn shadow(&self) -> Option<NodeId> {
        *self.shadow.lock()
    }

    pub(crate) fn injected(&self) -> Vec<NodeId> {
        self.injected.lock().clone()
    }

    pub(crate) fn take_injected(&self) -> Vec<NodeId> {
        std::mem::take(&mut *self.injected.lock())
    }

    /// Record the result of the first render.
    pub(crate) fn set_rendered(&self, topology: Topology, shadow: Option<NodeId>, injected: Vec<NodeId>) {
        *self.topology.lock() = Some(topology);
        *self.shadow.lock() = shadow;
        *self.injected.lock() = injected;
        self.rendered.store(true, Ordering::Release);
    }

    /// Queue an attribute change, keeping the oldest old value per name.
    ///
    /// Returns `true` when the caller should schedule a frame.
    pub(crate) fn push_change(&self, name: &str, old_value: Option<String>) -> bool {
        let mut pending = self.pending.lock();
        if !pending.iter().any(|c| c.name == name) {
            pending.push(PendingChange {
                name: name.to_string(),
                old_value,
            });
        }
        !self.attrs_scheduled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn take_changes(&self) -> Vec<PendingChange> {
        self.attrs_scheduled.store(false, Ordering::Release);
        std::mem::take(&mut *self.pending.lock())
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("element", &self.element)
            .field("tag", &self.tag)
            .field("id", &self.id())
            .field("offline", &self.is_offline())
            .field("rendered", &self.is_rendered())
            .field("ready", &self.is_ready())
            .field("topology", &self.topology())
            .finish()
    }
}

/// Handle a component uses to reach its element, its rendered content and
/// the engine services.
///
/// Contexts are cheap to clone. Once the component is disconnected every
/// registration through the context is refused.
#[derive(Clone)]
pub struct ComponentContext {
    dom: Dom,
    events: EventRegistry,
    templates: Arc<TemplateLoader>,
    instance: Arc<Instance>,
}

impl ComponentContext {
    pub(crate) fn new(
        dom: Dom,
        events: EventRegistry,
        templates: Arc<TemplateLoader>,
        instance: Arc<Instance>,
    ) -> Self {
        Self {
            dom,
            events,
            templates,
            instance,
        }
    }

    // =========================================================================
    // Identity and state
    // =========================================================================

    /// The component's element.
    pub fn element(&self) -> NodeId {
        self.instance.element
    }

    /// The component's current id.
    pub fn id(&self) -> String {
        self.instance.id()
    }

    /// Lowercase tag name.
    pub fn tag(&self) -> &str {
        &self.instance.tag
    }

    pub fn is_flat(&self) -> bool {
        self.instance.flat
    }

    /// Topology chosen at first render.
    pub fn topology(&self) -> Option<Topology> {
        self.instance.topology()
    }

    /// Whether the component has been disconnected.
    pub fn is_offline(&self) -> bool {
        self.instance.is_offline()
    }

    pub fn is_rendered(&self) -> bool {
        self.instance.is_rendered()
    }

    pub fn is_ready(&self) -> bool {
        self.instance.is_ready()
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// The shadow root, for shadow-rooted components.
    pub fn shadow_root(&self) -> Option<NodeId> {
        self.instance.shadow()
    }

    /// Nodes outside the element that hold rendered content.
    pub fn injected(&self) -> Vec<NodeId> {
        self.instance.injected()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Scopes searched by [`query`](Self::query), each with whether the scope
    /// node itself is content.
    fn search_roots(&self) -> Vec<(NodeId, bool)> {
        match self.instance.topology() {
            Some(Topology::Shadow) => self
                .instance
                .shadow()
                .map(|shadow| vec![(shadow, false)])
                .unwrap_or_default(),
            Some(Topology::Proxy) => self
                .instance
                .injected()
                .into_iter()
                .map(|wrapper| (wrapper, false))
                .collect(),
            Some(Topology::FlatParent | Topology::Unwrap) => self
                .instance
                .injected()
                .into_iter()
                .map(|node| (node, true))
                .collect(),
            Some(Topology::FlatSelf) | None => vec![(self.instance.element, false)],
        }
    }

    /// All elements matching `selector` within the rendered content.
    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        let roots = self.search_roots();
        Ok(self.dom.with_read(|doc| {
            let mut found = Vec::new();
            for (root, include_self) in roots {
                if include_self && list.matches(doc, root) {
                    found.push(root);
                }
                found.extend(doc.select_all(root, &list));
            }
            found
        }))
    }

    /// The first element matching `selector` within the rendered content.
    pub fn query(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a listener on `element` owned by this component.
    ///
    /// Refused (returns `false`) once the component is offline.
    pub fn attach_event(
        &self,
        element: NodeId,
        event: &str,
        callback: &Callback,
        once: bool,
        capture: bool,
    ) -> bool {
        if self.is_offline() {
            return false;
        }
        self.events
            .attach(self.instance.element, element, event, callback, once, capture)
    }

    /// Remove listeners this component registered on `element`.
    pub fn remove_event(&self, element: NodeId, event: &str, callback: Option<&Callback>) -> usize {
        self.events
            .remove(self.instance.element, element, event, callback)
    }

    /// Listen for `event` on the component's own element.
    pub fn listen(&self, event: &str, callback: &Callback) -> bool {
        self.attach_event(self.instance.element, event, callback, false, false)
    }

    /// Listen for the next `event` on the component's own element.
    pub fn once(&self, event: &str, callback: &Callback) -> bool {
        self.attach_event(self.instance.element, event, callback, true, false)
    }

    pub fn unlisten(&self, event: &str, callback: Option<&Callback>) -> usize {
        self.remove_event(self.instance.element, event, callback)
    }

    /// Dispatch `event` on the component's element.
    pub fn emit(&self, event: &Event) -> usize {
        self.dom.dispatch_event(self.instance.element, event)
    }

    /// Wait for the next `name` event on the element and yield its detail.
    ///
    /// The listener is registered when this is called. Fails with
    /// [`ElementsError::Offline`] if the component disconnects first.
    pub fn wait_event(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<Value>>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let callback = Callback::new(move |event| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(event.detail().cloned());
            }
        });
        let attached = self.once(name, &callback);

        let events = self.events.clone();
        let element = self.instance.element;
        let name = name.to_string();
        let id = self.id();
        let offline = self.instance.offline_watch();

        async move {
            if !attached {
                return Err(ElementsError::Offline(id));
            }
            let wait = async move {
                tokio::select! {
                    received = rx => received.ok(),
                    _ = went_offline(offline) => None,
                }
            };
            let detail = match timeout {
                Some(limit) => match tokio::time::timeout(limit, wait).await {
                    Ok(detail) => detail,
                    Err(_) => {
                        events.remove(element, element, &name, Some(&callback));
                        return Err(ElementsError::Timeout(limit));
                    }
                },
                None => wait.await,
            };
            detail.ok_or(ElementsError::Offline(id))
        }
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    /// Hide the element and any content rendered outside it.
    pub fn hide(&self) -> Result<()> {
        self.set_hidden(true)
    }

    pub fn show(&self) -> Result<()> {
        self.set_hidden(false)
    }

    pub fn is_hidden(&self) -> bool {
        self.dom
            .with_read(|doc| doc.has_attr(self.instance.element, attrs::HIDDEN))
    }

    fn set_hidden(&self, hidden: bool) -> Result<()> {
        let injected = self.instance.injected();
        self.dom.with_write(|doc| {
            doc.set_attr_bool(self.instance.element, attrs::HIDDEN, hidden)?;
            for node in injected {
                if doc.is_element(node) {
                    doc.set_attr_bool(node, attrs::HIDDEN, hidden)?;
                }
            }
            Ok(())
        })
    }

    // =========================================================================
    // Templates and attributes
    // =========================================================================

    /// Resolve the `template` attribute, or `default` when it is absent.
    pub async fn get_template(&self, default: Option<&str>) -> Option<String> {
        let source = self
            .attr(attrs::TEMPLATE)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| default.map(str::to_string))?;
        if self.is_offline() {
            return None;
        }
        self.templates
            .resolve(&self.dom, self.instance.element, &source)
            .await
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.dom
            .with_read(|doc| doc.attr(self.instance.element, name).map(str::to_string))
    }

    pub fn set_attr(&self, name: &str, value: impl Into<String>) -> Result<()> {
        Ok(self
            .dom
            .with_write(|doc| doc.set_attr(self.instance.element, name, value))?)
    }

    pub fn attr_bool(&self, name: &str) -> bool {
        self.dom
            .with_read(|doc| doc.attr_bool(self.instance.element, name))
    }

    pub fn attr_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.dom
            .with_read(|doc| doc.attr_json(self.instance.element, name))
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("instance", &self.instance)
            .finish()
    }
}

async fn went_offline(mut offline: watch::Receiver<bool>) {
    loop {
        if *offline.borrow_and_update() {
            return;
        }
        if offline.changed().await.is_err() {
            return;
        }
    }
}
