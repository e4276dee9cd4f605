//! The component lifecycle engine.
//!
//! The engine stands in for the browser's custom element machinery. Each
//! [`tick`](Engine::tick) is one turn of the event loop:
//!
//! 1. drain mutation records and run custom element reactions
//!    (connected, disconnected, attribute changed), then hand the batch to
//!    the [`MutationDispatcher`]
//! 2. run the tasks queued for this animation frame (render, ready,
//!    coalesced attribute forwarding); the templates of every render in the
//!    frame are resolved concurrently before any of them is injected
//! 3. drain the records those tasks produced
//! 4. free engine-created nodes that were removed this turn and are still
//!    detached; elements the caller created stay valid until the caller
//!    releases them, so a component can be moved across turns
//!
//! A connected element is first gated on the environment, then registered,
//! then rendered on the next frame and declared ready on the frame after.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::join_all;
use gs_elements_core::logging::{DomTreeDebug, PerfSpan, span_names, targets};
use gs_elements_core::{
    COMPONENT_READY_EVENT, Callback, ConnectionId, Dom, EngineConfig, Event, EventRegistry,
    FrameScheduler, IdGenerator, MutationDispatcher, MutationKind, NodeId, ORIENTATION_EVENT,
    Orientation, READY_EVENT, STYLE_EVENT, WeakDom,
};
use gs_elements_style::{StyleCache, StyleChange};
use parking_lot::{Mutex, RwLock};
use tracing::Instrument;

use crate::attrs;
use crate::component::{Component, ComponentFactory};
use crate::context::{ComponentContext, Instance};
use crate::eligibility;
use crate::error::{ElementsError, Result};
use crate::injection::{InjectionPlan, Topology};
use crate::registry::{ComponentInfo, ComponentRegistry};
use crate::template::{HttpFetcher, Namespace, TemplateFetcher, TemplateLoader};

/// Work deferred to an animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameTask {
    Render(NodeId),
    Ready(NodeId),
    Attributes(NodeId),
}

struct Mounted {
    instance: Arc<Instance>,
    component: Arc<dyn Component>,
    context: ComponentContext,
}

impl Mounted {
    fn parts(&self) -> (Arc<Instance>, Arc<dyn Component>, ComponentContext) {
        (
            self.instance.clone(),
            self.component.clone(),
            self.context.clone(),
        )
    }
}

struct EngineInner {
    dom: Dom,
    config: EngineConfig,
    ids: Arc<IdGenerator>,
    events: EventRegistry,
    mutations: MutationDispatcher,
    styles: Arc<StyleCache>,
    registry: ComponentRegistry,
    templates: Arc<TemplateLoader>,
    definitions: RwLock<HashMap<String, ComponentFactory>>,
    mounted: RwLock<HashMap<NodeId, Mounted>>,
    frames: FrameScheduler<FrameTask>,
    /// Top-level nodes inserted from templates, plus proxy wrappers.
    owned: Mutex<HashSet<NodeId>>,
    /// Owned nodes removed this turn, released at the end of the tick.
    removed: Mutex<Vec<NodeId>>,
    orientation: RwLock<Orientation>,
    style_connection: Mutex<Option<ConnectionId>>,
}

/// Builder for [`Engine`].
///
/// Every collaborator is optional; missing ones are created fresh, so
/// several engines can share a document or a style cache when given the
/// same handles.
pub struct EngineBuilder {
    config: EngineConfig,
    dom: Option<Dom>,
    styles: Option<Arc<StyleCache>>,
    fetcher: Option<Arc<dyn TemplateFetcher>>,
    namespace: Option<Arc<Namespace>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            dom: None,
            styles: None,
            fetcher: None,
            namespace: None,
        }
    }

    /// Use an existing document.
    pub fn dom(mut self, dom: Dom) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Share a style cache.
    pub fn style_cache(mut self, styles: Arc<StyleCache>) -> Self {
        self.styles = Some(styles);
        self
    }

    /// Fetch URL templates with `fetcher` instead of HTTP.
    pub fn fetcher(mut self, fetcher: Arc<dyn TemplateFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share a namespace of template functions and ready handlers.
    pub fn namespace(mut self, namespace: Arc<Namespace>) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Build the engine and start observing the document.
    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        let dom = self.dom.unwrap_or_default();
        let ids = Arc::new(IdGenerator::new(config.id_prefix.clone()));
        let events = EventRegistry::new(dom.clone(), ids.clone());
        let mutations = MutationDispatcher::new(dom.clone());
        mutations.observe(dom.with_read(|doc| doc.root()));

        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpFetcher::new()));
        let templates = Arc::new(TemplateLoader::new(
            config.base_url.as_deref(),
            fetcher,
            self.namespace.unwrap_or_default(),
        )?);

        let inner = Arc::new(EngineInner {
            registry: ComponentRegistry::new(dom.clone()),
            orientation: RwLock::new(config.environment.orientation),
            styles: self.styles.unwrap_or_default(),
            dom,
            config,
            ids,
            events,
            mutations,
            templates,
            definitions: RwLock::new(HashMap::new()),
            mounted: RwLock::new(HashMap::new()),
            frames: FrameScheduler::new(),
            owned: Mutex::new(HashSet::new()),
            removed: Mutex::new(Vec::new()),
            style_connection: Mutex::new(None),
        });

        let weak: Weak<EngineInner> = Arc::downgrade(&inner);
        let connection = inner.styles.changed().connect(move |change: &StyleChange| {
            if let Some(inner) = weak.upgrade() {
                inner.broadcast_style_change(change);
            }
        });
        *inner.style_connection.lock() = Some(connection);

        tracing::debug!(
            target: targets::LIFECYCLE,
            device = %inner.config.environment.device,
            os = %inner.config.environment.os,
            browser = %inner.config.environment.browser,
            "engine created"
        );
        Ok(Engine { inner })
    }
}

/// Handle to a lifecycle engine. Clones share the engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with a fresh document and an HTTP template fetcher.
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    // =========================================================================
    // Collaborators
    // =========================================================================

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn ids(&self) -> &Arc<IdGenerator> {
        &self.inner.ids
    }

    pub fn events(&self) -> &EventRegistry {
        &self.inner.events
    }

    pub fn mutations(&self) -> &MutationDispatcher {
        &self.inner.mutations
    }

    pub fn styles(&self) -> &Arc<StyleCache> {
        &self.inner.styles
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn templates(&self) -> &Arc<TemplateLoader> {
        &self.inner.templates
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        self.inner.templates.namespace()
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Define a custom element.
    ///
    /// Connected elements with this tag are upgraded immediately; they
    /// render on the next frame like any newly connected element.
    pub fn define<C, F>(&self, tag: &str, factory: F) -> Result<()>
    where
        C: Component,
        F: Fn() -> C + Send + Sync + 'static,
    {
        if !is_valid_tag(tag) {
            return Err(ElementsError::InvalidTagName(tag.to_string()));
        }
        {
            let mut definitions = self.inner.definitions.write();
            if definitions.contains_key(tag) {
                return Err(ElementsError::AlreadyDefined(tag.to_string()));
            }
            let factory: ComponentFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn Component>);
            definitions.insert(tag.to_string(), factory);
        }
        tracing::debug!(target: targets::LIFECYCLE, tag, "custom element defined");

        let existing = self.inner.dom.with_read(|doc| {
            doc.composed_subtree(doc.root())
                .into_iter()
                .filter(|&node| doc.tag_name(node) == Some(tag))
                .collect::<Vec<_>>()
        });
        for element in existing {
            self.inner.connect(element)?;
        }
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.inner.definitions.read().contains_key(tag)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// The context of a mounted component.
    pub fn context(&self, element: NodeId) -> Option<ComponentContext> {
        self.inner
            .mounted
            .read()
            .get(&element)
            .map(|m| m.context.clone())
    }

    /// The context of a mounted component, by id.
    pub fn context_by_id(&self, id: &str) -> Option<ComponentContext> {
        let info = self.inner.registry.get(id)?;
        self.context(info.element)
    }

    pub fn is_mounted(&self, element: NodeId) -> bool {
        self.inner.mounted.read().contains_key(&element)
    }

    pub fn mounted_count(&self) -> usize {
        self.inner.mounted.read().len()
    }

    // =========================================================================
    // Environment
    // =========================================================================

    pub fn orientation(&self) -> Orientation {
        *self.inner.orientation.read()
    }

    /// Change the orientation and dispatch `orientationchange` on the
    /// document.
    pub fn set_orientation(&self, orientation: Orientation) {
        {
            let mut current = self.inner.orientation.write();
            if *current == orientation {
                return;
            }
            *current = orientation;
        }
        let root = self.inner.dom.with_read(|doc| doc.root());
        self.inner
            .dom
            .dispatch_event(root, &Event::custom(ORIENTATION_EVENT, orientation.as_str()));
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Run one turn of the event loop.
    ///
    /// Returns whether there was any work. A fatal configuration error in
    /// one task does not stop the other tasks of the frame; the first such
    /// error is returned once the turn is complete.
    pub async fn tick(&self) -> Result<bool> {
        let span = tracing::debug_span!(target: span_names::TICK, "tick");
        self.inner.clone().run_tick().instrument(span).await
    }

    /// Tick until no work remains.
    ///
    /// Returns the number of ticks that did work.
    pub async fn settle(&self) -> Result<usize> {
        let limit = self.inner.config.max_settle_iterations.max(1);
        let mut busy = 0;
        while self.tick().await? {
            busy += 1;
            if busy >= limit && self.inner.has_pending_work() {
                return Err(ElementsError::SettleLimit(limit));
            }
        }
        Ok(busy)
    }

    /// Whether records, frame tasks or releases are waiting.
    pub fn has_pending_work(&self) -> bool {
        self.inner.has_pending_work()
    }

    /// Animation frames requested so far.
    pub fn frames_requested(&self) -> u64 {
        self.inner.frames.frames_requested()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<String> = self.inner.definitions.read().keys().cloned().collect();
        tags.sort();
        f.debug_struct("Engine")
            .field("defined", &tags)
            .field("mounted", &self.mounted_count())
            .field("pending_frame_tasks", &self.inner.frames.pending_count())
            .finish()
    }
}

impl EngineInner {
    fn has_pending_work(&self) -> bool {
        self.dom.with_read(|doc| doc.has_pending_records())
            || self.frames.has_pending()
            || !self.removed.lock().is_empty()
    }

    fn mounted_parts(&self, element: NodeId) -> Option<(Arc<Instance>, Arc<dyn Component>, ComponentContext)> {
        self.mounted.read().get(&element).map(Mounted::parts)
    }

    async fn run_tick(self: Arc<Self>) -> Result<bool> {
        let mut worked = self.process_records()?;

        let tasks = self.frames.take_frame();
        let mut first_error = None;
        if !tasks.is_empty() {
            worked = true;
            tracing::trace!(target: targets::LIFECYCLE, tasks = tasks.len(), "running frame");
        }
        let mut templates: HashMap<NodeId, Option<String>> = join_all(
            tasks
                .iter()
                .filter_map(|task| match task {
                    FrameTask::Render(element) => Some(*element),
                    _ => None,
                })
                .map(|element| {
                    let span = tracing::debug_span!(target: span_names::RENDER, "template", ?element);
                    self.resolve_template(element)
                        .instrument(span)
                        .map(move |template| (element, template))
                }),
        )
        .await
        .into_iter()
        .collect();

        for task in tasks {
            let result = match task {
                FrameTask::Render(element) => {
                    let span = tracing::debug_span!(target: span_names::RENDER, "render", ?element);
                    let _entered = span.enter();
                    self.render(element, templates.remove(&element).flatten())
                }
                FrameTask::Ready(element) => {
                    self.ready(element);
                    Ok(())
                }
                FrameTask::Attributes(element) => {
                    self.flush_attributes(element);
                    Ok(())
                }
            };
            if let Err(err) = result {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        self.process_records()?;
        self.release_removed();

        match first_error {
            Some(err) => Err(err),
            None => Ok(worked),
        }
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// Drain mutation records, run reactions and dispatch the batch.
    fn process_records(&self) -> Result<bool> {
        let records = self.dom.with_write(|doc| doc.take_records());
        if records.is_empty() {
            return Ok(false);
        }
        let _span = tracing::trace_span!(
            target: span_names::MUTATION,
            "mutations",
            count = records.len()
        )
        .entered();

        for record in &records {
            match &record.kind {
                MutationKind::ChildList { added, removed, .. } => {
                    for &node in removed {
                        if self.owned.lock().remove(&node) {
                            self.removed.lock().push(node);
                        }
                        self.disconnect_subtree(node);
                    }
                    for &node in added {
                        self.connect_subtree(node)?;
                    }
                }
                MutationKind::Attributes {
                    target,
                    name,
                    old_value,
                } => self.attribute_changed(*target, name, old_value.clone()),
            }
        }
        self.mutations.dispatch(&records);
        Ok(true)
    }

    fn connect_subtree(&self, node: NodeId) -> Result<()> {
        let candidates = self.dom.with_read(|doc| {
            if !doc.contains(node) || !doc.is_connected(node) {
                return Vec::new();
            }
            doc.composed_subtree(node)
                .into_iter()
                .filter(|&n| doc.tag_name(n).is_some_and(|tag| tag.contains('-')))
                .collect()
        });
        for element in candidates {
            self.connect(element)?;
        }
        Ok(())
    }

    fn disconnect_subtree(&self, node: NodeId) {
        let candidates = self.dom.with_read(|doc| {
            if !doc.contains(node) {
                return Vec::new();
            }
            doc.composed_subtree(node)
                .into_iter()
                .filter(|&n| doc.is_element(n) && !doc.is_connected(n))
                .collect::<Vec<_>>()
        });
        for element in candidates {
            self.disconnect(element);
        }
    }

    /// Connected reaction: gate, register and schedule the first render.
    fn connect(&self, element: NodeId) -> Result<()> {
        if self.mounted.read().contains_key(&element) {
            return Ok(());
        }
        let Some(tag) = self.dom.with_read(|doc| {
            doc.is_connected(element)
                .then(|| doc.tag_name(element).map(str::to_string))
                .flatten()
        }) else {
            return Ok(());
        };
        let Some(factory) = self.definitions.read().get(&tag).cloned() else {
            return Ok(());
        };

        let eligible = self.dom.with_read(|doc| {
            eligibility::is_eligible(doc, element, &self.config.environment)
        });
        if !eligible {
            self.dom.with_write(|doc| doc.detach(element))?;
            return Ok(());
        }

        let component = factory();
        let (id, flat) = self.dom.with_write(|doc| -> Result<(String, bool)> {
            let id = match doc.attr(element, attrs::ID).filter(|id| !id.is_empty()) {
                Some(id) => id.to_string(),
                None => {
                    let id = self.ids.next_string();
                    doc.set_attr(element, attrs::ID, id.clone())?;
                    id
                }
            };
            let flat = if doc.has_attr(element, attrs::FLAT) {
                doc.attr_bool(element, attrs::FLAT)
            } else {
                component.flat()
            };
            Ok((id, flat))
        })?;

        let instance = Arc::new(Instance::new(element, &tag, id.clone(), flat));
        let context = ComponentContext::new(
            self.dom.clone(),
            self.events.clone(),
            self.templates.clone(),
            instance.clone(),
        );
        self.mounted.write().insert(
            element,
            Mounted {
                instance,
                component,
                context,
            },
        );
        self.registry.add(ComponentInfo {
            element,
            id: id.clone(),
            tag: tag.clone(),
            flat,
        });
        self.frames.request(FrameTask::Render(element));
        tracing::debug!(target: targets::LIFECYCLE, %tag, %id, flat, "component connected");
        Ok(())
    }

    /// Disconnected reaction: go offline and tear everything down.
    fn disconnect(&self, element: NodeId) {
        let Some(mounted) = self.mounted.write().remove(&element) else {
            return;
        };
        let instance = &mounted.instance;
        instance.go_offline();

        if let Some(shadow) = instance.shadow() {
            self.mutations.disconnect(shadow);
        }
        self.registry.remove(element);
        let listeners = self.events.detach_all(element);

        let injected = instance.take_injected();
        if !injected.is_empty() {
            self.dom.with_write(|doc| {
                for node in injected {
                    if doc.contains(node) {
                        let _ = doc.detach(node);
                    }
                }
            });
        }

        mounted.component.on_disconnected(&mounted.context);
        tracing::debug!(
            target: targets::LIFECYCLE,
            tag = %instance.tag,
            id = %instance.id(),
            listeners,
            "component disconnected"
        );
    }

    /// Attribute reaction.
    fn attribute_changed(&self, element: NodeId, name: &str, old_value: Option<String>) {
        let Some((instance, component, _)) = self.mounted_parts(element) else {
            return;
        };
        if instance.is_offline() {
            return;
        }

        if name == attrs::ID {
            self.rename(&instance);
        }

        if !component.observed_attributes().contains(&name) || !instance.is_rendered() {
            return;
        }
        if instance.push_change(name, old_value) {
            self.frames.request(FrameTask::Attributes(element));
        }
    }

    fn rename(&self, instance: &Instance) {
        let element = instance.element;
        let Some(new_id) = self
            .dom
            .with_read(|doc| doc.attr(element, attrs::ID).map(str::to_string))
            .filter(|id| !id.is_empty())
        else {
            return;
        };
        if new_id == instance.id() {
            return;
        }
        let old_id = instance.id();
        instance.set_id(&new_id);
        self.registry.rename(element, &new_id);

        let injected = instance.injected();
        self.dom.with_write(|doc| {
            for node in injected {
                if doc.attr(node, attrs::OWNER).is_some() {
                    let _ = doc.set_attr(node, attrs::OWNER, new_id.clone());
                }
            }
        });
        tracing::debug!(target: targets::LIFECYCLE, old = %old_id, new = %new_id, "component renamed");
    }

    // =========================================================================
    // Frame tasks
    // =========================================================================

    /// Resolve the template of a pending render.
    async fn resolve_template(&self, element: NodeId) -> Option<String> {
        let (instance, component, context) = self.mounted_parts(element)?;
        if instance.is_offline() || instance.is_rendered() {
            return None;
        }
        let default = component.default_template();
        context.get_template(default.as_deref()).await
    }

    /// Inject a resolved template according to the topology.
    fn render(&self, element: NodeId, template: Option<String>) -> Result<()> {
        let Some((instance, _, context)) = self.mounted_parts(element) else {
            return Ok(());
        };
        if instance.is_rendered() {
            return Ok(());
        }
        if instance.is_offline() {
            tracing::trace!(target: targets::LIFECYCLE, ?element, "discarding render of offline component");
            return Ok(());
        }

        let id = instance.id();
        let tag = instance.tag.clone();
        let plan = match self
            .dom
            .with_read(|doc| InjectionPlan::from_element(doc, element))
        {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!(target: targets::LIFECYCLE, %tag, %id, %err, "invalid anchor");
                return Err(err);
            }
        };
        let topology = Topology::select(plan.as_ref(), instance.flat);
        let styles = if topology.is_shadow() {
            self.styles.styles()
        } else {
            Vec::new()
        };

        let _perf = PerfSpan::new("inject");
        let injected = self.dom.with_write(|doc| -> Result<(Option<NodeId>, Vec<NodeId>)> {
            let html = template.as_deref().unwrap_or_default();
            let plan = match (topology, plan.as_ref()) {
                (Topology::Shadow, _) => {
                    let shadow = doc.attach_shadow(element)?;
                    let nodes = doc.set_inner_html(shadow, html)?;
                    doc.set_adopted_styles(shadow, styles)?;
                    self.owned.lock().extend(nodes);
                    return Ok((Some(shadow), Vec::new()));
                }
                (Topology::FlatSelf, _) | (_, None) => {
                    if template.is_some() {
                        let nodes = doc.set_inner_html(element, html)?;
                        self.owned.lock().extend(nodes);
                    }
                    return Ok((None, Vec::new()));
                }
                (_, Some(plan)) => plan,
            };

            let target = plan.resolve_target(doc, element).ok_or_else(|| {
                ElementsError::InjectionTarget {
                    tag: tag.clone(),
                    id: id.clone(),
                    target: plan.to_string(),
                }
            })?;

            if topology == Topology::Proxy {
                let wrapper = doc.create_element(&self.config.proxy_tag);
                doc.set_attr(wrapper, attrs::OWNER, id.clone())?;
                doc.set_inner_html(wrapper, html)?;
                plan.place(doc, target, wrapper)?;
                self.owned.lock().insert(wrapper);
                return Ok((None, vec![wrapper]));
            }

            let nodes = doc.parse_fragment(html);
            for &node in &nodes {
                plan.place(doc, target, node)?;
            }
            self.owned.lock().extend(nodes.iter().copied());
            Ok((None, nodes))
        });
        let (shadow, injected) = match injected {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(target: targets::LIFECYCLE, %tag, %id, %err, "render failed");
                return Err(err);
            }
        };

        instance.set_rendered(topology, shadow, injected.clone());
        if let Some(shadow) = shadow {
            self.mutations.observe(shadow);
            self.listen_for_styles(&context, shadow);
        }
        self.listen_for_orientation(&context, &injected);
        self.frames.request(FrameTask::Ready(element));
        if tracing::enabled!(target: targets::LIFECYCLE, tracing::Level::TRACE) {
            let tree = self
                .dom
                .with_read(|doc| DomTreeDebug::new().format_subtree(doc, element));
            tracing::trace!(target: targets::LIFECYCLE, "rendered tree:\n{tree}");
        }
        tracing::debug!(
            target: targets::LIFECYCLE,
            %tag,
            %id,
            %topology,
            has_template = template.is_some(),
            "component rendered"
        );
        Ok(())
    }

    /// Run the ready hooks and announce readiness.
    fn ready(&self, element: NodeId) {
        let Some((instance, component, context)) = self.mounted_parts(element) else {
            return;
        };
        if instance.is_offline() || instance.is_ready() {
            return;
        }

        component.on_ready(&context);
        if let Some(path) = context.attr(attrs::ONREADY).filter(|p| !p.trim().is_empty()) {
            match self.templates.namespace().ready_handler(path.trim()) {
                Some(handler) => handler(&context),
                None => {
                    tracing::warn!(target: targets::LIFECYCLE, path = %path, "unknown ready handler")
                }
            }
        }
        if instance.is_offline() {
            return;
        }
        instance.mark_ready();

        let id = instance.id();
        self.dom
            .dispatch_event(element, &Event::custom(READY_EVENT, id.clone()));
        let body = self.dom.with_read(|doc| doc.body());
        self.dom.dispatch_event(
            body,
            &Event::custom(COMPONENT_READY_EVENT, id.clone()).with_bubbles(true),
        );
        self.registry.notify_ready(element);
        tracing::debug!(target: targets::LIFECYCLE, tag = %instance.tag, %id, "component ready");
    }

    /// Forward coalesced attribute changes.
    fn flush_attributes(&self, element: NodeId) {
        let Some((instance, component, context)) = self.mounted_parts(element) else {
            return;
        };
        let changes = instance.take_changes();
        if instance.is_offline() {
            return;
        }
        for change in changes {
            let new_value = context.attr(&change.name);
            if new_value == change.old_value {
                continue;
            }
            component.on_attribute_changed(
                &context,
                &change.name,
                change.old_value.as_deref(),
                new_value.as_deref(),
            );
        }
    }

    fn release_removed(&self) {
        let removed = std::mem::take(&mut *self.removed.lock());
        if removed.is_empty() {
            return;
        }
        let freed: usize = self.dom.with_write(|doc| {
            let freed = removed.into_iter().map(|node| doc.release(node)).sum();
            // Owned nodes inside a subtree the caller released are gone too.
            self.owned.lock().retain(|&node| doc.contains(node));
            freed
        });
        if freed > 0 {
            tracing::trace!(target: targets::LIFECYCLE, freed, "released detached nodes");
        }
    }

    // =========================================================================
    // Readiness listeners
    // =========================================================================

    /// Re-adopt the shared sheets whenever the style cache changes.
    fn listen_for_styles(&self, context: &ComponentContext, shadow: NodeId) {
        let weak_dom = self.dom.downgrade();
        let styles = self.styles.clone();
        let callback = Callback::new(move |_| {
            let Some(dom) = weak_dom.upgrade() else {
                return;
            };
            let sheets = styles.styles();
            dom.with_write(|doc| {
                if doc.contains(shadow) {
                    let _ = doc.set_adopted_styles(shadow, sheets);
                }
            });
        });
        let root = self.dom.with_read(|doc| doc.root());
        context.attach_event(root, STYLE_EVENT, &callback, false, false);
    }

    /// Hide the component while the orientation does not match its
    /// `orientation` attribute.
    fn listen_for_orientation(&self, context: &ComponentContext, injected: &[NodeId]) {
        let Some(wanted) = context.attr(attrs::ORIENTATION) else {
            return;
        };
        let mut nodes = vec![context.element()];
        nodes.extend_from_slice(injected);

        apply_orientation(&self.dom.downgrade(), &nodes, &wanted, *self.orientation.read());

        let weak_dom = self.dom.downgrade();
        let callback = Callback::new(move |event| {
            if let Some(current) = event.detail_str().and_then(Orientation::parse) {
                apply_orientation(&weak_dom, &nodes, &wanted, current);
            }
        });
        let root = self.dom.with_read(|doc| doc.root());
        context.attach_event(root, ORIENTATION_EVENT, &callback, false, false);
    }

    /// Forward a style cache change as a `gs-style` event on the document.
    fn broadcast_style_change(&self, change: &StyleChange) {
        let root = self.dom.with_read(|doc| doc.root());
        let detail = serde_json::json!({ "id": change.id(), "action": change.action() });
        let invoked = self
            .dom
            .dispatch_event(root, &Event::custom(STYLE_EVENT, detail));
        tracing::trace!(
            target: targets::STYLE,
            id = change.id(),
            action = change.action(),
            invoked,
            "style change broadcast"
        );
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(connection) = self.style_connection.lock().take() {
            self.styles.changed().disconnect(connection);
        }
    }
}

fn apply_orientation(dom: &WeakDom, nodes: &[NodeId], wanted: &str, current: Orientation) {
    let Some(dom) = dom.upgrade() else {
        return;
    };
    let hidden = !eligibility::orientation_matches(Some(wanted), current);
    dom.with_write(|doc| {
        for &node in nodes {
            if doc.is_element(node) {
                let _ = doc.set_attr_bool(node, attrs::HIDDEN, hidden);
            }
        }
    });
}

/// Custom element names start with a lowercase ASCII letter, contain a
/// hyphen and have no uppercase letters.
fn is_valid_tag(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_lowercase())
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}
