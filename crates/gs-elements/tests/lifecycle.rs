//! End-to-end tests for the lifecycle engine: gating, template resolution,
//! injection, readiness, attribute forwarding and teardown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use gs_elements::{
    BasicComponent, Callback, Component, ComponentContext, Device, ElementsError, Engine,
    EngineConfig, Environment, ListenerOptions, Namespace, NodeId, Orientation,
    Predicate, StaticFetcher, TemplateFetcher, Topology,
};
use gs_elements::attrs;
use gs_elements::style::StyleCache;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;
use url::Url;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_in(environment: Environment) -> Engine {
    init_tracing();
    Engine::builder(EngineConfig::default().with_environment(environment))
        .fetcher(Arc::new(StaticFetcher::new()))
        .build()
        .unwrap()
}

fn desktop() -> Engine {
    engine_in(Environment::default())
}

fn mount(engine: &Engine, html: &str) -> Vec<NodeId> {
    engine.dom().with_write(|doc| {
        let body = doc.body();
        doc.set_inner_html(body, html).unwrap()
    })
}

/// Collect the details of `kind` events reaching `node`.
fn record_events(engine: &Engine, node: NodeId, kind: &str) -> Arc<Mutex<Vec<Option<Value>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let callback = Callback::new(move |event| {
        seen_clone.lock().push(event.detail().cloned());
    });
    engine.dom().with_write(|doc| {
        doc.add_event_listener(node, kind, callback, ListenerOptions::default());
    });
    seen
}

fn body(engine: &Engine) -> NodeId {
    engine.dom().with_read(|doc| doc.body())
}

#[derive(Default)]
struct Recorder {
    changes: Arc<Mutex<Vec<(String, Option<String>, Option<String>)>>>,
    readies: Arc<Mutex<Vec<String>>>,
    disconnects: Arc<Mutex<Vec<String>>>,
}

impl Component for Recorder {
    fn observed_attributes(&self) -> &'static [&'static str] {
        &["label"]
    }

    fn default_template(&self) -> Option<String> {
        Some("<span class=\"label\"></span>".to_string())
    }

    fn on_ready(&self, ctx: &ComponentContext) {
        self.readies.lock().push(ctx.id());
    }

    fn on_attribute_changed(
        &self,
        _ctx: &ComponentContext,
        name: &str,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        self.changes.lock().push((
            name.to_string(),
            old_value.map(str::to_string),
            new_value.map(str::to_string),
        ));
    }

    fn on_disconnected(&self, ctx: &ComponentContext) {
        self.disconnects.lock().push(ctx.id());
    }
}

fn define_recorder(engine: &Engine, tag: &str) -> Recorder {
    let shared = Recorder::default();
    let (changes, readies, disconnects) = (
        shared.changes.clone(),
        shared.readies.clone(),
        shared.disconnects.clone(),
    );
    engine
        .define(tag, move || Recorder {
            changes: changes.clone(),
            readies: readies.clone(),
            disconnects: disconnects.clone(),
        })
        .unwrap();
    shared
}

// =========================================================================
// Mounting
// =========================================================================

#[tokio::test]
async fn test_desktop_widget_renders_into_shadow_and_reports_ready() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<gs-widget environment="desktop" id="w1" template="<div>hi</div>"></gs-widget>"#,
    );
    let widget = nodes[0];
    let ready = record_events(&engine, widget, "ready");
    let announced = record_events(&engine, body(&engine), "componentready");

    engine.settle().await.unwrap();

    let info = engine.registry().get("w1").unwrap();
    assert_eq!(info.element, widget);
    assert!(!info.flat);

    let context = engine.context(widget).unwrap();
    assert_eq!(context.topology(), Some(Topology::Shadow));
    let shadow = context.shadow_root().unwrap();
    let html = engine.dom().with_read(|doc| doc.inner_html(shadow));
    assert!(html.contains("<div>hi</div>"));

    assert_eq!(*ready.lock(), vec![Some(json!("w1"))]);
    assert_eq!(*announced.lock(), vec![Some(json!("w1"))]);
    assert!(context.is_ready());
}

#[tokio::test]
async fn test_mobile_only_widget_removes_itself_on_desktop() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();
    let announced = record_events(&engine, body(&engine), "componentready");

    let nodes = mount(
        &engine,
        r#"<gs-widget environment="mobile" id="m1" template="<div>hi</div>"></gs-widget>"#,
    );
    engine.settle().await.unwrap();

    assert!(engine.registry().get("m1").is_none());
    assert!(!engine.is_mounted(nodes[0]));
    assert!(engine.dom().with_read(|doc| doc.get_element_by_id("m1")).is_none());
    assert!(announced.lock().is_empty());
}

#[tokio::test]
async fn test_mobile_only_widget_mounts_on_mobile() {
    let engine = engine_in(Environment::default().with_device(Device::Mobile));
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<gs-widget environment="mobile" id="m1" template="<div>hi</div>"></gs-widget>"#,
    );
    let ready = record_events(&engine, nodes[0], "ready");
    engine.settle().await.unwrap();

    assert!(engine.registry().contains("m1"));
    assert_eq!(*ready.lock(), vec![Some(json!("m1"))]);
}

#[tokio::test]
async fn test_os_browser_and_protocol_gates_combine() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    mount(
        &engine,
        r#"<gs-widget id="a" os="linux, windows" browser="chrome" protocol="https:"></gs-widget>
           <gs-widget id="b" os="macos"></gs-widget>
           <gs-widget id="c" browser="firefox"></gs-widget>
           <gs-widget id="d" protocol="file"></gs-widget>"#,
    );
    engine.settle().await.unwrap();

    let ids: Vec<String> = engine.registry().all().into_iter().map(|info| info.id).collect();
    assert_eq!(ids, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_missing_id_is_generated() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(&engine, "<gs-widget></gs-widget><gs-widget></gs-widget>");
    engine.settle().await.unwrap();

    let first = engine.context(nodes[0]).unwrap().id();
    let second = engine.context(nodes[1]).unwrap().id();
    assert!(first.starts_with("gs-"));
    assert_ne!(first, second);
    assert_eq!(
        engine.dom().with_read(|doc| doc.attr(nodes[0], attrs::ID).map(str::to_string)),
        Some(first)
    );
}

#[tokio::test]
async fn test_define_upgrades_elements_already_in_the_document() {
    let engine = desktop();
    let nodes = mount(&engine, r#"<gs-late id="late" template="<p>late</p>"></gs-late>"#);
    engine.settle().await.unwrap();
    assert!(!engine.is_mounted(nodes[0]));

    engine.define("gs-late", || BasicComponent).unwrap();
    engine.settle().await.unwrap();

    assert!(engine.is_mounted(nodes[0]));
    assert!(engine.context(nodes[0]).unwrap().is_ready());
}

#[test]
fn test_define_rejects_bad_and_duplicate_tags() {
    let engine = desktop();
    assert!(matches!(
        engine.define("widget", || BasicComponent),
        Err(ElementsError::InvalidTagName(_))
    ));
    engine.define("gs-widget", || BasicComponent).unwrap();
    assert!(matches!(
        engine.define("gs-widget", || BasicComponent),
        Err(ElementsError::AlreadyDefined(_))
    ));
}

#[tokio::test]
async fn test_renders_are_batched_into_one_frame() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();
    mount(
        &engine,
        "<gs-widget></gs-widget><gs-widget></gs-widget><gs-widget></gs-widget>",
    );

    engine.tick().await.unwrap();
    // One frame for the three renders, one for the three ready tasks.
    assert_eq!(engine.frames_requested(), 2);
    engine.settle().await.unwrap();
    assert_eq!(engine.frames_requested(), 2);
}

// =========================================================================
// Injection
// =========================================================================

#[tokio::test]
async fn test_flat_self_injects_template_as_children() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<gs-widget id="f" flat anchor="self" template="<span>x</span>"></gs-widget>"#,
    );
    engine.settle().await.unwrap();

    let widget = nodes[0];
    engine.dom().with_read(|doc| {
        assert!(doc.shadow_root(widget).is_none());
        assert_eq!(doc.inner_html(widget), "<span>x</span>");
    });
    let context = engine.context(widget).unwrap();
    assert_eq!(context.topology(), Some(Topology::FlatSelf));
    assert!(context.query("span").unwrap().is_some());
    assert_eq!(engine.registry().find_all("gs-widget", true, false).unwrap().len(), 1);
    assert!(engine.registry().find_all("gs-widget", false, true).unwrap().is_empty());
}

#[tokio::test]
async fn test_flat_attribute_without_anchor_renders_in_place() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(&engine, r#"<gs-widget flat template="<em>flat</em>"></gs-widget>"#);
    engine.settle().await.unwrap();

    engine.dom().with_read(|doc| {
        assert!(doc.shadow_root(nodes[0]).is_none());
        assert_eq!(doc.inner_html(nodes[0]), "<em>flat</em>");
    });
}

#[tokio::test]
async fn test_proxy_injects_into_target_and_links_back() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<div id="target"></div><gs-widget id="p" anchor="beforeend@#target" template="<b>moved</b>"></gs-widget>"#,
    );
    let (target, widget) = (nodes[0], nodes[1]);
    engine.settle().await.unwrap();

    let context = engine.context(widget).unwrap();
    assert_eq!(context.topology(), Some(Topology::Proxy));
    let bold = context.query("b").unwrap().unwrap();

    engine.dom().with_read(|doc| {
        assert_eq!(doc.inner_html(widget), "");
        assert!(doc.shadow_root(widget).is_none());

        let children = doc.element_children(target);
        assert_eq!(children.len(), 1);
        let wrapper = children[0];
        assert_eq!(doc.tag_name(wrapper), Some("gs-proxy"));
        assert_eq!(doc.attr(wrapper, attrs::OWNER), Some("p"));
        assert_eq!(doc.inner_html(wrapper), "<b>moved</b>");
        assert!(doc.is_inclusive_ancestor(target, bold));
    });
    assert_eq!(engine.registry().owner(bold, None), Some(widget));
}

#[tokio::test]
async fn test_unwrap_places_content_before_the_element() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<section><gs-widget id="u" anchor="unwrap" template="<i>one</i><i>two</i>"></gs-widget></section>"#,
    );
    engine.settle().await.unwrap();

    let section = nodes[0];
    let html = engine.dom().with_read(|doc| doc.inner_html(section));
    assert!(html.starts_with("<i>one</i><i>two</i><gs-widget"));
    let context = engine.context_by_id("u").unwrap();
    assert_eq!(context.topology(), Some(Topology::Unwrap));
    assert_eq!(context.query_all("i").unwrap().len(), 2);
}

#[tokio::test]
async fn test_parent_anchor_appends_to_the_parent() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(
        &engine,
        r#"<div><gs-widget id="fp" anchor="parent" template="<i>tail</i>"></gs-widget></div>"#,
    );
    engine.settle().await.unwrap();

    let host = nodes[0];
    let html = engine.dom().with_read(|doc| doc.inner_html(host));
    assert!(html.ends_with("</gs-widget><i>tail</i>"));
    let context = engine.context_by_id("fp").unwrap();
    assert_eq!(context.topology(), Some(Topology::FlatParent));

    engine.dom().with_write(|doc| doc.detach(context.element()).unwrap());
    engine.settle().await.unwrap();
    assert_eq!(engine.dom().with_read(|doc| doc.inner_html(host)), "");
}

#[tokio::test]
async fn test_unresolvable_proxy_target_is_fatal() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    mount(
        &engine,
        r#"<gs-widget id="lost" anchor="beforeend@#missing" template="<b>x</b>"></gs-widget>"#,
    );
    let err = engine.settle().await.unwrap_err();

    match err {
        ElementsError::InjectionTarget { tag, id, target } => {
            assert_eq!(tag, "gs-widget");
            assert_eq!(id, "lost");
            assert_eq!(target, "beforeend@#missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_invalid_anchor_mode_is_reported() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    mount(&engine, r#"<gs-widget anchor="sideways@self"></gs-widget>"#);
    let err = engine.settle().await.unwrap_err();
    assert!(matches!(err, ElementsError::InvalidAnchor { .. }));
    assert!(err.is_configuration());
}

// =========================================================================
// Templates
// =========================================================================

#[tokio::test]
async fn test_templates_resolve_from_selector_function_and_url() {
    let namespace = Arc::new(Namespace::new());
    namespace.register_template("app.views.card", || Some("<i>card</i>".to_string()));
    let fetcher = Arc::new(StaticFetcher::new().with("https://example.test/app/panel.html", "<u>panel</u>"));
    let engine = Engine::builder(EngineConfig::default().with_base_url("https://example.test/app/"))
        .namespace(namespace)
        .fetcher(fetcher.clone())
        .build()
        .unwrap();
    engine.define("gs-widget", || BasicComponent).unwrap();

    mount(
        &engine,
        r##"<template id="tpl"><s>selected</s></template>
            <gs-widget id="sel" template="#tpl"></gs-widget>
            <gs-widget id="fn" template="app.views.card"></gs-widget>
            <gs-widget id="url" template="panel.html"></gs-widget>
            <gs-widget id="url2" template="panel.html"></gs-widget>
            <gs-widget id="none" template="missing.html"></gs-widget>"##,
    );
    engine.settle().await.unwrap();

    let shadow_html = |id: &str| {
        let shadow = engine.context_by_id(id).unwrap().shadow_root().unwrap();
        engine.dom().with_read(|doc| doc.inner_html(shadow))
    };
    assert_eq!(shadow_html("sel"), "<s>selected</s>");
    assert_eq!(shadow_html("fn"), "<i>card</i>");
    assert_eq!(shadow_html("url"), "<u>panel</u>");
    assert_eq!(shadow_html("url2"), "<u>panel</u>");
    assert_eq!(shadow_html("none"), "");
    assert!(engine.context_by_id("none").unwrap().is_ready());
    assert_eq!(engine.templates().cached_count(), 1);
}

/// Holds `slow.html` back until `fast.html` has been requested.
#[derive(Default)]
struct GatedFetcher {
    gate: Notify,
}

impl TemplateFetcher for GatedFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, gs_elements::Result<String>> {
        async move {
            if url.path().ends_with("slow.html") {
                self.gate.notified().await;
                Ok("<p>slow</p>".to_string())
            } else {
                self.gate.notify_one();
                Ok("<p>fast</p>".to_string())
            }
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_frame_templates_resolve_concurrently() {
    let engine = Engine::builder(EngineConfig::default().with_base_url("https://example.test/"))
        .fetcher(Arc::new(GatedFetcher::default()))
        .build()
        .unwrap();
    engine.define("gs-widget", || BasicComponent).unwrap();

    mount(
        &engine,
        r#"<gs-widget id="slow" template="slow.html"></gs-widget>
           <gs-widget id="fast" template="fast.html"></gs-widget>"#,
    );
    tokio::time::timeout(Duration::from_secs(5), engine.settle())
        .await
        .expect("slow template blocked the frame")
        .unwrap();

    for (id, body) in [("slow", "<p>slow</p>"), ("fast", "<p>fast</p>")] {
        let shadow = engine.context_by_id(id).unwrap().shadow_root().unwrap();
        assert_eq!(engine.dom().with_read(|doc| doc.inner_html(shadow)), body);
    }
}

#[tokio::test]
async fn test_default_template_applies_without_attribute() {
    let engine = desktop();
    define_recorder(&engine, "gs-recorder");

    let nodes = mount(&engine, "<gs-recorder></gs-recorder>");
    engine.settle().await.unwrap();

    let shadow = engine.context(nodes[0]).unwrap().shadow_root().unwrap();
    assert_eq!(
        engine.dom().with_read(|doc| doc.inner_html(shadow)),
        r#"<span class="label"></span>"#
    );
}

// =========================================================================
// Readiness
// =========================================================================

#[tokio::test]
async fn test_onready_handler_runs_after_hook() {
    let namespace = Arc::new(Namespace::new());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = calls.clone();
    namespace.register_ready("app.widgetReady", move |ctx| {
        calls_clone.lock().push(ctx.id());
    });
    let engine = Engine::builder(EngineConfig::default())
        .namespace(namespace)
        .fetcher(Arc::new(StaticFetcher::new()))
        .build()
        .unwrap();
    let recorder = define_recorder(&engine, "gs-recorder");

    mount(&engine, r#"<gs-recorder id="r" onready="app.widgetReady"></gs-recorder>"#);
    engine.settle().await.unwrap();

    assert_eq!(*recorder.readies.lock(), vec!["r".to_string()]);
    assert_eq!(*calls.lock(), vec!["r".to_string()]);
}

#[tokio::test]
async fn test_wait_for_resolves_on_ready_or_times_out() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let pending = engine.registry().wait_for("gs-widget", None);
    mount(&engine, r#"<gs-widget id="late"></gs-widget>"#);
    engine.settle().await.unwrap();
    assert_eq!(pending.await.unwrap().id, "late");

    // Already mounted: immediate.
    let info = engine.registry().wait_for("late", None).await.unwrap();
    assert_eq!(info.tag, "gs-widget");

    let missing = engine
        .registry()
        .wait_for("nobody", Some(Duration::from_millis(10)))
        .await;
    assert!(matches!(missing, Err(ElementsError::Timeout(_))));
    assert_eq!(engine.registry().ready().connection_count(), 0);
}

#[tokio::test]
async fn test_wait_event_yields_detail_and_fails_when_offline() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();
    let nodes = mount(&engine, r#"<gs-widget id="w"></gs-widget>"#);
    engine.settle().await.unwrap();
    let context = engine.context(nodes[0]).unwrap();

    let pong = context.wait_event("ping", None);
    context.emit(&gs_elements::Event::custom("ping", "pong"));
    assert_eq!(pong.await.unwrap(), Some(json!("pong")));

    let never = context.wait_event("ping", None);
    engine.dom().with_write(|doc| doc.detach(nodes[0]).unwrap());
    engine.settle().await.unwrap();
    assert!(matches!(never.await, Err(ElementsError::Offline(_))));
    assert!(!context.listen("ping", &Callback::new(|_| {})));
}

// =========================================================================
// Attributes
// =========================================================================

#[tokio::test]
async fn test_attribute_changes_wait_for_first_render_and_coalesce() {
    let engine = desktop();
    let recorder = define_recorder(&engine, "gs-recorder");

    let nodes = mount(&engine, r#"<gs-recorder id="r" label="a"></gs-recorder>"#);
    let widget = nodes[0];
    // Before the first render: never forwarded.
    engine
        .dom()
        .with_write(|doc| doc.set_attr(widget, "label", "b").unwrap());
    engine.settle().await.unwrap();
    assert!(recorder.changes.lock().is_empty());

    engine.dom().with_write(|doc| {
        doc.set_attr(widget, "label", "c").unwrap();
        doc.set_attr(widget, "label", "d").unwrap();
        doc.set_attr(widget, "title", "ignored").unwrap();
    });
    engine.settle().await.unwrap();
    assert_eq!(
        *recorder.changes.lock(),
        vec![("label".to_string(), Some("b".to_string()), Some("d".to_string()))]
    );

    // A round trip within one frame is not a change.
    engine.dom().with_write(|doc| {
        doc.set_attr(widget, "label", "e").unwrap();
        doc.set_attr(widget, "label", "d").unwrap();
    });
    engine.settle().await.unwrap();
    assert_eq!(recorder.changes.lock().len(), 1);
}

#[tokio::test]
async fn test_id_change_renames_registry_entry_and_proxy_link() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();
    let nodes = mount(
        &engine,
        r#"<div id="target"></div><gs-widget id="before" anchor="afterbegin@#target" template="<b>x</b>"></gs-widget>"#,
    );
    engine.settle().await.unwrap();

    let widget = nodes[1];
    engine
        .dom()
        .with_write(|doc| doc.set_attr(widget, attrs::ID, "after").unwrap());
    engine.settle().await.unwrap();

    assert!(engine.registry().get("before").is_none());
    assert_eq!(engine.registry().get("after").unwrap().element, widget);
    let wrapper = engine.context(widget).unwrap().injected()[0];
    assert_eq!(
        engine.dom().with_read(|doc| doc.attr(wrapper, attrs::OWNER).map(str::to_string)),
        Some("after".to_string())
    );
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_teardown_releases_everything_the_component_owns() {
    let engine = desktop();
    let recorder = define_recorder(&engine, "gs-recorder");

    let nodes = mount(
        &engine,
        r#"<div id="target"></div><gs-recorder id="p" anchor="beforeend@#target" orientation="landscape"></gs-recorder>"#,
    );
    let (target, widget) = (nodes[0], nodes[1]);
    engine.settle().await.unwrap();

    let context = engine.context(widget).unwrap();
    assert!(engine.events().has_owner(widget));
    let injected = engine.dom().with_read(|doc| doc.element_children(target));
    assert_eq!(injected.len(), 1);

    engine.dom().with_write(|doc| doc.detach(widget).unwrap());
    engine.settle().await.unwrap();

    assert!(context.is_offline());
    assert!(!engine.is_mounted(widget));
    assert!(engine.registry().get("p").is_none());
    assert!(!engine.events().has_owner(widget));
    assert_eq!(engine.dom().with_read(|doc| doc.element_children(target).len()), 0);
    // Injected content is freed; the host stays valid for its owner.
    assert!(!engine.dom().with_read(|doc| doc.contains(injected[0])));
    assert!(engine.dom().with_read(|doc| doc.contains(widget)));
    assert_eq!(*recorder.disconnects.lock(), vec!["p".to_string()]);
}

#[tokio::test]
async fn test_moved_component_reconnects_and_readies_again() {
    let engine = desktop();
    let recorder = define_recorder(&engine, "gs-recorder");

    let nodes = mount(&engine, r#"<gs-recorder id="w1"></gs-recorder><div id="dock"></div>"#);
    let (widget, dock) = (nodes[0], nodes[1]);
    let ready = record_events(&engine, widget, "ready");
    engine.settle().await.unwrap();
    let shadow = engine.context(widget).unwrap().shadow_root().unwrap();

    engine.dom().with_write(|doc| doc.detach(widget).unwrap());
    engine.settle().await.unwrap();
    assert!(engine.registry().get("w1").is_none());
    assert!(engine.dom().with_read(|doc| doc.contains(widget)));

    engine.dom().with_write(|doc| doc.append_child(dock, widget).unwrap());
    engine.settle().await.unwrap();

    assert_eq!(engine.registry().get("w1").unwrap().element, widget);
    let context = engine.context(widget).unwrap();
    assert!(context.is_ready());
    assert_eq!(context.shadow_root(), Some(shadow));
    let html = engine.dom().with_read(|doc| doc.inner_html(shadow));
    assert_eq!(html.matches("label").count(), 1);
    assert_eq!(*ready.lock(), vec![Some(json!("w1")), Some(json!("w1"))]);
    assert_eq!(*recorder.readies.lock(), vec!["w1".to_string(), "w1".to_string()]);
    assert_eq!(*recorder.disconnects.lock(), vec!["w1".to_string()]);
}

#[tokio::test]
async fn test_shared_id_stays_reachable_after_twin_leaves() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(&engine, r#"<gs-widget id="dup"></gs-widget><gs-widget id="dup"></gs-widget>"#);
    engine.settle().await.unwrap();
    assert_eq!(engine.registry().get("dup").unwrap().element, nodes[0]);

    engine.dom().with_write(|doc| doc.detach(nodes[1]).unwrap());
    engine.settle().await.unwrap();
    assert_eq!(engine.mounted_count(), 1);
    assert_eq!(engine.registry().get("dup").unwrap().element, nodes[0]);

    engine.dom().with_write(|doc| {
        let body = doc.body();
        doc.append_child(body, nodes[1]).unwrap();
        doc.detach(nodes[0]).unwrap();
    });
    engine.settle().await.unwrap();
    assert_eq!(engine.registry().get("dup").unwrap().element, nodes[1]);
    assert!(engine.context_by_id("dup").unwrap().is_ready());
}

#[tokio::test]
async fn test_disconnect_before_render_discards_the_render() {
    let engine = desktop();
    let recorder = define_recorder(&engine, "gs-recorder");

    let nodes = mount(&engine, r#"<gs-recorder id="gone"></gs-recorder>"#);
    engine.dom().with_write(|doc| doc.detach(nodes[0]).unwrap());
    engine.settle().await.unwrap();

    assert_eq!(engine.mounted_count(), 0);
    assert!(recorder.readies.lock().is_empty());
}

// =========================================================================
// Styles and orientation
// =========================================================================

#[tokio::test]
async fn test_style_changes_reach_every_shadow_root() {
    let styles = Arc::new(StyleCache::new());
    styles.get_or_set("b-theme", "p { color: red; }");
    styles.get_or_set("a-base", "p { margin: 0; }");
    let engine = Engine::builder(EngineConfig::default())
        .style_cache(styles.clone())
        .fetcher(Arc::new(StaticFetcher::new()))
        .build()
        .unwrap();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let nodes = mount(&engine, "<gs-widget></gs-widget><gs-widget></gs-widget>");
    engine.settle().await.unwrap();

    let shadows: Vec<NodeId> = nodes
        .iter()
        .map(|&node| engine.context(node).unwrap().shadow_root().unwrap())
        .collect();
    let adopted = |shadow: NodeId| -> Vec<String> {
        engine.dom().with_read(|doc| {
            doc.adopted_styles(shadow)
                .iter()
                .map(|sheet| sheet.id().to_string())
                .collect()
        })
    };
    for &shadow in &shadows {
        assert_eq!(adopted(shadow), vec!["a-base", "b-theme"]);
    }

    let broadcasts = record_events(&engine, engine.dom().with_read(|doc| doc.root()), "gs-style");
    styles.remove("a-base");
    for &shadow in &shadows {
        assert_eq!(adopted(shadow), vec!["b-theme"]);
    }
    assert_eq!(
        *broadcasts.lock(),
        vec![Some(json!({ "id": "a-base", "action": "removed" }))]
    );
}

#[tokio::test]
async fn test_orientation_mismatch_hides_the_component() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();
    let nodes = mount(&engine, r#"<gs-widget orientation="portrait"></gs-widget>"#);
    engine.settle().await.unwrap();

    let context = engine.context(nodes[0]).unwrap();
    assert_eq!(engine.orientation(), Orientation::Landscape);
    assert!(context.is_hidden());

    engine.set_orientation(Orientation::Portrait);
    assert!(!context.is_hidden());

    engine.set_orientation(Orientation::Landscape);
    assert!(context.is_hidden());

    context.show().unwrap();
    assert!(!context.is_hidden());
}

// =========================================================================
// Mutation dispatch
// =========================================================================

#[tokio::test]
async fn test_mutation_filters_see_shadow_content() {
    let engine = desktop();
    engine.define("gs-widget", || BasicComponent).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let actions = Predicate::new(|doc, node| doc.has_attr(node, "data-action"));
    engine
        .mutations()
        .register_filter(&actions, move |node| seen_clone.lock().push(node), false);

    mount(
        &engine,
        r#"<gs-widget template="<button data-action='go'>Go</button>"></gs-widget>"#,
    );
    engine.settle().await.unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    let inside_shadow = engine
        .dom()
        .with_read(|doc| doc.is_shadow_root(doc.root_of(seen[0])));
    assert!(inside_shadow);
}

#[tokio::test]
async fn test_settle_drains_all_pending_work() {
    let engine = desktop();
    mount(&engine, "<p>plain</p>");
    assert!(engine.has_pending_work());
    assert_eq!(engine.settle().await.unwrap(), 1);
    assert!(!engine.has_pending_work());
    assert!(!engine.tick().await.unwrap());
}
