//! Integration tests for the event registry and mutation dispatcher working
//! against the same document.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gs_elements_core::event_registry::ELEMENT_ID_ATTR;
use gs_elements_core::{
    Callback, Dom, Event, EventRegistry, IdGenerator, MutationDispatcher, NodeId, Predicate,
    hash_code,
};
use parking_lot::Mutex;

fn setup() -> (Dom, EventRegistry, MutationDispatcher) {
    let dom = Dom::new();
    let ids = Arc::new(IdGenerator::new("t-"));
    let registry = EventRegistry::new(dom.clone(), ids);
    let dispatcher = MutationDispatcher::new(dom.clone());
    dispatcher.observe(dom.with_read(|doc| doc.root()));
    (dom, registry, dispatcher)
}

#[test]
fn test_retrofit_listeners_onto_inserted_markup() {
    let (dom, registry, dispatcher) = setup();
    let owner = dom.with_write(|doc| {
        let owner = doc.create_element("gs-app");
        doc.append_child(doc.body(), owner).unwrap();
        owner
    });

    // Every element with data-action gets a click listener owned by gs-app.
    let clicks = Arc::new(AtomicUsize::new(0));
    let clicks_clone = clicks.clone();
    let on_click = Callback::new(move |_| {
        clicks_clone.fetch_add(1, Ordering::SeqCst);
    });
    let registry_clone = registry.clone();
    let actions = Predicate::new(|doc, node| doc.has_attr(node, "data-action"));
    dispatcher.register_filter(
        &actions,
        move |node| {
            registry_clone.attach(owner, node, "click", &on_click, false, false);
        },
        false,
    );

    let buttons: Vec<NodeId> = dom.with_write(|doc| {
        doc.set_inner_html(
            owner,
            r#"<button data-action="save">Save</button><button data-action="load">Load</button><button>Plain</button>"#,
        )
        .unwrap()
    });
    let records = dom.with_write(|doc| doc.take_records());
    dispatcher.dispatch(&records);

    assert_eq!(registry.listener_count(owner), 2);
    for &button in &buttons {
        dom.dispatch_event(button, &Event::new("click"));
    }
    assert_eq!(clicks.load(Ordering::SeqCst), 2);

    // Element ids were assigned lazily with the generator prefix.
    let eid = dom.with_read(|doc| doc.attr(buttons[0], ELEMENT_ID_ATTR).map(str::to_string));
    assert!(eid.unwrap().starts_with("t-"));
    assert_eq!(dom.with_read(|doc| doc.attr(buttons[2], ELEMENT_ID_ATTR).map(str::to_string)), None);

    registry.detach_all(owner);
    for &button in &buttons {
        dom.dispatch_event(button, &Event::new("click"));
    }
    assert_eq!(clicks.load(Ordering::SeqCst), 2);
    assert_eq!(registry.owner_count(), 0);
}

#[test]
fn test_removal_filter_sees_whole_subtree() {
    let (dom, _registry, dispatcher) = setup();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let removed_clone = removed.clone();
    dispatcher.register_filter(
        &Predicate::new(|doc, node| doc.tag_name(node) == Some("li")),
        move |node| removed_clone.lock().push(node),
        true,
    );

    let list = dom.with_write(|doc| {
        let body = doc.body();
        let nodes = doc.set_inner_html(body, "<ul><li>a</li><li>b</li></ul>").unwrap();
        nodes[0]
    });
    dispatcher.dispatch(&dom.with_write(|doc| doc.take_records()));
    assert!(removed.lock().is_empty());

    dom.with_write(|doc| doc.detach(list).unwrap());
    dispatcher.dispatch(&dom.with_write(|doc| doc.take_records()));
    assert_eq!(removed.lock().len(), 2);
}

#[test]
fn test_group_keys_distinguish_events() {
    assert_ne!(hash_code("t-1click"), hash_code("t-1focus"));
    assert_ne!(hash_code("t-1click"), hash_code("t-2click"));
}
