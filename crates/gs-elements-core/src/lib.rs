//! Core systems for gs-elements.
//!
//! This crate provides the foundations the component lifecycle engine is
//! built on:
//!
//! - **DOM**: An arena-backed document with shadow roots, attributes,
//!   native events, HTML parsing and CSS selector queries
//! - **Identity**: Unique id generation and Java-compatible string hashes
//! - **Event Registry**: Deduplicating, owner-scoped listener bookkeeping
//! - **Mutation Dispatcher**: Predicate filters over added/removed nodes
//! - **Frame Scheduler**: Animation-frame batching of deferred work
//! - **Signal/Slot System**: Change notifications between registries
//! - **Configuration**: Engine settings and the simulated environment
//!
//! # Event Registry Example
//!
//! ```
//! use std::sync::Arc;
//! use gs_elements_core::{Callback, Dom, Event, EventRegistry, IdGenerator};
//!
//! let dom = Dom::new();
//! let (owner, button) = dom.with_write(|doc| {
//!     let owner = doc.create_element("gs-form");
//!     let button = doc.create_element("button");
//!     doc.append_child(doc.body(), owner).unwrap();
//!     doc.append_child(owner, button).unwrap();
//!     (owner, button)
//! });
//!
//! let registry = EventRegistry::new(dom.clone(), Arc::new(IdGenerator::default()));
//! let on_click = Callback::new(|event| println!("{} fired", event.kind()));
//! registry.attach(owner, button, "click", &on_click, false, false);
//! registry.attach(owner, button, "click", &on_click, false, false); // no-op
//!
//! dom.dispatch_event(button, &Event::new("click"));
//! registry.detach_all(owner);
//! ```
//!
//! # Mutation Dispatcher Example
//!
//! ```
//! use gs_elements_core::{Dom, MutationDispatcher, Predicate};
//!
//! let dom = Dom::new();
//! let dispatcher = MutationDispatcher::new(dom.clone());
//! dispatcher.observe(dom.with_read(|doc| doc.root()));
//!
//! let popovers = Predicate::new(|doc, node| doc.attr(node, "data-bs-toggle") == Some("popover"));
//! dispatcher.register_filter(&popovers, |node| println!("retrofit {node:?}"), false);
//!
//! dom.with_write(|doc| {
//!     let body = doc.body();
//!     doc.set_inner_html(body, r#"<a data-bs-toggle="popover">?</a>"#).unwrap();
//! });
//! let records = dom.with_write(|doc| doc.take_records());
//! dispatcher.dispatch(&records);
//! ```

pub mod config;
pub mod dom;
mod error;
pub mod event_registry;
pub mod frame;
pub mod identity;
pub mod logging;
pub mod mutation_dispatcher;
pub mod signal;

pub use config::{Device, EngineConfig, Environment, Orientation};
pub use dom::{
    COMPONENT_READY_EVENT, Callback, Dom, Document, Event, EventPhase, InsertPosition,
    ListenerOptions, MutationKind, MutationRecord, NodeId, ORIENTATION_EVENT, READY_EVENT,
    STYLE_EVENT, SelectorList, StyleSheet, WeakDom,
};
pub use error::{CoreError, Result};
pub use event_registry::EventRegistry;
pub use frame::FrameScheduler;
pub use identity::{IdGenerator, hash_code, hash_parts};
pub use logging::{DomTreeDebug, PerfSpan, TreeFormatOptions, TreeStyle};
pub use mutation_dispatcher::{MutationDispatcher, Predicate};
pub use signal::{ConnectionId, Signal};
