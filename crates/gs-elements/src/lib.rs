//! gs-elements - A custom element lifecycle engine.
//!
//! This is the main crate. It re-exports the core systems and adds the
//! lifecycle engine on top of them:
//!
//! - **Engine**: Custom element definitions, mount gating, rendering,
//!   readiness and teardown driven by an explicit event loop
//! - **Templates**: Selector, inline, namespace function and URL templates
//! - **Injection**: Shadow, flat, unwrap and proxy placement of content
//! - **Registry**: Lookup of mounted components and ownership of nodes
//!
//! # Example
//!
//! ```
//! use gs_elements::{BasicComponent, Engine, EngineConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), gs_elements::ElementsError> {
//! let engine = Engine::new(EngineConfig::default())?;
//! engine.define("gs-greeting", || BasicComponent)?;
//!
//! engine.dom().with_write(|doc| {
//!     let body = doc.body();
//!     doc.set_inner_html(body, r#"<gs-greeting id="hello" template="<p>Hi</p>"></gs-greeting>"#)
//! })?;
//! engine.settle().await?;
//!
//! let context = engine.context_by_id("hello").expect("mounted");
//! let shadow = context.shadow_root().expect("rendered into a shadow root");
//! assert_eq!(engine.dom().with_read(|doc| doc.inner_html(shadow)), "<p>Hi</p>");
//! assert!(context.is_ready());
//! # Ok(())
//! # }
//! ```

pub mod attrs;
pub mod component;
pub mod context;
pub mod eligibility;
pub mod engine;
mod error;
pub mod injection;
pub mod registry;
pub mod template;

pub use gs_elements_core::*;

pub use component::{BasicComponent, Component};
pub use context::ComponentContext;
pub use engine::{Engine, EngineBuilder};
pub use error::{ElementsError, Result};
pub use injection::{InjectionMode, InjectionPlan, InjectionTarget, Topology};
pub use registry::{ComponentInfo, ComponentRegistry};
pub use template::{HttpFetcher, Namespace, ReadyHandler, StaticFetcher, TemplateFetcher, TemplateLoader};

/// Shared stylesheet cache.
pub mod style {
    pub use gs_elements_style::*;
}
