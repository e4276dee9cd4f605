//! Template resolution.
//!
//! A `template` attribute value is resolved in this order, first non-empty
//! result wins:
//!
//! 1. `#selector`: the inner HTML of the matching element (the contents of
//!    a `<template>` element come out as its children)
//! 2. inline HTML starting with `<`
//! 3. a dotted path registered in the [`Namespace`], sync or async
//! 4. a URL, resolved against the configured base URL and fetched through
//!    a [`TemplateFetcher`]; successful fetches are cached by absolute URL
//!
//! Resolution never fails loudly: problems are logged at warn level and the
//! component renders without a body.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use gs_elements_core::logging::targets;
use gs_elements_core::{Dom, NodeId};
use parking_lot::RwLock;
use url::Url;

use crate::context::ComponentContext;
use crate::error::{ElementsError, Result};

type SyncTemplateFn = dyn Fn() -> Option<String> + Send + Sync;
type AsyncTemplateFn = dyn Fn() -> BoxFuture<'static, Option<String>> + Send + Sync;

/// Handler invoked by the `onready` attribute.
pub type ReadyHandler = Arc<dyn Fn(&ComponentContext) + Send + Sync>;

#[derive(Clone)]
enum TemplateFunction {
    Sync(Arc<SyncTemplateFn>),
    Async(Arc<AsyncTemplateFn>),
}

/// Named functions reachable from markup by dotted path.
#[derive(Default)]
pub struct Namespace {
    templates: RwLock<HashMap<String, TemplateFunction>>,
    ready: RwLock<HashMap<String, ReadyHandler>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous template function.
    pub fn register_template<F>(&self, path: &str, func: F)
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.templates
            .write()
            .insert(path.to_string(), TemplateFunction::Sync(Arc::new(func)));
    }

    /// Register an asynchronous template function.
    pub fn register_async_template<F, Fut>(&self, path: &str, func: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        let func: Arc<AsyncTemplateFn> = Arc::new(move || func().boxed());
        self.templates
            .write()
            .insert(path.to_string(), TemplateFunction::Async(func));
    }

    /// Register a handler for `onready="<path>"`.
    pub fn register_ready<F>(&self, path: &str, handler: F)
    where
        F: Fn(&ComponentContext) + Send + Sync + 'static,
    {
        self.ready.write().insert(path.to_string(), Arc::new(handler));
    }

    pub fn has_template(&self, path: &str) -> bool {
        self.templates.read().contains_key(path)
    }

    /// Look up a ready handler.
    pub fn ready_handler(&self, path: &str) -> Option<ReadyHandler> {
        self.ready.read().get(path).cloned()
    }

    /// Call the template function at `path`.
    ///
    /// Returns `None` when nothing is registered there or the function
    /// produced nothing.
    pub async fn call_template(&self, path: &str) -> Option<String> {
        let func = self.templates.read().get(path).cloned()?;
        match func {
            TemplateFunction::Sync(func) => func(),
            TemplateFunction::Async(func) => func().await,
        }
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut templates: Vec<String> = self.templates.read().keys().cloned().collect();
        templates.sort();
        let mut ready: Vec<String> = self.ready.read().keys().cloned().collect();
        ready.sort();
        f.debug_struct("Namespace")
            .field("templates", &templates)
            .field("ready", &ready)
            .finish()
    }
}

// ============================================================================
// Fetchers
// ============================================================================

/// Source of remote template text.
pub trait TemplateFetcher: Send + Sync {
    /// Fetch the body at `url`.
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>>;
}

/// Fetches templates over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, headers, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl TemplateFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        async move {
            let response = self.client.get(url.clone()).send().await?.error_for_status()?;
            Ok(response.text().await?)
        }
        .boxed()
    }
}

/// Serves templates from memory.
///
/// Useful offline and in tests; counts the requests it receives.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    entries: RwLock<HashMap<String, String>>,
    requests: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at the absolute URL `url`.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.entries.write().insert(url.into(), body.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    /// Number of fetches served or refused so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl TemplateFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = self
            .entries
            .read()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| ElementsError::NotFound(url.to_string()));
        futures_util::future::ready(result).boxed()
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Resolves template descriptors to HTML.
pub struct TemplateLoader {
    base_url: Option<Url>,
    fetcher: Arc<dyn TemplateFetcher>,
    namespace: Arc<Namespace>,
    cache: RwLock<HashMap<String, String>>,
}

impl TemplateLoader {
    /// Create a loader.
    ///
    /// Fails when `base_url` is given but malformed.
    pub fn new(
        base_url: Option<&str>,
        fetcher: Arc<dyn TemplateFetcher>,
        namespace: Arc<Namespace>,
    ) -> Result<Self> {
        let base_url = base_url.map(Url::parse).transpose()?;
        Ok(Self {
            base_url,
            fetcher,
            namespace,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Resolve a template descriptor.
    ///
    /// `scope` is the node whose tree `#selector` references are looked up
    /// in before falling back to the whole document. A source that yields
    /// nothing hands over to the next one in the chain. Fragment-only
    /// references are never fetched since they name the current document.
    pub async fn resolve(&self, dom: &Dom, scope: NodeId, source: &str) -> Option<String> {
        let source = source.trim();
        if source.is_empty() {
            return None;
        }

        if source.starts_with('#') {
            match self.select(dom, scope, source) {
                Some(html) => return Some(html),
                None => {
                    tracing::warn!(target: targets::TEMPLATE, source, "template element not found or empty")
                }
            }
        }

        if source.starts_with('<') {
            return Some(source.to_string());
        }

        if self.namespace.has_template(source) {
            let html = self
                .namespace
                .call_template(source)
                .await
                .filter(|h| !h.trim().is_empty());
            match html {
                Some(html) => return Some(html),
                None => {
                    tracing::warn!(target: targets::TEMPLATE, source, "template function produced nothing")
                }
            }
        }

        if source.starts_with('#') {
            return None;
        }
        self.fetch(source).await
    }

    /// Inner HTML of the element matching `selector`, looked up in the tree
    /// of `scope` and then in the document.
    fn select(&self, dom: &Dom, scope: NodeId, selector: &str) -> Option<String> {
        dom.with_read(|doc| {
            let local = doc.root_of(scope);
            let found = match doc.query_selector(local, selector) {
                Ok(Some(node)) => Some(node),
                Ok(None) if local != doc.root() => {
                    doc.query_selector(doc.root(), selector).ok().flatten()
                }
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(target: targets::TEMPLATE, selector, %err, "invalid template selector");
                    None
                }
            };
            found.map(|node| doc.inner_html(node))
        })
        .filter(|html| !html.trim().is_empty())
    }

    /// Fetch a template URL, consulting the cache first.
    pub async fn fetch(&self, source: &str) -> Option<String> {
        let url = match self.absolute_url(source) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(target: targets::TEMPLATE, source, %err, "cannot resolve template url");
                return None;
            }
        };
        if let Some(cached) = self.cache.read().get(url.as_str()) {
            tracing::trace!(target: targets::TEMPLATE, url = %url, "template cache hit");
            return Some(cached.clone());
        }

        match self.fetcher.fetch(&url).await {
            Ok(body) if !body.trim().is_empty() => {
                tracing::debug!(target: targets::TEMPLATE, url = %url, bytes = body.len(), "template fetched");
                self.cache.write().insert(url.to_string(), body.clone());
                Some(body)
            }
            Ok(_) => {
                tracing::warn!(target: targets::TEMPLATE, url = %url, "fetched template is empty");
                None
            }
            Err(err) => {
                tracing::warn!(target: targets::TEMPLATE, url = %url, %err, "template fetch failed");
                None
            }
        }
    }

    /// Resolve `source` against the base URL.
    pub fn absolute_url(&self, source: &str) -> Result<Url> {
        match &self.base_url {
            Some(base) => Ok(base.join(source)?),
            None => Ok(Url::parse(source)?),
        }
    }

    /// Number of cached fetch results.
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Drop every cached fetch result.
    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

impl std::fmt::Debug for TemplateLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateLoader")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("cached", &self.cached_count())
            .finish()
    }
}
