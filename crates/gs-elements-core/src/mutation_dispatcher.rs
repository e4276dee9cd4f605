//! Mutation dispatch to registered node filters.
//!
//! The dispatcher observes a set of tree roots (the document and every
//! shadow root the engine creates). For each batch of mutation records it
//! walks every added or removed subtree depth-first and hands each node to
//! every filter whose predicate accepts it. One node may match several
//! unrelated filters; for a given node, filters run in registration order.
//!
//! A panicking predicate or callback is logged and skipped without
//! affecting other filters or the rest of the batch.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dom::{Document, Dom, MutationRecord, NodeId};
use crate::logging::targets;

type PredicateFn = dyn Fn(&Document, NodeId) -> bool + Send + Sync;
type NodeCallback = Arc<dyn Fn(NodeId) + Send + Sync>;

/// A node predicate with a stable identity.
///
/// Filters are registered and unregistered by predicate identity, so keep
/// the `Predicate` (or a clone) around to unregister later.
#[derive(Clone)]
pub struct Predicate(Arc<PredicateFn>);

impl Predicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Document, NodeId) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Whether both handles refer to the same predicate.
    pub fn ptr_eq(&self, other: &Predicate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn test(&self, document: &Document, node: NodeId) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.0)(document, node))) {
            Ok(matched) => matched,
            Err(_) => {
                tracing::error!(
                    target: targets::MUTATION,
                    ?node,
                    "mutation filter predicate panicked"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Predicate")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

#[derive(Clone)]
struct Filter {
    predicate: Predicate,
    callback: NodeCallback,
    for_removal: bool,
}

/// Re-broadcasts added and removed nodes to registered filters.
pub struct MutationDispatcher {
    dom: Dom,
    roots: Mutex<Vec<NodeId>>,
    filters: Mutex<Vec<Filter>>,
}

impl MutationDispatcher {
    /// Create a dispatcher observing nothing yet.
    pub fn new(dom: Dom) -> Self {
        Self {
            dom,
            roots: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    /// Start observing a tree root. Returns `false` if already observed.
    pub fn observe(&self, root: NodeId) -> bool {
        let mut roots = self.roots.lock();
        if roots.contains(&root) {
            return false;
        }
        roots.push(root);
        tracing::trace!(target: targets::MUTATION, ?root, "observing root");
        true
    }

    /// Stop observing a tree root. Returns `true` if it was observed.
    pub fn disconnect(&self, root: NodeId) -> bool {
        let mut roots = self.roots.lock();
        let before = roots.len();
        roots.retain(|&r| r != root);
        roots.len() != before
    }

    pub fn is_observing(&self, root: NodeId) -> bool {
        self.roots.lock().contains(&root)
    }

    /// Number of observed roots.
    pub fn root_count(&self) -> usize {
        self.roots.lock().len()
    }

    /// Number of registered filters.
    pub fn filter_count(&self) -> usize {
        self.filters.lock().len()
    }

    /// Register a filter.
    ///
    /// Add-type filters are immediately back-filled: the callback runs once
    /// for every node already present under an observed root that matches.
    /// Returns `false` if this predicate is already registered for the same
    /// kind of mutation.
    pub fn register_filter<F>(&self, predicate: &Predicate, callback: F, for_removal: bool) -> bool
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        let filter = Filter {
            predicate: predicate.clone(),
            callback: Arc::new(callback),
            for_removal,
        };
        {
            let mut filters = self.filters.lock();
            if filters
                .iter()
                .any(|f| f.for_removal == for_removal && f.predicate.ptr_eq(predicate))
            {
                return false;
            }
            filters.push(filter.clone());
        }

        if !for_removal {
            let roots = self.roots.lock().clone();
            let matches: Vec<NodeId> = self.dom.with_read(|doc| {
                roots
                    .iter()
                    .filter(|&&root| doc.contains(root))
                    .flat_map(|&root| doc.descendants(root))
                    .filter(|&node| filter.predicate.test(doc, node))
                    .collect()
            });
            tracing::debug!(
                target: targets::MUTATION,
                matches = matches.len(),
                "back-filling new filter"
            );
            for node in matches {
                invoke(&filter.callback, node);
            }
        }
        true
    }

    /// Unregister a filter by predicate identity.
    pub fn unregister_filter(&self, predicate: &Predicate, for_removal: bool) -> bool {
        let mut filters = self.filters.lock();
        let before = filters.len();
        filters.retain(|f| !(f.for_removal == for_removal && f.predicate.ptr_eq(predicate)));
        filters.len() != before
    }

    /// Dispatch a batch of mutation records.
    ///
    /// Records whose root is not observed are ignored. Returns the number
    /// of callbacks invoked.
    pub fn dispatch(&self, records: &[MutationRecord]) -> usize {
        let filters = self.filters.lock().clone();
        if filters.is_empty() || records.is_empty() {
            return 0;
        }
        let roots = self.roots.lock().clone();

        let calls: Vec<(NodeCallback, NodeId)> = self.dom.with_read(|doc| {
            let mut calls = Vec::new();
            for record in records.iter().filter(|r| roots.contains(&r.root)) {
                for (nodes, removal) in [(record.added(), false), (record.removed(), true)] {
                    for &top in nodes {
                        if !doc.contains(top) {
                            continue;
                        }
                        for node in doc.subtree(top) {
                            for filter in filters.iter().filter(|f| f.for_removal == removal) {
                                if filter.predicate.test(doc, node) {
                                    calls.push((filter.callback.clone(), node));
                                }
                            }
                        }
                    }
                }
            }
            calls
        });

        let count = calls.len();
        for (callback, node) in calls {
            invoke(&callback, node);
        }
        if count > 0 {
            tracing::trace!(target: targets::MUTATION, count, "dispatched mutations");
        }
        count
    }
}

fn invoke(callback: &NodeCallback, node: NodeId) {
    if catch_unwind(AssertUnwindSafe(|| callback(node))).is_err() {
        tracing::error!(
            target: targets::MUTATION,
            ?node,
            "mutation filter callback panicked"
        );
    }
}

impl std::fmt::Debug for MutationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDispatcher")
            .field("roots", &self.root_count())
            .field("filters", &self.filter_count())
            .finish()
    }
}
