//! Function registry — maps function subjects to their handlers.
//!
//! Each subject has at most one handler. The map is concurrent so that
//! registration may happen while the dispatch loop is reading it.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use faas_net::{Auth, Params};
use futures::future::BoxFuture;

use crate::callback::Callback;

/// A registered function.
///
/// Receives the request parameters, the caller's auth data (`None` when the
/// envelope had no `auth` field) and a [`Callback`] for reporting results.
/// The dispatch loop awaits the returned future before taking the next
/// message.
pub trait Handler: Send + Sync + 'static {
    /// Run the function for one request.
    fn call(&self, params: Params, auth: Option<Auth>, callback: Callback) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Params, Option<Auth>, Callback) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, params: Params, auth: Option<Auth>, callback: Callback) -> BoxFuture<'static, ()> {
        Box::pin(self(params, auth, callback))
    }
}

/// Shared handle to the subject → handler map. Clones share state.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: Arc<DashMap<String, Arc<dyn Handler>>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("subjects", &self.subjects())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a handler is registered for `subject`.
    #[must_use]
    pub fn contains(&self, subject: &str) -> bool {
        self.handlers.contains_key(subject)
    }

    /// Returns the handler for `subject`.
    #[must_use]
    pub fn get(&self, subject: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(subject).map(|h| Arc::clone(h.value()))
    }

    /// Record `handler` unless the subject already has one.
    ///
    /// Returns `true` if the handler was inserted. An existing handler is
    /// never replaced.
    pub fn insert_if_absent(&self, subject: &str, handler: Arc<dyn Handler>) -> bool {
        match self.handlers.entry(subject.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handler);
                true
            }
        }
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// All registered subjects, sorted.
    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        subjects.sort();
        subjects
    }
}
