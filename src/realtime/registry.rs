//! Listener Registry
//!
//! Maps event names to the ordered listeners registered for them.
//! Listeners are identified by `Arc` pointer identity, so the same
//! callback can be removed without keeping a separate token around.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::messages::{event_names, PushEvent};

/// Callback invoked for each matching push event
pub type Listener = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&PushEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Result of delivering one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Listeners that ran to completion
    pub delivered: usize,
    /// Listeners that panicked
    pub panicked: usize,
}

/// Event name → ordered listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for an event. Registering the same listener
    /// twice delivers the event twice.
    pub async fn add(&self, event: &str, listener: Listener) {
        self.listeners
            .write()
            .await
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove a specific listener, or every listener for the event when
    /// `listener` is `None`. Returns how many were removed.
    pub async fn remove(&self, event: &str, listener: Option<&Listener>) -> usize {
        let mut map = self.listeners.write().await;

        let removed = match (map.get_mut(event), listener) {
            (None, _) => 0,
            (Some(list), Some(target)) => {
                let before = list.len();
                list.retain(|l| !Arc::ptr_eq(l, target));
                before - list.len()
            }
            (Some(list), None) => {
                let n = list.len();
                list.clear();
                n
            }
        };

        // Clean up empty event entries
        if map.get(event).map(|l| l.is_empty()).unwrap_or(false) {
            map.remove(event);
        }

        removed
    }

    /// Detach every listener. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut map = self.listeners.write().await;
        let n = map.values().map(Vec::len).sum();
        map.clear();
        n
    }

    /// Listeners for an event, direct registrations first, then wildcard
    pub async fn listeners_for(&self, event: &str) -> Vec<Listener> {
        let map = self.listeners.read().await;
        let mut out: Vec<Listener> = map.get(event).cloned().unwrap_or_default();
        if event != event_names::WILDCARD {
            if let Some(wild) = map.get(event_names::WILDCARD) {
                out.extend(wild.iter().cloned());
            }
        }
        out
    }

    /// Deliver an event to its listeners in registration order.
    ///
    /// The lock is released before any listener runs, so a listener may
    /// touch the registry without deadlocking. A panicking listener does
    /// not stop delivery to the rest.
    ///
    /// The process panic hook still runs for each caught panic; embedders
    /// that want it silent install their own hook (the `medconsole` binary
    /// routes panics through `tracing`).
    pub async fn dispatch(&self, event: &PushEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for l in self.listeners_for(&event.name).await {
            match catch_unwind(AssertUnwindSafe(|| l(event))) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => outcome.panicked += 1,
            }
        }
        outcome
    }

    /// Total number of registered listeners
    pub async fn len(&self) -> usize {
        self.listeners.read().await.values().map(Vec::len).sum()
    }

    /// Whether no listeners are registered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of listeners registered for one event
    pub async fn count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .await
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
