//! Channel Handle
//!
//! The live object representing one push-event channel. Cheap to clone;
//! every clone refers to the same channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::{Listener, ListenerRegistry};

/// Lifecycle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel exists
    Uninitialized,
    /// Handshake in progress
    Initializing,
    /// Delivering events
    Connected,
    /// Dropped unexpectedly, reconnecting
    DisconnectedRetrying,
    /// Closed on purpose by either side
    DisconnectedClean,
    /// Gave up after the attempt cap or the connect timeout
    DisconnectedExhausted,
}

impl ChannelState {
    /// Clean and exhausted channels never come back
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChannelState::DisconnectedClean | ChannelState::DisconnectedExhausted
        )
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Uninitialized => "uninitialized",
            ChannelState::Initializing => "initializing",
            ChannelState::Connected => "connected",
            ChannelState::DisconnectedRetrying => "retrying",
            ChannelState::DisconnectedClean => "closed",
            ChannelState::DisconnectedExhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Handle to one authenticated push-event channel
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    id: String,
    token: String,
    listeners: ListenerRegistry,
    state_tx: watch::Sender<ChannelState>,
    shutdown_tx: watch::Sender<bool>,
    error_count: AtomicU32,
    connect_attempts: AtomicU32,
    torn_down: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelHandle {
    pub(crate) fn new(token: &str) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Initializing);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ChannelInner {
                id: Uuid::new_v4().to_string(),
                token: token.to_string(),
                listeners: ListenerRegistry::new(),
                state_tx,
                shutdown_tx,
                error_count: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
                torn_down: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Unique channel identifier
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Token this channel authenticated with
    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the state satisfies `f` and return that state
    pub async fn wait_for<F>(&self, mut f: F) -> ChannelState
    where
        F: FnMut(ChannelState) -> bool,
    {
        let mut rx = self.watch_state();
        let result = rx.wait_for(|s| f(*s)).await.map(|s| *s);
        match result {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    /// Current consecutive connection error count
    pub fn error_count(&self) -> u32 {
        self.inner.error_count.load(Ordering::SeqCst)
    }

    /// Handshake attempts made over the channel's lifetime
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Whether the channel has not been torn down
    pub fn is_live(&self) -> bool {
        !self.inner.torn_down.load(Ordering::SeqCst)
    }

    /// Attach a listener. Returns `false` if the channel is already gone.
    pub async fn on(&self, event: &str, listener: Listener) -> bool {
        if !self.is_live() {
            return false;
        }
        self.inner.listeners.add(event, listener).await;
        true
    }

    /// Detach one listener, or all listeners for `event` when `None`
    pub async fn off(&self, event: &str, listener: Option<&Listener>) -> usize {
        self.inner.listeners.remove(event, listener).await
    }

    /// Number of attached listeners
    pub async fn listener_count(&self) -> usize {
        self.inner.listeners.len().await
    }

    pub(crate) fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    pub(crate) fn set_state(&self, state: ChannelState) {
        self.inner.state_tx.send_replace(state);
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    pub(crate) fn record_attempt(&self) {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a failed connection attempt and return the new total
    pub(crate) fn record_error(&self) -> u32 {
        self.inner.error_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn reset_errors(&self) {
        self.inner.error_count.store(0, Ordering::SeqCst);
    }

    pub(crate) async fn attach_task(&self, task: JoinHandle<()>) {
        *self.inner.task.lock().await = Some(task);
    }

    /// Called by the supervisor when the channel ends on its own. Detaches
    /// listeners; the manager discards the handle on its next access.
    pub(crate) async fn retire(&self, state: ChannelState) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let removed = self.inner.listeners.clear().await;
        self.set_state(state);
        tracing::debug!(channel_id = %self.id(), listeners = removed, state = %state, "Channel retired");
    }

    /// Mark the channel torn down, detach listeners and signal the
    /// supervisor. Does not wait. Returns `false` if it was already down.
    pub(crate) async fn detach(&self) -> bool {
        let first = !self.inner.torn_down.swap(true, Ordering::SeqCst);
        if first {
            let removed = self.inner.listeners.clear().await;
            tracing::debug!(channel_id = %self.id(), listeners = removed, "Listeners detached");
        }
        self.signal_shutdown();
        first
    }

    /// Tear the channel down from outside: detach listeners, stop the
    /// supervisor and wait for it to close the connection. Idempotent.
    ///
    /// Counters are reset only once the supervisor has exited, so a
    /// handshake failing concurrently cannot leave a stale count behind.
    pub(crate) async fn shutdown(&self) {
        self.detach().await;

        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::debug!(channel_id = %self.id(), error = %e, "Channel supervisor ended abnormally");
            }
        }
        self.reset_errors();
        if !self.state().is_terminal() {
            self.set_state(ChannelState::DisconnectedClean);
        }
    }

    /// Ask the supervisor to stop without waiting for it
    pub(crate) fn signal_shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("error_count", &self.error_count())
            .finish()
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ChannelHandle {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::registry::listener;

    #[test]
    fn test_new_handle_is_initializing() {
        let handle = ChannelHandle::new("token-a");
        assert_eq!(handle.state(), ChannelState::Initializing);
        assert_eq!(handle.token(), "token-a");
        assert_eq!(handle.error_count(), 0);
        assert!(handle.is_live());
    }

    #[test]
    fn test_clones_share_identity() {
        let a = ChannelHandle::new("t");
        let b = a.clone();
        let c = ChannelHandle::new("t");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ChannelState::DisconnectedClean.is_terminal());
        assert!(ChannelState::DisconnectedExhausted.is_terminal());
        assert!(!ChannelState::DisconnectedRetrying.is_terminal());
        assert!(!ChannelState::Connected.is_terminal());
    }

    #[tokio::test]
    async fn test_retire_detaches_once_and_refuses_listeners() {
        let handle = ChannelHandle::new("t");
        assert!(handle.on("slot:updated", listener(|_| {})).await);

        handle.retire(ChannelState::DisconnectedExhausted).await;
        assert_eq!(handle.listener_count().await, 0);
        assert_eq!(handle.state(), ChannelState::DisconnectedExhausted);
        assert!(!handle.is_live());

        // A second retire keeps the first terminal state
        handle.retire(ChannelState::DisconnectedClean).await;
        assert_eq!(handle.state(), ChannelState::DisconnectedExhausted);

        assert!(!handle.on("slot:updated", listener(|_| {})).await);
    }

    #[tokio::test]
    async fn test_shutdown_without_task_resets_errors() {
        let handle = ChannelHandle::new("t");
        handle.record_error();
        handle.record_error();

        handle.shutdown().await;
        assert_eq!(handle.error_count(), 0);
        assert_eq!(handle.state(), ChannelState::DisconnectedClean);

        // Idempotent
        handle.shutdown().await;
        assert_eq!(handle.state(), ChannelState::DisconnectedClean);
    }

    #[tokio::test]
    async fn test_detach_signals_without_waiting() {
        let handle = ChannelHandle::new("t");
        let mut stop = handle.shutdown_signal();
        handle.on("order:created", listener(|_| {})).await;

        assert!(handle.detach().await);
        assert!(!handle.detach().await);
        assert!(*stop.borrow_and_update());
        assert_eq!(handle.listener_count().await, 0);
        assert_eq!(handle.state(), ChannelState::Initializing);

        handle.shutdown().await;
        assert_eq!(handle.state(), ChannelState::DisconnectedClean);
    }
}
