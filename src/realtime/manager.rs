//! Realtime Channel Manager
//!
//! Owns at most one authenticated push-event channel and hands it out to
//! the pages that want events. Each channel is driven by a supervisor
//! task that performs the handshake, dispatches events to listeners and
//! applies the reconnection policy.
//!
//! ## Reconnection policy
//!
//! - Each connection phase makes up to `max_attempts` handshake attempts
//!   with linear backoff between them, all within `connect_timeout`.
//! - Running out of either gives up for good: listeners are detached and
//!   the channel is discarded. A later `initialize` starts from scratch.
//! - An intentional close (ours or the server's) resets the error count
//!   and is never retried. Any other drop starts a new connection phase.
//!
//! Nothing here returns an error to callers. Realtime is an optimisation;
//! pages keep polling and treat a missing channel as "no events".

use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use super::handle::{ChannelHandle, ChannelState};
use super::messages::TransportEvent;
use super::registry::Listener;
use super::report_suppressed;
use super::transport::{ConnectRequest, Connection, RealtimeError, Transport};
use crate::config::RealtimeConfig;

/// Owns the single push-event channel
pub struct RealtimeManager {
    transport: Arc<dyn Transport>,
    api_base: String,
    config: RealtimeConfig,
    production: bool,
    slot: RwLock<Option<ChannelHandle>>,
}

impl RealtimeManager {
    /// Create a manager.
    ///
    /// `api_base` is the REST base URL; the channel URL is derived from it.
    /// `production` raises the level of suppressed error logs.
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base: impl Into<String>,
        config: RealtimeConfig,
        production: bool,
    ) -> Self {
        Self {
            transport,
            api_base: api_base.into(),
            config,
            production,
            slot: RwLock::new(None),
        }
    }

    /// Open a channel authenticated with `token`.
    ///
    /// Returns the existing handle if a live channel already uses the same
    /// token. A different token replaces the existing channel. Returns
    /// `None` when no token is given or the channel URL cannot be built.
    pub async fn initialize(&self, token: &str) -> Option<ChannelHandle> {
        if token.trim().is_empty() {
            tracing::warn!("Realtime unavailable: no token supplied");
            return None;
        }

        let mut slot = self.slot.write().await;

        if let Some(existing) = slot.as_ref() {
            if existing.is_live() && existing.token() == token {
                tracing::debug!(channel_id = %existing.id(), "Reusing realtime channel");
                return Some(existing.clone());
            }
        }

        let request = match ConnectRequest::from_api_base(&self.api_base, &self.config.path, token)
        {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Realtime unavailable");
                if let Some(previous) = slot.take() {
                    drop(slot);
                    previous.shutdown().await;
                }
                return None;
            }
        };

        // Stop the old channel before the new one starts; wait for it only
        // after the slot is released.
        let previous = slot.take();
        if let Some(previous) = &previous {
            tracing::info!(channel_id = %previous.id(), "Replacing realtime channel");
            previous.detach().await;
        }

        let handle = ChannelHandle::new(token);
        let supervisor = Supervisor {
            handle: handle.clone(),
            transport: Arc::clone(&self.transport),
            request,
            config: self.config.clone(),
            production: self.production,
        };
        let shutdown = handle.shutdown_signal();
        let task = tokio::spawn(supervisor.run(shutdown));
        handle.attach_task(task).await;

        tracing::info!(channel_id = %handle.id(), "Realtime channel initializing");
        *slot = Some(handle.clone());
        drop(slot);

        if let Some(previous) = previous {
            previous.shutdown().await;
        }
        Some(handle)
    }

    /// Close the channel, if any, and reset its counters. Safe to call
    /// when nothing is open.
    pub async fn disconnect(&self) {
        let previous = self.slot.write().await.take();
        match previous {
            Some(handle) => {
                handle.shutdown().await;
                tracing::info!(channel_id = %handle.id(), "Realtime channel disconnected");
            }
            None => tracing::trace!("Disconnect with no realtime channel"),
        }
    }

    /// The live channel, if any. Never opens one.
    pub async fn current(&self) -> Option<ChannelHandle> {
        {
            let slot = self.slot.read().await;
            match slot.as_ref() {
                None => return None,
                Some(handle) if handle.is_live() => return Some(handle.clone()),
                Some(_) => {}
            }
        }

        // The supervisor gave up on its own; discard the handle
        let mut slot = self.slot.write().await;
        if slot.as_ref().map(|h| !h.is_live()).unwrap_or(false) {
            if let Some(retired) = slot.take() {
                tracing::debug!(channel_id = %retired.id(), state = %retired.state(), "Discarded retired channel");
            }
        }
        slot.clone()
    }

    /// State of the managed channel; `Uninitialized` when there is none
    pub async fn state(&self) -> ChannelState {
        self.current()
            .await
            .map(|h| h.state())
            .unwrap_or(ChannelState::Uninitialized)
    }

    /// Replace the channel with one using a rotated token
    pub async fn reauthenticate(&self, new_token: &str) -> Option<ChannelHandle> {
        self.disconnect().await;
        self.initialize(new_token).await
    }

    /// Attach a listener to the live channel. Returns `false` (and does
    /// nothing) when no channel is live; callers must subscribe again after
    /// a later `initialize`.
    pub async fn subscribe(&self, event: &str, listener: Listener) -> bool {
        match self.current().await {
            Some(handle) => handle.on(event, listener).await,
            None => {
                tracing::debug!(event, "No realtime channel; subscribe ignored");
                false
            }
        }
    }

    /// Detach a listener (or every listener for `event` when `None`) from
    /// the live channel. Returns how many were removed.
    pub async fn unsubscribe(&self, event: &str, listener: Option<&Listener>) -> usize {
        match self.current().await {
            Some(handle) => handle.off(event, listener).await,
            None => 0,
        }
    }
}

impl Drop for RealtimeManager {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().take() {
            handle.signal_shutdown();
        }
    }
}

/// Drives one channel from handshake to its terminal state
struct Supervisor {
    handle: ChannelHandle,
    transport: Arc<dyn Transport>,
    request: ConnectRequest,
    config: RealtimeConfig,
    production: bool,
}

impl Supervisor {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut reconnecting = false;

        loop {
            let connected = tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                conn = self.connect_phase(reconnecting) => conn,
            };

            let mut conn = match connected {
                Some(conn) => conn,
                None => {
                    tracing::warn!(
                        channel_id = %self.handle.id(),
                        errors = self.handle.error_count(),
                        "Realtime connection attempts exhausted; giving up"
                    );
                    self.handle.retire(ChannelState::DisconnectedExhausted).await;
                    return;
                }
            };

            self.handle.reset_errors();
            self.handle.set_state(ChannelState::Connected);
            tracing::info!(channel_id = %self.handle.id(), "Realtime channel connected");

            let reason = loop {
                let next = tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        conn.close().await;
                        return;
                    }
                    next = conn.next_event() => next,
                };

                match next {
                    TransportEvent::Event(event) => {
                        let outcome = self.handle.listeners().dispatch(&event).await;
                        if outcome.panicked > 0 {
                            report_suppressed(
                                self.production,
                                "listener",
                                &format!("{} listener(s) panicked on '{}'", outcome.panicked, event.name),
                            );
                        }
                    }
                    TransportEvent::Closed(reason) => break reason,
                }
            };

            if reason.is_intentional() {
                tracing::info!(channel_id = %self.handle.id(), reason = %reason, "Realtime channel closed");
                self.handle.reset_errors();
                self.handle.retire(ChannelState::DisconnectedClean).await;
                return;
            }

            report_suppressed(self.production, "transport", &reason);
            self.handle.set_state(ChannelState::DisconnectedRetrying);
            reconnecting = true;
        }
    }

    /// One connection phase bounded by the attempt cap and the timeout
    async fn connect_phase(&self, reconnecting: bool) -> Option<Box<dyn Connection>> {
        let budget = self.config.connect_timeout();
        match tokio::time::timeout(budget, self.attempt_loop(reconnecting)).await {
            Ok(conn) => conn,
            Err(_) => {
                report_suppressed(
                    self.production,
                    "connect",
                    &RealtimeError::Timeout(self.config.connect_timeout_secs),
                );
                None
            }
        }
    }

    async fn attempt_loop(&self, reconnecting: bool) -> Option<Box<dyn Connection>> {
        let limit = self.config.attempt_limit();

        if reconnecting {
            tokio::time::sleep(self.config.backoff_delay(1)).await;
        }

        loop {
            self.handle.record_attempt();
            tracing::debug!(
                channel_id = %self.handle.id(),
                attempt = self.handle.error_count() + 1,
                url = %self.request.url,
                "Realtime handshake"
            );

            match self.transport.connect(&self.request).await {
                Ok(conn) => return Some(conn),
                Err(e) => {
                    let errors = self.handle.record_error();
                    report_suppressed(self.production, "connect", &e);
                    if errors >= limit {
                        return None;
                    }
                    tokio::time::sleep(self.config.backoff_delay(errors)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::messages::{DisconnectReason, PushEvent};
    use crate::realtime::registry::listener;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// What the fake transport does on the next handshake
    #[derive(Clone, Copy)]
    enum Step {
        Fail,
        /// Fail after this many milliseconds
        FailAfter(u64),
        Hang,
        Accept,
    }

    /// Test side of an accepted fake connection
    struct Link {
        events: mpsc::UnboundedSender<TransportEvent>,
        closes: Arc<AtomicUsize>,
    }

    struct FakeTransport {
        steps: Mutex<VecDeque<Step>>,
        fallback: Step,
        requests: Mutex<Vec<ConnectRequest>>,
        links: Mutex<Vec<Link>>,
        close_delay: Duration,
    }

    impl FakeTransport {
        fn new(steps: &[Step], fallback: Step) -> Arc<Self> {
            Self::with_close_delay(steps, fallback, Duration::ZERO)
        }

        /// Accepted connections take `close_delay` to close
        fn with_close_delay(steps: &[Step], fallback: Step, close_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.iter().copied().collect()),
                fallback,
                requests: Mutex::new(Vec::new()),
                links: Mutex::new(Vec::new()),
                close_delay,
            })
        }

        fn attempts(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn tokens(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.token.clone())
                .collect()
        }

        fn push(&self, link: usize, event: TransportEvent) {
            self.links.lock().unwrap()[link].events.send(event).unwrap();
        }

        fn closes(&self, link: usize) -> usize {
            self.links.lock().unwrap()[link].closes.load(Ordering::SeqCst)
        }
    }

    struct FakeConnection {
        events: mpsc::UnboundedReceiver<TransportEvent>,
        closes: Arc<AtomicUsize>,
        close_delay: Duration,
    }

    #[async_trait]
    impl Connection for FakeConnection {
        async fn next_event(&mut self) -> TransportEvent {
            match self.events.recv().await {
                Some(event) => event,
                None => TransportEvent::Closed(DisconnectReason::TransportClose),
            }
        }

        async fn close(&mut self) {
            if !self.close_delay.is_zero() {
                tokio::time::sleep(self.close_delay).await;
            }
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn Connection>, RealtimeError> {
            self.requests.lock().unwrap().push(request.clone());
            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback);

            match step {
                Step::Fail => Err(RealtimeError::Handshake("connection refused".into())),
                Step::FailAfter(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Err(RealtimeError::Handshake("connection reset".into()))
                }
                Step::Hang => std::future::pending().await,
                Step::Accept => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let closes = Arc::new(AtomicUsize::new(0));
                    self.links.lock().unwrap().push(Link {
                        events: tx,
                        closes: Arc::clone(&closes),
                    });
                    Ok(Box::new(FakeConnection {
                        events: rx,
                        closes,
                        close_delay: self.close_delay,
                    }))
                }
            }
        }
    }

    fn manager(transport: &Arc<FakeTransport>) -> RealtimeManager {
        let transport: Arc<dyn Transport> = transport.clone();
        RealtimeManager::new(
            transport,
            "http://localhost:5000/api",
            RealtimeConfig::default(),
            false,
        )
    }

    async fn connected(handle: &ChannelHandle) {
        assert_eq!(
            handle.wait_for(|s| s == ChannelState::Connected).await,
            ChannelState::Connected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_token_reuses_channel() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);

        let first = manager.initialize("token-a").await.unwrap();
        connected(&first).await;
        let second = manager.initialize("token-a").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_token_replaces_channel() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let l = listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let old = manager.initialize("token-a").await.unwrap();
        connected(&old).await;
        assert!(manager.subscribe("order:created", Arc::clone(&l)).await);
        assert!(manager.subscribe("slot:updated", Arc::clone(&l)).await);

        let new = manager.initialize("token-b").await.unwrap();

        assert_ne!(old, new);
        assert!(!old.is_live());
        assert_eq!(old.listener_count().await, 0);
        assert_eq!(Arc::strong_count(&l), 1);
        assert_eq!(transport.closes(0), 1);
        assert_eq!(new.token(), "token-b");

        connected(&new).await;
        assert_eq!(transport.tokens(), vec!["token-a", "token-b"]);
        assert_eq!(manager.current().await, Some(new));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_errors() {
        let transport = FakeTransport::new(&[], Step::Fail);
        let manager = manager(&transport);

        let handle = manager.initialize("token-a").await.unwrap();
        let state = handle.wait_for(ChannelState::is_terminal).await;

        assert_eq!(state, ChannelState::DisconnectedExhausted);
        assert_eq!(transport.attempts(), 3);
        assert_eq!(handle.error_count(), 3);
        assert!(manager.current().await.is_none());
        assert_eq!(manager.state().await, ChannelState::Uninitialized);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_incremental() {
        let transport = FakeTransport::new(&[], Step::Fail);
        let manager = manager(&transport);
        let start = tokio::time::Instant::now();

        let handle = manager.initialize("token-a").await.unwrap();
        handle.wait_for(ChannelState::is_terminal).await;

        // 1s after the first failure, 2s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_exhausts_channel() {
        let transport = FakeTransport::new(&[], Step::Hang);
        let manager = manager(&transport);
        let start = tokio::time::Instant::now();

        let handle = manager.initialize("token-a").await.unwrap();
        let state = handle.wait_for(ChannelState::is_terminal).await;

        assert_eq!(state, ChannelState::DisconnectedExhausted);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert_eq!(transport.attempts(), 1);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_after_exhaustion_starts_clean() {
        let transport = FakeTransport::new(&[Step::Fail, Step::Fail, Step::Fail], Step::Accept);
        let manager = manager(&transport);

        let first = manager.initialize("token-a").await.unwrap();
        first.wait_for(ChannelState::is_terminal).await;

        let second = manager.initialize("token-a").await.unwrap();
        assert_ne!(first, second);
        connected(&second).await;
        assert_eq!(second.error_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_without_channel_is_noop() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);

        manager.disconnect().await;
        manager.disconnect().await;

        assert!(manager.current().await.is_none());
        assert_eq!(manager.state().await, ChannelState::Uninitialized);
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_disconnect_resets_errors() {
        let transport = FakeTransport::new(&[Step::Fail, Step::Fail], Step::Hang);
        let manager = manager(&transport);

        let handle = manager.initialize("token-a").await.unwrap();
        while transport.attempts() < 3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(handle.error_count(), 2);

        manager.disconnect().await;

        assert_eq!(handle.error_count(), 0);
        assert_eq!(handle.state(), ChannelState::DisconnectedClean);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_disconnect_is_clean_and_not_retried() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);

        let handle = manager.initialize("token-a").await.unwrap();
        connected(&handle).await;
        manager
            .subscribe("order:created", listener(|_| {}))
            .await;

        transport.push(0, TransportEvent::Closed(DisconnectReason::ServerDisconnect));
        let state = handle.wait_for(ChannelState::is_terminal).await;

        assert_eq!(state, ChannelState::DisconnectedClean);
        assert_eq!(handle.error_count(), 0);
        assert_eq!(handle.listener_count().await, 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.attempts(), 1);
        assert!(manager.current().await.is_none());
    }

    async fn assert_reconnects_after(reason: DisconnectReason) {
        let transport = FakeTransport::new(&[Step::Accept, Step::Fail], Step::Accept);
        let manager = manager(&transport);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let handle = manager.initialize("token-a").await.unwrap();
        connected(&handle).await;
        manager
            .subscribe(
                "order:statusUpdated",
                listener(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let mut states = handle.watch_state();
        transport.push(0, TransportEvent::Closed(reason));
        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), ChannelState::DisconnectedRetrying);
        while transport.attempts() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        connected(&handle).await;

        assert_eq!(transport.attempts(), 3);
        assert_eq!(handle.error_count(), 0);
        assert_eq!(manager.current().await, Some(handle.clone()));

        // Listeners survive the reconnect
        transport.push(
            1,
            TransportEvent::Event(PushEvent::new("order:statusUpdated", json!({"id": 1}))),
        );
        while seen.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_timeout_reconnects() {
        assert_reconnects_after(DisconnectReason::PingTimeout).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_close_reconnects() {
        assert_reconnects_after(DisconnectReason::TransportClose).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_reconnects() {
        assert_reconnects_after(DisconnectReason::TransportError("connection reset".into())).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_during_failing_handshake_resets_errors() {
        // Each handshake fails 100ms in; the second one fails exactly when
        // disconnect is called (100ms + 1s backoff + 100ms).
        for _ in 0..40 {
            let transport = FakeTransport::new(&[], Step::FailAfter(100));
            let manager = manager(&transport);

            let handle = manager.initialize("token-a").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1200)).await;
            manager.disconnect().await;

            assert_eq!(handle.error_count(), 0);
            assert_eq!(handle.state(), ChannelState::DisconnectedClean);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_channel_does_not_block_readers() {
        let transport =
            FakeTransport::with_close_delay(&[], Step::Accept, Duration::from_secs(30));
        let manager = Arc::new(manager(&transport));

        let old = manager.initialize("token-a").await.unwrap();
        connected(&old).await;

        let replacing = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize("token-b").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The old connection is still closing
        assert_eq!(transport.closes(0), 0);
        assert!(!old.is_live());
        let current = tokio::time::timeout(Duration::from_secs(1), manager.current())
            .await
            .expect("current() blocked while the old channel was closing")
            .unwrap();
        assert_eq!(current.token(), "token-b");

        let new = replacing.await.unwrap().unwrap();
        assert_eq!(new, current);
        assert_eq!(transport.closes(0), 1);
        assert_eq!(old.state(), ChannelState::DisconnectedClean);
    }

    #[tokio::test]
    async fn test_subscribe_without_channel_is_noop() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);
        let l = listener(|_| {});

        assert!(!manager.subscribe("order:created", Arc::clone(&l)).await);
        assert_eq!(manager.unsubscribe("order:created", Some(&l)).await, 0);
        assert_eq!(manager.unsubscribe("order:created", None).await, 0);
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_reach_listeners_until_unsubscribed() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let l = listener(move |e: &PushEvent| log.lock().unwrap().push(e.data.clone()));

        let handle = manager.initialize("token-a").await.unwrap();
        connected(&handle).await;
        manager.subscribe("appointment:created", Arc::clone(&l)).await;

        transport.push(
            0,
            TransportEvent::Event(PushEvent::new("appointment:created", json!(1))),
        );
        while seen.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(manager.unsubscribe("appointment:created", Some(&l)).await, 1);
        transport.push(
            0,
            TransportEvent::Event(PushEvent::new("appointment:created", json!(2))),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock().unwrap(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_blank_token_or_bad_url_returns_none() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);
        assert!(manager.initialize("").await.is_none());
        assert!(manager.initialize("   ").await.is_none());

        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let broken = RealtimeManager::new(
            dyn_transport,
            "::not a url::",
            RealtimeConfig::default(),
            false,
        );
        assert!(broken.initialize("token-a").await.is_none());
        assert!(broken.current().await.is_none());
        assert_eq!(transport.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauthenticate_rotates_token() {
        let transport = FakeTransport::new(&[], Step::Accept);
        let manager = manager(&transport);

        let old = manager.initialize("token-a").await.unwrap();
        connected(&old).await;
        let new = manager.reauthenticate("token-b").await.unwrap();

        assert_eq!(old.state(), ChannelState::DisconnectedClean);
        assert_eq!(transport.closes(0), 1);
        connected(&new).await;
        assert_eq!(new.token(), "token-b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_attempt_cap() {
        let transport = FakeTransport::new(&[], Step::Fail);
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let manager = RealtimeManager::new(
            dyn_transport,
            "http://localhost:5000/api",
            RealtimeConfig {
                max_attempts: 5,
                connect_timeout_secs: 60,
                ..RealtimeConfig::default()
            },
            true,
        );

        let handle = manager.initialize("token-a").await.unwrap();
        handle.wait_for(ChannelState::is_terminal).await;
        assert_eq!(transport.attempts(), 5);
    }
}
