//! Console Session
//!
//! Holds the signed-in user's token and profile, keeps the realtime
//! channel in step with the token, and signs the user out after a period
//! without activity.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::realtime::{ChannelHandle, RealtimeManager};

/// Signed-in state
#[derive(Debug, Clone)]
pub struct SessionData {
    pub token: String,
    /// User profile as returned by the backend
    pub user: Value,
    pub signed_in_at: DateTime<Utc>,
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    TokenRotated,
    SignedOut,
    /// Cleared for inactivity; the user must sign in again
    Expired,
}

/// Owns the session and its inactivity timeout
pub struct SessionController {
    data: RwLock<Option<SessionData>>,
    realtime: Option<Arc<RealtimeManager>>,
    inactivity_timeout: Duration,
    last_activity: Mutex<Instant>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Create a controller. Pass `None` for `realtime` to run polling-only.
    pub fn new(config: &SessionConfig, realtime: Option<Arc<RealtimeManager>>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            data: RwLock::new(None),
            realtime,
            inactivity_timeout: config.inactivity_timeout(),
            last_activity: Mutex::new(Instant::now()),
            events,
        }
    }

    /// Receive session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Record user activity
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn idle_deadline(&self) -> Instant {
        let last = self
            .last_activity
            .lock()
            .map(|l| *l)
            .unwrap_or_else(|poisoned| *poisoned.into_inner());
        last + self.inactivity_timeout
    }

    /// Store a new session and open the realtime channel for it
    pub async fn sign_in(&self, token: impl Into<String>, user: Value) -> Option<ChannelHandle> {
        let token = token.into();
        *self.data.write().await = Some(SessionData {
            token: token.clone(),
            user,
            signed_in_at: Utc::now(),
        });
        self.touch();
        tracing::info!("Signed in");
        self.emit(SessionEvent::SignedIn);

        match &self.realtime {
            Some(realtime) => realtime.initialize(&token).await,
            None => None,
        }
    }

    /// Replace the token of the current session and re-authenticate the
    /// realtime channel. Returns `false` when nobody is signed in.
    pub async fn rotate_token(&self, new_token: impl Into<String>) -> bool {
        let new_token = new_token.into();
        {
            let mut data = self.data.write().await;
            match data.as_mut() {
                Some(session) => session.token = new_token.clone(),
                None => return false,
            }
        }

        if let Some(realtime) = &self.realtime {
            realtime.reauthenticate(&new_token).await;
        }
        tracing::info!("Session token rotated");
        self.emit(SessionEvent::TokenRotated);
        true
    }

    /// Clear the session and close the realtime channel
    pub async fn sign_out(&self) -> bool {
        let cleared = self.clear().await;
        if cleared {
            tracing::info!("Signed out");
            self.emit(SessionEvent::SignedOut);
        }
        cleared
    }

    async fn clear(&self) -> bool {
        let previous = self.data.write().await.take();
        if let Some(realtime) = &self.realtime {
            realtime.disconnect().await;
        }
        previous.is_some()
    }

    pub async fn token(&self) -> Option<String> {
        self.data.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn user(&self) -> Option<Value> {
        self.data.read().await.as_ref().map(|s| s.user.clone())
    }

    pub async fn is_active(&self) -> bool {
        self.data.read().await.is_some()
    }

    /// Expire the session if the idle deadline has passed
    pub async fn check_inactivity(&self) -> bool {
        if Instant::now() < self.idle_deadline() || !self.is_active().await {
            return false;
        }
        if self.clear().await {
            tracing::info!(
                timeout_secs = self.inactivity_timeout.as_secs(),
                "Session expired after inactivity"
            );
            self.emit(SessionEvent::Expired);
            return true;
        }
        false
    }

    /// Watch for inactivity in the background
    pub fn spawn_inactivity_monitor(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let deadline = self.idle_deadline();
                if Instant::now() < deadline {
                    tokio::time::sleep_until(deadline).await;
                    continue;
                }
                if !self.check_inactivity().await {
                    // Nobody signed in; look again after a full period
                    tokio::time::sleep(self.inactivity_timeout).await;
                }
            }
        })
    }
}
