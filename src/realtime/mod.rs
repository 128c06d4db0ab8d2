//! Realtime Push Events
//!
//! A single authenticated push-event channel shared by every page of the
//! console. Events only tell pages to re-fetch; they never carry the
//! authoritative state, so losing the channel degrades to polling.
//!
//! ## Architecture
//!
//! - **RealtimeManager**: owns the channel, applies the reconnection policy
//! - **ChannelHandle**: the live channel, its state and its listeners
//! - **ListenerRegistry**: event name → ordered callbacks
//! - **Transport**: seam between the manager and the socket
//! - **WsTransport**: WebSocket implementation of the seam
//!
//! ## Example
//!
//! ```rust,no_run
//! use medconsole::config::RealtimeConfig;
//! use medconsole::realtime::{event_names, listener, RealtimeManager, WsTransport};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = RealtimeConfig::default();
//! let transport = Arc::new(WsTransport::new(config.ping_timeout(), false));
//! let manager = RealtimeManager::new(transport, "https://ops.example.com/api", config, false);
//!
//! if manager.initialize("session-token").await.is_some() {
//!     manager
//!         .subscribe(event_names::ORDER_STATUS_UPDATED, listener(|e| {
//!             println!("order changed: {}", e.data);
//!         }))
//!         .await;
//! }
//! # }
//! ```

mod handle;
mod manager;
mod messages;
mod registry;
mod transport;
mod ws;

pub use handle::{ChannelHandle, ChannelState};
pub use manager::RealtimeManager;
pub use messages::{event_names, DisconnectReason, PushEvent, TransportEvent};
pub use registry::{listener, DispatchOutcome, Listener, ListenerRegistry};
pub use transport::{ConnectRequest, Connection, RealtimeError, Transport};
pub use ws::{WsConnection, WsTransport};

use std::fmt::Display;

/// Single sink for every realtime failure. Nothing is propagated; the
/// level is raised to `warn` only in production.
pub(crate) fn report_suppressed(production: bool, layer: &'static str, error: &dyn Display) {
    if production {
        tracing::warn!(layer, error = %error, "Realtime error suppressed");
    } else {
        tracing::debug!(layer, error = %error, "Realtime error suppressed");
    }
}
