//! Realtime Message Types
//!
//! Defines the frames carried over the push-event channel and the
//! classification of why a channel went away.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known push event names emitted by the backend
pub mod event_names {
    pub const APPOINTMENT_CREATED: &str = "appointment:created";
    pub const APPOINTMENT_UPDATED: &str = "appointment:updated";
    pub const ORDER_CREATED: &str = "order:created";
    pub const ORDER_STATUS_UPDATED: &str = "order:statusUpdated";
    pub const PRESCRIPTION_CREATED: &str = "prescription:created";
    pub const SLOT_UPDATED: &str = "slot:updated";
    pub const INVENTORY_UPDATED: &str = "inventory:updated";
    pub const NOTIFICATION_NEW: &str = "notification:new";

    /// Listener key that receives every event
    pub const WILDCARD: &str = "*";

    /// All named events a console page may care about
    pub const ALL: &[&str] = &[
        APPOINTMENT_CREATED,
        APPOINTMENT_UPDATED,
        ORDER_CREATED,
        ORDER_STATUS_UPDATED,
        PRESCRIPTION_CREATED,
        SLOT_UPDATED,
        INVENTORY_UPDATED,
        NOTIFICATION_NEW,
    ];

    /// Whether `name` is a known event or the wildcard
    pub fn is_known(name: &str) -> bool {
        name == WILDCARD || ALL.contains(&name)
    }
}

/// A named notification pushed by the backend.
///
/// The payload is advisory: consumers re-fetch authoritative state
/// rather than trusting `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Event name (e.g., "order:statusUpdated")
    #[serde(rename = "event")]
    pub name: String,
    /// Optional payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PushEvent {
    /// Create an event with a payload
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Decode a text frame
    pub fn from_frame(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as a text frame
    pub fn to_frame(&self) -> String {
        // A String key and a serde_json::Value never fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Why a channel stopped delivering events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// This client asked to close the channel
    ClientDisconnect,
    /// The server closed the channel on purpose
    ServerDisconnect,
    /// Nothing arrived within the ping window
    PingTimeout,
    /// The underlying connection ended without a clean close
    TransportClose,
    /// The underlying connection failed
    TransportError(String),
}

impl DisconnectReason {
    /// Intentional disconnects reset the error counter and are not retried.
    pub fn is_intentional(&self) -> bool {
        matches!(
            self,
            DisconnectReason::ClientDisconnect | DisconnectReason::ServerDisconnect
        )
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientDisconnect => write!(f, "client disconnect"),
            DisconnectReason::ServerDisconnect => write!(f, "server disconnect"),
            DisconnectReason::PingTimeout => write!(f, "ping timeout"),
            DisconnectReason::TransportClose => write!(f, "transport close"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// What a live connection yields next
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A push event arrived
    Event(PushEvent),
    /// The connection is gone
    Closed(DisconnectReason),
}
