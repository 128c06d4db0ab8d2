//! # MedConsole
//!
//! Client core of a healthcare operations admin console: REST access to the
//! backend, one shared realtime push-event channel, dashboard loading, record
//! export and the signed-in session.
//!
//! ## Modules
//!
//! - [`realtime`]: push-event channel with bounded reconnection
//! - [`api`]: bearer-token REST client and user notices
//! - [`dashboard`]: concurrent collection loading and stats
//! - [`export`]: record filtering and CSV/JSON rendering
//! - [`session`]: session state and inactivity timeout
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medconsole::realtime::{event_names, listener, RealtimeManager, WsTransport};
//! use medconsole::session::SessionController;
//! use medconsole::Config;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let base_url = config.api.require_base_url()?.to_string();
//!
//!     let transport = Arc::new(WsTransport::new(
//!         config.realtime.ping_timeout(),
//!         config.logging.production,
//!     ));
//!     let realtime = Arc::new(RealtimeManager::new(
//!         transport,
//!         base_url,
//!         config.realtime.clone(),
//!         config.logging.production,
//!     ));
//!
//!     let session = SessionController::new(&config.session, Some(Arc::clone(&realtime)));
//!     session.sign_in("session-token", serde_json::json!({"role": "admin"})).await;
//!
//!     realtime
//!         .subscribe(event_names::APPOINTMENT_CREATED, listener(|e| println!("{}", e.data)))
//!         .await;
//!
//!     session.sign_out().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod realtime;
pub mod session;

pub use api::{ApiClient, ApiError, ApiResult, Notice, NoticeLevel, Record};

pub use config::{
    ApiConfig, Config, ConfigError, DashboardConfig, LoggingConfig, RealtimeConfig,
    SessionConfig,
};

pub use dashboard::{Collections, DashboardLoader, DashboardSnapshot, DashboardStats};

pub use export::{ExportError, ExportFormat};

pub use realtime::{
    ChannelHandle, ChannelState, PushEvent, RealtimeError, RealtimeManager, Transport,
    WsTransport,
};

pub use session::{SessionController, SessionEvent};
