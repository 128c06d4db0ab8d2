//! REST Backend Access
//!
//! Bearer-token client for the backend's REST API. Every page-level fetch
//! goes through [`ApiClient`]; failures are caught at the call site and
//! turned into a [`Notice`] plus an empty view.
//!
//! # Example
//!
//! ```rust,no_run
//! use medconsole::api::ApiClient;
//! use medconsole::config::ApiConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig {
//!     base_url: Some("https://ops.example.com/api".into()),
//!     ..ApiConfig::default()
//! };
//! let client = ApiClient::new(&config, Some("session-token".into()))?;
//!
//! let (orders, notice) = client.collection_or_empty("/orders").await;
//! if let Some(notice) = notice {
//!     eprintln!("{}", notice.message);
//! }
//! println!("{} orders", orders.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{normalize_collection, ApiClient, Record};
pub use error::{ApiError, ApiResult, Notice, NoticeLevel};
