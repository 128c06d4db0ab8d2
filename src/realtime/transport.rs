//! Transport Seam
//!
//! The manager never talks to a socket directly. It asks a [`Transport`]
//! for a [`Connection`] and then pulls [`TransportEvent`]s from it, which
//! lets tests inject an in-memory transport.

use async_trait::async_trait;
use thiserror::Error;

use super::messages::TransportEvent;

/// Everything needed to open one authenticated channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Full channel URL (ws:// or wss://), without credentials
    pub url: String,
    /// Bearer token for the handshake
    pub token: String,
}

impl ConnectRequest {
    /// Build a request from the REST base URL and a channel path.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`.
    pub fn from_api_base(
        api_base: &str,
        path: &str,
        token: &str,
    ) -> Result<Self, RealtimeError> {
        let mut url = reqwest::Url::parse(api_base)
            .map_err(|e| RealtimeError::InvalidUrl(format!("{}: {}", api_base, e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(RealtimeError::InvalidUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| RealtimeError::InvalidUrl(api_base.to_string()))?;

        let base_path = url.path().trim_end_matches('/').to_string();
        let channel_path = format!("{}/{}", base_path, path.trim_start_matches('/'));
        url.set_path(&channel_path);
        url.set_query(None);

        Ok(Self {
            url: url.to_string(),
            token: token.to_string(),
        })
    }

    /// URL carrying the token as a `token` query parameter
    pub fn url_with_token(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}token={}",
            self.url,
            sep,
            urlencoding::encode(&self.token)
        )
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Opens connections for the manager
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform one handshake attempt
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn Connection>, RealtimeError>;
}

/// A live, authenticated connection
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next event. Once `Closed` is returned the connection
    /// is finished.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the connection from this side
    async fn close(&mut self);
}

/// Errors raised inside the realtime layer.
///
/// None of these reach callers of the manager; they are reported through
/// the suppressed logging path.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Handshake rejected with status {0}")]
    Rejected(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("Connection timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base_becomes_ws() {
        let req = ConnectRequest::from_api_base("http://localhost:5000/api", "/realtime", "t")
            .unwrap();
        assert_eq!(req.url, "ws://localhost:5000/api/realtime");
    }

    #[test]
    fn test_https_base_becomes_wss() {
        let req =
            ConnectRequest::from_api_base("https://ops.example.com/", "realtime", "t").unwrap();
        assert_eq!(req.url, "wss://ops.example.com/realtime");
    }

    #[test]
    fn test_invalid_base_is_rejected() {
        assert!(matches!(
            ConnectRequest::from_api_base("not a url", "/realtime", "t"),
            Err(RealtimeError::InvalidUrl(_))
        ));
        assert!(matches!(
            ConnectRequest::from_api_base("ftp://example.com", "/realtime", "t"),
            Err(RealtimeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_token_is_encoded() {
        let req = ConnectRequest {
            url: "ws://localhost/realtime".into(),
            token: "a b+c".into(),
        };
        assert_eq!(req.url_with_token(), "ws://localhost/realtime?token=a%20b%2Bc");
        assert_eq!(req.bearer(), "Bearer a b+c");
    }
}
