//! WebSocket Transport
//!
//! [`Transport`] implementation over `tokio-tungstenite`. Frames are JSON
//! text messages of the form `{"event": "<name>", "data": <payload>}`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::messages::{DisconnectReason, PushEvent, TransportEvent};
use super::report_suppressed;
use super::transport::{ConnectRequest, Connection, RealtimeError, Transport};

/// How long `close` waits for the peer to acknowledge
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket client transport
#[derive(Debug, Clone)]
pub struct WsTransport {
    ping_timeout: Duration,
    production: bool,
}

impl WsTransport {
    /// Create a transport. A connection that receives nothing (not even a
    /// ping) for `ping_timeout` is considered dead.
    pub fn new(ping_timeout: Duration, production: bool) -> Self {
        Self {
            ping_timeout,
            production,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn Connection>, RealtimeError> {
        let mut http_request = request
            .url_with_token()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;

        let bearer = HeaderValue::from_str(&request.bearer())
            .map_err(|e| RealtimeError::Handshake(format!("invalid token header: {}", e)))?;
        http_request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, response) = connect_async(http_request).await.map_err(|e| match e {
            WsError::Http(resp) => RealtimeError::Rejected(resp.status().as_u16()),
            other => RealtimeError::Handshake(other.to_string()),
        })?;

        tracing::debug!(
            url = %request.url,
            status = response.status().as_u16(),
            "Realtime handshake complete"
        );

        Ok(Box::new(WsConnection {
            stream,
            ping_timeout: self.ping_timeout,
            production: self.production,
        }))
    }
}

/// One open WebSocket
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ping_timeout: Duration,
    production: bool,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let next = match tokio::time::timeout(self.ping_timeout, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return TransportEvent::Closed(DisconnectReason::PingTimeout),
            };

            match next {
                None => return TransportEvent::Closed(DisconnectReason::TransportClose),
                Some(Err(
                    WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
                )) => return TransportEvent::Closed(DisconnectReason::TransportClose),
                Some(Err(e)) => {
                    return TransportEvent::Closed(DisconnectReason::TransportError(e.to_string()))
                }
                Some(Ok(Message::Text(text))) => match PushEvent::from_frame(&text) {
                    Ok(event) => return TransportEvent::Event(event),
                    Err(e) => {
                        report_suppressed(self.production, "frame", &RealtimeError::Frame(e));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(f) if f.code == CloseCode::Normal => DisconnectReason::ServerDisconnect,
                        _ => DisconnectReason::TransportClose,
                    };
                    return TransportEvent::Closed(reason);
                }
                // Pong replies to pings are queued by tungstenite itself
                Some(Ok(_)) => {}
            }
        }
    }

    async fn close(&mut self) {
        // An unresponsive peer must not hold up the caller
        let stream = &mut self.stream;
        let closed = tokio::time::timeout(CLOSE_GRACE, async move {
            stream.close(None).await?;
            while let Some(Ok(_)) = stream.next().await {}
            Ok::<_, WsError>(())
        })
        .await;

        match closed {
            Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {}
            Ok(Err(e)) => report_suppressed(
                self.production,
                "close",
                &RealtimeError::Transport(e.to_string()),
            ),
            Err(_) => report_suppressed(
                self.production,
                "close",
                &RealtimeError::Transport("peer did not acknowledge close".into()),
            ),
        }
    }
}
