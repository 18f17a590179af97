// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket event stream using tokio-tungstenite.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use sk_core::protocol::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::transport::{EventStream, TransportError, TransportFuture};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connected push stream.
pub struct WebSocketEventStream {
    /// `None` once the connection has closed or broken.
    ws: Option<Connection>,
}

struct Connection {
    sink: SplitSink<Socket, Message>,
    stream: SplitStream<Socket>,
}

/// Classify a failed handshake.
fn handshake_error(error: WsError) -> TransportError {
    match &error {
        WsError::Http(response) => match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                TransportError::Unauthenticated(format!("stream handshake rejected: {error}"))
            }
            StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => {
                TransportError::Unavailable(format!("server has no event stream: {error}"))
            }
            _ => TransportError::Network(error.to_string()),
        },
        WsError::Url(_) | WsError::HttpFormat(_) => {
            TransportError::Unavailable(format!("invalid stream url: {error}"))
        }
        _ => TransportError::Network(error.to_string()),
    }
}

impl WebSocketEventStream {
    /// Open a stream at `url`, authenticating with a bearer token if given.
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self, TransportError> {
        let mut request = url.into_client_request().map_err(handshake_error)?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Unknown(format!("invalid token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(handshake_error)?;
        debug!(url, "event stream connected");

        let (sink, stream) = socket.split();
        Ok(WebSocketEventStream {
            ws: Some(Connection { sink, stream }),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

impl EventStream for WebSocketEventStream {
    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let ws = self
                .ws
                .as_mut()
                .ok_or_else(|| TransportError::Network("stream closed".to_string()))?;

            let json = msg
                .to_json()
                .map_err(|e| TransportError::Unknown(format!("failed to encode message: {e}")))?;

            if let Err(e) = ws.sink.send(Message::Text(json.into())).await {
                self.ws = None;
                return Err(TransportError::Network(e.to_string()));
            }
            // Flush so a dead connection surfaces here rather than on the next recv.
            if let Err(e) = ws.sink.flush().await {
                self.ws = None;
                return Err(TransportError::Network(e.to_string()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            let Some(ws) = self.ws.as_mut() else {
                return Ok(None);
            };

            loop {
                match ws.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let msg = ServerMessage::from_json(&text).map_err(|e| {
                            TransportError::Unknown(format!("invalid server message: {e}"))
                        })?;
                        return Ok(Some(msg));
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        self.ws = None;
                        return Ok(None);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.ws = None;
                        return Err(TransportError::Network(e.to_string()));
                    }
                }
            }
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if let Some(mut ws) = self.ws.take() {
                if let Err(e) = ws.sink.close().await {
                    debug!(error = %e, "error closing event stream");
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
