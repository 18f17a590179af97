// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-over-HTTP record transport.
//!
//! Routes, relative to the configured base URL:
//!
//! | Call            | Request                                           |
//! |-----------------|---------------------------------------------------|
//! | create          | `POST /api/{collection}`                          |
//! | update          | `PATCH /api/{collection}/{id}`                    |
//! | delete          | `DELETE /api/{collection}/{id}`                   |
//! | query           | `POST /api/{collection}/search`                   |
//! | poll            | `GET /api/channels/{channel}/events?after={id}`   |
//! | ping            | `GET /api/ping`                                   |
//!
//! Mutations carry the queued operation id in an `Idempotency-Key` header.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sk_core::protocol::ChannelEvent;
use sk_core::value::{fields_from_json, fields_to_json};
use sk_core::Fields;
use tracing::debug;

use super::transport::{
    Applied, EventStream, Filter, Mutation, QueryOptions, RecordTransport, TransportError,
    TransportFuture, TransportResult,
};
use super::websocket::WebSocketEventStream;

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// HTTP transport with an optional WebSocket event stream.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    stream_url: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("stream_url", &self.stream_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct MutationResponse {
    id: Option<i64>,
    record: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    filter: &'a Filter,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [String],
    #[serde(flatten)]
    options: &'a QueryOptions,
}

fn no_fields(fields: &&[String]) -> bool {
    fields.is_empty()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    records: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<ChannelEvent>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a non-success status to the failure taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthenticated(detail),
        StatusCode::NOT_FOUND => TransportError::NotFound(detail),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            TransportError::Validation(detail)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TransportError::Timeout,
        _ => TransportError::Unknown(detail),
    }
}

fn classify_request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_decode() {
        TransportError::Unknown(format!("invalid response: {error}"))
    } else {
        TransportError::Network(error.to_string())
    }
}

fn decode_fields(value: serde_json::Value) -> TransportResult<Fields> {
    fields_from_json(value).map_err(|e| TransportError::Unknown(format!("invalid record: {e}")))
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(TransportError::Unknown("remote url must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpTransport {
            base_url,
            stream_url: None,
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// WebSocket URL for the event stream. Without one, only polling is used.
    pub fn with_stream_url(mut self, url: Option<String>) -> Self {
        self.stream_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode its JSON body. An empty body decodes as `T::default()`.
    async fn send<T>(&self, builder: RequestBuilder) -> TransportResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = builder.send().await.map_err(classify_request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_request_error)?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&body)
            .map_err(|e| TransportError::Unknown(format!("invalid response: {e}")))
    }
}

impl Default for SearchResponse {
    fn default() -> Self {
        SearchResponse { records: Vec::new() }
    }
}

impl Default for EventsResponse {
    fn default() -> Self {
        EventsResponse { events: Vec::new() }
    }
}

impl RecordTransport for HttpTransport {
    fn execute<'a>(
        &'a self,
        collection: &'a str,
        key: &'a str,
        mutation: Mutation,
    ) -> TransportFuture<'a, Applied> {
        Box::pin(async move {
            debug!(collection, key, kind = mutation.name(), "http mutation");
            let (builder, known_id) = match &mutation {
                Mutation::Create { payload } => (
                    self.request(Method::POST, collection)
                        .json(&fields_to_json(payload)),
                    None,
                ),
                Mutation::Update { id, payload } => (
                    self.request(Method::PATCH, &format!("{collection}/{id}"))
                        .json(&fields_to_json(payload)),
                    Some(*id),
                ),
                Mutation::Delete { id } => (
                    self.request(Method::DELETE, &format!("{collection}/{id}")),
                    Some(*id),
                ),
            };

            let builder = builder.header(IDEMPOTENCY_KEY, key);
            let response: MutationResponse = self.send(builder).await?;
            let id = response.id.or(known_id).ok_or_else(|| {
                TransportError::Unknown("create response did not include an id".to_string())
            })?;
            let record = response.record.map(decode_fields).transpose()?;
            Ok(Applied { id, record })
        })
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        filter: &'a Filter,
        fields: &'a [String],
        options: &'a QueryOptions,
    ) -> TransportFuture<'a, Vec<Fields>> {
        Box::pin(async move {
            let body = SearchRequest {
                filter,
                fields,
                options,
            };
            let builder = self
                .request(Method::POST, &format!("{collection}/search"))
                .json(&body);
            let response: SearchResponse = self.send(builder).await?;
            response.records.into_iter().map(decode_fields).collect()
        })
    }

    fn open_event_stream(&self) -> TransportFuture<'_, Box<dyn EventStream>> {
        Box::pin(async move {
            let url = self.stream_url.as_deref().ok_or_else(|| {
                TransportError::Unavailable("no stream url configured".to_string())
            })?;
            let stream = WebSocketEventStream::connect(url, self.token.as_deref()).await?;
            Ok(Box::new(stream) as Box<dyn EventStream>)
        })
    }

    fn poll_since<'a>(&'a self, channel: &'a str, last_id: i64) -> TransportFuture<'a, Vec<ChannelEvent>> {
        Box::pin(async move {
            let builder = self.request(
                Method::GET,
                &format!("channels/{channel}/events?after={last_id}"),
            );
            let response: EventsResponse = self.send(builder).await?;
            Ok(response.events)
        })
    }

    fn ping(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let builder = self.request(Method::GET, "ping");
            let _: serde_json::Value = self.send(builder).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
