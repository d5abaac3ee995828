//! The single request path every component talks to the server through.
//!
//! Every call is one round-trip: the bearer token (if any) is attached,
//! non-2xx answers are folded into [`ClientError::Api`] with the server's
//! `message` when it sent one, and success bodies come back as JSON.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskmate_shared::Payload;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use crate::transport::{HttpRequest, Method, Transport};

pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "configured api client");
        Self {
            base_url,
            transport,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let mut headers = Vec::new();
        let body = match body {
            Some(value) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(
                    serde_json::to_string(value)
                        .map_err(|err| ClientError::Encode(err.to_string()))?,
                )
            }
            None => None,
        };
        if let Some(token) = self.session.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let request = HttpRequest {
            method,
            url: join_url(&self.base_url, path),
            headers,
            body,
        };
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let message = error_message(response.status, &response.body);
            warn!(status = response.status, message = %message, "request failed");
            return Err(ClientError::Api {
                status: response.status,
                message,
            });
        }

        debug!(status = response.status, "request succeeded");
        parse_success_body(&response.body)
    }

    /// Serializes `body` and sends it.
    pub async fn send<B>(&self, method: Method, path: &str, body: &B) -> ClientResult<Value>
    where
        B: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(body).map_err(|err| ClientError::Encode(err.to_string()))?;
        self.request(path, method, Some(&value)).await
    }

    /// `GET` decoded into `T`, unwrapping the server envelope when present.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let value = self.request(path, Method::Get, None).await?;
        decode_payload(value)
    }
}

/// Decodes a success body that may or may not be wrapped in the server's
/// `{success, message, data}` envelope.
pub fn decode_payload<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    let payload: Payload<T> =
        serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))?;
    payload
        .into_inner()
        .ok_or_else(|| ClientError::Decode("response carried no data".to_string()))
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn parse_success_body(body: &str) -> ClientResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|err| ClientError::Decode(err.to_string()))
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
