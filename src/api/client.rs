//! HTTP API Client
//!
//! Thin bearer-token client for the REST backend. Endpoint shapes are the
//! backend's business; collections are normalised to "array or empty".

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{ApiError, ApiResult, Notice};
use crate::config::ApiConfig;

/// Opaque server record
pub type Record = Value;

/// REST backend client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client. Fails when the base URL is not configured.
    pub fn new(config: &ApiConfig, token: Option<String>) -> ApiResult<Self> {
        let base_url = config.require_base_url()?.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ApiError::from_reqwest)?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token (e.g., after rotation or sign-out)
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Copy of this client using a different token
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiError::Unauthorized(status.as_u16()));
        }

        let text = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&text).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            }),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let text = response.text().await.map_err(ApiError::from_reqwest)?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?
        };
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Self::decode(response).await
    }

    /// GET a collection. Non-array bodies become an empty list.
    pub async fn get_collection(&self, path: &str) -> ApiResult<Vec<Record>> {
        let value: Value = self.get_json(path).await?;
        Ok(normalize_collection(value))
    }

    /// GET a collection, converting any failure into an empty list plus
    /// a notice for the user
    pub async fn collection_or_empty(&self, path: &str) -> (Vec<Record>, Option<Notice>) {
        match self.get_collection(path).await {
            Ok(records) => (records, None),
            Err(e) => {
                tracing::warn!(path, error = %e, "Fetch failed; showing empty list");
                (Vec::new(), Some(e.notice()))
            }
        }
    }

    /// POST a JSON body
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Self::decode(response).await
    }

    /// PUT a JSON body
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.request(Method::PUT, path).json(body))
            .await?;
        Self::decode(response).await
    }

    /// DELETE a resource
    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Turn a collection response into a list.
///
/// Accepts a bare array or an object wrapping one under `data` or
/// `items`; anything else is an empty list.
pub fn normalize_collection(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ["data", "items"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| match value.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
}
