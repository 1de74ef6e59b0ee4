//! Authenticated session.

use std::sync::Arc;

use courier_protocol::AuthorizeResponse;
use courier_protocol::endpoints::{self, API_KEY_HEADER, PART_CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::classify::{ResponseClass, classify};
use crate::config::SessionConfig;
use crate::error::Error;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Owns the API key and the lazily acquired bearer token.
///
/// The token is fetched on first use and then cached for the lifetime of the
/// session (or until [`reset_token`](Self::reset_token)). The cache sits
/// behind an async mutex held across the authorization request, so
/// concurrent first callers share a single in-flight request.
pub struct Session {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
    token: Mutex<Option<String>>,
}

impl Session {
    /// Creates a session backed by a `reqwest` transport.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a session on top of a custom transport.
    pub fn with_transport(
        config: SessionConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, Error> {
        let base_url = config.normalized_base_url()?;
        Ok(Self {
            transport,
            base_url,
            api_key: config.api_key,
            token: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the cached token, authorizing first if needed.
    ///
    /// A 4xx or a response without a usable token is an
    /// [`Error::Authentication`]; other failures keep their classification.
    pub async fn authorize(&self) -> Result<String, Error> {
        let mut token = self.token.lock().await;
        if let Some(t) = token.as_ref() {
            return Ok(t.clone());
        }

        debug!(base_url = %self.base_url, "authorizing session");
        let req = HttpRequest::new(Method::POST, self.url(&endpoints::authorize()))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("Content-Type", "application/json")
            .body(b"{}".to_vec());
        let resp = self.transport.send(req).await?;

        match classify(resp.status, &resp.body) {
            ResponseClass::Ok => {}
            ResponseClass::ClientError(message) => return Err(Error::Authentication(message)),
            other => other.into_result(resp.status)?,
        }

        let parsed: AuthorizeResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| Error::Authentication(format!("unreadable authorization response: {e}")))?;
        let value = parsed
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Authentication("no token in authorization response".into()))?;

        *token = Some(value.clone());
        info!("session authorized");
        Ok(value)
    }

    /// Drops the cached token; the next request authorizes again.
    pub async fn reset_token(&self) {
        *self.token.lock().await = None;
    }

    /// Returns `true` if a token is cached.
    pub async fn is_authorized(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// Performs an authenticated JSON request and returns the decoded body.
    ///
    /// An empty success body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        let token = self.authorize().await?;

        let mut req = HttpRequest::new(method.clone(), self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.body(serde_json::to_vec(body)?);
        }

        debug!(%method, path, "api request");
        let resp = self.transport.send(req).await?;
        decode(resp)
    }

    /// Typed variant of [`request`](Self::request).
    pub async fn request_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let value = self.request(method, path, body.as_ref()).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Uploads raw part bytes to a signed URL.
    ///
    /// Signed URLs carry their own authorization, so no bearer token or API
    /// key is attached.
    pub async fn put_part(&self, url: &str, data: Vec<u8>) -> Result<(), Error> {
        let len = data.len();
        let req = HttpRequest::new(Method::PUT, url)
            .header("Content-Type", PART_CONTENT_TYPE)
            .header("Content-Length", len.to_string())
            .body(data);
        let resp = self.transport.send(req).await?;
        classify(resp.status, &resp.body).into_result(resp.status)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn decode(resp: HttpResponse) -> Result<serde_json::Value, Error> {
    classify(resp.status, &resp.body).into_result(resp.status)?;
    if resp.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    Ok(serde_json::from_slice(&resp.body)?)
}
