// Authenticated request pipeline wrapping reqwest.
//
// Every backend call goes through `ApiClient`: an ordered list of request
// transforms runs on the way out (bearer attachment by default), and the
// uniform `{code, message, data}` envelope is unwrapped on the way back.
// Failures map onto the `ApiError` taxonomy; the 401 arm additionally clears
// the session and forces the router to login, so any stale-token failure
// anywhere converges the client to the logged-out state.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::router::Router;
use crate::session::SessionStore;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 — the backend rejected the session. The pipeline has already
    /// cleared local state and redirected to login by the time this is seen.
    #[error("authentication rejected: {message}")]
    Auth { message: String },

    /// 403 — authenticated but not allowed.
    #[error("permission denied: {message}")]
    Permission { message: String },

    /// 422 — the backend rejected the request payload. `detail` carries the
    /// field-level diagnostics exactly as the backend sent them.
    #[error("validation failed: {message}")]
    Validation { message: String, detail: Value },

    /// Any other non-2xx status.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No response was received (connect failure, timeout, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A 2xx response whose body did not match the expected envelope.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// The durable session store failed while persisting a session change.
    #[error("session storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

/// Uniform wrapper around every non-streaming backend response. The pipeline
/// delivers only `data` to callers.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub message: String,
    pub data: T,
}

/// Pagination envelope. `total_pages` comes from the backend contract and is
/// never recomputed locally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// An outbound request transform. Transforms run in push order on every
/// request; ordering is part of the pipeline contract, not an artifact of
/// registration.
pub type RequestTransform =
    Box<dyn Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync>;

/// Single choke point for all backend calls.
pub struct ApiClient {
    http: reqwest::Client,
    /// Separate client without a total timeout: the extraction feed is a
    /// long-lived response and must outlive the default request deadline.
    stream_http: reqwest::Client,
    base: String,
    transforms: Vec<RequestTransform>,
    session: Arc<SessionStore>,
    router: Arc<Router>,
}

impl ApiClient {
    /// Build a client from config. The default transform pipeline contains
    /// exactly one entry: bearer attachment from the session store.
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionStore>,
        router: Arc<Router>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()?;

        let mut client = Self {
            http,
            stream_http,
            base: format!("{}{}", config.base_url, config.api_prefix),
            transforms: Vec::new(),
            session: session.clone(),
            router,
        };
        client.push_transform(bearer_transform(session));
        Ok(client)
    }

    /// Append a transform to the outbound pipeline. Transforms run in the
    /// order they were pushed.
    pub fn push_transform(&mut self, transform: RequestTransform) {
        self.transforms.push(transform);
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub(crate) fn apply_transforms(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.transforms.iter().fold(rb, |rb, t| t(rb))
    }

    /// Build an outbound request on the streaming (no total timeout) client,
    /// with the transform pipeline already applied.
    pub(crate) fn streaming_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.apply_transforms(self.stream_http.post(self.url(path)))
    }

    // -- Verb helpers: each issues exactly one backend call --

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.get(self.url(path))).await
    }

    pub async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.execute(self.http.get(self.url(path)).query(query)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.http.post(self.url(path)).json(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.post(self.url(path))).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.execute(self.http.put(self.url(path)).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.delete(self.url(path))).await
    }

    // -- Pipeline core --

    async fn execute<T: DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let rb = self.apply_transforms(rb);
        let response = rb.send().await?;

        let status = response.status();
        if status.is_success() {
            let envelope: Envelope<T> = response.json().await.map_err(ApiError::Decode)?;
            debug!(code = envelope.code, "response envelope unwrapped");
            return Ok(envelope.data);
        }

        Err(self.error_from_response(response).await)
    }

    /// Map a non-2xx response onto the error taxonomy, running the 401 local
    /// side effect. Shared by the envelope pipeline and the streaming
    /// endpoint.
    pub(crate) async fn error_from_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let (message, detail) = parse_error_body(&body);

        match status.as_u16() {
            401 => {
                warn!(%status, "authentication rejected, clearing local session");
                if let Err(e) = self.session.clear() {
                    warn!(error = %e, "failed to clear session after auth rejection");
                }
                self.router.force_login();
                ApiError::Auth { message }
            }
            403 => {
                error!(%status, message, "permission denied");
                ApiError::Permission { message }
            }
            422 => {
                error!(%status, message, %detail, "validation error");
                ApiError::Validation { message, detail }
            }
            code => {
                error!(%status, message, "request error");
                ApiError::Server {
                    status: code,
                    message,
                }
            }
        }
    }
}

/// The default outbound transform: attach the session's access token as a
/// bearer credential. Requests issued while logged out go out untouched.
fn bearer_transform(session: Arc<SessionStore>) -> RequestTransform {
    Box::new(move |rb| match session.access_token() {
        Some(token) => rb.bearer_auth(token),
        None => rb,
    })
}

/// Extract `{message, detail}` from an error body, tolerating bodies that
/// are empty or not JSON.
pub(crate) fn parse_error_body(body: &str) -> (String, Value) {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("request failed")
        .to_string();
    let detail = parsed.get("detail").cloned().unwrap_or(Value::Null);
    (message, detail)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
