use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// Uploads and embedding generation can take a while server-side.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for the document backend. Owns the connection pool and
/// base URL. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    api_base: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpClient {
    pub fn new(api_base: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Client(format!("http client: {e}")))?;

        let api_base = api_base.trim_end_matches('/').to_string();
        info!(api_base = %api_base, "http client initialized");

        Ok(Self {
            inner: Arc::new(Inner { client, api_base }),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.inner.api_base
    }

    /// `path` is appended to the base URL (e.g. `/api/documentos/`).
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.inner.api_base);
        self.inner.client.request(method, url)
    }

    /// Send `req` and turn a non-2xx response into [`ApiError::Status`].
    pub async fn send(
        &self,
        op: &'static str,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Request(format!("{op}: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        warn!(op, status = %status, "request failed: {message}");
        Err(ApiError::Status {
            op,
            status: status.as_u16(),
            message,
        })
    }
}
