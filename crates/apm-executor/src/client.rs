//! HTTP client with connection pooling, used by the archive-fetch path.

use crate::config::ExecutorConfig;
use apm_core::{Error, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, RANGE, USER_AGENT},
    Client, Response, StatusCode,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Connection-pooled HTTP client wrapping `reqwest`.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Arc<ExecutorConfig>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("client", &"reqwest::Client")
            .field("config", &self.config)
            .finish()
    }
}

impl HttpClient {
    /// # Errors
    /// Returns `Error::download_failed` if the client cannot be built.
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.total_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .tcp_keepalive(config.keep_alive.then_some(config.keep_alive_timeout))
            .tcp_nodelay(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .zstd(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .use_rustls_tls();

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| Error::invalid_parameters(format!("bad proxy url: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::download_failed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default()).expect("default config always builds a client")
    }

    #[must_use]
    pub const fn config(&self) -> &Arc<ExecutorConfig> {
        &self.config
    }

    /// # Errors
    /// Returns `Error::download_failed` on a transport or non-2xx error.
    pub async fn get(&self, url: &Url) -> Result<Response> {
        let headers = self.default_headers();
        debug!(url = %url, "GET request");
        let response = self
            .client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::download_failed(format!("{url}: {e}")))?;
        Self::check_response(response).await
    }

    /// # Errors
    /// Returns `Error::download_failed` on a transport or non-2xx error.
    pub async fn get_range(&self, url: &Url, start: u64) -> Result<Response> {
        let mut headers = self.default_headers();
        headers.insert(
            RANGE,
            HeaderValue::from_str(&format!("bytes={start}-"))
                .map_err(|e| Error::invalid_parameters(e.to_string()))?,
        );
        trace!(url = %url, start, "GET range request");
        let response = self
            .client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::download_failed(format!("{url}: {e}")))?;
        Self::check_response(response).await
    }

    /// # Errors
    /// Returns `Error::download_failed` if the HEAD request fails.
    pub async fn content_length(&self, url: &Url) -> Result<Option<u64>> {
        let headers = self.default_headers();
        let response = self
            .client
            .head(url.as_str())
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::download_failed(format!("{url}: {e}")))?;
        Ok(response.content_length())
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        if let Ok(enc) = HeaderValue::from_str(&self.config.accept_encoding) {
            headers.insert(ACCEPT_ENCODING, enc);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers
    }

    async fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() || status == StatusCode::PARTIAL_CONTENT {
            return Ok(response);
        }

        let url = response.url().to_string();
        match status {
            StatusCode::NOT_FOUND => Err(Error::download_failed(format!("not found: {url}"))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(Error::download_failed(format!(
                    "rate limited on {url} (retry after {retry_after:?})"
                )))
            }
            _ if status.is_server_error() => {
                let body = response.text().await.unwrap_or_else(|_| status.to_string());
                Err(Error::download_failed(format!(
                    "server error {status} on {url}: {body}"
                )))
            }
            _ => Err(Error::download_failed(format!("HTTP {status} on {url}"))),
        }
    }
}
