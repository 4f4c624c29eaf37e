//! Tunables for the download phase of the Execution Driver. Layered
//! beneath `apm_core::Context`: the Context carries the worker-pool size
//! and cancellation token that are common to the whole Planner/Executor
//! surface, while `ExecutorConfig` carries the HTTP-specific knobs that
//! only the archive-fetch path needs.

use std::time::Duration;

/// Configuration for the HTTP-backed archive fetcher.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub total_timeout: Duration,
    pub max_connections_per_host: usize,
    pub keep_alive: bool,
    pub keep_alive_timeout: Duration,
    pub retry: crate::retry::RetryConfig,
    /// Bytes per second, or `None` for unlimited.
    pub bandwidth_limit: Option<u64>,
    pub verify_checksums: bool,
    pub user_agent: String,
    pub accept_encoding: String,
    /// Proxy URL; falls back to `HTTPS_PROXY`/`HTTP_PROXY`/`NO_PROXY`
    /// environment variables when unset.
    pub proxy: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            total_timeout: Duration::from_secs(300),
            max_connections_per_host: 8,
            keep_alive: true,
            keep_alive_timeout: Duration::from_secs(60),
            retry: crate::retry::RetryConfig::default(),
            bandwidth_limit: None,
            verify_checksums: true,
            user_agent: format!("apm/{}", env!("CARGO_PKG_VERSION")),
            accept_encoding: "gzip, br, deflate, zstd".to_string(),
            proxy: None,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }
}

/// Builder for `ExecutorConfig`.
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    config: ExecutorConfig,
}

impl ExecutorConfigBuilder {
    #[must_use]
    pub fn worker_pool_size(mut self, n: usize) -> Self {
        self.config.max_connections_per_host = n;
        self
    }

    #[must_use]
    pub fn bandwidth_limit(mut self, bytes_per_second: Option<u64>) -> Self {
        self.config.bandwidth_limit = bytes_per_second;
        self
    }

    #[must_use]
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    #[must_use]
    pub fn build(self) -> ExecutorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ExecutorConfig::default();
        assert!(config.verify_checksums);
        assert!(config.bandwidth_limit.is_none());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = ExecutorConfig::builder()
            .bandwidth_limit(Some(1_000_000))
            .verify_checksums(false)
            .build();
        assert_eq!(config.bandwidth_limit, Some(1_000_000));
        assert!(!config.verify_checksums);
    }
}
