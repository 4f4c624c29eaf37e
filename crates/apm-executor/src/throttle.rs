//! Aggregate bandwidth cap for the archive-fetch phase (§4.6/§5's
//! "optional bandwidth throttle" ambient addition).
//!
//! One [`BandwidthThrottler`] is shared (via `&self` on
//! [`crate::http_backend::HttpExecutorBackend`]) across every concurrent
//! download the worker pool runs, so `bandwidth_limit` in
//! [`crate::config::ExecutorConfig`] caps the whole invocation's
//! throughput, not each download individually — doubling
//! `worker_pool_size` does not double total bandwidth. The cap is
//! enforced with a token bucket: `governor` only grants quota in whole
//! tokens, so bytes are converted to tokens at
//! [`QUOTA_GRANULARITY_BYTES`]-sized units, independent of whatever
//! chunk sizes `download_one` happens to read off the wire.

use crate::config::ExecutorConfig;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Unit the token bucket counts in. Small enough that a throttled
/// download's progress callback still fires at a fine grain.
const QUOTA_GRANULARITY_BYTES: u32 = 1024;

/// Caps aggregate archive-download throughput to a configured
/// bytes-per-second limit, or applies no limit at all.
#[derive(Clone)]
pub struct BandwidthThrottler {
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>>,
}

impl std::fmt::Debug for BandwidthThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthThrottler")
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

impl BandwidthThrottler {
    /// Builds the throttler the fetch phase runs under from
    /// [`ExecutorConfig::bandwidth_limit`]. A limit of `0` is treated as
    /// unlimited rather than "stall forever", since it almost always
    /// means the knob was left unset in a layered config rather than a
    /// deliberate request to never download anything.
    #[must_use]
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.bandwidth_limit)
    }

    /// Bytes-per-second limit, or `None`/`Some(0)` for unlimited.
    #[must_use]
    pub fn new(bytes_per_second: Option<u64>) -> Self {
        let limiter = bytes_per_second.and_then(|bps| {
            if bps == 0 {
                return None;
            }

            let tokens_per_second = (bps / u64::from(QUOTA_GRANULARITY_BYTES)).max(1);

            #[allow(clippy::cast_possible_truncation)]
            let tps = tokens_per_second.min(u64::from(u32::MAX)) as u32;

            NonZeroU32::new(tps).map(|nz| Arc::new(RateLimiter::direct(Quota::per_second(nz))))
        });

        Self { limiter }
    }

    #[must_use]
    pub const fn unlimited() -> Self {
        Self { limiter: None }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    fn tokens_for(bytes: usize) -> u32 {
        let bytes = u32::try_from(bytes).unwrap_or(u32::MAX);
        (bytes / QUOTA_GRANULARITY_BYTES).max(1)
    }

    /// Blocks `download_one`'s loop until `bytes` worth of quota is
    /// available. A no-op when the throttler is unlimited, so callers
    /// don't need to branch on [`Self::is_enabled`] themselves.
    pub async fn acquire(&self, bytes: usize) {
        if let Some(limiter) = &self.limiter {
            for _ in 0..Self::tokens_for(bytes) {
                limiter.until_ready().await;
            }
        }
    }

    /// Non-blocking variant used by tests and dry-run paths that need to
    /// know whether the cap has already been exhausted without waiting.
    #[must_use]
    pub fn try_acquire(&self, bytes: usize) -> bool {
        self.limiter.as_ref().is_none_or(|limiter| {
            (0..Self::tokens_for(bytes)).all(|_| limiter.check().is_ok())
        })
    }
}

impl Default for BandwidthThrottler {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_throttler_never_blocks_acquisition() {
        let throttler = BandwidthThrottler::unlimited();
        assert!(!throttler.is_enabled());
        assert!(throttler.try_acquire(50 * 1024 * 1024));
    }

    #[test]
    fn limited_throttler_is_enabled() {
        let throttler = BandwidthThrottler::new(Some(1024 * 1024));
        assert!(throttler.is_enabled());
    }

    #[test]
    fn zero_limit_means_unlimited_not_stalled() {
        let throttler = BandwidthThrottler::new(Some(0));
        assert!(!throttler.is_enabled());
    }

    #[test]
    fn from_config_reads_the_configured_limit() {
        let mut config = ExecutorConfig::default();
        config.bandwidth_limit = Some(1024 * 1024);
        assert!(BandwidthThrottler::from_config(&config).is_enabled());
        config.bandwidth_limit = None;
        assert!(!BandwidthThrottler::from_config(&config).is_enabled());
    }

    #[tokio::test]
    async fn acquire_completes_under_an_ample_quota() {
        let throttler = BandwidthThrottler::new(Some(1024 * 1024));
        throttler.acquire(1024).await;
    }
}
