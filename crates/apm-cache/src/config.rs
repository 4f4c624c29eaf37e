//! Cache configuration: size limits, per-entry-type TTLs, and the knobs
//! that control compression and background maintenance.

use std::path::PathBuf;
use std::time::Duration;

/// The two artifact kinds A4 caches (§ "On-disk cache of Universe
/// snapshots and resolved-Plan artifacts").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntryType {
    /// A serialized `Universe` snapshot, keyed by the backing store's
    /// refresh fingerprint.
    UniverseSnapshot,
    /// A serialized `Plan`/`ChangeSet` artifact, keyed by the request
    /// that produced it.
    PlanArtifact,
}

impl CacheEntryType {
    /// The TTL this entry type expires after, per `config`.
    #[must_use]
    pub fn ttl(self, config: &CacheConfig) -> Duration {
        match self {
            Self::UniverseSnapshot => config.universe_snapshot_ttl,
            Self::PlanArtifact => config.plan_artifact_ttl,
        }
    }

    /// The on-disk subdirectory this entry type's blobs live under.
    #[must_use]
    pub const fn subdir(self) -> &'static str {
        match self {
            Self::UniverseSnapshot => "universe",
            Self::PlanArtifact => "plans",
        }
    }

    #[must_use]
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::UniverseSnapshot => 0,
            Self::PlanArtifact => 1,
        }
    }

    #[must_use]
    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::UniverseSnapshot,
            _ => Self::PlanArtifact,
        }
    }
}

/// Tunables for the two-tier cache. Construct with [`CacheConfig::default`]
/// or [`CacheConfigBuilder`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache root directory. `None` means the caller supplies one
    /// explicitly at `TieredCache::at_path` time.
    pub root: Option<PathBuf>,
    /// L1 (in-memory) weighted size limit, in bytes.
    pub l1_size_limit: u64,
    /// L2 (on-disk) total size limit, in bytes, enforced by `gc`.
    pub l2_size_limit: u64,
    /// TTL for `CacheEntryType::UniverseSnapshot` entries.
    pub universe_snapshot_ttl: Duration,
    /// TTL for `CacheEntryType::PlanArtifact` entries.
    pub plan_artifact_ttl: Duration,
    /// zstd compression level, 1 (fastest) to 22 (smallest).
    pub compression_level: i32,
    /// Whether to compress entries at all.
    pub compression_enabled: bool,
    /// Interval between background GC sweeps.
    pub gc_interval: Duration,
    /// Whether to track `CacheStats` counters.
    pub stats_enabled: bool,
}

impl CacheConfig {
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            l1_size_limit: 64 * 1024 * 1024,
            l2_size_limit: 1024 * 1024 * 1024,
            universe_snapshot_ttl: Duration::from_secs(6 * 3600),
            plan_artifact_ttl: Duration::from_secs(24 * 3600),
            compression_level: 3,
            compression_enabled: true,
            gc_interval: Duration::from_secs(3600),
            stats_enabled: true,
        }
    }
}

/// Fluent builder for [`CacheConfig`].
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = Some(root.into());
        self
    }

    #[must_use]
    pub const fn l1_size_limit(mut self, bytes: u64) -> Self {
        self.config.l1_size_limit = bytes;
        self
    }

    #[must_use]
    pub const fn l2_size_limit(mut self, bytes: u64) -> Self {
        self.config.l2_size_limit = bytes;
        self
    }

    #[must_use]
    pub const fn universe_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.config.universe_snapshot_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn plan_artifact_ttl(mut self, ttl: Duration) -> Self {
        self.config.plan_artifact_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn compression_level(mut self, level: i32) -> Self {
        self.config.compression_level = level;
        self
    }

    #[must_use]
    pub const fn compression_enabled(mut self, enabled: bool) -> Self {
        self.config.compression_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn gc_interval(mut self, interval: Duration) -> Self {
        self.config.gc_interval = interval;
        self
    }

    #[must_use]
    pub const fn stats_enabled(mut self, enabled: bool) -> Self {
        self.config.stats_enabled = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
