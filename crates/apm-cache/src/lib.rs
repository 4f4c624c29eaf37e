//! The Package Index Cache (A4): a two-tier, content-addressable cache of
//! Universe snapshots and resolved Plan artifacts, so repeated runs don't
//! re-read the backing store or re-resolve an unchanged request.
//!
//! - **L1 Memory Cache**: in-memory weighted-LRU cache using
//!   [moka](https://crates.io/crates/moka), fronting L2.
//!
//! - **L2 Disk Cache**: persistent content-addressable storage keyed by
//!   a blake3 hash, deduplicating identical snapshots/artifacts.
//!
//! - **Compression**: Zstd compression for cached blobs above a small
//!   size threshold.
//!
//! - **TTL-Based Expiration**: distinct TTLs for Universe snapshots
//!   (short-lived, since the backing store moves) and Plan artifacts
//!   (longer-lived, since a resolved Plan for an unchanged request is
//!   still valid).
//!
//! - **Background Maintenance**: a GC task removes expired/over-budget
//!   entries on `gc_interval`; `warm` pulls recently used L2 entries
//!   back into L1 after a cold start.
//!
//! ## Example
//!
//! ```no_run
//! use apm_cache::{TieredCache, CacheConfig, CacheEntryType};
//!
//! # fn main() -> apm_core::Result<()> {
//! let config = CacheConfig::builder()
//!     .root("/tmp/apm-cache")
//!     .l1_size_limit(512 * 1024 * 1024)
//!     .build();
//! let cache = TieredCache::with_config(config)?;
//!
//! let data = b"serialized universe snapshot...";
//! let key = cache.put(data, CacheEntryType::UniverseSnapshot, None, None)?;
//!
//! if let Some(cached) = cache.get(&key)? {
//!     assert_eq!(cached, data);
//! }
//!
//! let stats = cache.stats();
//! println!("Hit rate: {:.1}%", stats.hit_rate * 100.0);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod compression;
mod config;
mod index;
mod l1;
mod l2;
mod stats;
mod tiered;

pub use compression::{
    compress, compress_with_stats, decompress, decompress_with_hint, is_compressed,
    should_compress, strip_magic, with_magic, CompressionStats, COMPRESSED_MAGIC,
};
pub use config::{CacheConfig, CacheConfigBuilder, CacheEntryType};
pub use index::{CacheIndex, IndexEntry};
pub use l1::{L1Cache, L1CacheBuilder, L1Entry};
pub use l2::{hash_hex, L2Cache};
pub use stats::{CacheStats, CacheStatsSnapshot, SizeTracker};
pub use tiered::{ClearPattern, ClearResult, GcResult, TieredCache};
