//! Cache hit/miss/size counters, exposed as a point-in-time snapshot.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Atomic cache statistics, updated lock-free on every cache operation.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    compressions: AtomicU64,
    compression_savings: AtomicU64,
    total_lookup_time_us: AtomicU64,
    lookup_count: AtomicU64,
    start_time: RwLock<Option<Instant>>,
}

impl CacheStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(Some(Instant::now())),
            ..Default::default()
        }
    }

    pub fn record_hit(&self, is_l1: bool) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if is_l1 {
            self.l1_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.l2_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self, original_size: u64, compressed_size: u64) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
        if original_size > compressed_size {
            self.compression_savings
                .fetch_add(original_size - compressed_size, Ordering::Relaxed);
        }
    }

    pub fn record_lookup_time(&self, duration: Duration) {
        self.total_lookup_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.lookup_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };

        let lookup_count = self.lookup_count.load(Ordering::Relaxed);
        let total_lookup_time_us = self.total_lookup_time_us.load(Ordering::Relaxed);
        let avg_lookup_time = if lookup_count > 0 {
            Duration::from_micros(total_lookup_time_us / lookup_count)
        } else {
            Duration::ZERO
        };

        let uptime = self.start_time.read().map(|t| t.elapsed()).unwrap_or_default();

        CacheStatsSnapshot {
            hits,
            misses,
            hit_rate,
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            compression_savings: self.compression_savings.load(Ordering::Relaxed),
            avg_lookup_time,
            uptime,
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.l1_hits.store(0, Ordering::Relaxed);
        self.l2_hits.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.compressions.store(0, Ordering::Relaxed);
        self.compression_savings.store(0, Ordering::Relaxed);
        self.total_lookup_time_us.store(0, Ordering::Relaxed);
        self.lookup_count.store(0, Ordering::Relaxed);
        *self.start_time.write() = Some(Instant::now());
    }
}

/// A point-in-time copy of [`CacheStats`]'s counters.
#[derive(Debug, Clone)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub compressions: u64,
    pub compression_savings: u64,
    pub avg_lookup_time: Duration,
    pub uptime: Duration,
}

impl CacheStatsSnapshot {
    #[must_use]
    pub fn format_summary(&self) -> String {
        let mut lines = vec![
            format!(
                "Hit Rate: {:.1}% ({} hits, {} misses)",
                self.hit_rate * 100.0,
                self.hits,
                self.misses
            ),
            format!("  L1 (memory): {} hits, L2 (disk): {} hits", self.l1_hits, self.l2_hits),
            format!(
                "Bytes: {} read, {} written",
                format_bytes(self.bytes_read),
                format_bytes(self.bytes_written)
            ),
            format!("Evictions: {}, Expirations: {}", self.evictions, self.expirations),
        ];

        if self.compressions > 0 {
            lines.push(format!(
                "Compression: {} ops, {} saved",
                self.compressions,
                format_bytes(self.compression_savings)
            ));
        }

        lines.push(format!("Avg Lookup: {:.2}ms", self.avg_lookup_time.as_secs_f64() * 1000.0));
        lines.push(format!("Uptime: {:.1}s", self.uptime.as_secs_f64()));

        lines.join("\n")
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Tracks aggregate size/count for a pool of entries (used by
/// `TieredCache` to know when `l2_size_limit` is exceeded).
#[derive(Debug, Default)]
pub struct SizeTracker {
    total: AtomicU64,
    count: AtomicU64,
}

impl SizeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, size: u64) {
        self.total.fetch_add(size, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn remove(&self, size: u64) {
        self.total.fetch_sub(size.min(self.total()), Ordering::Relaxed);
        if self.count.load(Ordering::Relaxed) > 0 {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_basic() {
        let stats = CacheStats::new();
        stats.record_hit(true);
        stats.record_hit(false);
        stats.record_miss();

        let snap = stats.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.l1_hits, 1);
        assert_eq!(snap.l2_hits, 1);
        assert!((snap.hit_rate - 0.666).abs() < 0.01);
    }

    #[test]
    fn stats_reset() {
        let stats = CacheStats::new();
        stats.record_hit(true);
        stats.reset();
        assert_eq!(stats.snapshot().hits, 0);
    }

    #[test]
    fn size_tracker() {
        let tracker = SizeTracker::new();
        tracker.add(100);
        tracker.add(200);
        assert_eq!(tracker.total(), 300);
        assert_eq!(tracker.count(), 2);

        tracker.remove(100);
        assert_eq!(tracker.total(), 200);
        assert_eq!(tracker.count(), 1);
    }
}
