//! Observer-capability progress model (§4.6, §9's "callback-driven
//! progress" design note) and the throttling rule that gates how often
//! events actually reach the observer.
//!
//! The Execution Driver never stores a reference to the caller's progress
//! sink beyond the lifetime of one `apply` call, and invokes it
//! synchronously from its own thread rather than handing it to a
//! background task.

use dashmap::DashMap;
use std::time::Instant;

/// One progress notification, as described by the Execution API (§6):
/// `(package_name, event_kind, current, total)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    DownloadProgress {
        package: String,
        current: u64,
        total: u64,
    },
    DownloadComplete,
    InstallProgress {
        package: String,
        percent: u8,
    },
    InstallDone {
        package: String,
    },
}

/// The observer capability injected by the caller. Implementors must be
/// cheap and non-blocking; the driver calls this inline on its own thread.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// An observer that drops every event, for callers that don't want
/// progress reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Per-package `(last emitted percent, last emission time)`, owned by the
/// Execution Driver for the duration of one `apply` call, used to enforce
/// §4.6's throttling rule: consecutive emissions for the same package
/// differ by at least 50ms in the 10-90% band and at least 100ms
/// otherwise.
#[derive(Debug, Default)]
pub struct ThrottleMap {
    last: DashMap<String, (u8, Instant)>,
}

impl ThrottleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a percent update for `package` should be emitted
    /// now. Always lets 0% and 100% through so `DownloadComplete` /
    /// `InstallDone` boundaries are never swallowed.
    pub fn should_emit(&self, package: &str, percent: u8) -> bool {
        if percent == 0 || percent == 100 {
            self.last.insert(package.to_string(), (percent, Instant::now()));
            return true;
        }

        let min_gap = if (10..=90).contains(&percent) {
            std::time::Duration::from_millis(50)
        } else {
            std::time::Duration::from_millis(100)
        };

        let now = Instant::now();
        let should = match self.last.get(package) {
            Some(entry) => {
                let (last_percent, last_time) = *entry;
                percent != last_percent && now.duration_since(last_time) >= min_gap
            }
            None => true,
        };

        if should {
            self.last.insert(package.to_string(), (percent, now));
        }
        should
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_percents_always_emit() {
        let throttle = ThrottleMap::new();
        assert!(throttle.should_emit("vim", 0));
        assert!(throttle.should_emit("vim", 100));
    }

    #[test]
    fn second_call_in_band_is_suppressed_until_gap_elapses() {
        let throttle = ThrottleMap::new();
        assert!(throttle.should_emit("vim", 50));
        assert!(!throttle.should_emit("vim", 51));
    }

    #[test]
    fn distinct_packages_are_tracked_independently() {
        let throttle = ThrottleMap::new();
        assert!(throttle.should_emit("vim", 50));
        assert!(throttle.should_emit("nano", 50));
    }
}
