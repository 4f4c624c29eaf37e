//! The Execution Driver (C6): acquires archives for a frozen plan on a
//! bounded worker pool, hands installation off to the package backend
//! with throttled progress events, and commits the resulting marks.
//!
//! # Example
//!
//! ```no_run
//! use apm_core::Context;
//! use apm_executor::{ExecutionDriver, MemoryBackend, NoopLock, NullObserver};
//! use apm_planner::ChangeSet;
//!
//! # async fn example() -> apm_core::Result<()> {
//! let backend = MemoryBackend::new();
//! let lock = NoopLock;
//! let observer = NullObserver;
//! let driver = ExecutionDriver::new(&backend, &lock, &observer);
//!
//! let plan = ChangeSet {
//!     new_installed: vec!["vim".to_string()],
//!     ..Default::default()
//! };
//! let ctx = Context::new("/var/lib/apm");
//! driver.apply(&plan, &ctx).await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod checksum;
mod client;
mod config;
mod download;
mod driver;
mod http_backend;
mod lock;
mod progress;
mod retry;
mod source;
mod throttle;

pub use backend::{ExecutorBackend, MemoryBackend, ProgressFn};
pub use checksum::{ComputedChecksums, MultiHasher};
pub use client::HttpClient;
pub use config::{ExecutorConfig, ExecutorConfigBuilder};
pub use download::download_one;
pub use driver::ExecutionDriver;
pub use http_backend::{ArchiveLocator, HttpExecutorBackend, ShellBackend};
pub use lock::{ExecutionLock, NoopLock};
pub use progress::{NullObserver, ProgressEvent, ProgressObserver, ThrottleMap};
pub use retry::{CircuitBreaker, RetryConfig};
pub use source::{ArchiveSource, ArchiveType, ChecksumAlgorithm, ExpectedChecksum, FetchedArchive};
pub use throttle::BandwidthThrottler;
