//! Core types shared across the atomic package manager:
//! - The version/requirement model (§4.1) and its dpkg-style comparator
//! - The ten-kind error taxonomy (§7) with stable documentation codes
//! - The per-invocation [`Context`], replacing ambient global state
//! - High-performance JSON encode/decode helpers

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod error;
mod json;
mod version;

pub use context::{CancellationToken, Context};
pub use error::{Error, Result};
pub use json::{from_json, from_json_slice, to_json, to_json_pretty};
pub use version::{Op, RequirementSpec, compare, compare_versions};

/// Global allocator using mimalloc for high performance.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;
