//! The Package Universe (C2): an in-memory snapshot of all known packages,
//! versions, dependencies, provides, conflicts, essentiality, and
//! current-install state, looked up by name or by virtual provide.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod backend;
mod types;
mod universe;

pub use backend::{MemoryBackend, PackageSnapshot, UniverseBackend};
pub use types::{
    OrGroup, Package, PackageId, PackageVersion, Provide, Relations, Requirement, VersionId,
};
pub use universe::{Universe, UniverseData};
