//! Public entry points: atlas creation and remap replay.
//!
//! Purpose
//! - [`create_atlas`] runs the full pipeline (connectivity build, recursive
//!   partition, per-chart parameterization, merging, stretch optimization,
//!   packing) and returns the packed (u,v) assignment plus the vertex
//!   remap that records where the atlas duplicated vertices.
//! - [`apply_remap`] replays that duplication onto any per-vertex buffer.
//!
//! All fallible paths return the uniform [`AtlasError`]; on failure no
//! output is produced and the caller's buffers are untouched.

mod driver;
mod error;
mod options;
mod remap;
mod schemer;

pub use driver::create_atlas;
pub use error::AtlasError;
pub use options::{Atlas, AtlasOptions, MeshDesc, Progress};
pub use remap::apply_remap;
pub use schemer::CallbackSchemer;

pub use crate::geodesic::GeodesicMode;

#[cfg(test)]
mod tests;
