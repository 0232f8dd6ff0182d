//! Mesh connectivity (vertex/face/edge store, repair, boundaries).
//!
//! Purpose
//! - Build full vertex/face/edge topology from indexed triangle data, detect
//!   manifold violations, and repair bowties by vertex duplication.
//! - Provide the boundary machinery the partitioner needs: loop extraction,
//!   shortest paths over edge lengths, and cutting a chart along a path so a
//!   multi-boundary chart becomes a disk.
//!
//! Why this design
//! - All collections are flat arrays indexed by `u32` ids with
//!   [`INVALID_ID`] as the absent sentinel; cross-references are indices,
//!   never pointers. Submeshes copy connectivity but share geometry with the
//!   root mesh through `root_id` indirection into [`BaseMesh`].

mod base;
mod boundary;
mod build;
mod types;

pub use base::BaseMesh;
pub use boundary::{boundary_loops, cut_to_single_boundary, shortest_path, DijkstraOutcome};
pub use build::{build_connectivity, root_proto, sub_proto, ProtoMesh};
pub use types::{ChartMesh, Edge, Face, Vertex, INVALID_ID, MUST_RESERVE};

#[cfg(test)]
mod tests;
