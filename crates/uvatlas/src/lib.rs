//! Isometric texture-atlas generation for triangle meshes.
//!
//! The crate partitions a 3D mesh into charts that unfold with bounded
//! stretch, parameterizes each chart into (u,v), and packs the charts into a
//! rectangular atlas with a guaranteed inter-chart gutter. The pipeline is
//! single-threaded and deterministic given the input and the configured seed.
//!
//! Entry points live in [`atlas`]: [`atlas::create_atlas`] runs the full
//! pipeline, [`atlas::apply_remap`] replays the vertex duplication onto an
//! arbitrary per-vertex buffer.

pub mod atlas;
pub mod chart;
pub mod geodesic;
pub mod isomap;
pub mod mesh;
pub mod numeric;
pub mod pack;
pub mod shapes;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Convenience re-exports for the common call path.
pub use atlas::{
    apply_remap, create_atlas, Atlas, AtlasError, AtlasOptions, GeodesicMode, MeshDesc, Progress,
};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::atlas::{
        apply_remap, create_atlas, Atlas, AtlasError, AtlasOptions, GeodesicMode, MeshDesc,
        Progress,
    };
    pub use crate::chart::PartitionCfg;
    pub use crate::pack::PackCfg;
}
