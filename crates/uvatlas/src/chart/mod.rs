//! Charts: the unit of partitioning, parameterization, and packing.
//!
//! Purpose
//! - A chart is a face-connected submesh with its own connectivity copy,
//!   Isomap state, stretch bookkeeping, and position in the partition tree.
//! - This module owns everything between the root mesh and the packer: the
//!   stretch metrics, the recursive partitioner with its shape classifier,
//!   the graph-cut boundary optimizer, the parameterizer chain, the vertex
//!   relaxation optimizer, and the chart merger.

mod graphcut;
mod maxflow;
mod merge;
mod optimize;
mod param;
mod partition;
mod stretch;
mod types;

pub use graphcut::{optimize_boundary_by_angle, optimize_boundary_by_stretch, GraphCutCfg};
pub use maxflow::FlowNetwork;
pub use merge::{merge_small_charts, MergeCfg};
pub use optimize::{optimize_chart_stretch, OptimizeCfg, OptimizeGoal};
pub use param::{parameterize_chart, ParamOutcome};
pub use partition::{partition_chart, prepare_isomap, PartitionCfg, PartitionOutcome};
pub use stretch::{
    chart_l2_geo_squared_stretch, chart_ln_squared_stretch, face_l2_squared_stretch,
    face_ln_squared_stretch, face_signal_squared_stretch, signed_area_2d, vertex_stretch,
    INFINITE_STRETCH,
};
pub use types::{Chart, IsomapState};

#[cfg(test)]
mod tests;
