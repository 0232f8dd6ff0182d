//! Input description, options, and output of the pipeline.

use crate::chart::{GraphCutCfg, MergeCfg, OptimizeCfg, PartitionCfg};
use crate::geodesic::GeodesicMode;
use crate::pack::PackCfg;

/// Indexed triangle input. Indices are 32-bit; callers with 16-bit buffers
/// widen at ingestion and narrow on the way out.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshDesc<'a> {
    pub positions: &'a [[f32; 3]],
    /// Triangle list, three indices per face, counter-clockwise.
    pub indices: &'a [u32],
    /// Optional precomputed face adjacency (3 entries per face). Validated
    /// for size when present; connectivity is always derived internally.
    pub adjacency: Option<&'a [u32]>,
    /// Three flags per face marking edges that must not be cut
    /// (entry `3f + k` covers the edge from corner `k` to corner `k+1`).
    pub false_edges: Option<&'a [bool]>,
    /// Per-face integrated metric tensor `[m00, m01, m11]` for
    /// signal-specialized parameterization.
    pub imt: Option<&'a [[f32; 3]]>,
    /// Vertices that must be kept as landmarks.
    pub reserve_verts: Option<&'a [u32]>,
}

/// Return value of the progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Cancel,
}

/// Pipeline options. The nested configs expose every empirical tunable;
/// their defaults reproduce the historical behavior.
#[derive(Clone, Copy, Debug)]
pub struct AtlasOptions {
    /// Upper bound on the chart count (0 = unlimited).
    pub max_chart_number: usize,
    /// Stretch target in [0, 1]: 0 demands isometry, 1 accepts anything.
    pub max_stretch: f64,
    /// Atlas resolution the gutter is measured against.
    pub width: usize,
    pub height: usize,
    /// Minimum inter-chart distance in pixels.
    pub gutter: f64,
    pub geodesic: GeodesicMode,
    /// Reject merges that would regress past the stretch target.
    pub limit_merge_stretch: bool,
    /// Force a further split while any face exceeds the per-face floor.
    pub limit_face_stretch: bool,
    /// Minimum progress delta between two callback invocations, in [0, 1].
    pub callback_frequency: f64,
    pub partition: PartitionCfg,
    pub optimize: OptimizeCfg,
    pub graph_cut: GraphCutCfg,
    pub merge: MergeCfg,
    pub pack: PackCfg,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            max_chart_number: 0,
            max_stretch: 1.0 / 6.0,
            width: 512,
            height: 512,
            gutter: 2.0,
            geodesic: GeodesicMode::Default,
            limit_merge_stretch: false,
            limit_face_stretch: false,
            callback_frequency: 0.0001,
            partition: PartitionCfg::default(),
            optimize: OptimizeCfg::default(),
            graph_cut: GraphCutCfg::default(),
            merge: MergeCfg::default(),
            pack: PackCfg::default(),
        }
    }
}

/// The finished atlas.
#[derive(Clone, Debug, Default)]
pub struct Atlas {
    /// Positions of the atlas vertices, in the caller's coordinate units.
    pub positions: Vec<[f32; 3]>,
    /// Packed texture coordinates in [0, 1]².
    pub uvs: Vec<[f32; 2]>,
    /// New triangle list over the atlas vertices, aligned with the input
    /// face order.
    pub indices: Vec<u32>,
    /// Chart id per face, aligned with the input face order.
    pub face_partition: Vec<u32>,
    /// For every atlas vertex, the input vertex it was duplicated from.
    pub vertex_remap: Vec<u32>,
    /// Achieved stretch mapped back to the [0, 1] scale of `max_stretch`.
    pub stretch: f64,
    pub chart_count: usize,
}
