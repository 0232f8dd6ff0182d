//! The chart record and its lifecycle state.

use nalgebra::Vector2;

use crate::geodesic::LandmarkDistances;
use crate::isomap::Isomap;
use crate::mesh::{BaseMesh, ChartMesh};

/// Isomap state a chart carries between partitioning stages; released
/// before packing.
#[derive(Clone, Debug)]
pub struct IsomapState {
    pub iso: Isomap,
    /// Per-vertex embedding, row-major `vert_count × dim`.
    pub coords: Vec<f64>,
    pub dim: usize,
    /// Dimensions holding the configured share of the spectral energy.
    pub primary_dim: usize,
    /// Landmark-to-all distance rows backing the embedding.
    pub distances: LandmarkDistances,
}

/// A face-connected submesh with parameterization state.
///
/// Charts form a tree: `father`/`children` are indices into the driver's
/// chart arena, never owning pointers. Leaves of the finished tree become
/// the packed atlas charts.
#[derive(Clone, Debug)]
pub struct Chart {
    pub mesh: ChartMesh,
    pub father: Option<usize>,
    pub children: Vec<usize>,
    /// Bounding-box diagonal of the chart's 3D geometry.
    pub bbox_diag: f64,
    /// Ids of neighboring charts, recomputed per pass by the merger.
    pub adjacent_charts: Vec<u32>,
    /// Landmark vertex ids; ordered per the landmark invariants.
    pub landmarks: Vec<u32>,
    pub isomap: Option<IsomapState>,
    pub area_3d: f64,
    pub area_2d: f64,
    /// Current L² squared stretch (integral form, `∞` on folds).
    pub l2_stretch: f64,
    pub linf_stretch: f64,
    /// Lower bound of the L² stretch: reached exactly when isometric.
    pub base_l2_stretch: f64,
    pub is_init_chart: bool,
    pub is_parameterized: bool,
    pub is_optimized: bool,
    pub is_sub_chart: bool,
    pub needs_clean: bool,
    /// Set when a split attempt failed; the driver stops scheduling it.
    pub unsplittable: bool,
}

impl Chart {
    pub fn new(mesh: ChartMesh, base: &BaseMesh) -> Self {
        let area_3d: f64 = mesh
            .faces
            .iter()
            .map(|f| base.face_areas[f.root_id as usize])
            .sum();
        let bbox_diag = chart_bbox_diag(&mesh, base);
        Self {
            mesh,
            father: None,
            children: Vec::new(),
            bbox_diag,
            adjacent_charts: Vec::new(),
            landmarks: Vec::new(),
            isomap: None,
            area_3d,
            area_2d: 0.0,
            l2_stretch: f64::INFINITY,
            linf_stretch: f64::INFINITY,
            base_l2_stretch: area_3d,
            is_init_chart: false,
            is_parameterized: false,
            is_optimized: false,
            is_sub_chart: false,
            needs_clean: false,
            unsplittable: false,
        }
    }

    /// Sum of signed (u,v) triangle areas; refreshes `area_2d`.
    pub fn update_area_2d(&mut self) -> f64 {
        let mut total = 0.0;
        for face in &self.mesh.faces {
            total += super::stretch::signed_area_2d(
                self.mesh.verts[face.verts[0] as usize].uv,
                self.mesh.verts[face.verts[1] as usize].uv,
                self.mesh.verts[face.verts[2] as usize].uv,
            );
        }
        self.area_2d = total;
        total
    }

    /// Uniformly scale the parameterization around the origin.
    pub fn scale_uv(&mut self, s: f64) {
        for v in &mut self.mesh.verts {
            v.uv *= s;
        }
        self.area_2d *= s * s;
        if self.l2_stretch.is_finite() && s != 0.0 {
            // Integral L² stretch scales inversely with the squared factor.
            self.l2_stretch /= s * s;
        }
    }

    /// Scale so the 2D area equals the 3D area (the stretch-neutral size).
    pub fn normalize_uv_scale(&mut self) {
        self.update_area_2d();
        if self.area_2d > 0.0 && self.area_3d > 0.0 {
            self.scale_uv((self.area_3d / self.area_2d).sqrt());
        }
    }

    /// Release landmark buffers and Isomap state before packing.
    pub fn release_partition_state(&mut self) {
        self.landmarks = Vec::new();
        self.isomap = None;
        for v in &mut self.mesh.verts {
            v.landmark = crate::mesh::INVALID_ID;
        }
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }

    /// Set the landmark back-links on the vertices from `self.landmarks`.
    pub fn mark_landmarks(&mut self) {
        for v in &mut self.mesh.verts {
            v.landmark = crate::mesh::INVALID_ID;
        }
        for (i, &lm) in self.landmarks.iter().enumerate() {
            self.mesh.verts[lm as usize].landmark = i as u32;
        }
    }

    /// Copy of all vertex uv coordinates (used for rollback).
    pub fn snapshot_uv(&self) -> Vec<Vector2<f64>> {
        self.mesh.verts.iter().map(|v| v.uv).collect()
    }

    pub fn restore_uv(&mut self, snapshot: &[Vector2<f64>]) {
        for (v, uv) in self.mesh.verts.iter_mut().zip(snapshot) {
            v.uv = *uv;
        }
    }
}

fn chart_bbox_diag(mesh: &ChartMesh, base: &BaseMesh) -> f64 {
    use nalgebra::Vector3;
    let mut min = Vector3::repeat(f64::INFINITY);
    let mut max = Vector3::repeat(f64::NEG_INFINITY);
    for v in &mesh.verts {
        let p = base.position(v.root_id);
        min = min.inf(&p);
        max = max.sup(&p);
    }
    if mesh.verts.is_empty() {
        0.0
    } else {
        (max - min).norm()
    }
}
