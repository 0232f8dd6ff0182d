//! Root-mesh geometry shared by every chart.
//!
//! The input mesh is recentered and scaled once so that its largest extent
//! becomes a canonical size; every tolerance downstream is calibrated against
//! that scale. Charts never copy positions: they index into this store
//! through their vertices' `root_id`.

use std::collections::HashSet;

use nalgebra::{Vector2, Vector3};

use super::types::MUST_RESERVE;

/// Canonical model size the input is rescaled to. Experiential value.
pub(crate) const MODEL_SCALE: f64 = 500.0;

/// Geometry and per-face attributes of the root mesh, after canonical
/// rescale and index widening.
#[derive(Clone, Debug)]
pub struct BaseMesh {
    /// Scaled positions, indexed by root vertex id.
    pub positions: Vec<Vector3<f64>>,
    /// Unit face normals (zero for degenerate faces).
    pub face_normals: Vec<Vector3<f64>>,
    /// Face areas in scaled space.
    pub face_areas: Vec<f64>,
    /// Per-face integrated metric tensors `[m00, m01, m11]`, if supplied.
    pub imt: Option<Vec<[f64; 3]>>,
    /// Per-face canonical 2D coordinates of the three corners, present when
    /// an IMT is supplied (signal lengths are measured in this frame).
    pub canonical_uv: Option<Vec<[Vector2<f64>; 3]>>,
    /// Per-vertex importance order; `MUST_RESERVE` pins landmarks.
    pub importance: Vec<i32>,
    /// Unordered root-vertex pairs the host forbids cutting along.
    pub nonsplit_edges: HashSet<(u32, u32)>,
    /// Total surface area in scaled space.
    pub mesh_area: f64,
    /// Bounding-box diagonal in scaled space.
    pub box_diag: f64,
    /// Applied uniform scale (canonical / input units).
    pub scale: f64,
    /// Input-space center removed before scaling.
    pub center: Vector3<f64>,
    pub face_count: usize,
}

impl BaseMesh {
    /// Build the shared store from widened input data.
    pub fn new(
        input_positions: &[[f32; 3]],
        indices: &[[u32; 3]],
        imt: Option<Vec<[f64; 3]>>,
        nonsplit_edges: HashSet<(u32, u32)>,
        reserve_verts: &[u32],
    ) -> Self {
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for p in input_positions {
            for k in 0..3 {
                let c = f64::from(p[k]);
                if c < min[k] {
                    min[k] = c;
                }
                if c > max[k] {
                    max[k] = c;
                }
            }
        }
        let center = (min + max) / 2.0;
        let extent = (max - min).max();
        // All-coincident (or NaN) input keeps unit scale.
        let scale = if extent > 0.0 {
            MODEL_SCALE / extent
        } else {
            1.0
        };
        let positions: Vec<Vector3<f64>> = input_positions
            .iter()
            .map(|p| {
                (Vector3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2])) - center) * scale
            })
            .collect();
        let box_diag = ((max - min) * scale).norm();

        let mut base = Self {
            positions,
            face_normals: Vec::new(),
            face_areas: Vec::new(),
            imt,
            canonical_uv: None,
            importance: Vec::new(),
            nonsplit_edges,
            mesh_area: 0.0,
            box_diag,
            scale,
            center,
            face_count: indices.len(),
        };
        base.compute_face_attributes(indices);
        base.compute_importance(indices, reserve_verts);
        base
    }

    #[inline]
    pub fn position(&self, root_vert: u32) -> Vector3<f64> {
        self.positions[root_vert as usize]
    }

    /// True when the unordered root-vertex pair lies on a forbidden cut.
    #[inline]
    pub fn is_nonsplit_pair(&self, a: u32, b: u32) -> bool {
        let key = if a < b { (a, b) } else { (b, a) };
        self.nonsplit_edges.contains(&key)
    }

    fn compute_face_attributes(&mut self, indices: &[[u32; 3]]) {
        self.face_normals.clear();
        self.face_areas.clear();
        self.mesh_area = 0.0;
        let mut canonical = self.imt.as_ref().map(|_| Vec::with_capacity(indices.len()));
        for tri in indices {
            let p0 = self.position(tri[0]);
            let p1 = self.position(tri[1]);
            let p2 = self.position(tri[2]);
            let cross = (p1 - p0).cross(&(p2 - p0));
            let doubled = cross.norm();
            let area = doubled * 0.5;
            self.face_areas.push(area);
            self.mesh_area += area;
            self.face_normals.push(if doubled > 0.0 {
                cross / doubled
            } else {
                Vector3::zeros()
            });
            if let Some(canonical) = canonical.as_mut() {
                canonical.push(canonical_coordinates(p0, p1, p2));
            }
        }
        self.canonical_uv = canonical;
    }

    /// Rank vertices by a one-ring feature cost: the sum over incident faces
    /// of `area·(1 − n_f·n̄_v)` with `n̄_v` the area-weighted average normal.
    /// Flat, small one-rings rank low; creases and large stars rank high.
    /// Removal rank becomes the importance order (later removal is more
    /// important). Host-reserved vertices get the `MUST_RESERVE` sentinel.
    fn compute_importance(&mut self, indices: &[[u32; 3]], reserve_verts: &[u32]) {
        let n = self.positions.len();
        let mut avg_normal = vec![Vector3::<f64>::zeros(); n];
        let mut ring_area = vec![0.0f64; n];
        for (f, tri) in indices.iter().enumerate() {
            for &v in tri {
                avg_normal[v as usize] += self.face_normals[f] * self.face_areas[f];
                ring_area[v as usize] += self.face_areas[f];
            }
        }
        let mut cost = vec![0.0f64; n];
        for (f, tri) in indices.iter().enumerate() {
            for &v in tri {
                let vi = v as usize;
                let nn = avg_normal[vi].norm();
                let bend = if nn > 0.0 {
                    1.0 - self.face_normals[f].dot(&avg_normal[vi]) / nn
                } else {
                    0.0
                };
                cost[vi] += self.face_areas[f] * bend.max(0.0);
            }
        }
        // Tiny area bias keeps the ordering total on perfectly flat regions.
        for vi in 0..n {
            cost[vi] += ring_area[vi] * 1e-6;
        }
        let mut order: Vec<u32> = (0..n as u32).collect();
        order.sort_by(|&a, &b| {
            cost[a as usize]
                .partial_cmp(&cost[b as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        self.importance = vec![0; n];
        for (rank, &v) in order.iter().enumerate() {
            self.importance[v as usize] = rank as i32;
        }
        for &v in reserve_verts {
            if (v as usize) < n {
                self.importance[v as usize] = MUST_RESERVE;
            }
        }
    }
}

/// Unfold one triangle into its own plane: origin at `p0`, u-axis along
/// `p0→p1`, v-axis completing a right-handed frame with the face normal.
fn canonical_coordinates(
    p0: Vector3<f64>,
    p1: Vector3<f64>,
    p2: Vector3<f64>,
) -> [Vector2<f64>; 3] {
    let e01 = p1 - p0;
    let e02 = p2 - p0;
    let normal = e01.cross(&e02);
    let len01 = e01.norm();
    if len01 <= 0.0 || normal.norm() <= 0.0 {
        return [Vector2::zeros(); 3];
    }
    let axis_u = e01 / len01;
    let axis_v = normal.normalize().cross(&axis_u);
    [
        Vector2::zeros(),
        Vector2::new(len01, 0.0),
        Vector2::new(e02.dot(&axis_u), e02.dot(&axis_v)),
    ]
}
