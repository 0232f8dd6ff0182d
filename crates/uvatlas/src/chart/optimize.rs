//! Heap-driven vertex relaxation minimizing chart stretch.
//!
//! Vertices are visited worst-first. Each visit samples candidate positions
//! on a disk around a per-vertex center (one-ring centroid for interior
//! vertices, the current position for boundary vertices), bisects between
//! the incumbent and the sample, and accepts only strict improvements of the
//! one-ring stretch. The disk radius is shrunk so no accepted move can fold
//! a triangle of a previously valid ring or cross another boundary edge.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mesh::BaseMesh;
use crate::numeric::{HeapHandle, MaxHeap};

use super::stretch::{
    face_l2_squared_stretch, face_ln_squared_stretch, face_signal_squared_stretch,
    signed_area_2d, vertex_stretch, INFINITE_STRETCH,
};
use super::types::Chart;

/// What the relaxation minimizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizeGoal {
    /// Integral L² stretch (sum over one-ring).
    GeoL2,
    /// Worst-case stretch (max over one-ring).
    GeoLn,
    /// Signal-specialized stretch with the bounding-box constraint.
    Signal,
}

/// Tunables of the stretch optimizer. Counts and factors follow the
/// historical values.
#[derive(Clone, Copy, Debug)]
pub struct OptimizeCfg {
    /// Full L² passes over all vertices.
    pub l2_passes: usize,
    /// L∞ passes over all vertices.
    pub ln_passes: usize,
    /// Passes restricted to infinite-stretch neighborhoods.
    pub infinite_passes: usize,
    /// Random candidates per vertex visit, per goal.
    pub rand_l2: usize,
    pub rand_ln: usize,
    pub rand_infinite: usize,
    /// Positional tolerance (relative to the average edge length).
    pub tolerance: f64,
    /// Stop a pass loop when the max face stretch improves less than this.
    pub min_change: f64,
    /// Shrink factor on every movement radius.
    pub conservative: f64,
    /// Skip relaxation of L∞ vertices already below this bar.
    pub ln_stop_bar: f64,
    /// Seed of the candidate-angle RNG (reset per vertex visit).
    pub seed: u64,
    /// Chart-area fraction of folded faces tolerated by the escape pass.
    pub overturn_tolerance: f64,
}

impl Default for OptimizeCfg {
    fn default() -> Self {
        Self {
            l2_passes: 6,
            ln_passes: 3,
            infinite_passes: 5,
            rand_l2: 10,
            rand_ln: 10,
            rand_infinite: 40,
            tolerance: 1e-4,
            min_change: 0.01,
            conservative: 0.80,
            ln_stop_bar: 1.5,
            seed: 2,
            overturn_tolerance: 0.1,
        }
    }
}

/// Scratch shared across one optimization run.
struct OptRun<'a> {
    chart: &'a mut Chart,
    base: &'a BaseMesh,
    cfg: &'a OptimizeCfg,
    goal: OptimizeGoal,
    face_stretch: Vec<f64>,
    vert_stretch: Vec<f64>,
    /// L∞ normalization: √(area2D/area3D).
    scale: f64,
    avg_edge_len: f64,
    use_bbox: bool,
    bbox_min: Vector2<f64>,
    bbox_max: Vector2<f64>,
    /// Signal-mode cap on the geometric form trace (∞ disables).
    expected_stretch_cap: f64,
}

impl<'a> OptRun<'a> {
    fn new(
        chart: &'a mut Chart,
        base: &'a BaseMesh,
        cfg: &'a OptimizeCfg,
        goal: OptimizeGoal,
        use_bbox: bool,
        expected_stretch_cap: f64,
    ) -> Self {
        let ln_mode = goal == OptimizeGoal::GeoLn;
        let scale = if ln_mode {
            let area2d: f64 = chart
                .mesh
                .faces
                .iter()
                .map(|f| {
                    signed_area_2d(
                        chart.mesh.verts[f.verts[0] as usize].uv,
                        chart.mesh.verts[f.verts[1] as usize].uv,
                        chart.mesh.verts[f.verts[2] as usize].uv,
                    )
                })
                .sum();
            if chart.area_3d > 0.0 && area2d > 0.0 {
                (area2d / chart.area_3d).sqrt()
            } else {
                1.0
            }
        } else {
            1.0
        };
        let avg_edge_len = if chart.mesh.edges.is_empty() {
            1.0
        } else {
            chart.mesh.edges.iter().map(|e| e.length).sum::<f64>()
                / chart.mesh.edge_count() as f64
        };
        let (bbox_min, bbox_max) = uv_bounds(chart);
        let mut run = Self {
            chart,
            base,
            cfg,
            goal,
            face_stretch: Vec::new(),
            vert_stretch: Vec::new(),
            scale,
            avg_edge_len,
            use_bbox,
            bbox_min,
            bbox_max,
            expected_stretch_cap,
        };
        run.recompute_all();
        run
    }

    fn ln_mode(&self) -> bool {
        self.goal == OptimizeGoal::GeoLn
    }

    fn recompute_all(&mut self) {
        let mesh = &self.chart.mesh;
        let mut f2d = 0.0;
        self.face_stretch = mesh
            .faces
            .iter()
            .map(|face| {
                self.eval_face(
                    face.id,
                    mesh.verts[face.verts[0] as usize].uv,
                    mesh.verts[face.verts[1] as usize].uv,
                    mesh.verts[face.verts[2] as usize].uv,
                    &mut f2d,
                )
            })
            .collect();
        self.vert_stretch = (0..mesh.vert_count() as u32)
            .map(|v| vertex_stretch(mesh, &self.face_stretch, v, self.ln_mode()))
            .collect();
    }

    fn eval_face(
        &self,
        face_id: u32,
        v0: Vector2<f64>,
        v1: Vector2<f64>,
        v2: Vector2<f64>,
        f2d: &mut f64,
    ) -> f64 {
        let mesh = &self.chart.mesh;
        let face = &mesh.faces[face_id as usize];
        match self.goal {
            OptimizeGoal::GeoL2 => {
                face_l2_squared_stretch(mesh, self.base, face, v0, v1, v2, f2d)
            }
            OptimizeGoal::GeoLn => {
                face_ln_squared_stretch(mesh, self.base, face, v0, v1, v2, self.scale, f2d)
            }
            OptimizeGoal::Signal => {
                let mut geo = [0.0f64; 3];
                let s = face_signal_squared_stretch(
                    mesh,
                    self.base,
                    face,
                    v0,
                    v1,
                    v2,
                    f2d,
                    Some(&mut geo),
                );
                // Keep the geometric distortion bounded while chasing signal.
                if self.expected_stretch_cap.is_finite()
                    && (geo[0] + geo[2]) > self.expected_stretch_cap * 2.0
                {
                    return INFINITE_STRETCH;
                }
                s
            }
        }
    }

    /// One-ring stretch if `vert` moved to `uv`; fills `ring` with the new
    /// per-face stretches.
    fn eval_move(&self, vert: u32, uv: Vector2<f64>, ring: &mut [f64]) -> f64 {
        let mesh = &self.chart.mesh;
        let faces = &mesh.verts[vert as usize].face_adj;
        let mut f2d = 0.0;
        for (slot, &f) in ring.iter_mut().zip(faces) {
            let face = &mesh.faces[f as usize];
            let pick = |k: usize| {
                if face.verts[k] == vert {
                    uv
                } else {
                    mesh.verts[face.verts[k] as usize].uv
                }
            };
            *slot = self.eval_face(f, pick(0), pick(1), pick(2), &mut f2d);
        }
        if self.ln_mode() {
            ring.iter().fold(0.0, |m, &s| m.max(s))
        } else {
            let mut total = 0.0;
            for &s in ring.iter() {
                if s >= INFINITE_STRETCH {
                    return INFINITE_STRETCH;
                }
                total += s;
            }
            total
        }
    }

    /// Movement disk for a boundary vertex: stay inside the one-ring, off
    /// other boundary edges, and keep the incident boundary edges clear of
    /// every other boundary vertex.
    fn boundary_disk(&self, vert: u32) -> (Vector2<f64>, f64) {
        let mesh = &self.chart.mesh;
        let v = &mesh.verts[vert as usize];
        let center = v.uv;
        let mut radius_sq = f64::INFINITY;
        for &adj in &v.vert_adj {
            radius_sq = radius_sq.min((mesh.verts[adj as usize].uv - center).norm_squared());
        }
        for edge in &mesh.edges {
            if !edge.is_boundary || edge.has_vert(vert) {
                continue;
            }
            let d = point_segment_dist_sq(
                center,
                mesh.verts[edge.verts[0] as usize].uv,
                mesh.verts[edge.verts[1] as usize].uv,
            );
            radius_sq = radius_sq.min(d);
        }
        for &e in &v.edge_adj {
            let edge = &mesh.edges[e as usize];
            if !edge.is_boundary {
                continue;
            }
            let a = mesh.verts[edge.verts[0] as usize].uv;
            let b = mesh.verts[edge.verts[1] as usize].uv;
            for other in &mesh.verts {
                if !other.is_boundary || edge.has_vert(other.id) {
                    continue;
                }
                radius_sq = radius_sq.min(point_segment_dist_sq(other.uv, a, b));
            }
        }
        (center, radius_sq.sqrt() * self.cfg.conservative)
    }

    /// Movement disk for an interior vertex: centered at the one-ring
    /// centroid, inside the nearest ring vertex.
    fn interior_disk(&self, vert: u32) -> (Vector2<f64>, f64) {
        let mesh = &self.chart.mesh;
        let v = &mesh.verts[vert as usize];
        let mut center = Vector2::zeros();
        for &adj in &v.vert_adj {
            center += mesh.verts[adj as usize].uv;
        }
        center /= v.vert_adj.len() as f64;
        let mut radius_sq = f64::INFINITY;
        for &adj in &v.vert_adj {
            radius_sq = radius_sq.min((mesh.verts[adj as usize].uv - center).norm_squared());
        }
        (center, radius_sq.sqrt() * self.cfg.conservative)
    }

    /// Relax one vertex; true when its position (and ring stretch) improved.
    fn relax_vertex(&mut self, vert: u32, rand_trials: usize) -> bool {
        let is_boundary = self.chart.mesh.verts[vert as usize].is_boundary;
        let ring_len = self.chart.mesh.verts[vert as usize].face_adj.len();
        if ring_len == 0 {
            return false;
        }
        let mut ring_best = vec![0.0f64; ring_len];
        let mut ring_work = vec![0.0f64; ring_len];

        let original_uv = self.chart.mesh.verts[vert as usize].uv;
        let original_stretch = self.vert_stretch[vert as usize];

        let (center, radius) = if is_boundary {
            self.boundary_disk(vert)
        } else {
            self.interior_disk(vert)
        };
        if radius <= self.avg_edge_len * 1e-9 {
            return false;
        }

        // Seed candidate: interior vertices probe the centroid and blends
        // toward each neighbor before the random sweep.
        let mut best_uv = original_uv;
        let mut best_stretch = original_stretch;
        if !is_boundary {
            let s = self.eval_move(vert, center, &mut ring_work);
            if s < best_stretch {
                best_stretch = s;
                best_uv = center;
                ring_best.copy_from_slice(&ring_work);
            }
            let ring: Vec<u32> = self.chart.mesh.verts[vert as usize].vert_adj.clone();
            for adj in ring {
                let target = self.chart.mesh.verts[adj as usize].uv;
                let blend = target * self.cfg.conservative + center * (1.0 - self.cfg.conservative);
                let s = self.eval_move(vert, blend, &mut ring_work);
                if s < best_stretch {
                    best_stretch = s;
                    best_uv = blend;
                    ring_best.copy_from_slice(&ring_work);
                }
            }
        }

        // Random directions with a fixed seed keep the result deterministic
        // and independent of visit order.
        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let tol_sq = (self.avg_edge_len * self.cfg.tolerance).powi(2);
        let mut cur_uv = original_uv;
        let mut cur_stretch = original_stretch;
        for _ in 0..rand_trials {
            let angle = rng.gen::<f64>() * std::f64::consts::TAU;
            let mut end = center + Vector2::new(angle.cos(), angle.sin()) * radius;
            if is_boundary && self.use_bbox {
                end.x = end.x.clamp(self.bbox_min.x, self.bbox_max.x);
                end.y = end.y.clamp(self.bbox_min.y, self.bbox_max.y);
            }
            let mut end_stretch = self.eval_move(vert, end, &mut ring_work);

            // Bisect toward the better endpoint.
            let mut start = cur_uv;
            let mut start_stretch = cur_stretch;
            let mut gap = (start - end).norm_squared();
            let mut prev_gap = gap;
            while gap > tol_sq {
                let middle = (start + end) / 2.0;
                let mid_stretch = self.eval_move(vert, middle, &mut ring_work);
                if start_stretch < end_stretch {
                    end = middle;
                    end_stretch = mid_stretch;
                } else {
                    start = middle;
                    start_stretch = mid_stretch;
                }
                gap = (start - end).norm_squared();
                if prev_gap - gap <= f64::MIN_POSITIVE || prev_gap < gap {
                    break;
                }
                prev_gap = gap;
            }
            if end_stretch < start_stretch {
                start = end;
                start_stretch = end_stretch;
            }
            if start_stretch < cur_stretch {
                cur_uv = start;
                cur_stretch = start_stretch;
            }
        }

        if cur_stretch < best_stretch {
            best_uv = cur_uv;
            best_stretch = cur_stretch;
        }
        if best_stretch >= INFINITE_STRETCH || best_stretch >= original_stretch {
            return false;
        }

        // Accept: move the vertex and refresh ring stretches.
        let final_stretch = self.eval_move(vert, best_uv, &mut ring_best);
        self.chart.mesh.verts[vert as usize].uv = best_uv;
        self.vert_stretch[vert as usize] = final_stretch;
        let faces: Vec<u32> = self.chart.mesh.verts[vert as usize].face_adj.clone();
        for (f, s) in faces.iter().zip(&ring_best) {
            self.face_stretch[*f as usize] = *s;
        }
        let ring: Vec<u32> = self.chart.mesh.verts[vert as usize].vert_adj.clone();
        for adj in ring {
            self.vert_stretch[adj as usize] =
                vertex_stretch(&self.chart.mesh, &self.face_stretch, adj, self.ln_mode());
        }
        true
    }

    /// Drain a heap of scheduled vertices, re-keying rings on acceptance.
    fn drain_heap(
        &mut self,
        heap: &mut MaxHeap<u32>,
        handles: &mut [Option<HeapHandle>],
        bar: f64,
        rand_trials: usize,
        boundary: bool,
        interior: bool,
    ) {
        while let Some((weight, vert)) = heap.pop() {
            handles[vert as usize] = None;
            if weight < bar {
                continue;
            }
            let is_boundary = self.chart.mesh.verts[vert as usize].is_boundary;
            if (is_boundary && !boundary) || (!is_boundary && !interior) {
                continue;
            }
            if self.relax_vertex(vert, rand_trials) {
                let ring: Vec<u32> = self.chart.mesh.verts[vert as usize].vert_adj.clone();
                for adj in ring {
                    if let Some(h) = handles[adj as usize] {
                        heap.update(h, self.vert_stretch[adj as usize]);
                    }
                }
            }
        }
    }

    /// Full passes over every vertex; L² mode stops when the max face
    /// stretch converges.
    fn optimize_all(&mut self, passes: usize, rand_trials: usize, bar: f64) {
        let n = self.chart.mesh.vert_count();
        let mut prev_max = INFINITE_STRETCH;
        for _ in 0..passes {
            let mut heap = MaxHeap::with_capacity(n);
            let mut handles: Vec<Option<HeapHandle>> = vec![None; n];
            for v in 0..n as u32 {
                handles[v as usize] = Some(heap.push(self.vert_stretch[v as usize], v));
            }
            self.drain_heap(&mut heap, &mut handles, bar, rand_trials, true, true);
            if !self.ln_mode() {
                let cur_max = self.face_stretch.iter().copied().fold(0.0, f64::max);
                if prev_max - cur_max < self.cfg.min_change {
                    break;
                }
                prev_max = cur_max;
            }
        }
    }

    /// Passes restricted to infinite-stretch vertices and their rings.
    fn optimize_infinite(&mut self, passes: usize, rand_trials: usize) {
        let n = self.chart.mesh.vert_count();
        for _ in 0..passes {
            let mut heap = MaxHeap::with_capacity(n);
            let mut handles: Vec<Option<HeapHandle>> = vec![None; n];
            let mut bad = 0usize;
            for v in 0..n {
                if self.vert_stretch[v] >= INFINITE_STRETCH {
                    bad += 1;
                    if handles[v].is_none() {
                        handles[v] = Some(heap.push(self.vert_stretch[v], v as u32));
                    }
                    for &adj in &self.chart.mesh.verts[v].vert_adj {
                        let a = adj as usize;
                        if handles[a].is_none() {
                            handles[a] = Some(heap.push(self.vert_stretch[a], adj));
                        }
                    }
                }
            }
            if bad == 0 {
                return;
            }
            self.drain_heap(&mut heap, &mut handles, 0.0, rand_trials, true, true);
        }
    }

    fn total_l2(&self) -> f64 {
        let mut total = 0.0;
        for &s in &self.face_stretch {
            if s >= INFINITE_STRETCH {
                return INFINITE_STRETCH;
            }
            total += s;
        }
        total
    }
}

fn uv_bounds(chart: &Chart) -> (Vector2<f64>, Vector2<f64>) {
    let mut min = Vector2::repeat(f64::INFINITY);
    let mut max = Vector2::repeat(f64::NEG_INFINITY);
    for v in &chart.mesh.verts {
        min = min.inf(&v.uv);
        max = max.sup(&v.uv);
    }
    (min, max)
}

fn point_segment_dist_sq(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= f64::MIN_POSITIVE {
        return (p - a).norm_squared();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm_squared()
}

/// Full stretch optimization of a parameterized chart: an L∞ round to clear
/// the worst distortion, then L² rounds until convergence. In signal mode
/// the L² rounds minimize the signal stretch under the chart's bounding-box
/// constraint. Updates the chart's stretch fields.
pub fn optimize_chart_stretch(
    chart: &mut Chart,
    base: &BaseMesh,
    cfg: &OptimizeCfg,
    signal_mode: bool,
    expected_stretch_cap: f64,
) {
    if chart.face_count() <= 1 {
        chart.l2_stretch = chart.base_l2_stretch;
        chart.is_optimized = true;
        return;
    }
    if !signal_mode {
        let mut run = OptRun::new(chart, base, cfg, OptimizeGoal::GeoLn, false, f64::INFINITY);
        run.optimize_all(cfg.ln_passes, cfg.rand_ln, cfg.ln_stop_bar);
        drop(run);
        let mut run = OptRun::new(chart, base, cfg, OptimizeGoal::GeoL2, false, f64::INFINITY);
        run.optimize_all(cfg.l2_passes, cfg.rand_l2, 0.0);
        let total = run.total_l2();
        drop(run);
        chart.l2_stretch = total;
    } else {
        let mut run = OptRun::new(chart, base, cfg, OptimizeGoal::Signal, true, expected_stretch_cap);
        run.optimize_all(cfg.l2_passes, cfg.rand_l2, 0.0);
        let total = run.total_l2();
        drop(run);
        chart.l2_stretch = total;
    }
    chart.update_area_2d();
    chart.linf_stretch = super::stretch::chart_ln_squared_stretch(&chart.mesh, base);
    chart.is_optimized = true;
}

/// The infinite-stretch escape: L∞ relaxation restricted to folded
/// neighborhoods. Returns false when the area of still-folded faces exceeds
/// the overturn tolerance, letting the caller fall to the next
/// parameterizer.
pub fn optimize_infinite_stretch(chart: &mut Chart, base: &BaseMesh, cfg: &OptimizeCfg) -> bool {
    let mut run = OptRun::new(chart, base, cfg, OptimizeGoal::GeoLn, false, f64::INFINITY);
    let has_bad = run
        .vert_stretch
        .iter()
        .any(|&s| s >= INFINITE_STRETCH);
    if has_bad {
        run.optimize_infinite(cfg.infinite_passes, cfg.rand_infinite);
    }
    let mut bad_area = 0.0;
    for (f, &s) in run.face_stretch.iter().enumerate() {
        if s >= INFINITE_STRETCH {
            bad_area += base.face_areas[run.chart.mesh.faces[f].root_id as usize];
        }
    }
    let area = run.chart.area_3d;
    drop(run);
    let ok = area <= 0.0 || bad_area / area <= cfg.overturn_tolerance;
    if ok {
        chart.l2_stretch = super::stretch::chart_l2_geo_squared_stretch(&chart.mesh, base);
        chart.update_area_2d();
    }
    ok
}
