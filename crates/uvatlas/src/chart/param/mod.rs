//! Chart parameterizers, tried in order until one is fold-free.
//!
//! The Isomap projection is the default seed: the top two embedding
//! coordinates plus an L∞ relaxation of folded neighborhoods. When that
//! overlaps, LSCM (conformal least squares) runs, then the barycentric
//! Tutte map with its convex-boundary guarantee. Every parameterizer ends
//! with the same check: rescale so the 2D area matches the 3D area and
//! require every triangle to keep a non-negative signed area.

mod barycentric;
mod lscm;
mod unfold;

pub use barycentric::barycentric_parameterization;
pub use lscm::lscm_parameterization;
pub use unfold::{chain_unfold, plane_unfold};

use nalgebra::{Vector2, Vector3};

use crate::atlas::AtlasError;
use crate::mesh::BaseMesh;

use super::optimize::{optimize_infinite_stretch, OptimizeCfg};
use super::stretch::signed_area_2d;
use super::types::Chart;

/// Result of a parameterization attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamOutcome {
    Parameterized,
    /// Every parameterizer produced folded triangles.
    Overlapping,
}

/// Run the fall-through chain on a single-boundary chart.
pub fn parameterize_chart(
    chart: &mut Chart,
    base: &BaseMesh,
    opt_cfg: &OptimizeCfg,
) -> Result<ParamOutcome, AtlasError> {
    if chart.face_count() == 1 {
        parameterize_one_face(chart, base);
        return Ok(ParamOutcome::Parameterized);
    }
    if chart.area_3d <= 0.0 {
        // Degenerate chart: every vertex collapses to the origin and no
        // atlas area is consumed.
        for v in &mut chart.mesh.verts {
            v.uv = Vector2::zeros();
        }
        chart.l2_stretch = 0.0;
        chart.area_2d = 0.0;
        chart.is_parameterized = true;
        return Ok(ParamOutcome::Parameterized);
    }

    // 0. Flat and near-flat charts unfold directly (geometry only; an IMT
    // changes what "flat" means, so those charts take the general path).
    if base.imt.is_none() {
        let snapshot = chart.snapshot_uv();
        if plane_unfold(chart, base)
            && optimize_infinite_stretch(chart, base, opt_cfg)
            && finish_parameterization(chart, base)
        {
            return Ok(ParamOutcome::Parameterized);
        }
        chart.restore_uv(&snapshot);
        let plane_like = chart.isomap.as_ref().is_some_and(|s| {
            s.primary_dim <= 2 && !(chart.is_sub_chart && s.iso.dimension > 2)
        });
        if plane_like {
            if chain_unfold(chart, base)
                && optimize_infinite_stretch(chart, base, opt_cfg)
                && finish_parameterization(chart, base)
            {
                return Ok(ParamOutcome::Parameterized);
            }
            chart.restore_uv(&snapshot);
        }
    }

    // 1. Isomap projection: the embedding's leading plane, with folded
    // spots relaxed away.
    if let Some(state) = chart.isomap.as_ref() {
        if state.dim >= 2 {
            let coords = state.coords.clone();
            let dim = state.dim;
            for v in &mut chart.mesh.verts {
                let i = v.id as usize * dim;
                v.uv = Vector2::new(coords[i], coords[i + 1]);
            }
            if optimize_infinite_stretch(chart, base, opt_cfg)
                && finish_parameterization(chart, base)
            {
                return Ok(ParamOutcome::Parameterized);
            }
        }
    }

    // 2. Conformal least squares.
    if lscm_parameterization(chart, base)? && finish_parameterization(chart, base) {
        return Ok(ParamOutcome::Parameterized);
    }

    // 3. Tutte embedding on the unit circle.
    if barycentric_parameterization(chart)? && finish_parameterization(chart, base) {
        return Ok(ParamOutcome::Parameterized);
    }

    Ok(ParamOutcome::Overlapping)
}

/// Common epilogue: reject folds, normalize the scale, mark the chart.
pub(crate) fn finish_parameterization(chart: &mut Chart, base: &BaseMesh) -> bool {
    let mut total = 0.0;
    for face in &chart.mesh.faces {
        let area = signed_area_2d(
            chart.mesh.verts[face.verts[0] as usize].uv,
            chart.mesh.verts[face.verts[1] as usize].uv,
            chart.mesh.verts[face.verts[2] as usize].uv,
        );
        if area < 0.0 && base.face_areas[face.root_id as usize] > 0.0 {
            return false;
        }
        total += area.abs();
    }
    if total > 0.0 && chart.area_3d > 0.0 {
        let s = (chart.area_3d / total).sqrt();
        for v in &mut chart.mesh.verts {
            v.uv *= s;
        }
    }
    chart.area_2d = chart.area_3d;
    chart.is_parameterized = true;
    true
}

/// Closed-form placement of a single triangle into its own plane.
pub(crate) fn parameterize_one_face(chart: &mut Chart, base: &BaseMesh) {
    let face = &chart.mesh.faces[0];
    let p = |k: usize| base.position(chart.mesh.verts[face.verts[k] as usize].root_id);
    let uv = canonical_triangle(p(0), p(1), p(2));
    let ids = face.verts;
    for (k, &v) in ids.iter().enumerate() {
        chart.mesh.verts[v as usize].uv = uv[k];
    }
    chart.l2_stretch = base.face_areas[chart.mesh.faces[0].root_id as usize];
    chart.area_2d = chart.area_3d;
    chart.is_parameterized = true;
}

/// Unfold one 3D triangle: origin at p0, u along p0→p1.
pub(crate) fn canonical_triangle(
    p0: Vector3<f64>,
    p1: Vector3<f64>,
    p2: Vector3<f64>,
) -> [Vector2<f64>; 3] {
    let e01 = p1 - p0;
    let e02 = p2 - p0;
    let len01 = e01.norm();
    let normal = e01.cross(&e02);
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
