//! Least-squares conformal parameterization.
//!
//! Each triangle contributes two rows (real and imaginary part of the
//! conformality residual) scaled by the square root of its doubled area.
//! The two geodesically farthest boundary vertices are pinned at (1, 0)
//! and (−1, 0); the remaining unknowns solve the normal equations by
//! conjugate gradient.

use nalgebra::Vector2;

use crate::atlas::AtlasError;
use crate::mesh::{shortest_path, BaseMesh};
use crate::numeric::{solve_normal_cg, CgOutcome, SparseMatrix};

use super::canonical_triangle;
use super::super::types::Chart;

const LSCM_MAX_ITERATION: usize = 10_000;
const LSCM_EPSILON: f64 = 1e-8;

/// Column of an unpinned vertex: vertices keep their order with the two
/// pins deleted; the v-coordinate block follows the u block.
fn free_column(vert: u32, pin1: u32, pin2: u32) -> Option<usize> {
    if vert == pin1 || vert == pin2 {
        return None;
    }
    let mut col = vert as usize;
    if vert > pin1 {
        col -= 1;
    }
    if vert > pin2 {
        col -= 1;
    }
    Some(col)
}

/// Two geodesically farthest boundary vertices (graph distance), ordered.
fn farthest_boundary_pair(chart: &Chart) -> Option<(u32, u32)> {
    let first = chart.mesh.verts.iter().find(|v| v.is_boundary)?.id;
    let outcome = shortest_path(&chart.mesh, &[first], |_| true, |_| false);
    let mut best = (first, f64::NEG_INFINITY);
    for v in &chart.mesh.verts {
        if v.is_boundary && outcome.dist[v.id as usize].is_finite() {
            if outcome.dist[v.id as usize] > best.1 {
                best = (v.id, outcome.dist[v.id as usize]);
            }
        }
    }
    if best.0 == first {
        return None;
    }
    Some((first.min(best.0), first.max(best.0)))
}

/// Run LSCM; returns whether a solution was produced (the caller still
/// checks it for folds). Charts without two distinct boundary vertices are
/// rejected immediately.
pub fn lscm_parameterization(chart: &mut Chart, base: &BaseMesh) -> Result<bool, AtlasError> {
    let n = chart.mesh.vert_count();
    let f = chart.mesh.face_count();
    if n < 3 {
        return Ok(false);
    }
    let Some((pin1, pin2)) = farthest_boundary_pair(chart) else {
        return Ok(false);
    };
    let pins = [Vector2::new(1.0, 0.0), Vector2::new(-1.0, 0.0)];

    let cols = (n - 2) * 2;
    let mut a = SparseMatrix::new(2 * f, cols);
    let mut b = vec![0.0f64; 2 * f];

    for face in &chart.mesh.faces {
        let p = |k: usize| base.position(chart.mesh.verts[face.verts[k] as usize].root_id);
        let v2d = canonical_triangle(p(0), p(1), p(2));
        let doubled: f64 = (v2d[0].x * v2d[1].y - v2d[0].y * v2d[1].x)
            + (v2d[1].x * v2d[2].y - v2d[1].y * v2d[2].x)
            + (v2d[2].x * v2d[0].y - v2d[2].y * v2d[0].x);
        if doubled <= f64::MIN_POSITIVE {
            continue;
        }
        let t = doubled.sqrt();
        let row_re = face.id as usize;
        let row_im = face.id as usize + f;
        for k in 0..3 {
            let vert = face.verts[k];
            let w_r = (v2d[(k + 2) % 3].x - v2d[(k + 1) % 3].x) / t;
            let w_i = (v2d[(k + 2) % 3].y - v2d[(k + 1) % 3].y) / t;
            match free_column(vert, pin1, pin2) {
                Some(col) => {
                    let col_u = col;
                    let col_v = col + n - 2;
                    a.add(row_re, col_u, w_r);
                    a.add(row_re, col_v, -w_i);
                    a.add(row_im, col_u, w_i);
                    a.add(row_im, col_v, w_r);
                }
                None => {
                    // Pinned: the contribution moves to the right-hand side.
                    let uv = if vert == pin1 { pins[0] } else { pins[1] };
                    b[row_re] -= w_r * uv.x - w_i * uv.y;
                    b[row_im] -= w_i * uv.x + w_r * uv.y;
                }
            }
        }
    }

    let mut x = Vec::new();
    if solve_normal_cg(&a, &b, &mut x, LSCM_MAX_ITERATION, LSCM_EPSILON) == CgOutcome::Exhausted {
        // A stalled solve yields garbage coordinates; let the chain fall
        // through to the barycentric map instead of surfacing an error.
        return Ok(false);
    }

    for v in &mut chart.mesh.verts {
        if v.id == pin1 {
            v.uv = pins[0];
        } else if v.id == pin2 {
            v.uv = pins[1];
        } else if let Some(col) = free_column(v.id, pin1, pin2) {
            v.uv = Vector2::new(x[col], x[col + n - 2]);
        } else {
            v.uv = Vector2::zeros();
        }
    }
    Ok(true)
}
