//! Tutte's barycentric embedding: boundary pinned to the unit circle by
//! 3D arc length, every interior vertex at the uniform centroid of its
//! neighbors. With a convex boundary the solution of the resulting linear
//! system is always an embedding of a valid disk, which makes this the
//! parameterizer of last resort.

use nalgebra::Vector2;

use crate::atlas::AtlasError;
use crate::mesh::INVALID_ID;
use crate::numeric::{solve_normal_cg, CgOutcome, SparseMatrix};

use super::super::types::Chart;

const BC_MAX_ITERATION: usize = 10_000;
const BC_EPSILON: f64 = 1e-8;

pub fn barycentric_parameterization(chart: &mut Chart) -> Result<bool, AtlasError> {
    let n = chart.mesh.vert_count();

    // Slot maps: boundary vertices number the circle table, interior
    // vertices number the unknowns.
    let mut slot = vec![0u32; n];
    let mut boundary_count = 0usize;
    let mut interior_count = 0usize;
    for v in &chart.mesh.verts {
        if v.is_boundary {
            slot[v.id as usize] = boundary_count as u32;
            boundary_count += 1;
        } else {
            slot[v.id as usize] = interior_count as u32;
            interior_count += 1;
        }
    }
    if boundary_count == 0 {
        return Ok(false);
    }

    // Walk the (single) boundary loop, accumulating 3D arc length, then
    // wrap it onto the unit circle.
    let first = chart
        .mesh
        .verts
        .iter()
        .find(|v| v.is_boundary)
        .map(|v| v.id)
        .unwrap_or(INVALID_ID);
    let mut arc = vec![0.0f64; boundary_count];
    let mut total_len = 0.0;
    let mut prev = first;
    let mut cur = chart.mesh.verts[first as usize].vert_adj[0];
    arc[slot[first as usize] as usize] = 0.0;
    let mut walked = 1usize;
    while cur != first {
        let e = chart
            .mesh
            .edge_between(prev, cur)
            .ok_or_else(|| AtlasError::topology("broken boundary loop"))?;
        total_len += chart.mesh.edges[e as usize].length;
        arc[slot[cur as usize] as usize] = total_len;
        let adj = &chart.mesh.verts[cur as usize].vert_adj;
        let next = if adj[0] != prev {
            adj[0]
        } else {
            adj[adj.len() - 1]
        };
        prev = cur;
        cur = next;
        walked += 1;
        if walked > boundary_count + 1 {
            // More than one boundary loop reached this walk.
            return Ok(false);
        }
    }
    if walked != boundary_count {
        return Ok(false);
    }
    let e = chart
        .mesh
        .edge_between(prev, first)
        .ok_or_else(|| AtlasError::topology("broken boundary loop"))?;
    total_len += chart.mesh.edges[e as usize].length;
    if total_len <= 0.0 {
        return Ok(false);
    }
    let circle: Vec<Vector2<f64>> = arc
        .iter()
        .map(|&l| {
            let angle = std::f64::consts::TAU * l / total_len;
            Vector2::new(angle.cos(), angle.sin())
        })
        .collect();

    // Interior system: degree on the diagonal, −1 per interior neighbor,
    // boundary neighbors on the right-hand side.
    let mut uv_out: Vec<Vector2<f64>> = vec![Vector2::zeros(); n];
    if interior_count > 0 {
        let mut a = SparseMatrix::new(interior_count, interior_count);
        let mut bu = vec![0.0f64; interior_count];
        let mut bv = vec![0.0f64; interior_count];
        for v in &chart.mesh.verts {
            if v.is_boundary {
                continue;
            }
            let row = slot[v.id as usize] as usize;
            a.set(row, row, v.vert_adj.len() as f64);
            for &adj in &v.vert_adj {
                let av = &chart.mesh.verts[adj as usize];
                if av.is_boundary {
                    let c = circle[slot[adj as usize] as usize];
                    bu[row] += c.x;
                    bv[row] += c.y;
                } else {
                    a.set(row, slot[adj as usize] as usize, -1.0);
                }
            }
        }
        let mut xu = Vec::new();
        let mut xv = Vec::new();
        let ru = solve_normal_cg(&a, &bu, &mut xu, BC_MAX_ITERATION, BC_EPSILON);
        let rv = solve_normal_cg(&a, &bv, &mut xv, BC_MAX_ITERATION, BC_EPSILON);
        if ru == CgOutcome::Exhausted || rv == CgOutcome::Exhausted {
            // Last resort of the chain; a stalled solve is a numeric failure.
            return Err(AtlasError::numeric(
                "conjugate gradient stalled in barycentric parameterization",
            ));
        }
        for v in &chart.mesh.verts {
            if !v.is_boundary {
                let i = slot[v.id as usize] as usize;
                uv_out[v.id as usize] = Vector2::new(xu[i], xv[i]);
            }
        }
    }
    for v in &mut chart.mesh.verts {
        if v.is_boundary {
            v.uv = circle[slot[v.id as usize] as usize];
        } else {
            v.uv = uv_out[v.id as usize];
        }
    }
    Ok(true)
}
