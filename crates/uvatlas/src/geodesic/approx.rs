//! Dijkstra over mesh edges with the Kimmel–Sethian triangle update.
//!
//! Plain edge relaxation overestimates distances that cut across faces. When
//! a vertex C is adjacent to an edge whose endpoints A and B are already
//! finalized, the cosine-law construction below propagates a planar wavefront
//! through the triangle (A, B, C) and can tighten C beyond any edge path.

use nalgebra::Vector3;

use crate::mesh::{BaseMesh, ChartMesh, INVALID_ID};
use crate::numeric::{HeapHandle, MaxHeap};

use super::{GeodesicEngine, ZERO_EPS};

/// Distances from one source; `signal` mirrors `geodesic` when no IMT rides
/// along.
pub struct DistanceField {
    pub geodesic: Vec<f64>,
    pub signal: Vec<f64>,
    /// Last vertex finalized, i.e. the geodesically farthest reachable one.
    pub farthest: u32,
}

/// The fast engine: Dijkstra augmented with the fan update.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproxEngine;

impl GeodesicEngine for ApproxEngine {
    fn one_to_all(&self, mesh: &ChartMesh, base: &BaseMesh, source: u32) -> Vec<f64> {
        dijkstra_abc(mesh, base, source, false).geodesic
    }
}

/// One-to-all run. With `with_signal`, signal distances are relaxed over the
/// cached signal edge lengths in the same sweep (the fan update applies to
/// the geodesic field only).
pub fn dijkstra_abc(
    mesh: &ChartMesh,
    base: &BaseMesh,
    source: u32,
    with_signal: bool,
) -> DistanceField {
    let n = mesh.vert_count();
    let mut geo = vec![f64::INFINITY; n];
    let mut sig = vec![f64::INFINITY; n];
    let mut processed = vec![false; n];
    let mut handles: Vec<Option<HeapHandle>> = vec![None; n];
    let mut heap = MaxHeap::with_capacity(n);

    geo[source as usize] = 0.0;
    sig[source as usize] = 0.0;
    processed[source as usize] = true;
    heap.push(0.0, source);
    let mut farthest = source;

    while let Some((_, cur)) = heap.pop() {
        processed[cur as usize] = true;
        farthest = cur;

        // Relax every incident edge, then try the triangle update from each
        // finalized opposite vertex of that edge.
        for &e in &mesh.verts[cur as usize].edge_adj {
            let edge = &mesh.edges[e as usize];
            let adj = edge.other_vert(cur);
            if processed[adj as usize] {
                continue;
            }
            let cand = geo[cur as usize] + edge.length;
            if geo[adj as usize] > cand {
                geo[adj as usize] = cand;
                if with_signal {
                    sig[adj as usize] = sig[cur as usize] + edge.signal_length;
                }
            }
            for &opp in &edge.opposites {
                if opp == INVALID_ID || !processed[opp as usize] {
                    continue;
                }
                if geo[opp as usize] > geo[cur as usize] {
                    triangle_update(mesh, base, cur, opp, adj, &mut geo);
                } else {
                    triangle_update(mesh, base, opp, cur, adj, &mut geo);
                }
            }
        }

        for &adj in &mesh.verts[cur as usize].vert_adj {
            if processed[adj as usize] {
                continue;
            }
            let weight = -geo[adj as usize];
            match handles[adj as usize] {
                Some(h) => heap.update(h, weight),
                None => handles[adj as usize] = Some(heap.push(weight, adj)),
            }
        }
    }

    if !with_signal {
        sig.copy_from_slice(&geo);
    }
    DistanceField {
        geodesic: geo,
        signal: sig,
        farthest,
    }
}

/// Kimmel–Sethian update of vertex C from finalized vertices A and B of the
/// same triangle, with `dist(A) ≤ dist(B)`.
pub(crate) fn triangle_update(
    mesh: &ChartMesh,
    base: &BaseMesh,
    va: u32,
    vb: u32,
    vc: u32,
    geo: &mut [f64],
) {
    let pos = |v: u32| -> Vector3<f64> { base.position(mesh.verts[v as usize].root_id) };
    let u = geo[vb as usize] - geo[va as usize];
    if !u.is_finite() {
        return;
    }
    let v0 = pos(vb) - pos(vc);
    let v1 = pos(va) - pos(vc);
    let a = v0.norm();
    let b = v1.norm();
    let c = a * b;
    if c <= ZERO_EPS {
        return;
    }
    let cos_theta = v0.dot(&v1) / c;
    let sin_theta = v0.cross(&v1).norm() / c;

    let qa = a * a + b * b - 2.0 * a * b * cos_theta;
    let qb = 2.0 * b * u * (a * cos_theta - b);
    let qc = b * b * (u * u - a * a * sin_theta * sin_theta);

    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 || qa.abs() <= ZERO_EPS {
        return;
    }
    let t = (disc.sqrt() - qb) / (2.0 * qa);
    if t < u || t.abs() <= ZERO_EPS {
        return;
    }
    // The wavefront must enter C through the interior of the triangle.
    let ft = b * (t - u) / t;
    if cos_theta > ZERO_EPS && ft > a / cos_theta {
        return;
    }
    if ft < a * cos_theta {
        return;
    }
    let cand = geo[va as usize] + t;
    if geo[vc as usize] > cand {
        geo[vc as usize] = cand;
    }
}
