//! Quality engine: the fan update iterated to a fixed point.
//!
//! The single-pass Dijkstra run only applies the triangle update in wavefront
//! order, so corrections cannot flow "backwards" across the front. Sweeping
//! every triangle repeatedly until no distance moves produces the converged
//! field; each sweep only lowers distances, so the result is no worse than
//! the fast engine's and the loop terminates.

use crate::mesh::{BaseMesh, ChartMesh};

use super::approx::{dijkstra_abc, triangle_update, DistanceField};
use super::GeodesicEngine;

#[derive(Clone, Copy, Debug)]
pub struct QualityEngine {
    pub max_sweeps: usize,
    /// Stop when the largest per-sweep improvement falls below this.
    pub tolerance: f64,
}

impl Default for QualityEngine {
    fn default() -> Self {
        Self {
            max_sweeps: 32,
            tolerance: 1e-7,
        }
    }
}

impl QualityEngine {
    pub fn field(&self, mesh: &ChartMesh, base: &BaseMesh, source: u32) -> DistanceField {
        let mut field = dijkstra_abc(mesh, base, source, false);
        let geo = &mut field.geodesic;
        for _ in 0..self.max_sweeps {
            let mut changed = 0.0f64;
            for face in &mesh.faces {
                // Each corner in turn plays C, updated from the other two.
                for k in 0..3 {
                    let vc = face.verts[k];
                    let (mut va, mut vb) = (face.verts[(k + 1) % 3], face.verts[(k + 2) % 3]);
                    if geo[va as usize] > geo[vb as usize] {
                        std::mem::swap(&mut va, &mut vb);
                    }
                    if !geo[vb as usize].is_finite() {
                        continue;
                    }
                    let before = geo[vc as usize];
                    triangle_update(mesh, base, va, vb, vc, geo);
                    let gain = before - geo[vc as usize];
                    if gain.is_finite() && gain > changed {
                        changed = gain;
                    }
                }
            }
            if changed < self.tolerance {
                break;
            }
        }
        // The farthest vertex may have moved during the sweeps.
        let mut farthest = source;
        let mut best = 0.0;
        for (i, &d) in field.geodesic.iter().enumerate() {
            if d.is_finite() && d > best {
                best = d;
                farthest = i as u32;
            }
        }
        field.farthest = farthest;
        field.signal.copy_from_slice(&field.geodesic);
        field
    }
}

impl GeodesicEngine for QualityEngine {
    fn one_to_all(&self, mesh: &ChartMesh, base: &BaseMesh, source: u32) -> Vec<f64> {
        self.field(mesh, base, source).geodesic
    }
}
