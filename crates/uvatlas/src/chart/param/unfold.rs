//! Direct unfolds for flat and almost-flat charts.
//!
//! A chart whose face normals agree projects straight onto its own plane.
//! An almost-flat chart (spectral energy concentrated in two dimensions)
//! is laid out face by face instead: starting from a reference triangle,
//! each new vertex is placed by the cosine law relative to its two already
//! placed neighbors, walking the face graph breadth-first. The chain layout
//! is only accepted when no two boundary-independent edges intersect.

use std::collections::VecDeque;

use nalgebra::{Vector2, Vector3};

use crate::mesh::{BaseMesh, ChartMesh, INVALID_ID};

use super::super::types::Chart;

const PLANE_NORMAL_EPS: f64 = 1e-6;

/// Reference face: first face with non-degenerate area.
fn standard_face(mesh: &ChartMesh, base: &BaseMesh) -> Option<u32> {
    mesh.faces
        .iter()
        .find(|f| base.face_areas[f.root_id as usize] > PLANE_NORMAL_EPS)
        .map(|f| f.id)
}

/// Project every vertex onto the plane of the reference face. Returns false
/// when the chart is not flat (the caller handles fully degenerate charts).
pub fn plane_unfold(chart: &mut Chart, base: &BaseMesh) -> bool {
    let mesh = &chart.mesh;
    let Some(std_face) = standard_face(mesh, base) else {
        return false;
    };
    let std_normal = base.face_normals[mesh.faces[std_face as usize].root_id as usize];
    for face in &mesh.faces {
        let n = base.face_normals[face.root_id as usize];
        if n.norm() <= PLANE_NORMAL_EPS {
            continue;
        }
        if (n - std_normal).norm_squared() > PLANE_NORMAL_EPS {
            return false;
        }
    }

    let (origin, axis_u, axis_v) = face_frame(mesh, base, std_face);
    for v in &mut chart.mesh.verts {
        let d = base.position(v.root_id) - origin;
        v.uv = Vector2::new(d.dot(&axis_u), d.dot(&axis_v));
    }
    true
}

/// In-plane frame of a face, anchored at the corner whose edges are most
/// orthogonal.
fn face_frame(
    mesh: &ChartMesh,
    base: &BaseMesh,
    face_id: u32,
) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let face = &mesh.faces[face_id as usize];
    let p = |k: usize| base.position(mesh.verts[face.verts[k] as usize].root_id);
    let mut best = 0usize;
    let mut best_dot = f64::INFINITY;
    for k in 0..3 {
        let e1 = (p((k + 1) % 3) - p(k)).normalize();
        let e2 = (p((k + 2) % 3) - p(k)).normalize();
        let d = e1.dot(&e2).abs();
        if d < best_dot {
            best_dot = d;
            best = k;
        }
    }
    let origin = p(best);
    let e1 = p((best + 1) % 3) - origin;
    let e2 = p((best + 2) % 3) - origin;
    let normal = e1.cross(&e2);
    let axis_u = e1.normalize();
    let axis_v = normal.cross(&e1).normalize();
    (origin, axis_u, axis_v)
}

/// Lay faces onto the plane one at a time, growing from the reference face.
/// Returns false when the layout degenerates or self-intersects.
pub fn chain_unfold(chart: &mut Chart, base: &BaseMesh) -> bool {
    let Some(std_face) = standard_face(&chart.mesh, base) else {
        return false;
    };
    let n = chart.mesh.vert_count();
    let mut placed = vec![false; n];
    let mut uv = vec![Vector2::<f64>::zeros(); n];

    // Seed triangle in its own frame.
    {
        let (origin, axis_u, axis_v) = face_frame(&chart.mesh, base, std_face);
        for &v in &chart.mesh.faces[std_face as usize].verts {
            let d = base.position(chart.mesh.verts[v as usize].root_id) - origin;
            uv[v as usize] = Vector2::new(d.dot(&axis_u), d.dot(&axis_v));
            placed[v as usize] = true;
        }
    }
    let seed = chart.mesh.faces[std_face as usize].verts;
    let seed_positive = triangle_sign(uv[seed[0] as usize], uv[seed[1] as usize], uv[seed[2] as usize]);

    let mut added = vec![false; chart.mesh.face_count()];
    added[std_face as usize] = true;
    let mut queue = VecDeque::from([std_face]);
    while let Some(f) = queue.pop_front() {
        let face = chart.mesh.faces[f as usize].clone();
        // Place the one unplaced corner, if any.
        for k in 0..3 {
            let vid = face.verts[k];
            if placed[vid as usize] {
                continue;
            }
            let v0 = face.verts[(k + 1) % 3];
            let v1 = face.verts[(k + 2) % 3];
            if !placed[v0 as usize] || !placed[v1 as usize] {
                // Reached through a vertex only; wait for an edge.
                continue;
            }
            let q0 = base.position(chart.mesh.verts[v0 as usize].root_id);
            let q1 = base.position(chart.mesh.verts[v1 as usize].root_id);
            let q2 = base.position(chart.mesh.verts[vid as usize].root_id);
            let len1 = (q1 - q0).norm();
            let len2 = (q2 - q0).norm();
            if len1 <= PLANE_NORMAL_EPS {
                return false;
            }
            if len2 <= PLANE_NORMAL_EPS {
                uv[vid as usize] = uv[v0 as usize];
                placed[vid as usize] = true;
                break;
            }
            let cos_b = ((q1 - q0).dot(&(q2 - q0)) / (len1 * len2)).clamp(-1.0, 1.0);
            let mut sin_b = (1.0 - cos_b * cos_b).max(0.0).sqrt();
            let dir = uv[v1 as usize] - uv[v0 as usize];
            let dir = if dir.norm() > 0.0 {
                dir.normalize()
            } else {
                Vector2::new(1.0, 0.0)
            };
            let rotate = |s: f64| {
                Vector2::new(dir.x * cos_b - dir.y * s, dir.y * cos_b + dir.x * s)
            };
            // Keep the winding of the seed triangle.
            let candidate = uv[v0 as usize] + rotate(sin_b) * len2;
            if triangle_sign(uv[v0 as usize], uv[v1 as usize], candidate) != seed_positive {
                sin_b = -sin_b;
            }
            uv[vid as usize] = uv[v0 as usize] + rotate(sin_b) * len2;
            if !uv[vid as usize].x.is_finite() || !uv[vid as usize].y.is_finite() {
                return false;
            }
            placed[vid as usize] = true;
            break;
        }
        for &e in &face.edges {
            let edge = &chart.mesh.edges[e as usize];
            let adj = edge.other_face(f);
            if adj != INVALID_ID && !added[adj as usize] {
                added[adj as usize] = true;
                queue.push_back(adj);
            }
        }
    }
    if placed.iter().any(|&p| !p) {
        return false;
    }
    for v in &mut chart.mesh.verts {
        v.uv = uv[v.id as usize];
    }
    !is_self_overlapping(chart, base)
}

#[inline]
fn triangle_sign(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> bool {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) >= 0.0
}

/// Edge-against-edge sweep: any crossing between two vertex-disjoint edges
/// whose incident faces are non-degenerate rejects the layout.
fn is_self_overlapping(chart: &Chart, base: &BaseMesh) -> bool {
    let mesh = &chart.mesh;
    let degenerate = |f: u32| {
        f != INVALID_ID
            && base.face_areas[mesh.faces[f as usize].root_id as usize] <= PLANE_NORMAL_EPS
    };
    for i in 0..mesh.edge_count() {
        let e1 = &mesh.edges[i];
        if e1.faces.iter().any(|&f| degenerate(f)) {
            continue;
        }
        let (a1, b1) = (
            mesh.verts[e1.verts[0] as usize].uv,
            mesh.verts[e1.verts[1] as usize].uv,
        );
        for e2 in &mesh.edges[i + 1..] {
            if e2.has_vert(e1.verts[0]) || e2.has_vert(e1.verts[1]) {
                continue;
            }
            if e2.faces.iter().any(|&f| degenerate(f)) {
                continue;
            }
            let (a2, b2) = (
                mesh.verts[e2.verts[0] as usize].uv,
                mesh.verts[e2.verts[1] as usize].uv,
            );
            if segments_intersect(a1, b1, a2, b2) {
                return true;
            }
        }
    }
    false
}

fn segments_intersect(
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
    d: Vector2<f64>,
) -> bool {
    let orient = |p: Vector2<f64>, q: Vector2<f64>, r: Vector2<f64>| {
        (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)
    };
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}
