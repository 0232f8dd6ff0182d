use std::collections::HashSet;

use super::*;
use crate::geodesic::{landmark_distances, EngineChoice};
use crate::mesh::{build_connectivity, root_proto, BaseMesh, ChartMesh, MUST_RESERVE};
use crate::shapes;

fn build(positions: &[[f32; 3]], indices: &[u32]) -> (BaseMesh, ChartMesh) {
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let base = BaseMesh::new(positions, &t, None, HashSet::new(), &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    (base, mesh)
}

#[test]
fn mds_recovers_a_line() {
    // Four points on a line, pairwise distances |i-j|.
    let n = 4;
    let mut d = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            d[i * n + j] = (i as f64 - j as f64).abs();
        }
    }
    let iso = Isomap::new(n, &d, 4).unwrap();
    // A line has one meaningful dimension.
    assert_eq!(iso.primary_dimension(0.99), 1);
    assert!(iso.eigen_value(0) > 1.0);
    assert!(iso.eigen_value(1) < 1e-3);
    // Recovered 1D coordinates preserve pairwise gaps.
    let x: Vec<f64> = (0..n).map(|j| iso.landmark_coord(j, 0)).collect();
    for i in 0..n {
        for j in 0..n {
            assert!(((x[i] - x[j]).abs() - d[i * n + j]).abs() < 1e-9);
        }
    }
}

#[test]
fn nystrom_matches_spectral_coords() {
    // Unit square in the plane: embed the fourth point out-of-sample and
    // compare with its in-sample coordinate.
    let pts = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    let n = pts.len();
    let dist = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let mut d = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            d[i * n + j] = dist(pts[i], pts[j]);
        }
    }
    let iso = Isomap::new(n, &d, 4).unwrap();
    assert!(iso.dimension >= 2);
    let to_landmarks: Vec<f64> = (0..n).map(|j| dist(pts[3], pts[j])).collect();
    for k in 0..2 {
        let nystrom = iso.embed_coord(&to_landmarks, k);
        let spectral = iso.landmark_coord(3, k);
        assert!((nystrom - spectral).abs() < 1e-9, "dimension {k}");
    }
}

#[test]
fn landmark_selection_prefers_reserved_and_important() {
    let (positions, indices) = shapes::grid(3);
    let (base, mut mesh) = build(&positions, &indices);
    let _ = base;
    mesh.verts[5].importance = MUST_RESERVE;
    let picked = select_landmarks(&mesh, MIN_LANDMARK_NUMBER);
    assert!(picked.len() >= MIN_LANDMARK_NUMBER);
    assert_eq!(picked[0], 5);
    // Importance never increases after the reserved prefix.
    let imps: Vec<i32> = picked[1..]
        .iter()
        .map(|&v| mesh.verts[v as usize].importance)
        .collect();
    for w in imps.windows(2) {
        assert!(w[0] >= w[1]);
    }
}

#[test]
fn small_chart_takes_all_vertices() {
    let (positions, indices) = shapes::tetrahedron();
    let (_, mesh) = build(&positions, &indices);
    let picked = select_landmarks(&mesh, MIN_LANDMARK_NUMBER);
    assert_eq!(picked.len(), 4);
}

#[test]
fn farthest_pair_moves_to_head() {
    let (positions, indices) = shapes::cylinder_shell(8, 4);
    let (base, mesh) = build(&positions, &indices);
    let mut landmarks = select_landmarks(&mesh, MIN_LANDMARK_NUMBER);
    let mut d = landmark_distances(&mesh, &base, &landmarks, EngineChoice::Fast);
    reserve_farthest_pair(&mut landmarks, &mut d);
    // The head pair realizes the maximum landmark-to-landmark distance, and
    // the swapped rows stay aligned with the reordered list.
    let fresh = landmark_distances(&mesh, &base, &landmarks, EngineChoice::Fast);
    let head = d.geo(0, landmarks[1]);
    for i in 0..landmarks.len() {
        for j in 0..landmarks.len() {
            assert!(d.geo(i, landmarks[j]) <= head + 1e-9);
            assert!((d.geo(i, landmarks[j]) - fresh.geo(i, landmarks[j])).abs() < 1e-9);
        }
    }
}

#[test]
fn grid_embedding_is_two_dimensional_and_positive() {
    let (positions, indices) = shapes::grid(4);
    let (base, mesh) = build(&positions, &indices);
    let landmarks = select_landmarks(&mesh, MIN_LANDMARK_NUMBER);
    let d = landmark_distances(&mesh, &base, &landmarks, EngineChoice::Quality);
    let block = landmark_block(&landmarks, &d);
    let iso = Isomap::new(landmarks.len(), &block, ROOT_CHART_EIGEN_DIMENSION).unwrap();
    // A flat sheet concentrates its energy in two dimensions.
    assert!(iso.primary_dimension(0.90) <= 2);
    let coords = embed_vertices(&mesh, &iso, &landmarks, &d, 2);
    // Canonical handedness: majority of faces wind positively.
    let mut positive = 0;
    for face in &mesh.faces {
        let p = |v: u32| (coords[v as usize * 2], coords[v as usize * 2 + 1]);
        let (x0, y0) = p(face.verts[0]);
        let (x1, y1) = p(face.verts[1]);
        let (x2, y2) = p(face.verts[2]);
        if (x1 - x0) * (y2 - y0) - (y1 - y0) * (x2 - x0) >= 0.0 {
            positive += 1;
        }
    }
    assert!(positive * 2 >= mesh.face_count());
}

fn landmark_block(landmarks: &[u32], d: &crate::geodesic::LandmarkDistances) -> Vec<f64> {
    let n = landmarks.len();
    let mut block = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            block[i * n + j] = d.dist(i, landmarks[j]);
        }
    }
    block
}
