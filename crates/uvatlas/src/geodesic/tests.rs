use std::collections::HashSet;

use super::*;
use crate::mesh::{build_connectivity, root_proto, BaseMesh};
use crate::shapes;

fn build(positions: &[[f32; 3]], indices: &[u32]) -> (BaseMesh, ChartMesh) {
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let base = BaseMesh::new(positions, &t, None, HashSet::new(), &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    (base, mesh)
}

#[test]
fn flat_grid_distances_bound_by_euclidean() {
    let (positions, indices) = shapes::grid(4);
    let (base, mesh) = build(&positions, &indices);
    let source = 0u32;
    let fast = dijkstra_abc(&mesh, &base, source, false);
    let quality = QualityEngine::default().field(&mesh, &base, source);
    let p0 = base.position(0);
    for v in 0..mesh.vert_count() as u32 {
        let euclid = (base.position(mesh.verts[v as usize].root_id) - p0).norm();
        // Surface distance on a plane can never undercut the straight line,
        // and the converged field can only improve on the one-pass field.
        assert!(fast.geodesic[v as usize] >= euclid - 1e-6);
        assert!(quality.geodesic[v as usize] >= euclid - 1e-6);
        assert!(quality.geodesic[v as usize] <= fast.geodesic[v as usize] + 1e-9);
    }
    // The triangle update must beat pure edge hopping somewhere off-axis.
    let target = 4 + 2 * 5; // node (4, 2) of the 5x5 grid
    let euclid = (base.position(target as u32) - p0).norm();
    assert!(quality.geodesic[target] < euclid * 1.10);
}

#[test]
fn farthest_vertex_is_opposite_corner() {
    let (positions, indices) = shapes::grid(3);
    let (base, mesh) = build(&positions, &indices);
    let f = dijkstra_abc(&mesh, &base, 0, false);
    assert_eq!(f.farthest, 15); // node (3, 3)
}

#[test]
fn disconnected_component_is_unreachable() {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [5.0, 5.0, 0.0],
        [6.0, 5.0, 0.0],
        [5.0, 6.0, 0.0],
    ];
    let indices = vec![0, 1, 2, 3, 4, 5];
    let (base, mesh) = build(&positions, &indices);
    let f = dijkstra_abc(&mesh, &base, 0, false);
    assert!(f.geodesic[1].is_finite());
    assert!(f.geodesic[3].is_infinite());
    assert!(f.geodesic[4].is_infinite());
}

#[test]
fn combine_signal_blends_with_average_ratio() {
    let geo = vec![1.0, 2.0, 3.0, 2.0];
    // Signal distances twice the geodesic ones: ratio is 1/2, so the blend
    // must reproduce the geodesic field exactly.
    let mut sig = vec![2.0, 4.0, 6.0, 4.0];
    combine_signal(&geo, &mut sig);
    for (s, g) in sig.iter().zip(&geo) {
        assert!((s - g).abs() < 1e-12);
    }
    // Zero signal falls back to the geodesic field.
    let mut zero = vec![0.0; 4];
    combine_signal(&geo, &mut zero);
    assert_eq!(zero, geo);
}

#[test]
fn engine_choice_follows_mode_and_size() {
    assert_eq!(
        choose_engine(GeodesicMode::Default, 100, false),
        EngineChoice::Quality
    );
    assert_eq!(
        choose_engine(GeodesicMode::Default, LIMIT_FACENUM_QUALITY_GEODESIC, false),
        EngineChoice::Fast
    );
    assert_eq!(
        choose_engine(GeodesicMode::Quality, 1_000_000, false),
        EngineChoice::Quality
    );
    assert_eq!(
        choose_engine(GeodesicMode::Fast, 100, false),
        EngineChoice::Fast
    );
    // An IMT pins the fast engine.
    assert_eq!(
        choose_engine(GeodesicMode::Quality, 100, true),
        EngineChoice::Fast
    );
}

#[test]
fn landmark_matrix_is_symmetric_at_landmarks() {
    let (positions, indices) = shapes::icosphere(1);
    let (base, mesh) = build(&positions, &indices);
    let landmarks = [0u32, 7, 19, 33];
    let d = landmark_distances(&mesh, &base, &landmarks, EngineChoice::Fast);
    for i in 0..landmarks.len() {
        assert!(d.geo(i, landmarks[i]) <= 1e-9);
        for j in 0..landmarks.len() {
            let ij = d.geo(i, landmarks[j]);
            let ji = d.geo(j, landmarks[i]);
            assert!((ij - ji).abs() < 1e-12);
        }
    }
}
