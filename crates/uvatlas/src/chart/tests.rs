use std::collections::HashSet;

use nalgebra::Vector2;

use super::*;
use crate::geodesic::EngineChoice;
use crate::mesh::{build_connectivity, root_proto, BaseMesh};
use crate::shapes;

fn build_chart(positions: &[[f32; 3]], indices: &[u32]) -> (BaseMesh, Chart) {
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let base = BaseMesh::new(positions, &t, None, HashSet::new(), &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    let chart = Chart::new(mesh, &base);
    (base, chart)
}

/// Identity parameterization of a flat chart (xy coordinates).
fn flatten_by_position(chart: &mut Chart, base: &BaseMesh) {
    for v in &mut chart.mesh.verts {
        let p = base.position(v.root_id);
        v.uv = Vector2::new(p.x, p.y);
    }
    chart.update_area_2d();
}

#[test]
fn isometric_parameterization_reaches_the_stretch_lower_bound() {
    let (positions, indices) = shapes::grid(3);
    let (base, mut chart) = build_chart(&positions, &indices);
    flatten_by_position(&mut chart, &base);
    let l2 = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    // For an isometry the integral L² stretch equals the 3D area.
    assert!((l2 - chart.area_3d).abs() / chart.area_3d < 1e-9);
    let ln = chart_ln_squared_stretch(&chart.mesh, &base);
    assert!((ln - 1.0).abs() < 1e-9);
}

#[test]
fn folded_triangle_has_infinite_stretch() {
    let (positions, indices) = shapes::grid(1);
    let (base, mut chart) = build_chart(&positions, &indices);
    flatten_by_position(&mut chart, &base);
    // Fold one corner across the diagonal.
    let fold = chart.mesh.verts[0].uv + Vector2::new(1000.0, 1000.0);
    chart.mesh.verts[0].uv = fold;
    assert_eq!(
        chart_l2_geo_squared_stretch(&chart.mesh, &base),
        INFINITE_STRETCH
    );
}

#[test]
fn uniform_scaling_is_penalized_by_l2() {
    let (positions, indices) = shapes::grid(2);
    let (base, mut chart) = build_chart(&positions, &indices);
    flatten_by_position(&mut chart, &base);
    let neutral = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    for v in &mut chart.mesh.verts {
        v.uv *= 0.5;
    }
    let shrunk = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    // Shrinking the domain doubles the derivatives: 4x the stretch.
    assert!((shrunk / neutral - 4.0).abs() < 1e-9);
}

#[test]
fn degenerate_face_adds_no_stretch_and_still_parameterizes() {
    // Face 1 is a zero-area sliver: its third corner sits on the shared edge.
    let positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.5, 0.0, 0.0],
    ];
    let indices = vec![0, 1, 2, 1, 0, 3];
    let (base, mut chart) = build_chart(&positions, &indices);
    assert_eq!(base.face_areas[1], 0.0);
    flatten_by_position(&mut chart, &base);
    let l2 = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    // Only the non-degenerate face contributes, and it is isometric.
    assert!((l2 - chart.area_3d).abs() / chart.area_3d < 1e-9);

    let outcome = parameterize_chart(&mut chart, &base, &OptimizeCfg::default()).unwrap();
    assert_eq!(outcome, ParamOutcome::Parameterized);
    for v in &chart.mesh.verts {
        assert!(v.uv.x.is_finite() && v.uv.y.is_finite());
    }
}

#[test]
fn maxflow_cuts_the_bottleneck() {
    // source-heavy chain: s → a → b → t with capacities 3, 1, 3.
    let mut net = FlowNetwork::new(2);
    net.set_terminal(0, 3.0, 0.0);
    net.set_terminal(1, 0.0, 3.0);
    net.add_edge(0, 1, 1.0, 1.0);
    let flow = net.max_flow();
    assert!((flow - 1.0).abs() < 1e-12);
    assert!(net.in_source_side(0));
    assert!(!net.in_source_side(1));
}

#[test]
fn maxflow_grid_cut_separates_terminals() {
    // 2x3 face grid: left column wired to source, right to sink, unit
    // capacities inside except a cheap middle column.
    let mut net = FlowNetwork::new(6);
    let idx = |r: usize, c: usize| r * 3 + c;
    for r in 0..2 {
        net.set_terminal(idx(r, 0), f64::INFINITY, 0.0);
        net.set_terminal(idx(r, 2), 0.0, f64::INFINITY);
        net.add_edge(idx(r, 0), idx(r, 1), 10.0, 10.0);
        net.add_edge(idx(r, 1), idx(r, 2), 0.5, 0.5);
    }
    net.add_edge(idx(0, 1), idx(1, 1), 10.0, 10.0);
    let flow = net.max_flow();
    assert!((flow - 1.0).abs() < 1e-9);
    for r in 0..2 {
        assert!(net.in_source_side(idx(r, 0)));
        assert!(net.in_source_side(idx(r, 1)));
        assert!(!net.in_source_side(idx(r, 2)));
    }
}

#[test]
fn optimizer_improves_a_distorted_interior_vertex() {
    let (positions, indices) = shapes::grid(2);
    let (base, mut chart) = build_chart(&positions, &indices);
    flatten_by_position(&mut chart, &base);
    // Drag the center vertex off its isometric position (still unfolded).
    let center = 4usize;
    assert!(!chart.mesh.verts[center].is_boundary);
    chart.mesh.verts[center].uv += Vector2::new(80.0, 50.0);
    let before = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    optimize_chart_stretch(&mut chart, &base, &OptimizeCfg::default(), false, f64::INFINITY);
    let after = chart_l2_geo_squared_stretch(&chart.mesh, &base);
    assert!(after < before, "stretch went {before} → {after}");
    // Near-isometric again.
    assert!(after < chart.area_3d * 1.1);
}

#[test]
fn parameterize_chart_unfolds_a_flat_grid() {
    let (positions, indices) = shapes::grid(3);
    let (base, mut chart) = build_chart(&positions, &indices);
    let outcome = parameterize_chart(&mut chart, &base, &OptimizeCfg::default()).unwrap();
    assert_eq!(outcome, ParamOutcome::Parameterized);
    assert!(chart.is_parameterized);
    // All faces positively oriented, and the 2D area matches the 3D area.
    let mut total = 0.0;
    for face in &chart.mesh.faces {
        let a = signed_area_2d(
            chart.mesh.verts[face.verts[0] as usize].uv,
            chart.mesh.verts[face.verts[1] as usize].uv,
            chart.mesh.verts[face.verts[2] as usize].uv,
        );
        assert!(a > 0.0);
        total += a;
    }
    assert!((total - chart.area_3d).abs() / chart.area_3d < 1e-6);
}

#[test]
fn parameterize_chart_handles_a_bumpy_disk() {
    let (mut positions, indices) = shapes::grid(3);
    for (i, p) in positions.iter_mut().enumerate() {
        p[2] = 0.15 * ((i * 31) % 7) as f32 / 7.0;
    }
    let (base, mut chart) = build_chart(&positions, &indices);
    chart.is_sub_chart = false;
    crate::chart::prepare_isomap(
        &mut chart,
        &base,
        &PartitionCfg::default(),
        EngineChoice::Quality,
    )
    .unwrap();
    let outcome = parameterize_chart(&mut chart, &base, &OptimizeCfg::default()).unwrap();
    assert_eq!(outcome, ParamOutcome::Parameterized);
    for face in &chart.mesh.faces {
        let a = signed_area_2d(
            chart.mesh.verts[face.verts[0] as usize].uv,
            chart.mesh.verts[face.verts[1] as usize].uv,
            chart.mesh.verts[face.verts[2] as usize].uv,
        );
        assert!(a >= 0.0);
    }
}

#[test]
fn partition_splits_a_cylinder_in_two() {
    let (positions, indices) = shapes::cylinder_shell(16, 4);
    let (base, mut chart) = build_chart(&positions, &indices);
    let outcome = partition_chart(
        &mut chart,
        &base,
        &PartitionCfg::default(),
        &GraphCutCfg::default(),
        EngineChoice::Quality,
    )
    .unwrap();
    let PartitionOutcome::Split(children) = outcome else {
        panic!("cylinder must split, got {outcome:?}");
    };
    assert!(children.len() >= 2);
    let total: usize = children.iter().map(|c| c.len()).sum();
    assert_eq!(total, chart.face_count());
    for child in &children {
        assert!(!child.is_empty());
    }
}

#[test]
fn partition_respects_false_edges() {
    // Every interior edge pinned: the chart must report Blocked.
    let (positions, indices) = shapes::grid(2);
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let mut forbidden = HashSet::new();
    for c in &t {
        for k in 0..3 {
            let (a, b) = (c[k], c[(k + 1) % 3]);
            forbidden.insert((a.min(b), a.max(b)));
        }
    }
    let base = BaseMesh::new(&positions, &t, None, forbidden, &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    let mut chart = Chart::new(mesh, &base);
    let outcome = partition_chart(
        &mut chart,
        &base,
        &PartitionCfg::default(),
        &GraphCutCfg::default(),
        EngineChoice::Fast,
    )
    .unwrap();
    assert_eq!(outcome, PartitionOutcome::Blocked);
}

#[test]
fn single_face_chart_is_not_splittable() {
    let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices = vec![0, 1, 2];
    let (base, mut chart) = build_chart(&positions, &indices);
    let outcome = partition_chart(
        &mut chart,
        &base,
        &PartitionCfg::default(),
        &GraphCutCfg::default(),
        EngineChoice::Fast,
    )
    .unwrap();
    assert_eq!(outcome, PartitionOutcome::NotSplittable);
}

#[test]
fn merge_rejoins_two_halves_of_a_flat_grid() {
    let (positions, indices) = shapes::grid(2);
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let base = BaseMesh::new(&positions, &t, None, HashSet::new(), &[]);
    let root = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    let adjacency: Vec<[u32; 3]> = root
        .faces
        .iter()
        .map(|face| {
            let mut adj = [crate::mesh::INVALID_ID; 3];
            for (k, &e) in face.edges.iter().enumerate() {
                adj[k] = root.edges[e as usize].other_face(face.id);
            }
            adj
        })
        .collect();

    // Four charts: the four quads of the grid (two faces each).
    let mut charts = Vec::new();
    for pair in [[0u32, 1], [2, 3], [4, 5], [6, 7]] {
        let mesh = build_connectivity(crate::mesh::sub_proto(&root, &pair), &base).unwrap();
        let mut chart = Chart::new(mesh, &base);
        parameterize_chart(&mut chart, &base, &OptimizeCfg::default()).unwrap();
        charts.push(chart);
    }
    merge_small_charts(
        &mut charts,
        &base,
        &adjacency,
        expected(0.5),
        0,
        true,
        &MergeCfg {
            min_charts: 2,
            ..MergeCfg::default()
        },
        &PartitionCfg::default(),
        &OptimizeCfg::default(),
        EngineChoice::Fast,
    )
    .unwrap();
    // Flat neighbors merge without resistance.
    assert!(charts.len() < 4, "expected merges, still {}", charts.len());
    let faces: usize = charts.iter().map(|c| c.face_count()).sum();
    assert_eq!(faces, 8);
}

fn expected(max_stretch: f64) -> f64 {
    1.0 / ((1.0 - max_stretch) * (1.0 - max_stretch))
}
