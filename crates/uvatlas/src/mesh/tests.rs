use std::collections::HashSet;

use super::build::{root_proto, sub_proto};
use super::*;
use crate::shapes;

fn tris(indices: &[u32]) -> Vec<[u32; 3]> {
    indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn build(positions: &[[f32; 3]], indices: &[u32]) -> (BaseMesh, ChartMesh) {
    let t = tris(indices);
    let base = BaseMesh::new(positions, &t, None, HashSet::new(), &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    (base, mesh)
}

fn check_integrity(mesh: &ChartMesh) {
    for face in &mesh.faces {
        for k in 0..3 {
            let v = face.verts[k];
            assert!(
                mesh.verts[v as usize].face_adj.contains(&face.id),
                "vertex {} misses face {}",
                v,
                face.id
            );
            let e = &mesh.edges[face.edges[k] as usize];
            let (a, b) = (face.verts[k], face.verts[(k + 1) % 3]);
            assert!(e.has_vert(a) && e.has_vert(b));
            assert!(e.faces.contains(&face.id));
        }
    }
    for vert in &mesh.verts {
        if vert.face_adj.is_empty() {
            continue;
        }
        let expect = if vert.is_boundary {
            vert.face_adj.len() + 1
        } else {
            vert.face_adj.len()
        };
        assert_eq!(vert.vert_adj.len(), expect, "fan size at vertex {}", vert.id);
        assert_eq!(vert.edge_adj.len(), expect);
    }
}

#[test]
fn grid_connectivity_counts() {
    let (positions, indices) = shapes::grid(2);
    let (_, mesh) = build(&positions, &indices);
    assert_eq!(mesh.vert_count(), 9);
    assert_eq!(mesh.face_count(), 8);
    assert_eq!(mesh.edge_count(), 16);
    assert_eq!(mesh.boundary_verts().len(), 8);
    assert!(!mesh.verts[4].is_boundary);
    check_integrity(&mesh);
}

#[test]
fn cube_is_closed() {
    let (positions, indices) = shapes::cube();
    let (_, mesh) = build(&positions, &indices);
    assert_eq!(mesh.vert_count(), 8);
    assert_eq!(mesh.face_count(), 12);
    assert_eq!(mesh.edge_count(), 18);
    assert!(mesh.boundary_verts().is_empty());
    assert!(mesh.edges.iter().all(|e| !e.is_boundary));
    check_integrity(&mesh);
}

#[test]
fn base_mesh_canonical_scale() {
    let (positions, indices) = shapes::cube();
    let t = tris(&indices);
    let base = BaseMesh::new(&positions, &t, None, HashSet::new(), &[]);
    // Unit cube scaled so its largest extent is the canonical size.
    assert!((base.box_diag - 500.0 * 3.0f64.sqrt()).abs() < 1e-6);
    assert!((base.mesh_area - 6.0 * 500.0 * 500.0).abs() < 1e-3);
}

#[test]
fn bowtie_is_split() {
    // Two triangles touching only at vertex 2.
    let positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.5, 0.5, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    let indices = vec![0, 1, 2, 2, 4, 3];
    let (_, mesh) = build(&positions, &indices);
    assert_eq!(mesh.vert_count(), 6);
    // Both copies trace back to the same root vertex.
    let copies: Vec<_> = mesh.verts.iter().filter(|v| v.root_id == 2).collect();
    assert_eq!(copies.len(), 2);
    check_integrity(&mesh);
}

#[test]
fn inconsistent_orientation_fails() {
    let positions = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    // Second triangle winds the shared edge the same way as the first.
    let t = vec![[0, 1, 2], [0, 1, 3]];
    let base = BaseMesh::new(&positions, &t, None, HashSet::new(), &[]);
    let err = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap_err();
    assert!(matches!(err, crate::atlas::AtlasError::InvalidTopology { .. }));
}

#[test]
fn boundary_loop_of_grid_is_single_cycle() {
    let (positions, indices) = shapes::grid(3);
    let (_, mesh) = build(&positions, &indices);
    let loops = boundary_loops(&mesh);
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].len(), 12);
    // Consecutive loop vertices share a boundary edge.
    for w in loops[0].windows(2) {
        let e = mesh.edge_between(w[0], w[1]).unwrap();
        assert!(mesh.edges[e as usize].is_boundary);
    }
}

#[test]
fn cylinder_has_two_loops_and_cut_reduces_to_one() {
    let (positions, indices) = shapes::cylinder_shell(12, 3);
    let (base, mesh) = build(&positions, &indices);
    let loops = boundary_loops(&mesh);
    assert_eq!(loops.len(), 2);
    assert_eq!(loops[0].len(), 12);

    let before = mesh.vert_count();
    let cut = cut_to_single_boundary(mesh, &base).unwrap();
    let loops = boundary_loops(&cut);
    assert_eq!(loops.len(), 1);
    // The cut duplicated every vertex along the connecting path.
    assert!(cut.vert_count() > before);
    check_integrity(&cut);
}

#[test]
fn cut_blocked_by_nonsplittable_edges_fails() {
    let (positions, indices) = shapes::cylinder_shell(8, 2);
    let t = tris(&indices);
    // Forbid every interior (non-ring) edge: no axial path can be cut.
    let mut forbidden = HashSet::new();
    for c in &t {
        for k in 0..3 {
            let (a, b) = (c[k], c[(k + 1) % 3]);
            let key = if a < b { (a, b) } else { (b, a) };
            forbidden.insert(key);
        }
    }
    let base = BaseMesh::new(&positions, &t, None, forbidden, &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    let err = cut_to_single_boundary(mesh, &base).unwrap_err();
    assert_eq!(err, crate::atlas::AtlasError::NonSplittableBlocked);
}

#[test]
fn sub_proto_compacts_vertices() {
    let (positions, indices) = shapes::grid(2);
    let (base, mesh) = build(&positions, &indices);
    // First two faces form the lower-left quad.
    let sub = sub_proto(&mesh, &[0, 1]);
    let child = build_connectivity(sub, &base).unwrap();
    assert_eq!(child.face_count(), 2);
    assert_eq!(child.vert_count(), 4);
    for v in &child.verts {
        // Father links point back into the parent chart.
        assert!((v.father_id as usize) < mesh.vert_count());
        assert_eq!(mesh.verts[v.father_id as usize].root_id, v.root_id);
    }
    check_integrity(&child);
}
