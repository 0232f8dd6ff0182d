use super::*;
use crate::shapes;

fn run(
    positions: &[[f32; 3]],
    indices: &[u32],
    options: &AtlasOptions,
) -> Result<Atlas, AtlasError> {
    let desc = MeshDesc {
        positions,
        indices,
        ..MeshDesc::default()
    };
    create_atlas(&desc, options, None)
}

fn signed_area(atlas: &Atlas, f: usize) -> f64 {
    let p = |k: usize| {
        let i = atlas.indices[f * 3 + k] as usize;
        (f64::from(atlas.uvs[i][0]), f64::from(atlas.uvs[i][1]))
    };
    let (x0, y0) = p(0);
    let (x1, y1) = p(1);
    let (x2, y2) = p(2);
    0.5 * ((x1 - x0) * (y2 - y0) - (y1 - y0) * (x2 - x0))
}

fn check_core_invariants(atlas: &Atlas, positions: &[[f32; 3]], indices: &[u32]) {
    assert_eq!(atlas.indices.len(), indices.len());
    assert_eq!(atlas.face_partition.len(), indices.len() / 3);
    assert_eq!(atlas.positions.len(), atlas.uvs.len());
    assert_eq!(atlas.positions.len(), atlas.vertex_remap.len());
    // uv ∈ [0,1]².
    for uv in &atlas.uvs {
        assert!((0.0..=1.0).contains(&uv[0]), "u out of range: {}", uv[0]);
        assert!((0.0..=1.0).contains(&uv[1]), "v out of range: {}", uv[1]);
    }
    // Remap is a left-inverse of the duplication.
    for (i, &src) in atlas.vertex_remap.iter().enumerate() {
        assert_eq!(atlas.positions[i], positions[src as usize]);
    }
    // Triangles keep a non-negative orientation in the atlas.
    for f in 0..indices.len() / 3 {
        assert!(
            signed_area(atlas, f) >= -1e-12,
            "face {f} folded in the atlas"
        );
    }
    assert!(atlas.chart_count >= 1);
    let max_part = atlas.face_partition.iter().max().copied().unwrap_or(0);
    assert!((max_part as usize) < atlas.chart_count);
}

#[test]
fn cube_produces_per_face_charts() {
    let (positions, indices) = shapes::cube();
    let options = AtlasOptions {
        max_stretch: 0.5,
        width: 256,
        height: 256,
        gutter: 2.0,
        ..AtlasOptions::default()
    };
    let atlas = run(&positions, &indices, &options).unwrap();
    check_core_invariants(&atlas, &positions, &indices);
    // A cube cannot be flattened in one piece.
    assert!(atlas.chart_count >= 2);
    assert!(atlas.chart_count <= 12);
    // Both triangles of one cube face always land in one chart.
    assert!(atlas.stretch <= 0.5 + 1e-3);
}

#[test]
fn tetrahedron_yields_few_charts() {
    let (positions, indices) = shapes::tetrahedron();
    let atlas = run(&positions, &indices, &AtlasOptions::default()).unwrap();
    check_core_invariants(&atlas, &positions, &indices);
    assert!(atlas.chart_count <= 4);
}

#[test]
fn cylinder_shell_splits_along_the_axis() {
    let (positions, indices) = shapes::cylinder_shell(32, 2);
    let options = AtlasOptions {
        max_stretch: 0.5,
        ..AtlasOptions::default()
    };
    let atlas = run(&positions, &indices, &options).unwrap();
    check_core_invariants(&atlas, &positions, &indices);
    assert!(atlas.chart_count >= 1);
    assert!(atlas.chart_count <= 8);
}

#[test]
fn icosphere_charts_are_disks_with_disjoint_uv() {
    let (positions, indices) = shapes::icosphere(1);
    let options = AtlasOptions {
        max_stretch: 0.5,
        width: 512,
        height: 512,
        gutter: 2.0,
        ..AtlasOptions::default()
    };
    let atlas = run(&positions, &indices, &options).unwrap();
    check_core_invariants(&atlas, &positions, &indices);
    assert!(atlas.chart_count >= 2);

    // Inter-chart overlap check on a raster: no cell interior to triangles
    // of two different charts.
    let res = 256usize;
    let mut owner = vec![u32::MAX; res * res];
    for f in 0..indices.len() / 3 {
        let chart = atlas.face_partition[f];
        let p: Vec<(f64, f64)> = (0..3)
            .map(|k| {
                let i = atlas.indices[f * 3 + k] as usize;
                (
                    f64::from(atlas.uvs[i][0]) * res as f64,
                    f64::from(atlas.uvs[i][1]) * res as f64,
                )
            })
            .collect();
        let minx = p.iter().map(|q| q.0).fold(f64::INFINITY, f64::min) as usize;
        let maxx = (p.iter().map(|q| q.0).fold(0.0, f64::max) as usize).min(res - 1);
        let miny = p.iter().map(|q| q.1).fold(f64::INFINITY, f64::min) as usize;
        let maxy = (p.iter().map(|q| q.1).fold(0.0, f64::max) as usize).min(res - 1);
        for y in miny..=maxy {
            for x in minx..=maxx {
                let (cx, cy) = (x as f64 + 0.5, y as f64 + 0.5);
                let d = |a: (f64, f64), b: (f64, f64)| {
                    (b.0 - a.0) * (cy - a.1) - (b.1 - a.1) * (cx - a.0)
                };
                let (d0, d1, d2) = (d(p[0], p[1]), d(p[1], p[2]), d(p[2], p[0]));
                let inside = (d0 > 0.0 && d1 > 0.0 && d2 > 0.0)
                    || (d0 < 0.0 && d1 < 0.0 && d2 < 0.0);
                if !inside {
                    continue;
                }
                let cell = &mut owner[y * res + x];
                if *cell == u32::MAX {
                    *cell = chart;
                } else {
                    assert_eq!(*cell, chart, "charts overlap at cell ({x},{y})");
                }
            }
        }
    }
}

#[test]
fn single_triangle_fills_the_atlas() {
    let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices = vec![0, 1, 2];
    let atlas = run(&positions, &indices, &AtlasOptions::default()).unwrap();
    check_core_invariants(&atlas, &positions, &indices);
    assert_eq!(atlas.chart_count, 1);
    let spread = atlas
        .uvs
        .iter()
        .map(|uv| f64::from(uv[0].max(uv[1])))
        .fold(0.0, f64::max);
    assert!(spread > 0.5, "triangle should span the atlas, got {spread}");
}

#[test]
fn fully_blocked_mesh_reports_nonsplittable() {
    let (positions, indices) = shapes::cylinder_shell(8, 2);
    // Forbid cutting any interior edge: the shell can neither be split nor
    // opened into a disk.
    let false_edges = vec![true; indices.len()];
    let desc = MeshDesc {
        positions: &positions,
        indices: &indices,
        false_edges: Some(&false_edges),
        ..MeshDesc::default()
    };
    let options = AtlasOptions {
        max_chart_number: 2,
        max_stretch: 0.5,
        ..AtlasOptions::default()
    };
    let err = create_atlas(&desc, &options, None).unwrap_err();
    assert_eq!(err, AtlasError::NonSplittableBlocked);
}

#[test]
fn cancellation_propagates_without_output() {
    let (positions, indices) = shapes::icosphere(1);
    let desc = MeshDesc {
        positions: &positions,
        indices: &indices,
        ..MeshDesc::default()
    };
    let mut cancel_at_half = |fraction: f32| {
        if fraction >= 0.5 {
            Progress::Cancel
        } else {
            Progress::Continue
        }
    };
    let err = create_atlas(
        &desc,
        &AtlasOptions::default(),
        Some(&mut cancel_at_half),
    )
    .unwrap_err();
    assert_eq!(err, AtlasError::Canceled);
}

#[test]
fn invalid_arguments_are_rejected() {
    let (positions, indices) = shapes::cube();
    let bad_stretch = AtlasOptions {
        max_stretch: 2.0,
        ..AtlasOptions::default()
    };
    assert!(matches!(
        run(&positions, &indices, &bad_stretch),
        Err(AtlasError::InvalidArgument { .. })
    ));
    let zero_size = AtlasOptions {
        width: 0,
        ..AtlasOptions::default()
    };
    assert!(matches!(
        run(&positions, &indices, &zero_size),
        Err(AtlasError::InvalidArgument { .. })
    ));
    assert!(matches!(
        run(&positions, &[], &AtlasOptions::default()),
        Err(AtlasError::InvalidArgument { .. })
    ));
    let out_of_range = vec![0u32, 1, 99];
    assert!(matches!(
        run(&positions, &out_of_range, &AtlasOptions::default()),
        Err(AtlasError::InvalidArgument { .. })
    ));
}

#[test]
fn apply_remap_replays_duplication() {
    let (positions, indices) = shapes::cube();
    let atlas = run(&positions, &indices, &AtlasOptions::default()).unwrap();
    // A one-byte-per-vertex marker buffer: remapping must copy the marker
    // of the source vertex into every duplicate.
    let markers: Vec<u8> = (0..positions.len() as u8).collect();
    let replayed = apply_remap(&atlas.vertex_remap, 1, &markers).unwrap();
    assert_eq!(replayed.len(), atlas.positions.len());
    for (i, &src) in atlas.vertex_remap.iter().enumerate() {
        assert_eq!(replayed[i], markers[src as usize]);
    }
    // Errors on misuse.
    assert!(apply_remap(&atlas.vertex_remap, 0, &markers).is_err());
    assert!(apply_remap(&[99], 1, &markers[..2]).is_err());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        /// Invariants 1 and 4 over randomized grid meshes.
        #[test]
        fn grid_atlases_stay_valid(n in 2usize..5, jitter in 0.0f32..0.3) {
            let (mut positions, indices) = shapes::grid(n);
            // Deterministic per-vertex height jitter keeps the mesh valid
            // while varying the geometry.
            for (i, p) in positions.iter_mut().enumerate() {
                p[2] = jitter * ((i * 2654435761) % 97) as f32 / 97.0;
            }
            let atlas = run(&positions, &indices, &AtlasOptions::default()).unwrap();
            check_core_invariants(&atlas, &positions, &indices);
        }
    }
}
