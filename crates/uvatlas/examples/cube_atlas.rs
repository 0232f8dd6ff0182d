//! Minimal end-to-end run: atlas a cube and print the per-chart layout.

use uvatlas::{create_atlas, shapes, AtlasOptions, MeshDesc};

fn main() {
    let (positions, indices) = shapes::cube();
    let desc = MeshDesc {
        positions: &positions,
        indices: &indices,
        ..MeshDesc::default()
    };
    let options = AtlasOptions {
        max_stretch: 0.5,
        width: 256,
        height: 256,
        gutter: 2.0,
        ..AtlasOptions::default()
    };
    let atlas = create_atlas(&desc, &options, None).expect("cube atlas");

    println!(
        "charts: {}  stretch: {:.4}  vertices: {} -> {}",
        atlas.chart_count,
        atlas.stretch,
        positions.len(),
        atlas.positions.len()
    );
    for f in 0..indices.len() / 3 {
        let uv = |k: usize| atlas.uvs[atlas.indices[f * 3 + k] as usize];
        println!(
            "face {f:2} chart {} uv ({:.3},{:.3}) ({:.3},{:.3}) ({:.3},{:.3})",
            atlas.face_partition[f],
            uv(0)[0],
            uv(0)[1],
            uv(1)[0],
            uv(1)[1],
            uv(2)[0],
            uv(2)[1],
        );
    }
}
