//! Procedural test meshes.
//!
//! Small generators used by the examples, benchmarks, and the experiment
//! runner. Each returns `(positions, indices)` with counter-clockwise
//! triangles when viewed from outside.

/// Axis-aligned cube with corners at ±0.5, 12 triangles.
pub fn cube() -> (Vec<[f32; 3]>, Vec<u32>) {
    let h = 0.5f32;
    let positions = vec![
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    let indices = vec![
        // -z
        0, 2, 1, 0, 3, 2, // +z
        4, 5, 6, 4, 6, 7, // -y
        0, 1, 5, 0, 5, 4, // +y
        3, 7, 6, 3, 6, 2, // -x
        0, 4, 7, 0, 7, 3, // +x
        1, 2, 6, 1, 6, 5,
    ];
    (positions, indices)
}

/// Regular tetrahedron, 4 triangles.
pub fn tetrahedron() -> (Vec<[f32; 3]>, Vec<u32>) {
    let positions = vec![
        [1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
    ];
    let indices = vec![0, 1, 2, 0, 3, 1, 0, 2, 3, 1, 3, 2];
    (positions, indices)
}

/// Open cylinder shell (no caps) around the Y axis: `segments` around,
/// `rings` bands along the axis.
pub fn cylinder_shell(segments: usize, rings: usize) -> (Vec<[f32; 3]>, Vec<u32>) {
    assert!(segments >= 3 && rings >= 1);
    let mut positions = Vec::with_capacity(segments * (rings + 1));
    for r in 0..=rings {
        let y = r as f32 / rings as f32 * 2.0 - 1.0;
        for s in 0..segments {
            let a = s as f32 / segments as f32 * std::f32::consts::TAU;
            positions.push([a.cos(), y, a.sin()]);
        }
    }
    let mut indices = Vec::with_capacity(segments * rings * 6);
    for r in 0..rings {
        for s in 0..segments {
            let s1 = (s + 1) % segments;
            let a = (r * segments + s) as u32;
            let b = (r * segments + s1) as u32;
            let c = ((r + 1) * segments + s) as u32;
            let d = ((r + 1) * segments + s1) as u32;
            // Outward-facing winding (normal away from the axis).
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    (positions, indices)
}

/// Icosphere: unit icosahedron subdivided `subdivisions` times
/// (0 → 20 faces, 1 → 80, 2 → 320).
pub fn icosphere(subdivisions: usize) -> (Vec<[f32; 3]>, Vec<u32>) {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let mut positions: Vec<[f32; 3]> = vec![
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ];
    for p in positions.iter_mut() {
        let n = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        *p = [p[0] / n, p[1] / n, p[2] / n];
    }
    let mut indices: Vec<u32> = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, //
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, //
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, //
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];
    for _ in 0..subdivisions {
        let mut midpoint = std::collections::HashMap::new();
        let mut next = Vec::with_capacity(indices.len() * 4);
        for tri in indices.chunks(3) {
            let mut mid = [0u32; 3];
            for k in 0..3 {
                let a = tri[k];
                let b = tri[(k + 1) % 3];
                let key = if a < b { (a, b) } else { (b, a) };
                mid[k] = *midpoint.entry(key).or_insert_with(|| {
                    let pa = positions[a as usize];
                    let pb = positions[b as usize];
                    let mut m = [
                        (pa[0] + pb[0]) / 2.0,
                        (pa[1] + pb[1]) / 2.0,
                        (pa[2] + pb[2]) / 2.0,
                    ];
                    let n = (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]).sqrt();
                    m = [m[0] / n, m[1] / n, m[2] / n];
                    positions.push(m);
                    (positions.len() - 1) as u32
                });
            }
            next.extend_from_slice(&[
                tri[0], mid[0], mid[2], //
                tri[1], mid[1], mid[0], //
                tri[2], mid[2], mid[1], //
                mid[0], mid[1], mid[2],
            ]);
        }
        indices = next;
    }
    (positions, indices)
}

/// Flat (n+1)×(n+1) vertex grid in the XY plane, 2n² triangles.
pub fn grid(n: usize) -> (Vec<[f32; 3]>, Vec<u32>) {
    assert!(n >= 1);
    let mut positions = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            positions.push([i as f32 / n as f32, j as f32 / n as f32, 0.0]);
        }
    }
    let stride = (n + 1) as u32;
    let mut indices = Vec::with_capacity(n * n * 6);
    for j in 0..n as u32 {
        for i in 0..n as u32 {
            let a = j * stride + i;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }
    (positions, indices)
}
