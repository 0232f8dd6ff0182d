use std::collections::{HashMap, HashSet};

use nalgebra::Vector2;

use super::*;
use crate::chart::Chart;
use crate::mesh::{build_connectivity, root_proto, BaseMesh};
use crate::shapes;

/// Flat chart from a grid, parameterized by its own xy coordinates and
/// scaled so the 2D area matches the 3D area. `width` squeezes the x
/// extent so charts get distinct aspect ratios.
fn flat_chart(n: usize, width: f32) -> (BaseMesh, Chart) {
    let (mut positions, indices) = shapes::grid(n);
    for p in positions.iter_mut() {
        p[0] *= width;
    }
    let t: Vec<[u32; 3]> = indices.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
    let base = BaseMesh::new(&positions, &t, None, HashSet::new(), &[]);
    let mesh = build_connectivity(root_proto(&t, positions.len(), &base), &base).unwrap();
    let mut chart = Chart::new(mesh, &base);
    for v in &mut chart.mesh.verts {
        let p = base.position(v.root_id);
        v.uv = Vector2::new(p.x, p.y);
    }
    chart.normalize_uv_scale();
    (base, chart)
}

#[test]
fn single_chart_fills_most_of_the_atlas() {
    let (_, chart) = flat_chart(2, 1.0);
    let mut charts = vec![chart];
    let stats = pack_charts(&mut charts, 256, 256, 2.0, &PackCfg::default()).unwrap();
    assert!(stats.area_lost < 0.5);
    for v in &charts[0].mesh.verts {
        assert!((0.0..=1.0).contains(&v.uv.x));
        assert!((0.0..=1.0).contains(&v.uv.y));
    }
    // The chart spans nearly the full unit square.
    let (min, size) = bbox(&charts[0]);
    assert!(min.norm() < 0.05);
    assert!(size.x > 0.9 && size.y > 0.9);
}

#[test]
fn charts_never_overlap_per_pixel() {
    let mut charts = Vec::new();
    for (n, scale) in [(2usize, 1.0f32), (2, 0.7), (1, 0.5), (1, 0.4), (2, 0.9)] {
        charts.push(flat_chart(n, scale).1);
    }
    let stats = pack_charts(&mut charts, 512, 512, 2.0, &PackCfg::default()).unwrap();
    assert!(stats.box_width > 0.0 && stats.box_height > 0.0);

    // Rasterize triangle coverage on a fine grid; no cell may be claimed
    // by two charts.
    let res = 512usize;
    let mut owner: HashMap<(usize, usize), usize> = HashMap::new();
    for (ci, chart) in charts.iter().enumerate() {
        for face in &chart.mesh.faces {
            let p0 = chart.mesh.verts[face.verts[0] as usize].uv;
            let p1 = chart.mesh.verts[face.verts[1] as usize].uv;
            let p2 = chart.mesh.verts[face.verts[2] as usize].uv;
            let min_x = p0.x.min(p1.x).min(p2.x);
            let max_x = p0.x.max(p1.x).max(p2.x);
            let min_y = p0.y.min(p1.y).min(p2.y);
            let max_y = p0.y.max(p1.y).max(p2.y);
            let c0 = (min_x * res as f64) as usize;
            let c1 = ((max_x * res as f64) as usize).min(res - 1);
            let r0 = (min_y * res as f64) as usize;
            let r1 = ((max_y * res as f64) as usize).min(res - 1);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    let p = Vector2::new(
                        (c as f64 + 0.5) / res as f64,
                        (r as f64 + 0.5) / res as f64,
                    );
                    if !strictly_inside(p, p0, p1, p2) {
                        continue;
                    }
                    if let Some(&prev) = owner.get(&(c, r)) {
                        assert_eq!(prev, ci, "pixel ({c},{r}) claimed by two charts");
                    } else {
                        owner.insert((c, r), ci);
                    }
                }
            }
        }
    }
    // Sanity: the biggest charts actually rasterized something.
    assert!(owner.len() > 100);
}

#[test]
fn all_uv_stay_in_unit_square() {
    let mut charts: Vec<Chart> = (0..4).map(|i| flat_chart(1, 0.3 + 0.2 * i as f32).1).collect();
    pack_charts(&mut charts, 128, 128, 1.0, &PackCfg::default()).unwrap();
    for chart in &charts {
        for v in &chart.mesh.verts {
            assert!((0.0..=1.0).contains(&v.uv.x));
            assert!((0.0..=1.0).contains(&v.uv.y));
        }
    }
}

#[test]
fn zero_area_chart_collapses_to_origin() {
    let (_, good) = flat_chart(1, 1.0);
    let (_, mut degenerate) = flat_chart(1, 1.0);
    for v in &mut degenerate.mesh.verts {
        v.uv = Vector2::new(0.25, 0.25);
    }
    degenerate.update_area_2d();
    let mut charts = vec![good, degenerate];
    pack_charts(&mut charts, 64, 64, 1.0, &PackCfg::default()).unwrap();
    for v in &charts[1].mesh.verts {
        assert_eq!(v.uv, Vector2::zeros());
    }
}

#[test]
fn taller_atlas_grows_sideways() {
    // Two identical tall charts: the second must land beside, not on top.
    let (_, a) = flat_chart(2, 1.0);
    let (_, b) = flat_chart(2, 1.0);
    let mut charts = vec![a, b];
    let stats = pack_charts(&mut charts, 256, 256, 2.0, &PackCfg::default()).unwrap();
    let ratio = stats.box_width / stats.box_height;
    assert!(ratio > 1.0, "expected side-by-side packing, ratio {ratio}");
}

fn bbox(chart: &Chart) -> (Vector2<f64>, Vector2<f64>) {
    let mut min = Vector2::repeat(f64::INFINITY);
    let mut max = Vector2::repeat(f64::NEG_INFINITY);
    for v in &chart.mesh.verts {
        min = min.inf(&v.uv);
        max = max.sup(&v.uv);
    }
    (min, max - min)
}

fn strictly_inside(
    p: Vector2<f64>,
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
) -> bool {
    let sign = |p1: Vector2<f64>, p2: Vector2<f64>, p3: Vector2<f64>| {
        (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    (d1 > 0.0 && d2 > 0.0 && d3 > 0.0) || (d1 < 0.0 && d2 < 0.0 && d3 < 0.0)
}
