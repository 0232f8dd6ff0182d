//! The packing driver.

use nalgebra::Vector2;

use crate::atlas::AtlasError;
use crate::chart::Chart;

use super::border::{BorderProfile, ChartBorders};

/// Packer tunables. Rates and sizes mirror the empirical atlas fill target
/// at the standard 512² / gutter-2 configuration.
#[derive(Clone, Copy, Debug)]
pub struct PackCfg {
    /// Rotation poses tried per chart (0°, 90°, 180°, 270° at 4).
    pub rotations: usize,
    /// Minimum tangent scan step in pixels.
    pub search_step_length: usize,
    /// Maximum number of scan steps along the tangent range.
    pub search_step_count: usize,
    /// Empirical atlas fill rate at the standard configuration.
    pub standard_space_rate: f64,
    pub standard_uv_size: f64,
    pub standard_gutter: f64,
}

impl Default for PackCfg {
    fn default() -> Self {
        Self {
            rotations: 4,
            search_step_length: 2,
            search_step_count: 120,
            standard_space_rate: 0.75,
            standard_uv_size: 512.0,
            standard_gutter: 2.0,
        }
    }
}

/// Outcome numbers of a packing run.
#[derive(Clone, Copy, Debug)]
pub struct PackStats {
    /// Fraction of the enclosing box not covered by charts.
    pub area_lost: f64,
    pub box_width: f64,
    pub box_height: f64,
    pub pixel_length: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    FromRight,
    FromLeft,
    FromTop,
    FromBottom,
}

/// Growing atlas state: box extents and the four borders.
struct AtlasState {
    top: BorderProfile,
    bottom: BorderProfile,
    left: BorderProfile,
    right: BorderProfile,
    box_left: f64,
    box_right: f64,
    box_bottom: f64,
    box_top: f64,
    packed_area: f64,
}

/// One placement candidate.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    rotation: usize,
    origin: Vector2<f64>,
    waste: f64,
    between_area: f64,
}

/// Pack all charts into the atlas and normalize (u,v) into [0,1]².
///
/// Charts must arrive with their 2D area already matched to their 3D area;
/// vertices are updated in place. Zero-area charts collapse to the origin
/// and consume no space.
pub fn pack_charts(
    charts: &mut [Chart],
    width: usize,
    height: usize,
    gutter: f64,
    cfg: &PackCfg,
) -> Result<PackStats, AtlasError> {
    if width == 0 || height == 0 {
        return Err(AtlasError::invalid("atlas dimensions must be positive"));
    }
    // Function-local rotation tables.
    let (cos_table, sin_table): (Vec<f64>, Vec<f64>) = (0..cfg.rotations)
        .map(|k| {
            let a = k as f64 * std::f64::consts::TAU / cfg.rotations as f64;
            (a.cos(), a.sin())
        })
        .unzip();

    // 1. Align every chart to its longest axis and anchor at the origin.
    let mut total_area = 0.0;
    for chart in charts.iter_mut() {
        chart.update_area_2d();
        total_area += chart.area_2d.abs();
        align_longest_axis(chart, &cos_table, &sin_table);
    }

    // 2. Height-descending processing order.
    let mut order: Vec<usize> = (0..charts.len()).collect();
    order.sort_by(|&a, &b| {
        let ha = chart_bbox(&charts[a]).1.y;
        let hb = chart_bbox(&charts[b]).1.y;
        hb.partial_cmp(&ha)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    // 3. Pixel length and gutter in uv units.
    let pixel = estimate_pixel_length(charts, total_area, width, height, gutter, cfg);
    let gutter_uv = gutter * pixel;
    let ratio = width as f64 / height as f64;

    let mut atlas = AtlasState {
        top: BorderProfile::new(true),
        bottom: BorderProfile::new(false),
        left: BorderProfile::new(false),
        right: BorderProfile::new(true),
        box_left: 0.0,
        box_right: 0.0,
        box_bottom: 0.0,
        box_top: 0.0,
        packed_area: 0.0,
    };

    let mut first = true;
    for &ci in &order {
        let chart = &mut charts[ci];
        let area = chart.area_2d.abs();
        if area <= 1e-12 {
            for v in &mut chart.mesh.verts {
                v.uv = Vector2::zeros();
            }
            continue;
        }
        // Poses: uv anchored at origin per rotation, plus sampled borders.
        let poses = build_poses(chart, pixel, &cos_table, &sin_table);

        if first {
            // Seed the atlas with the pose wasting the least box area.
            let mut best = 0usize;
            let mut best_waste = f64::INFINITY;
            for (r, pose) in poses.iter().enumerate() {
                let waste = 1.0 - area / (pose.borders.width * pose.borders.height);
                if waste < best_waste {
                    best_waste = waste;
                    best = r;
                }
            }
            apply_pose(chart, &poses[best], Vector2::zeros());
            merge_borders(&mut atlas, &poses[best].borders, Vector2::zeros(), pixel);
            atlas.box_right = poses[best].borders.width;
            atlas.box_top = poses[best].borders.height;
            atlas.packed_area = area;
            first = false;
            continue;
        }

        // Keep the atlas close to the requested aspect: grow the lagging
        // axis. Exact ties default to horizontal growth (add from right).
        let expected_width = (atlas.box_top - atlas.box_bottom) * ratio;
        let directions: [Direction; 2] = if expected_width >= atlas.box_right - atlas.box_left {
            [Direction::FromRight, Direction::FromLeft]
        } else {
            [Direction::FromTop, Direction::FromBottom]
        };

        let mut best: Option<(Direction, Candidate)> = None;
        for dir in directions {
            for (r, pose) in poses.iter().enumerate() {
                if let Some(c) = scan_direction(&atlas, &pose.borders, dir, r, gutter_uv, pixel, cfg)
                {
                    let better = match &best {
                        None => true,
                        Some((_, b)) => {
                            c.waste < b.waste
                                || (c.waste == b.waste && c.between_area < b.between_area)
                        }
                    };
                    if better {
                        best = Some((dir, c));
                    }
                }
            }
        }
        let Some((_, cand)) = best else {
            // No border overlap anywhere (degenerate): stack right.
            let fallback = Candidate {
                rotation: 0,
                origin: Vector2::new(atlas.box_right + gutter_uv, atlas.box_bottom),
                waste: 0.0,
                between_area: 0.0,
            };
            apply_pose(chart, &poses[0], fallback.origin);
            merge_borders(&mut atlas, &poses[0].borders, fallback.origin, pixel);
            grow_box(&mut atlas, &poses[0].borders, fallback.origin);
            atlas.packed_area += area;
            continue;
        };
        let pose = &poses[cand.rotation];
        apply_pose(chart, pose, cand.origin);
        merge_borders(&mut atlas, &pose.borders, cand.origin, pixel);
        grow_box(&mut atlas, &pose.borders, cand.origin);
        atlas.packed_area += area;
    }

    // 4. Normalize into [0,1]² honoring the W/H aspect.
    let box_w = (atlas.box_right - atlas.box_left).max(1e-12);
    let box_h = (atlas.box_top - atlas.box_bottom).max(1e-12);
    let norm_w = box_w.max(box_h * ratio);
    let norm_h = box_h.max(box_w / ratio);
    for chart in charts.iter_mut() {
        for v in &mut chart.mesh.verts {
            v.uv.x = ((v.uv.x - atlas.box_left) / norm_w).clamp(0.0, 1.0);
            v.uv.y = ((v.uv.y - atlas.box_bottom) / norm_h).clamp(0.0, 1.0);
        }
    }

    Ok(PackStats {
        area_lost: 1.0 - atlas.packed_area / (box_w * box_h),
        box_width: box_w,
        box_height: box_h,
        pixel_length: pixel,
    })
}

/// Bounding box of a chart's current uv.
fn chart_bbox(chart: &Chart) -> (Vector2<f64>, Vector2<f64>) {
    let mut min = Vector2::repeat(f64::INFINITY);
    let mut max = Vector2::repeat(f64::NEG_INFINITY);
    for v in &chart.mesh.verts {
        min = min.inf(&v.uv);
        max = max.sup(&v.uv);
    }
    if chart.mesh.verts.is_empty() {
        (Vector2::zeros(), Vector2::zeros())
    } else {
        (min, max - min)
    }
}

/// Rotate the chart so its longest extent runs along Y, then anchor the
/// bounding box at the origin.
fn align_longest_axis(chart: &mut Chart, cos_table: &[f64], sin_table: &[f64]) {
    let (min, size) = chart_bbox(chart);
    let center = min + size / 2.0;
    let mut best_r = 0usize;
    let mut best_h = f64::NEG_INFINITY;
    for r in 0..cos_table.len() {
        let (c, s) = (cos_table[r], sin_table[r]);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for v in &chart.mesh.verts {
            let d = v.uv - center;
            let y = d.x * s + d.y * c;
            lo = lo.min(y);
            hi = hi.max(y);
        }
        if hi - lo > best_h {
            best_h = hi - lo;
            best_r = r;
        }
    }
    let (c, s) = (cos_table[best_r], sin_table[best_r]);
    for v in &mut chart.mesh.verts {
        let d = v.uv - center;
        v.uv = Vector2::new(d.x * c - d.y * s, d.x * s + d.y * c);
    }
    let (min, _) = chart_bbox(chart);
    for v in &mut chart.mesh.verts {
        v.uv -= min;
    }
}

/// Internal pixel length ≈ √(totalArea / (W·H·packRatio)), with the fill
/// rate adjusted from the standard configuration by the gutter scale.
fn estimate_pixel_length(
    charts: &[Chart],
    total_area: f64,
    width: usize,
    height: usize,
    gutter: f64,
    cfg: &PackCfg,
) -> f64 {
    if total_area <= 0.0 {
        return 1.0;
    }
    let f_gutter = gutter * cfg.standard_uv_size / width.min(height) as f64;
    let mut space_area = total_area * cfg.standard_space_rate / (1.0 - cfg.standard_space_rate);
    let base_pixel = ((total_area + space_area) / (width * height) as f64).sqrt();
    let base_gutter = gutter * base_pixel;
    let shorten = (base_gutter * (f_gutter / cfg.standard_gutter) - base_gutter) / 2.0;
    for chart in charts {
        let (_, size) = chart_bbox(chart);
        if size.y <= 1e-12 {
            continue;
        }
        let scale = (size.y - shorten) / size.y;
        space_area += (1.0 - scale * scale.abs()) * chart.area_2d.abs();
    }
    let rate = total_area / (total_area + space_area);
    (total_area / ((width * height) as f64 * rate)).sqrt()
}

/// One rotated pose of a chart: origin-anchored uv plus sampled borders.
struct Pose {
    uv: Vec<Vector2<f64>>,
    borders: ChartBorders,
}

fn build_poses(chart: &Chart, pixel: f64, cos_table: &[f64], sin_table: &[f64]) -> Vec<Pose> {
    let (min, size) = chart_bbox(chart);
    let center = min + size / 2.0;
    let mut poses = Vec::with_capacity(cos_table.len());
    for r in 0..cos_table.len() {
        let (c, s) = (cos_table[r], sin_table[r]);
        let mut uv: Vec<Vector2<f64>> = chart
            .mesh
            .verts
            .iter()
            .map(|v| {
                let d = v.uv - center;
                Vector2::new(d.x * c - d.y * s, d.x * s + d.y * c)
            })
            .collect();
        let mut lo = Vector2::repeat(f64::INFINITY);
        let mut hi = Vector2::repeat(f64::NEG_INFINITY);
        for p in &uv {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        for p in &mut uv {
            *p -= lo;
        }
        let dims = hi - lo;
        let borders = ChartBorders::build(&chart.mesh, &uv, dims.x, dims.y, pixel);
        poses.push(Pose { uv, borders });
    }
    poses
}

fn apply_pose(chart: &mut Chart, pose: &Pose, origin: Vector2<f64>) {
    for (v, p) in chart.mesh.verts.iter_mut().zip(&pose.uv) {
        v.uv = p + origin;
    }
}

fn grow_box(atlas: &mut AtlasState, borders: &ChartBorders, origin: Vector2<f64>) {
    atlas.box_left = atlas.box_left.min(origin.x);
    atlas.box_right = atlas.box_right.max(origin.x + borders.width);
    atlas.box_bottom = atlas.box_bottom.min(origin.y);
    atlas.box_top = atlas.box_top.max(origin.y + borders.height);
}

/// Merge a placed chart's borders into the atlas envelope. Values spill
/// into both adjacent slots so a fractional-pixel shift can never punch a
/// hole in the envelope.
fn merge_borders(atlas: &mut AtlasState, borders: &ChartBorders, origin: Vector2<f64>, pixel: f64) {
    let col0 = (origin.x / pixel).floor() as i64;
    let row0 = (origin.y / pixel).floor() as i64;
    for (c, (&t, &b)) in borders.top.iter().zip(&borders.bottom).enumerate() {
        for spill in 0..2 {
            let slot = col0 + c as i64 + spill;
            atlas.top.merge(slot, t + origin.y);
            atlas.bottom.merge(slot, b + origin.y);
        }
    }
    for (r, (&l, &rt)) in borders.left.iter().zip(&borders.right).enumerate() {
        for spill in 0..2 {
            let slot = row0 + r as i64 + spill;
            atlas.left.merge(slot, l + origin.x);
            atlas.right.merge(slot, rt + origin.x);
        }
    }
}

/// Scan one insertion direction: slide the chart along the tangent axis and
/// rest it against the facing atlas border. Returns the best candidate.
fn scan_direction(
    atlas: &AtlasState,
    borders: &ChartBorders,
    dir: Direction,
    rotation: usize,
    gutter_uv: f64,
    pixel: f64,
    cfg: &PackCfg,
) -> Option<Candidate> {
    // Tangent extent of the atlas and the chart.
    let (tan_lo, tan_hi, chart_tan) = match dir {
        Direction::FromRight | Direction::FromLeft => {
            (atlas.box_bottom, atlas.box_top, borders.height)
        }
        Direction::FromTop | Direction::FromBottom => {
            (atlas.box_left, atlas.box_right, borders.width)
        }
    };
    let range = (tan_hi - tan_lo) + chart_tan;
    let range_px = (range / pixel).ceil() as usize;
    let step_px = cfg
        .search_step_length
        .max(range_px / cfg.search_step_count.max(1)) as i64;

    let start_slot = ((tan_lo - chart_tan) / pixel).floor() as i64;
    let end_slot = (tan_hi / pixel).ceil() as i64;

    let mut best: Option<Candidate> = None;
    let mut slot = start_slot;
    while slot <= end_slot {
        if let Some(cand) = place_at(atlas, borders, dir, rotation, slot, gutter_uv, pixel) {
            let better = match &best {
                None => true,
                Some(b) => {
                    cand.waste < b.waste
                        || (cand.waste == b.waste && cand.between_area < b.between_area)
                }
            };
            if better {
                best = Some(cand);
            }
        }
        slot += step_px;
    }
    best
}

/// Radial placement at one tangent slot.
fn place_at(
    atlas: &AtlasState,
    borders: &ChartBorders,
    dir: Direction,
    rotation: usize,
    tangent_slot: i64,
    gutter_uv: f64,
    pixel: f64,
) -> Option<Candidate> {
    let tangent = tangent_slot as f64 * pixel;
    // Collect the facing chart/atlas profile pair.
    let (chart_prof, atlas_prof, sign): (&[f64], &BorderProfile, f64) = match dir {
        Direction::FromRight => (&borders.left, &atlas.right, 1.0),
        Direction::FromLeft => (&borders.right, &atlas.left, -1.0),
        Direction::FromTop => (&borders.bottom, &atlas.top, 1.0),
        Direction::FromBottom => (&borders.top, &atlas.bottom, -1.0),
    };

    // Radial offset: push until the chart rests gutter-deep on the border.
    let mut radial: Option<f64> = None;
    let mut overlap = 0usize;
    for (i, &cv) in chart_prof.iter().enumerate() {
        let slot = tangent_slot + i as i64;
        if let Some(av) = atlas_prof.get(slot) {
            // sign=+1: origin ≥ av + gutter − cv ; sign=−1: origin ≤ av − gutter − cv
            let bound = av + sign * gutter_uv - cv;
            radial = Some(match radial {
                None => bound,
                Some(r) => {
                    if sign > 0.0 {
                        r.max(bound)
                    } else {
                        r.min(bound)
                    }
                }
            });
            overlap += 1;
        }
    }
    let radial = radial?;
    if overlap == 0 {
        return None;
    }

    let origin = match dir {
        Direction::FromRight | Direction::FromLeft => Vector2::new(radial, tangent),
        Direction::FromTop | Direction::FromBottom => Vector2::new(tangent, radial),
    };

    // Waste: growth of the enclosing box.
    let new_left = atlas.box_left.min(origin.x);
    let new_right = atlas.box_right.max(origin.x + borders.width);
    let new_bottom = atlas.box_bottom.min(origin.y);
    let new_top = atlas.box_top.max(origin.y + borders.height);
    let waste = (new_right - new_left) * (new_top - new_bottom);

    // Between-area: integrated gap along the touching profile.
    let mut between = 0.0;
    for (i, &cv) in chart_prof.iter().enumerate() {
        let slot = tangent_slot + i as i64;
        if let Some(av) = atlas_prof.get(slot) {
            between += (sign * (radial + cv - av - sign * gutter_uv)).max(0.0) * pixel;
        }
    }

    Some(Candidate {
        rotation,
        origin,
        waste,
        between_area: between,
    })
}
