//! Boundary optimization between sub-charts via graph cut.
//!
//! After clustering assigns every face a sub-chart label, the boundary is
//! jagged. A band of faces around each new boundary (the fuzzy region) is
//! relabeled by a minimum cut whose capacities prefer cutting along creases
//! (dihedral term) and along lines where the two candidate embeddings
//! disagree most (stretch term). Faces outside the band anchor the cut with
//! infinite terminal capacity.

use std::collections::VecDeque;

use crate::geodesic::{landmark_distances, EngineChoice, LandmarkDistances};
use crate::isomap::Isomap;
use crate::mesh::{BaseMesh, ChartMesh, INVALID_ID, MUST_RESERVE};

use super::maxflow::FlowNetwork;
use super::types::Chart;

/// Weight of the stretch term in the cut capacity.
const OPTIMAL_CUT_STRETCH_WEIGHT: f64 = 0.35;

/// Depth of the fuzzy band as a fraction of each region's BFS depth.
const FUZZY_REGION_PERCENT: f64 = 0.30;

/// Cap on per-region landmarks for the stretch capacities.
const MAX_LOCAL_LANDMARKS: usize = 10;

#[derive(Clone, Copy, Debug)]
pub struct GraphCutCfg {
    pub stretch_weight: f64,
    pub fuzzy_percent: f64,
}

impl Default for GraphCutCfg {
    fn default() -> Self {
        Self {
            stretch_weight: OPTIMAL_CUT_STRETCH_WEIGHT,
            fuzzy_percent: FUZZY_REGION_PERCENT,
        }
    }
}

/// Per-edge dihedral distance `1 − n₁·n₂` and its interior average.
fn edge_angle_distance(mesh: &ChartMesh, base: &BaseMesh) -> Option<(Vec<f64>, f64)> {
    let mut dist = vec![0.0f64; mesh.edge_count()];
    let mut total = 0.0;
    let mut count = 0usize;
    for edge in &mesh.edges {
        if edge.is_boundary {
            continue;
        }
        let n1 = base.face_normals[mesh.faces[edge.faces[0] as usize].root_id as usize];
        let n2 = base.face_normals[mesh.faces[edge.faces[1] as usize].root_id as usize];
        let d = 1.0 - n1.dot(&n2);
        dist[edge.id as usize] = d;
        total += d;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let avg = total / count as f64;
    if avg <= 1e-6 {
        return None;
    }
    Some((dist, avg))
}

/// The fuzzy band: per-face flag plus each region's BFS depth.
struct FuzzyRegion {
    fuzzy_face: Vec<bool>,
    region_depth: Vec<usize>,
}

/// Grow BFS levels away from the watershed inside each label region and
/// keep the shallow fraction as the fuzzy band.
fn fuzzy_region(
    mesh: &ChartMesh,
    labels: &[u32],
    label_count: usize,
    fuzzy_percent: f64,
) -> FuzzyRegion {
    let nv = mesh.vert_count();
    let mut fuzzy_face = vec![false; mesh.face_count()];
    let mut region_depth = vec![0usize; label_count];

    for r in 0..label_count as u32 {
        // Region membership and watershed seeds.
        let mut in_region = vec![false; nv];
        for face in &mesh.faces {
            if labels[face.id as usize] == r {
                for &v in &face.verts {
                    in_region[v as usize] = true;
                }
            }
        }
        let mut level = vec![usize::MAX; nv];
        let mut queue = VecDeque::new();
        for edge in &mesh.edges {
            if edge.is_boundary {
                continue;
            }
            let (f0, f1) = (edge.faces[0] as usize, edge.faces[1] as usize);
            if labels[f0] != labels[f1] && (labels[f0] == r || labels[f1] == r) {
                for &v in &edge.verts {
                    if in_region[v as usize] && level[v as usize] == usize::MAX {
                        level[v as usize] = 0;
                        queue.push_back(v);
                    }
                }
            }
        }
        if queue.is_empty() {
            continue;
        }
        let mut max_level = 0usize;
        while let Some(v) = queue.pop_front() {
            let l = level[v as usize];
            max_level = max_level.max(l);
            for &adj in &mesh.verts[v as usize].vert_adj {
                let a = adj as usize;
                if in_region[a] && level[a] == usize::MAX {
                    level[a] = l + 1;
                    queue.push_back(adj);
                }
            }
        }
        region_depth[r as usize] = max_level;
        let cutoff = ((max_level as f64 * fuzzy_percent + 0.5) as usize)
            .min(max_level.saturating_sub(1));
        // A face is fuzzy when no corner lies beyond the cutoff depth.
        for face in &mesh.faces {
            if labels[face.id as usize] != r {
                continue;
            }
            let deep = face.verts.iter().any(|&v| {
                let l = level[v as usize];
                l != usize::MAX && l > cutoff
            });
            if !deep {
                fuzzy_face[face.id as usize] = true;
            }
        }
    }
    FuzzyRegion {
        fuzzy_face,
        region_depth,
    }
}

/// Neighbor label pairs actually sharing an edge.
fn adjacent_label_pairs(mesh: &ChartMesh, labels: &[u32]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();
    for edge in &mesh.edges {
        if edge.is_boundary {
            continue;
        }
        let a = labels[edge.faces[0] as usize];
        let b = labels[edge.faces[1] as usize];
        if a != b {
            let key = (a.min(b), a.max(b));
            if !pairs.contains(&key) {
                pairs.push(key);
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Cut the fuzzy band between one label pair. `stretch_diff` is empty in
/// angle-only mode.
#[allow(clippy::too_many_arguments)]
fn cut_one_boundary(
    mesh: &ChartMesh,
    labels: &mut [u32],
    fuzzy: &[bool],
    pair: (u32, u32),
    angle_dist: &[f64],
    avg_angle: f64,
    stretch_diff: &[f64],
    stretch_weight: f64,
) {
    let mut node_of = vec![INVALID_ID; mesh.face_count()];
    let mut fuzzy_faces = Vec::new();
    for face in &mesh.faces {
        let l = labels[face.id as usize];
        if fuzzy[face.id as usize] && (l == pair.0 || l == pair.1) {
            node_of[face.id as usize] = fuzzy_faces.len() as u32;
            fuzzy_faces.push(face.id);
        }
    }
    if fuzzy_faces.is_empty() {
        return;
    }

    let avg_stretch_diff = if stretch_diff.is_empty() {
        0.0
    } else {
        2.0 * fuzzy_faces
            .iter()
            .map(|&f| stretch_diff[f as usize])
            .sum::<f64>()
            / fuzzy_faces.len() as f64
    };

    let mut net = FlowNetwork::new(fuzzy_faces.len());
    for &f in &fuzzy_faces {
        let face = &mesh.faces[f as usize];
        for &e in &face.edges {
            let edge = &mesh.edges[e as usize];
            if edge.is_boundary {
                continue;
            }
            let adj = edge.other_face(f);
            if node_of[adj as usize] != INVALID_ID {
                // Add each interior pair once.
                if adj < f {
                    continue;
                }
                let mut w = if stretch_diff.is_empty() || avg_stretch_diff <= 1e-12 {
                    1.0 / (1.0 + angle_dist[e as usize] / avg_angle)
                } else {
                    (1.0 - stretch_weight) / (1.0 + angle_dist[e as usize] / avg_angle)
                        + stretch_weight
                            * (stretch_diff[f as usize] + stretch_diff[adj as usize])
                            / avg_stretch_diff
                };
                if !w.is_finite() {
                    w = 1.0;
                }
                net.add_edge(
                    node_of[f as usize] as usize,
                    node_of[adj as usize] as usize,
                    w,
                    w,
                );
            } else if !fuzzy[adj as usize] {
                // Anchored by the settled side it touches.
                if labels[adj as usize] == pair.0 {
                    net.set_terminal(node_of[f as usize] as usize, f64::INFINITY, 0.0);
                } else if labels[adj as usize] == pair.1 {
                    net.set_terminal(node_of[f as usize] as usize, 0.0, f64::INFINITY);
                }
            }
        }
    }
    net.max_flow();
    for &f in &fuzzy_faces {
        labels[f as usize] = if net.in_source_side(node_of[f as usize] as usize) {
            pair.0
        } else {
            pair.1
        };
    }
}

/// Angle-only boundary optimization (used when the sub-charts have no
/// embeddings of their own yet). Runs two sweeps over all label pairs.
pub fn optimize_boundary_by_angle(
    chart: &Chart,
    base: &BaseMesh,
    labels: &mut [u32],
    label_count: usize,
    cfg: &GraphCutCfg,
) {
    let Some((angle_dist, avg_angle)) = edge_angle_distance(&chart.mesh, base) else {
        return;
    };
    let fuzzy = fuzzy_region(&chart.mesh, labels, label_count, cfg.fuzzy_percent);
    for _ in 0..2 {
        for pair in adjacent_label_pairs(&chart.mesh, labels) {
            if fuzzy.region_depth[pair.0 as usize] < 1 && fuzzy.region_depth[pair.1 as usize] < 1 {
                continue;
            }
            cut_one_boundary(
                &chart.mesh,
                labels,
                &fuzzy.fuzzy_face,
                pair,
                &angle_dist,
                avg_angle,
                &[],
                cfg.stretch_weight,
            );
        }
    }
}

/// Per-region landmark embedding used by the stretch capacities.
struct RegionEmbedding {
    landmarks: Vec<u32>,
    iso: Isomap,
    /// Spectral uv of each local landmark.
    landmark_uv: Vec<[f64; 2]>,
    distances: LandmarkDistances,
}

fn region_embedding(
    mesh: &ChartMesh,
    base: &BaseMesh,
    labels: &[u32],
    region: u32,
    engine: EngineChoice,
) -> Option<RegionEmbedding> {
    let mut in_region = vec![false; mesh.vert_count()];
    for face in &mesh.faces {
        if labels[face.id as usize] == region {
            for &v in &face.verts {
                in_region[v as usize] = true;
            }
        }
    }
    let mut verts: Vec<u32> = (0..mesh.vert_count() as u32)
        .filter(|&v| in_region[v as usize])
        .collect();
    if verts.len() < 3 {
        return None;
    }
    verts.sort_by(|&a, &b| {
        let ia = mesh.verts[a as usize].importance;
        let ib = mesh.verts[b as usize].importance;
        let rank = |i: i32| if i == MUST_RESERVE { i64::MAX } else { i64::from(i) };
        rank(ib).cmp(&rank(ia)).then(a.cmp(&b))
    });
    verts.truncate(MAX_LOCAL_LANDMARKS);
    // Distances are measured on the whole parent chart so fuzzy faces of
    // either side can be embedded against this region.
    let distances = landmark_distances(mesh, base, &verts, engine);
    let n = verts.len();
    let mut block = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            block[i * n + j] = distances.dist(i, verts[j]);
        }
    }
    let iso = Isomap::new(n, &block, 2).ok()?;
    if iso.dimension < 2 {
        return None;
    }
    let landmark_uv = (0..n)
        .map(|j| [iso.landmark_coord(j, 0), iso.landmark_coord(j, 1)])
        .collect();
    Some(RegionEmbedding {
        landmarks: verts,
        iso,
        landmark_uv,
        distances,
    })
}

/// Distortion of a face measured against one region's embedding: project
/// the face center through the embedding and compare Euclidean against
/// geodesic distances to every local landmark.
fn face_distortion(mesh: &ChartMesh, face_id: u32, emb: &RegionEmbedding) -> f64 {
    let face = &mesh.faces[face_id as usize];
    let n = emb.landmarks.len();
    let mut dist_buf = vec![0.0f64; n];
    let mut center = [0.0f64; 2];
    for &v in &face.verts {
        for (j, d) in dist_buf.iter_mut().enumerate() {
            *d = emb.distances.dist(j, v);
        }
        for k in 0..2 {
            center[k] += emb.iso.embed_coord(&dist_buf, k);
        }
    }
    center[0] /= 3.0;
    center[1] /= 3.0;

    let mut error = 0.0;
    for (j, lm_uv) in emb.landmark_uv.iter().enumerate() {
        let dx = center[0] - lm_uv[0];
        let dy = center[1] - lm_uv[1];
        let euclid = (dx * dx + dy * dy).sqrt();
        let geodesic = face
            .verts
            .iter()
            .map(|&v| emb.distances.dist(j, v))
            .sum::<f64>()
            / 3.0;
        let diff = euclid - geodesic;
        error += diff * diff;
    }
    error / n as f64
}

/// Full boundary optimization: angle capacities blended with the distortion
/// difference between the two adjacent sub-chart embeddings.
pub fn optimize_boundary_by_stretch(
    chart: &Chart,
    base: &BaseMesh,
    labels: &mut [u32],
    label_count: usize,
    engine: EngineChoice,
    cfg: &GraphCutCfg,
) {
    let Some((angle_dist, avg_angle)) = edge_angle_distance(&chart.mesh, base) else {
        return;
    };
    let fuzzy = fuzzy_region(&chart.mesh, labels, label_count, cfg.fuzzy_percent);
    let embeddings: Vec<Option<RegionEmbedding>> = (0..label_count as u32)
        .map(|r| region_embedding(&chart.mesh, base, labels, r, engine))
        .collect();

    for pair in adjacent_label_pairs(&chart.mesh, labels) {
        // Regions too shallow to carry a fuzzy band keep their boundary.
        if fuzzy.region_depth[pair.0 as usize] < 1 && fuzzy.region_depth[pair.1 as usize] < 1 {
            continue;
        }
        let (Some(e1), Some(e2)) = (
            embeddings[pair.0 as usize].as_ref(),
            embeddings[pair.1 as usize].as_ref(),
        ) else {
            // Fall back to the angle term alone.
            cut_one_boundary(
                &chart.mesh,
                labels,
                &fuzzy.fuzzy_face,
                pair,
                &angle_dist,
                avg_angle,
                &[],
                cfg.stretch_weight,
            );
            continue;
        };
        let mut stretch_diff = vec![0.0f64; chart.mesh.face_count()];
        for face in &chart.mesh.faces {
            let l = labels[face.id as usize];
            if fuzzy.fuzzy_face[face.id as usize] && (l == pair.0 || l == pair.1) {
                let d1 = face_distortion(&chart.mesh, face.id, e1);
                let d2 = face_distortion(&chart.mesh, face.id, e2);
                stretch_diff[face.id as usize] = (d1 - d2).abs();
            }
        }
        cut_one_boundary(
            &chart.mesh,
            labels,
            &fuzzy.fuzzy_face,
            pair,
            &angle_dist,
            avg_angle,
            &stretch_diff,
            cfg.stretch_weight,
        );
    }
}

/// Bipartition guarantee: when a two-way cut leaves a side empty or
/// fragmented, rebuild the boundary from the longest watershed chain and
/// re-grow both labels from it.
pub fn ensure_bipartition(mesh: &ChartMesh, labels: &mut [u32]) {
    // Watershed edges, split into marginal (touching the chart boundary)
    // and internal ones.
    let mut internal: Vec<u32> = Vec::new();
    let mut marginal: Vec<u32> = Vec::new();
    for edge in &mesh.edges {
        if edge.is_boundary {
            continue;
        }
        if labels[edge.faces[0] as usize] != labels[edge.faces[1] as usize] {
            if mesh.verts[edge.verts[0] as usize].is_boundary
                || mesh.verts[edge.verts[1] as usize].is_boundary
            {
                marginal.push(edge.id);
            } else {
                internal.push(edge.id);
            }
        }
    }
    if marginal.is_empty() {
        return;
    }

    // Chain watershed edges between two boundary anchors; keep the longest.
    let mut best_path: Vec<u32> = Vec::new();
    let mut best_len = f64::NEG_INFINITY;
    while let Some(start) = marginal.first().copied() {
        marginal.remove(0);
        let mut path = vec![start];
        let mut length = mesh.edges[start as usize].length;
        let edge = &mesh.edges[start as usize];
        let mut cursor = if mesh.verts[edge.verts[0] as usize].is_boundary {
            edge.verts[1]
        } else {
            edge.verts[0]
        };
        let mut closed = mesh.verts[cursor as usize].is_boundary;
        while !closed && !(marginal.is_empty() && internal.is_empty()) {
            if let Some(i) = marginal
                .iter()
                .position(|&e| mesh.edges[e as usize].has_vert(cursor))
            {
                let e = marginal.remove(i);
                path.push(e);
                length += mesh.edges[e as usize].length;
                closed = true;
                break;
            }
            match internal
                .iter()
                .position(|&e| mesh.edges[e as usize].has_vert(cursor))
            {
                Some(i) => {
                    let e = internal.remove(i);
                    cursor = mesh.edges[e as usize].other_vert(cursor);
                    length += mesh.edges[e as usize].length;
                    path.push(e);
                }
                None => break,
            }
        }
        if closed && length > best_len {
            best_len = length;
            best_path = path;
        }
    }
    if best_path.is_empty() {
        return;
    }

    // Re-grow labels from the chosen chain's side faces.
    let mut settled = vec![false; mesh.face_count()];
    let mut queue = VecDeque::new();
    for &e in &best_path {
        for &f in &mesh.edges[e as usize].faces {
            if f != INVALID_ID && !settled[f as usize] {
                settled[f as usize] = true;
                queue.push_back(f);
            }
        }
    }
    while let Some(f) = queue.pop_front() {
        let face = &mesh.faces[f as usize];
        for &e in &face.edges {
            let edge = &mesh.edges[e as usize];
            if edge.is_boundary {
                continue;
            }
            let adj = edge.other_face(f);
            if !settled[adj as usize] {
                settled[adj as usize] = true;
                labels[adj as usize] = labels[f as usize];
                queue.push_back(adj);
            }
        }
    }
}
