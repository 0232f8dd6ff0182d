//! Recursive chart splitting: shape classification, representative
//! selection, face clustering, and label validity enforcement.
//!
//! A chart is split by assigning every face a sub-chart label. Special
//! shapes (cylinders, longhorns) get dedicated label rules driven by the
//! Isomap spectrum; everything else clusters faces around representative
//! landmarks by combined distance. Labels then pass through smoothing, the
//! user splittability rule, the non-manifold fix-up, and the graph-cut
//! boundary optimizer before the children are materialized.

use std::collections::VecDeque;

use crate::atlas::AtlasError;
use crate::geodesic::{landmark_distances, EngineChoice};
use crate::isomap::{
    embed_vertices, reserve_farthest_pair, select_landmarks, Isomap, MIN_LANDMARK_NUMBER,
    ROOT_CHART_EIGEN_DIMENSION,
};
use crate::mesh::{BaseMesh, ChartMesh, INVALID_ID};

use super::graphcut::{
    ensure_bipartition, optimize_boundary_by_angle, optimize_boundary_by_stretch, GraphCutCfg,
};
use super::types::{Chart, IsomapState};

/// Partitioner tunables. The shape-classification thresholds are empirical
/// and kept at their historical values.
#[derive(Clone, Copy, Debug)]
pub struct PartitionCfg {
    pub min_landmarks: usize,
    /// Eigen dimensions computed for root / sub charts.
    pub root_eigen_dim: usize,
    pub sub_eigen_dim: usize,
    /// Spectral energy share defining the primary dimension.
    pub primary_energy: f64,
    /// Cylinder detection: λ₀/λ₂ < a, λ₀/λ₃ > b, λ₁/λ₂ < c, λ₂/λ₃ > d.
    pub cylinder_ratio_02: f64,
    pub cylinder_ratio_03: f64,
    pub cylinder_ratio_12: f64,
    pub cylinder_ratio_23: f64,
    /// Longhorn detection: λ₀/λ₁ > this, single boundary.
    pub longhorn_ratio_01: f64,
    /// Near-zero eigenvalue guard.
    pub eigen_zero_eps: f64,
    /// Label-smoothing sweeps after clustering.
    pub smoothing_passes: usize,
}

impl Default for PartitionCfg {
    fn default() -> Self {
        Self {
            min_landmarks: MIN_LANDMARK_NUMBER,
            root_eigen_dim: ROOT_CHART_EIGEN_DIMENSION,
            sub_eigen_dim: 4,
            primary_energy: 0.90,
            cylinder_ratio_02: 20.0,
            cylinder_ratio_03: 18.0,
            cylinder_ratio_12: 5.0,
            cylinder_ratio_23: 2.0,
            longhorn_ratio_01: 10.0,
            eigen_zero_eps: 1e-6,
            smoothing_passes: 3,
        }
    }
}

/// Result of one split attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// Children as face-id lists in the parent chart's id space; each list
    /// is edge-connected and non-empty.
    Split(Vec<Vec<u32>>),
    /// No valid split exists (single face, or clustering collapsed).
    NotSplittable,
    /// The user splittability rule pins every face together: no partition
    /// of this chart can honor the false edges.
    Blocked,
}

/// Compute (or reuse) the chart's landmark Isomap state.
pub fn prepare_isomap(
    chart: &mut Chart,
    base: &BaseMesh,
    cfg: &PartitionCfg,
    engine: EngineChoice,
) -> Result<(), AtlasError> {
    if chart.isomap.is_some() {
        return Ok(());
    }
    let mut landmarks = select_landmarks(&chart.mesh, cfg.min_landmarks);
    let mut distances = landmark_distances(&chart.mesh, base, &landmarks, engine);
    reserve_farthest_pair(&mut landmarks, &mut distances);

    let n = landmarks.len();
    let mut block = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            block[i * n + j] = distances.dist(i, landmarks[j]);
        }
    }
    let max_dim = if chart.is_sub_chart {
        cfg.sub_eigen_dim
    } else {
        cfg.root_eigen_dim
    };
    let iso = Isomap::new(n, &block, max_dim)?;
    let primary_dim = iso.primary_dimension(cfg.primary_energy).max(1);
    // Keep a third axis around when the spectrum has one: the cylinder
    // split reads it.
    let dim = iso.dimension.min(primary_dim.max(3)).max(1);
    let coords = embed_vertices(&chart.mesh, &iso, &landmarks, &distances, dim);

    chart.landmarks = landmarks;
    chart.mark_landmarks();
    chart.isomap = Some(IsomapState {
        iso,
        coords,
        dim,
        primary_dim,
        distances,
    });
    Ok(())
}

/// Try to split `chart` into two or more children.
pub fn partition_chart(
    chart: &mut Chart,
    base: &BaseMesh,
    cfg: &PartitionCfg,
    cut_cfg: &GraphCutCfg,
    engine: EngineChoice,
) -> Result<PartitionOutcome, AtlasError> {
    if chart.face_count() <= 1 {
        return Ok(PartitionOutcome::NotSplittable);
    }
    prepare_isomap(chart, base, cfg, engine)?;
    let boundaries = crate::mesh::boundary_loops(&chart.mesh).len();

    // Special shapes first.
    if let Some(labels) = try_special_shape(chart, base, cfg, cut_cfg, engine, boundaries)? {
        return finish_labels(chart, labels);
    }

    // General shape: representatives, clustering, smoothing, graph cut.
    general_partition(chart, base, cfg, cut_cfg, engine)
}

/// Cylinder / longhorn detection and labeling.
fn try_special_shape(
    chart: &mut Chart,
    base: &BaseMesh,
    cfg: &PartitionCfg,
    cut_cfg: &GraphCutCfg,
    engine: EngineChoice,
    boundaries: usize,
) -> Result<Option<Vec<u32>>, AtlasError> {
    let Some(state) = chart.isomap.as_ref() else {
        return Ok(None);
    };
    let iso = &state.iso;
    if iso.dimension < 3
        || iso.eigen_value(1) <= cfg.eigen_zero_eps
        || iso.eigen_value(2) <= cfg.eigen_zero_eps
    {
        return Ok(None);
    }
    let r01 = iso.eigen_value(0) / iso.eigen_value(1);
    let r02 = iso.eigen_value(0) / iso.eigen_value(2);
    let r12 = iso.eigen_value(1) / iso.eigen_value(2);

    let mut is_cylinder = false;
    if iso.dimension > 3 && iso.eigen_value(3) > cfg.eigen_zero_eps {
        let r03 = iso.eigen_value(0) / iso.eigen_value(3);
        let r23 = iso.eigen_value(2) / iso.eigen_value(3);
        is_cylinder = r02 < cfg.cylinder_ratio_02
            && r03 > cfg.cylinder_ratio_03
            && r12 < cfg.cylinder_ratio_12
            && r23 > cfg.cylinder_ratio_23;
    }

    // The extreme-vertex probe needs a single boundary loop; a multi-loop
    // cylinder is accepted on the spectrum alone. A chart passing both
    // tests partitions as a cylinder.
    let mut tip = None;
    if boundaries == 1 {
        let is_longhorn = r01 > cfg.longhorn_ratio_01;
        if !is_cylinder && !is_longhorn {
            return Ok(None);
        }
        // Probe: all boundary distances measured from the opposite interior
        // extreme must stay inside [avg/2, 2·avg].
        let Some(probe) = extreme_vertex(chart) else {
            return Ok(None);
        };
        let field = engine.field(&chart.mesh, base, probe, false);
        let mut min_d = f64::INFINITY;
        let mut max_d = f64::NEG_INFINITY;
        let mut total = 0.0;
        let mut count = 0usize;
        for v in &chart.mesh.verts {
            if v.is_boundary {
                let d = field.geodesic[v.id as usize];
                min_d = min_d.min(d);
                max_d = max_d.max(d);
                total += d;
                count += 1;
            }
        }
        if count == 0 {
            return Ok(None);
        }
        let avg = total / count as f64;
        if !(min_d > avg / 2.0 && max_d < avg * 2.0) {
            return Ok(None);
        }
        tip = Some(probe);
    } else if !is_cylinder {
        return Ok(None);
    }

    let mut labels;
    if is_cylinder {
        // Split by the sign of the third principal axis; fall back to the
        // second if the halves are too lopsided.
        labels = group_by_coord_sign(&chart.mesh, &state.coords, state.dim, 2);
        if sign_split_imbalanced(&labels) {
            labels = group_by_coord_sign(&chart.mesh, &state.coords, state.dim, 1);
        }
        if sign_split_imbalanced(&labels) {
            return Ok(None);
        }
        smooth_labels(&chart.mesh, &mut labels, 2, cfg.smoothing_passes);
        let Validity::Valid { .. } = make_partition_valid(chart, &mut labels, 2)? else {
            return Ok(None);
        };
        optimize_boundary_by_stretch(chart, base, &mut labels, 2, engine, cut_cfg);
    } else {
        // Longhorn: the tip vertex's one-ring is one seed chart.
        let Some(extreme) = tip else {
            return Ok(None);
        };
        labels = vec![1u32; chart.face_count()];
        for &f in &chart.mesh.verts[extreme as usize].face_adj {
            labels[f as usize] = 0;
        }
        let Validity::Valid { .. } = make_partition_valid(chart, &mut labels, 2)? else {
            return Ok(None);
        };
        optimize_boundary_by_stretch(chart, base, &mut labels, 2, engine, cut_cfg);
    }
    let backup = labels.clone();
    match make_partition_valid(chart, &mut labels, 2)? {
        Validity::Valid { needs_clean } => {
            chart.needs_clean = needs_clean;
            Ok(Some(labels))
        }
        Validity::Invalid => Ok(Some(backup)),
    }
}

/// Probe anchor: find the boundary vertex with the largest |u| along the
/// first embedding axis, then step to the interior vertex at the opposite
/// u extreme (the tip of a longhorn, the far cap of a cylinder).
fn extreme_vertex(chart: &Chart) -> Option<u32> {
    let state = chart.isomap.as_ref()?;
    let u_of = |id: u32| state.coords[id as usize * state.dim];
    let mut rim = None;
    let mut rim_u = f64::NEG_INFINITY;
    for v in &chart.mesh.verts {
        if v.is_boundary && u_of(v.id).abs() > rim_u {
            rim_u = u_of(v.id).abs();
            rim = Some(v.id);
        }
    }
    let rim_positive = u_of(rim?) > 0.0;
    let mut best = None;
    let mut best_u = if rim_positive {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    };
    for v in &chart.mesh.verts {
        if v.is_boundary {
            continue;
        }
        let u = u_of(v.id);
        if (rim_positive && u < best_u) || (!rim_positive && u > best_u) {
            best_u = u;
            best = Some(v.id);
        }
    }
    best
}

fn group_by_coord_sign(mesh: &ChartMesh, coords: &[f64], dim: usize, axis: usize) -> Vec<u32> {
    mesh.faces
        .iter()
        .map(|face| {
            let sum: f64 = face
                .verts
                .iter()
                .map(|&v| coords[v as usize * dim + axis])
                .sum();
            u32::from(sum >= 0.0)
        })
        .collect()
}

fn sign_split_imbalanced(labels: &[u32]) -> bool {
    let pos = labels.iter().filter(|&&l| l == 1).count();
    let neg = labels.len() - pos;
    pos == 0 || neg == 0 || pos / neg > 2 || neg / pos > 2
}

/// General clustering split around representative landmarks.
fn general_partition(
    chart: &mut Chart,
    base: &BaseMesh,
    cfg: &PartitionCfg,
    cut_cfg: &GraphCutCfg,
    engine: EngineChoice,
) -> Result<PartitionOutcome, AtlasError> {
    let reps = {
        let state = chart.isomap.as_ref().expect("isomap prepared");
        let mut reps = representative_landmarks(chart, state);
        if chart.is_sub_chart {
            reps.truncate(2);
        } else {
            drop_close_representatives(chart, state, &mut reps);
        }
        reps
    };
    if reps.len() < 2 {
        return per_face_partition(chart);
    }
    let label_count = reps.len();

    let mut labels = cluster_faces(chart, &reps);
    smooth_labels(&chart.mesh, &mut labels, label_count, cfg.smoothing_passes);
    match make_partition_valid(chart, &mut labels, label_count)? {
        Validity::Valid { needs_clean } => chart.needs_clean = needs_clean,
        Validity::Invalid => return Ok(PartitionOutcome::Blocked),
    }
    if single_label(&labels) {
        return per_face_partition(chart);
    }

    // Boundary optimization; an invalid cut result rolls back.
    let backup = labels.clone();
    if chart.is_sub_chart {
        optimize_boundary_by_stretch(chart, base, &mut labels, label_count, engine, cut_cfg);
    } else {
        optimize_boundary_by_angle(chart, base, &mut labels, label_count, cut_cfg);
    }
    if label_count == 2 {
        ensure_bipartition(&chart.mesh, &mut labels);
    }
    match make_partition_valid(chart, &mut labels, label_count)? {
        Validity::Valid { needs_clean } => chart.needs_clean = needs_clean,
        Validity::Invalid => labels = backup,
    }
    if single_label(&labels) {
        return per_face_partition(chart);
    }
    finish_labels(chart, labels)
}

/// Every face its own child: the fallback when clustering collapses.
fn per_face_partition(chart: &Chart) -> Result<PartitionOutcome, AtlasError> {
    if chart.face_count() <= 1 {
        return Ok(PartitionOutcome::NotSplittable);
    }
    if chart.mesh.edges.iter().any(|e| !e.splittable) {
        // Splitting every face apart would cut the false edges.
        return Ok(PartitionOutcome::Blocked);
    }
    Ok(PartitionOutcome::Split(
        (0..chart.face_count() as u32).map(|f| vec![f]).collect(),
    ))
}

fn single_label(labels: &[u32]) -> bool {
    labels.windows(2).all(|w| w[0] == w[1])
}

/// Per principal dimension, the landmarks with extreme coordinates.
/// Returned values are indices into the chart's landmark list.
fn representative_landmarks(chart: &Chart, state: &IsomapState) -> Vec<u32> {
    let mut reps: Vec<u32> = Vec::new();
    for d in 0..state.primary_dim.min(state.dim) {
        let mut max_i = None;
        let mut min_i = None;
        let mut max_c = f64::NEG_INFINITY;
        let mut min_c = f64::INFINITY;
        for (i, &lm) in chart.landmarks.iter().enumerate() {
            let c = state.coords[lm as usize * state.dim + d];
            if c > max_c {
                max_c = c;
                max_i = Some(i as u32);
            }
            if c < min_c {
                min_c = c;
                min_i = Some(i as u32);
            }
        }
        if let (Some(a), Some(b)) = (max_i, min_i) {
            if !reps.contains(&a) {
                reps.push(a);
            }
            if !reps.contains(&b) {
                reps.push(b);
            }
        }
    }
    reps
}

/// Greedy farthest-point keep: each kept representative must stand at
/// least one chart radius away from all previously kept ones.
fn drop_close_representatives(chart: &Chart, state: &IsomapState, reps: &mut Vec<u32>) {
    if reps.len() <= 2 {
        return;
    }
    let radius = (chart.area_3d / (state.primary_dim as f64 + 1.0)).sqrt();
    let mut keep = 2usize;
    while keep < reps.len() {
        let mut best_j = None;
        let mut best_d = 0.0f64;
        for j in keep..reps.len() {
            let mut min_d = f64::INFINITY;
            for &kept in reps.iter().take(keep) {
                let d = state
                    .distances
                    .geo(kept as usize, chart.landmarks[reps[j] as usize]);
                min_d = min_d.min(d);
            }
            if min_d > best_d {
                best_d = min_d;
                best_j = Some(j);
            }
        }
        let Some(j) = best_j else { break };
        if best_d < radius {
            break;
        }
        reps.swap(keep, j);
        keep += 1;
    }
    reps.truncate(keep);
}

/// Assign every face to the representative minimizing the summed combined
/// distance of its three corners.
fn cluster_faces(chart: &Chart, reps: &[u32]) -> Vec<u32> {
    let state = chart.isomap.as_ref().expect("isomap prepared");
    chart
        .mesh
        .faces
        .iter()
        .map(|face| {
            let mut best = 0u32;
            let mut best_d = f64::INFINITY;
            for (slot, &rep) in reps.iter().enumerate() {
                let d: f64 = face
                    .verts
                    .iter()
                    .map(|&v| state.distances.dist(rep as usize, v))
                    .sum();
                if d < best_d {
                    best_d = d;
                    best = slot as u32;
                }
            }
            best
        })
        .collect()
}

/// Label smoothing: a face whose label disagrees with at least two edge
/// neighbors adopts the majority neighbor label; full three-way ties go to
/// the neighbor across the longest shared edge. Charts are visited smallest
/// first so tiny islands dissolve into their surroundings.
fn smooth_labels(mesh: &ChartMesh, labels: &mut [u32], label_count: usize, passes: usize) {
    for _ in 0..passes {
        let mut counts = vec![0usize; label_count];
        for &l in labels.iter() {
            counts[l as usize] += 1;
        }
        let mut order: Vec<u32> = (0..label_count as u32).collect();
        order.sort_by_key(|&l| counts[l as usize]);
        for &l in &order {
            for face in &mesh.faces {
                if labels[face.id as usize] != l {
                    continue;
                }
                smooth_one_face(mesh, labels, face.id);
            }
        }
    }
}

fn smooth_one_face(mesh: &ChartMesh, labels: &mut [u32], face_id: u32) {
    let face = &mesh.faces[face_id as usize];
    let own = labels[face_id as usize];
    let mut neighbor = [own; 3];
    let mut foreign = 0usize;
    for (k, &e) in face.edges.iter().enumerate() {
        let edge = &mesh.edges[e as usize];
        if edge.is_boundary {
            neighbor[k] = own;
        } else {
            neighbor[k] = labels[edge.other_face(face_id) as usize];
            if neighbor[k] != own {
                foreign += 1;
            }
        }
    }
    if foreign < 2 {
        return;
    }
    // Prefer the label shared by two neighbors.
    for k in 0..3 {
        if neighbor[k] != own
            && (neighbor[k] == neighbor[(k + 1) % 3] || neighbor[k] == neighbor[(k + 2) % 3])
        {
            labels[face_id as usize] = neighbor[k];
            return;
        }
    }
    if foreign == 3 || (foreign == 2 && neighbor.iter().all(|&l| l != own)) {
        // All distinct: take the neighbor across the longest edge.
        let longest = (0..3)
            .max_by(|&a, &b| {
                mesh.edges[face.edges[a] as usize]
                    .length
                    .partial_cmp(&mesh.edges[face.edges[b] as usize].length)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        labels[face_id as usize] = neighbor[longest];
    } else if foreign == 2 {
        let longest = (0..3)
            .filter(|&k| neighbor[k] != own)
            .max_by(|&a, &b| {
                mesh.edges[face.edges[a] as usize]
                    .length
                    .partial_cmp(&mesh.edges[face.edges[b] as usize].length)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        labels[face_id as usize] = neighbor[longest];
    }
}

/// Result of the validity enforcement.
enum Validity {
    Valid { needs_clean: bool },
    Invalid,
}

/// Enforce the user splittability rule and the manifold rule, iterating the
/// two fix-ups until stable. The user rule is checked first each round.
fn make_partition_valid(
    chart: &Chart,
    labels: &mut [u32],
    label_count: usize,
) -> Result<Validity, AtlasError> {
    let max_iterations = label_count.max(2);
    let mut manifold = false;
    let mut needs_clean = false;
    let mut iteration = 0usize;
    loop {
        let (modified_user, satisfied, has_false_edge) =
            satisfy_user_rule(&chart.mesh, labels)?;
        if !satisfied {
            return Ok(Validity::Invalid);
        }
        if iteration + 1 >= max_iterations {
            // Cannot honor both rules at once; keep the labels and let the
            // child build clean up remaining non-manifold spots.
            return Ok(Validity::Valid { needs_clean: true });
        }
        let mut modified_manifold = false;
        if modified_user || !manifold {
            let converged;
            (modified_manifold, converged) =
                satisfy_manifold_rule(&chart.mesh, labels, max_iterations);
            manifold = converged;
        }
        if manifold && (!modified_manifold || !has_false_edge) {
            return Ok(Validity::Valid { needs_clean });
        }
        needs_clean = true;
        iteration += 1;
        if !modified_manifold || iteration >= max_iterations {
            return Ok(Validity::Valid { needs_clean: true });
        }
    }
}

/// Faces joined by non-splittable edges must share one label. Returns
/// (modified, satisfiable, has_false_edge).
fn satisfy_user_rule(
    mesh: &ChartMesh,
    labels: &mut [u32],
) -> Result<(bool, bool, bool), AtlasError> {
    let mut has_false_edge = false;
    for edge in &mesh.edges {
        if !edge.splittable {
            if edge.is_boundary {
                return Err(AtlasError::topology("false edge on a boundary edge"));
            }
            has_false_edge = true;
        }
    }
    if !has_false_edge {
        return Ok((false, true, false));
    }

    // Congener groups: connected components over non-splittable edges.
    let mut group_of = vec![INVALID_ID; mesh.face_count()];
    let mut groups: Vec<Vec<u32>> = Vec::new();
    for edge in &mesh.edges {
        if edge.splittable {
            continue;
        }
        for &f in &edge.faces {
            if f != INVALID_ID && group_of[f as usize] == INVALID_ID {
                let gid = groups.len() as u32;
                let mut group = vec![f];
                group_of[f as usize] = gid;
                let mut head = 0usize;
                while head < group.len() {
                    let cur = group[head];
                    head += 1;
                    for &e in &mesh.faces[cur as usize].edges {
                        let ce = &mesh.edges[e as usize];
                        if ce.splittable {
                            continue;
                        }
                        let adj = ce.other_face(cur);
                        if adj != INVALID_ID && group_of[adj as usize] == INVALID_ID {
                            group_of[adj as usize] = gid;
                            group.push(adj);
                        }
                    }
                }
                groups.push(group);
            }
        }
    }

    // Majority label inside each group.
    let mut modified = false;
    for group in &groups {
        let mut tally: Vec<(u32, usize)> = Vec::new();
        for &f in group {
            let l = labels[f as usize];
            match tally.iter_mut().find(|t| t.0 == l) {
                Some(t) => t.1 += 1,
                None => tally.push((l, 1)),
            }
        }
        if tally.len() <= 1 {
            continue;
        }
        tally.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let target = tally[0].0;
        for &f in group {
            labels[f as usize] = target;
        }
        modified = true;
    }

    // If propagation collapsed everything onto one label, retarget the
    // first group. A group spanning the whole chart means no split can
    // honor the rule.
    if single_label(labels) {
        match groups.first() {
            Some(group) if group.len() < mesh.face_count() => {
                let other = u32::from(labels[0] == 0);
                for &f in group {
                    labels[f as usize] = other;
                }
                modified = true;
            }
            _ => return Ok((modified, false, true)),
        }
    }
    Ok((modified, true, true))
}

/// At every vertex, faces of one label must form a single edge-connected
/// fan. Flips the smaller offending component to the other candidate label.
/// Returns (modified, converged).
fn satisfy_manifold_rule(
    mesh: &ChartMesh,
    labels: &mut [u32],
    max_iterations: usize,
) -> (bool, bool) {
    let mut modified_any = false;
    let mut iteration = 0usize;
    loop {
        let mut modified_pass = false;
        for vert in &mesh.verts {
            if fix_vertex_star(mesh, labels, vert.id) {
                modified_pass = true;
            }
        }
        modified_any |= modified_pass;
        iteration += 1;
        if !modified_pass {
            return (modified_any, true);
        }
        if iteration > max_iterations {
            return (modified_any, false);
        }
    }
}

/// Check one vertex star; returns whether a label was flipped.
fn fix_vertex_star(mesh: &ChartMesh, labels: &mut [u32], vert: u32) -> bool {
    let star = &mesh.verts[vert as usize].face_adj;
    if star.len() < 2 {
        return false;
    }
    let first = labels[star[0] as usize];
    let Some(&second_face) = star.iter().find(|&&f| labels[f as usize] != first) else {
        return false;
    };
    let candidate1 = first;
    let candidate2 = labels[second_face as usize];

    let mut checked: Vec<u32> = Vec::new();
    for (i, &f) in star.iter().enumerate() {
        let label = labels[f as usize];
        if checked.contains(&label) {
            continue;
        }
        checked.push(label);

        // Faces of this label at the vertex, split into the component
        // reachable from `f` and the rest.
        let mut connected = vec![f];
        let mut rest: Vec<u32> = star[i + 1..]
            .iter()
            .copied()
            .filter(|&g| labels[g as usize] == label)
            .collect();
        let mut head = 0usize;
        while head < connected.len() && !rest.is_empty() {
            let cur = connected[head];
            head += 1;
            for &e in &mesh.faces[cur as usize].edges {
                let edge = &mesh.edges[e as usize];
                if edge.is_boundary {
                    continue;
                }
                let adj = edge.other_face(cur);
                if let Some(pos) = rest.iter().position(|&g| g == adj) {
                    rest.swap_remove(pos);
                    connected.push(adj);
                }
            }
        }
        if rest.is_empty() {
            continue;
        }
        // Non-manifold: flip the smaller side to the other candidate.
        let target = if label == candidate1 {
            candidate2
        } else {
            candidate1
        };
        let flip = if rest.len() > connected.len() {
            &connected
        } else {
            &rest
        };
        for &g in flip {
            labels[g as usize] = target;
        }
        return true;
    }
    false
}

/// Group labeled faces into children, splitting disconnected label regions
/// into separate children so every child is edge-connected.
fn finish_labels(chart: &Chart, labels: Vec<u32>) -> Result<PartitionOutcome, AtlasError> {
    if single_label(&labels) {
        return Ok(PartitionOutcome::NotSplittable);
    }
    let mesh = &chart.mesh;
    let mut assigned = vec![false; mesh.face_count()];
    let mut children: Vec<Vec<u32>> = Vec::new();
    for f in 0..mesh.face_count() as u32 {
        if assigned[f as usize] {
            continue;
        }
        let label = labels[f as usize];
        let mut component = vec![f];
        assigned[f as usize] = true;
        let mut queue = VecDeque::from([f]);
        while let Some(cur) = queue.pop_front() {
            for &e in &mesh.faces[cur as usize].edges {
                let edge = &mesh.edges[e as usize];
                if edge.is_boundary {
                    continue;
                }
                let adj = edge.other_face(cur);
                if !assigned[adj as usize] && labels[adj as usize] == label {
                    assigned[adj as usize] = true;
                    component.push(adj);
                    queue.push_back(adj);
                }
            }
        }
        children.push(component);
    }
    if children.len() < 2 {
        return Ok(PartitionOutcome::NotSplittable);
    }
    Ok(PartitionOutcome::Split(children))
}
