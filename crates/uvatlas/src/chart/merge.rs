//! Merging small charts back together after partitioning.
//!
//! Charts are visited smallest first. Each one tries its neighbors in
//! order of average-normal similarity: the tentative union must keep a
//! clean topology (shared vertices forming one boundary chain, at least one
//! boundary loop left), must parameterize without folds, and under the
//! merge-stretch limit must not push the atlas-wide stretch past the
//! target. A rejected candidate simply leaves both charts in place.

use nalgebra::Vector3;

use crate::atlas::AtlasError;
use crate::geodesic::EngineChoice;
use crate::mesh::{boundary_loops, build_connectivity, BaseMesh, ProtoMesh, INVALID_ID};
use crate::numeric::MaxHeap;

use super::optimize::{optimize_chart_stretch, OptimizeCfg};
use super::param::{parameterize_chart, ParamOutcome};
use super::partition::{prepare_isomap, PartitionCfg};
use super::types::Chart;

#[derive(Clone, Copy, Debug)]
pub struct MergeCfg {
    /// A merge may not produce a chart above this share of all faces...
    pub max_merge_ratio: f64,
    /// ...unless that cap is below this absolute face count.
    pub max_merge_faces: usize,
    /// Skip merging entirely below this many charts.
    pub min_charts: usize,
}

impl Default for MergeCfg {
    fn default() -> Self {
        Self {
            max_merge_ratio: 0.25,
            max_merge_faces: 1024,
            min_charts: 4,
        }
    }
}

/// Reduce the chart count by merging adjacent small charts.
///
/// `root_face_chart[f]` maps every root face to its chart index and is kept
/// up to date; `expected_stretch` is the internal average-L² target;
/// `max_chart_count` (0 = unlimited) caps how many merges run.
#[allow(clippy::too_many_arguments)]
pub fn merge_small_charts(
    charts: &mut Vec<Chart>,
    base: &BaseMesh,
    root_adjacency: &[[u32; 3]],
    expected_stretch: f64,
    max_chart_count: usize,
    limit_merge_stretch: bool,
    cfg: &MergeCfg,
    part_cfg: &PartitionCfg,
    opt_cfg: &OptimizeCfg,
    engine: EngineChoice,
) -> Result<(), AtlasError> {
    if charts.len() < cfg.min_charts {
        return Ok(());
    }
    let n = charts.len();
    let mut slots: Vec<Option<Chart>> = charts.drain(..).map(Some).collect();

    // Chart adjacency through root-face adjacency.
    let mut chart_of_face = vec![INVALID_ID; base.face_count];
    for (ci, chart) in slots.iter().enumerate() {
        for face in &chart.as_ref().unwrap().mesh.faces {
            chart_of_face[face.root_id as usize] = ci as u32;
        }
    }
    let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); n];
    for (f, neighbors) in root_adjacency.iter().enumerate() {
        let a = chart_of_face[f];
        if a == INVALID_ID {
            continue;
        }
        for &g in neighbors {
            if g == INVALID_ID {
                continue;
            }
            let b = chart_of_face[g as usize];
            if b != INVALID_ID && b != a && !adjacency[a as usize].contains(&b) {
                adjacency[a as usize].push(b);
            }
        }
    }

    let mut normals: Vec<Vector3<f64>> = slots
        .iter()
        .map(|c| average_normal(c.as_ref().unwrap(), base))
        .collect();

    let max_faces = ((base.face_count as f64 * cfg.max_merge_ratio) as usize)
        .max(cfg.max_merge_faces);
    let mut merges_left = if max_chart_count > 0 && max_chart_count < n {
        n - max_chart_count
    } else {
        usize::MAX
    };

    // Smallest chart first; a successful merge re-queues the survivor.
    let mut heap = MaxHeap::with_capacity(n);
    let mut can_merge = vec![true; n];
    for (i, slot) in slots.iter().enumerate() {
        let chart = slot.as_ref().unwrap();
        if !adjacency[i].is_empty() && chart.area_3d > 0.0 {
            heap.push(-(chart.face_count() as f64), i as u32);
        }
    }

    while let Some((_, main)) = heap.pop() {
        let main = main as usize;
        if slots[main].is_none() || merges_left == 0 {
            continue;
        }
        // Neighbors ordered by normal agreement.
        let mut candidates: Vec<u32> = adjacency[main]
            .iter()
            .copied()
            .filter(|&j| slots[j as usize].is_some())
            .collect();
        candidates.sort_by(|&a, &b| {
            let da = normals[main].dot(&normals[a as usize]);
            let db = normals[main].dot(&normals[b as usize]);
            db.partial_cmp(&da)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let mut merged_with = None;
        for j in candidates {
            let j = j as usize;
            if !can_merge[j] {
                continue;
            }
            let other = slots[j].as_ref().unwrap();
            if other.area_3d <= 0.0 {
                continue;
            }
            let main_chart = slots[main].as_ref().unwrap();
            if main_chart.face_count() + other.face_count() > max_faces {
                continue;
            }
            if let Some(merged) = try_merge_pair(
                main_chart,
                other,
                &slots,
                base,
                expected_stretch,
                limit_merge_stretch,
                part_cfg,
                opt_cfg,
                engine,
            )? {
                slots[main] = Some(merged);
                slots[j] = None;
                merged_with = Some(j);
                break;
            }
        }

        match merged_with {
            Some(j) => {
                // Rewire adjacency from the absorbed chart to the survivor.
                let absorbed: Vec<u32> = std::mem::take(&mut adjacency[j]);
                for &k in &absorbed {
                    let k = k as usize;
                    adjacency[k].retain(|&x| x != j as u32);
                    if k != main && !adjacency[k].contains(&(main as u32)) {
                        adjacency[k].push(main as u32);
                    }
                }
                for k in absorbed {
                    if k != main as u32 && !adjacency[main].contains(&k) {
                        adjacency[main].push(k);
                    }
                }
                adjacency[main].retain(|&x| x != j as u32 && x != main as u32);
                normals[main] = average_normal(slots[main].as_ref().unwrap(), base);
                merges_left -= 1;
                heap.push(
                    -(slots[main].as_ref().unwrap().face_count() as f64),
                    main as u32,
                );
            }
            None => {
                can_merge[main] = false;
            }
        }
    }

    charts.extend(slots.into_iter().flatten());
    Ok(())
}

/// Area-weighted average face normal.
fn average_normal(chart: &Chart, base: &BaseMesh) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    for face in &chart.mesh.faces {
        let root = face.root_id as usize;
        normal += base.face_normals[root] * base.face_areas[root];
    }
    let len = normal.norm();
    if len > 0.0 {
        normal / len
    } else {
        Vector3::zeros()
    }
}

/// Attempt one merge; `None` means the candidate was rejected.
#[allow(clippy::too_many_arguments)]
fn try_merge_pair(
    c1: &Chart,
    c2: &Chart,
    slots: &[Option<Chart>],
    base: &BaseMesh,
    expected_stretch: f64,
    limit_merge_stretch: bool,
    part_cfg: &PartitionCfg,
    opt_cfg: &OptimizeCfg,
    engine: EngineChoice,
) -> Result<Option<Chart>, AtlasError> {
    if !shared_verts_form_single_chain(c1, c2) {
        return Ok(None);
    }
    let Some((proto, expected_verts)) = merged_proto(c1, c2, base) else {
        return Ok(None);
    };
    let Ok(mesh) = build_connectivity(proto, base) else {
        return Ok(None);
    };
    // A union that had to bowtie-split grew extra vertices: the charts
    // touched at a lone vertex, which is not a mergeable configuration.
    if mesh.vert_count() != expected_verts {
        return Ok(None);
    }
    let loops = boundary_loops(&mesh);
    if loops.is_empty() {
        // The merge closed the surface.
        return Ok(None);
    }
    let mut merged = Chart::new(mesh, base);
    merged.is_sub_chart = false;
    if loops.len() > 1 {
        return Ok(None);
    }
    prepare_isomap(&mut merged, base, part_cfg, engine)?;
    if parameterize_chart(&mut merged, base, opt_cfg)? != ParamOutcome::Parameterized {
        return Ok(None);
    }
    optimize_chart_stretch(&mut merged, base, opt_cfg, false, f64::INFINITY);
    if merged.l2_stretch >= super::stretch::INFINITE_STRETCH {
        return Ok(None);
    }

    if limit_merge_stretch {
        // Atlas-wide optimally-scaled average with the tentative chart in
        // place of the two originals.
        let mut sum_sqrt = 0.0;
        for slot in slots.iter().flatten() {
            if std::ptr::eq(slot, c1) || std::ptr::eq(slot, c2) {
                continue;
            }
            sum_sqrt += (slot.l2_stretch * slot.area_2d).max(0.0).sqrt();
        }
        sum_sqrt += (merged.l2_stretch * merged.area_2d).max(0.0).sqrt();
        let avg = (sum_sqrt / base.mesh_area).powi(2);
        if avg > expected_stretch + 1e-5 {
            return Ok(None);
        }
    }
    Ok(Some(merged))
}

/// The vertices shared by the two charts must form one contiguous run along
/// one boundary loop of the first chart.
fn shared_verts_form_single_chain(c1: &Chart, c2: &Chart) -> bool {
    let shared: std::collections::HashSet<u32> =
        c2.mesh.verts.iter().map(|v| v.root_id).collect();
    let loops = boundary_loops(&c1.mesh);
    let mut touched_loops = 0usize;
    let mut single_run = true;
    for lp in &loops {
        let marks: Vec<bool> = lp
            .iter()
            .map(|&v| shared.contains(&c1.mesh.verts[v as usize].root_id))
            .collect();
        let count = marks.iter().filter(|&&m| m).count();
        if count == 0 {
            continue;
        }
        touched_loops += 1;
        // Count cyclic false→true transitions: one run means one rise.
        let rises = marks
            .iter()
            .zip(marks.iter().cycle().skip(1))
            .filter(|(&prev, &cur)| !prev && cur)
            .count();
        if count == marks.len() {
            // The whole loop is shared: allowed (absorbing an island).
            continue;
        }
        if rises != 1 {
            single_run = false;
        }
    }
    touched_loops == 1 && single_run
}

/// Face union of two charts. Vertices are unified only across the shared
/// boundary (matched by root id); duplicates inside one chart (seams from
/// earlier cuts) stay distinct. Returns the proto plus the expected vertex
/// count, or None when the shared boundary match is ambiguous.
fn merged_proto(c1: &Chart, c2: &Chart, base: &BaseMesh) -> Option<(ProtoMesh, usize)> {
    let mut verts = Vec::new();
    let mut tris = Vec::new();
    let mut face_root = Vec::new();
    let mut face_father = Vec::new();

    // Chart 1 keeps its local identity.
    let mut local1 = Vec::with_capacity(c1.mesh.vert_count());
    let mut boundary_root: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
    for v in &c1.mesh.verts {
        let id = verts.len() as u32;
        verts.push((v.root_id, INVALID_ID, base.importance[v.root_id as usize]));
        local1.push(id);
        if v.is_boundary && boundary_root.insert(v.root_id, id).is_some() {
            // Two boundary vertices of chart 1 share a root id (a cut
            // seam); matching chart 2 against them is ambiguous.
            return None;
        }
    }
    // Chart 2 vertices fuse with chart 1 along the shared boundary.
    let mut shared = 0usize;
    let mut local2 = Vec::with_capacity(c2.mesh.vert_count());
    for v in &c2.mesh.verts {
        match boundary_root.get(&v.root_id) {
            Some(&id) if v.is_boundary => {
                shared += 1;
                local2.push(id);
            }
            _ => {
                let id = verts.len() as u32;
                verts.push((v.root_id, INVALID_ID, base.importance[v.root_id as usize]));
                local2.push(id);
            }
        }
    }
    let expected = c1.mesh.vert_count() + c2.mesh.vert_count() - shared;

    for (chart, local) in [(c1, &local1), (c2, &local2)] {
        for face in &chart.mesh.faces {
            let tri = [
                local[face.verts[0] as usize],
                local[face.verts[1] as usize],
                local[face.verts[2] as usize],
            ];
            tris.push(tri);
            face_root.push(face.root_id);
            face_father.push(INVALID_ID);
        }
    }
    Some((
        ProtoMesh {
            verts,
            tris,
            face_root,
            face_father,
        },
        expected,
    ))
}
