//! The pipeline driver: validation, the partition loop, merging,
//! optimization, packing, and output assembly.

use std::collections::HashSet;

use crate::chart::{
    chart_l2_geo_squared_stretch, merge_small_charts, optimize_chart_stretch, parameterize_chart,
    partition_chart, prepare_isomap, Chart, ParamOutcome, PartitionOutcome, INFINITE_STRETCH,
};
use crate::geodesic::{choose_engine, EngineChoice};
use crate::mesh::{
    boundary_loops, build_connectivity, cut_to_single_boundary, root_proto, sub_proto, BaseMesh,
    ChartMesh, INVALID_ID,
};
use crate::pack::pack_charts;

use super::error::AtlasError;
use super::options::{Atlas, AtlasOptions, MeshDesc, Progress};
use super::schemer::CallbackSchemer;

/// Map the public stretch knob onto the internal average-L² target:
/// 0 demands isometry (target 1), 1 removes the bound.
fn expected_stretch(max_stretch: f64) -> f64 {
    if max_stretch >= 1.0 {
        f64::INFINITY
    } else {
        1.0 / ((1.0 - max_stretch) * (1.0 - max_stretch))
    }
}

/// Map the achieved internal average back to the public scale.
fn achieved_stretch(avg: f64) -> f64 {
    if !avg.is_finite() || avg <= 0.0 {
        return 1.0;
    }
    (1.0 - 1.0 / avg.sqrt()).clamp(0.0, 1.0)
}

/// Generate the texture atlas for an indexed triangle mesh.
///
/// On success every input face appears in the output with fresh vertex
/// indices; `vertex_remap` leads each atlas vertex back to the input vertex
/// it copies. On failure no output is produced and the input is untouched.
pub fn create_atlas(
    desc: &MeshDesc<'_>,
    options: &AtlasOptions,
    mut callback: Option<&mut dyn FnMut(f32) -> Progress>,
) -> Result<Atlas, AtlasError> {
    validate(desc, options)?;
    let mut schemer = CallbackSchemer::new(callback.take(), options.callback_frequency);
    let engine = choose_engine(
        options.geodesic,
        desc.indices.len() / 3,
        desc.imt.is_some(),
    );
    let expected = expected_stretch(options.max_stretch);

    // 1. Base mesh and root connectivity (with bowtie repair).
    let tris: Vec<[u32; 3]> = desc
        .indices
        .chunks(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    let mut nonsplit = HashSet::new();
    if let Some(false_edges) = desc.false_edges {
        for (f, tri) in tris.iter().enumerate() {
            for k in 0..3 {
                if false_edges[f * 3 + k] {
                    let (a, b) = (tri[k], tri[(k + 1) % 3]);
                    nonsplit.insert((a.min(b), a.max(b)));
                }
            }
        }
    }
    let imt = desc.imt.map(|rows| {
        rows.iter()
            .map(|m| [f64::from(m[0]), f64::from(m[1]), f64::from(m[2])])
            .collect()
    });
    let base = BaseMesh::new(
        desc.positions,
        &tris,
        imt,
        nonsplit,
        desc.reserve_verts.unwrap_or(&[]),
    );
    let root = build_connectivity(root_proto(&tris, desc.positions.len(), &base), &base)?;
    let root_adjacency = face_adjacency(&root);
    schemer.update(0.05)?;

    // 2. One root chart per connected component.
    let mut charts: Vec<Chart> = connected_components(&root)
        .into_iter()
        .map(|faces| {
            let mesh = build_connectivity(sub_proto(&root, &faces), &base)?;
            let mut chart = Chart::new(mesh, &base);
            chart.is_init_chart = true;
            Ok(chart)
        })
        .collect::<Result<_, AtlasError>>()?;

    // 3. Partition loop: process charts, split the worst until the stretch
    // target or the chart-count target is met.
    let mut blocked = false;
    let mut iteration = 0usize;
    loop {
        for chart in charts.iter_mut() {
            process_chart(chart, &base, options, engine)?;
        }
        iteration += 1;
        schemer.update(0.05 + 0.55 * (1.0 - 0.97f64.powi(iteration as i32)))?;

        let avg = average_stretch(&charts, &base);
        if avg <= expected + 1e-5 {
            break;
        }
        if options.max_chart_number > 0 && charts.len() >= options.max_chart_number {
            break;
        }
        let Some(worst) = best_partition_candidate(&charts) else {
            break;
        };
        let mut chart = charts.swap_remove(worst);
        match partition_chart(&mut chart, &base, &options.partition, &options.graph_cut, engine)? {
            PartitionOutcome::Split(children) => {
                for faces in children {
                    let mesh = build_connectivity(sub_proto(&chart.mesh, &faces), &base)?;
                    let mut child = Chart::new(mesh, &base);
                    child.is_sub_chart = true;
                    charts.push(child);
                }
            }
            PartitionOutcome::NotSplittable => {
                if boundary_loops(&chart.mesh).len() > 1 {
                    // Fall back to multi-boundary cutting so the chart can
                    // still be parameterized as a disk.
                    let mesh = cut_to_single_boundary(chart.mesh.clone(), &base)?;
                    let mut cut = Chart::new(mesh, &base);
                    cut.is_sub_chart = chart.is_sub_chart;
                    cut.unsplittable = true;
                    charts.push(cut);
                } else {
                    chart.unsplittable = true;
                    charts.push(chart);
                }
            }
            PartitionOutcome::Blocked => {
                blocked = true;
                chart.unsplittable = true;
                charts.push(chart);
            }
        }
    }

    // Charts that never became parameterizable by splitting: cut to disks.
    for chart in charts.iter_mut() {
        if !chart.is_parameterized && boundary_loops(&chart.mesh).len() != 1 {
            let mesh = cut_to_single_boundary(chart.mesh.clone(), &base)?;
            *chart = Chart::new(mesh, &base);
            process_chart(chart, &base, options, engine)?;
        }
    }

    let avg = average_stretch(&charts, &base);
    if avg > expected + 1e-5 && blocked {
        return Err(AtlasError::NonSplittableBlocked);
    }
    schemer.update(0.62)?;

    // 4. Merge small charts back together.
    merge_small_charts(
        &mut charts,
        &base,
        &root_adjacency,
        expected,
        options.max_chart_number,
        options.limit_merge_stretch,
        &options.merge,
        &options.partition,
        &options.optimize,
        engine,
    )?;
    schemer.update(0.70)?;

    // 5. Final stretch optimization (signal-specialized when an IMT rides
    // along) and scale normalization.
    let chart_count = charts.len();
    for (i, chart) in charts.iter_mut().enumerate() {
        if base.imt.is_some() && chart.is_parameterized {
            optimize_chart_stretch(chart, &base, &options.optimize, true, expected);
        }
        chart.normalize_uv_scale();
        chart.release_partition_state();
        schemer.update(0.70 + 0.15 * (i + 1) as f64 / chart_count.max(1) as f64)?;
    }

    let achieved = achieved_stretch(average_stretch(&charts, &base));

    // 6. Pack.
    pack_charts(
        &mut charts,
        options.width,
        options.height,
        options.gutter,
        &options.pack,
    )?;
    schemer.update(0.95)?;

    // 7. Assemble output aligned with the input face order.
    let atlas = assemble(&charts, desc, chart_count, achieved)?;
    schemer.update(1.0)?;
    Ok(atlas)
}

fn validate(desc: &MeshDesc<'_>, options: &AtlasOptions) -> Result<(), AtlasError> {
    if desc.positions.is_empty() {
        return Err(AtlasError::invalid("empty position buffer"));
    }
    if desc.indices.is_empty() || desc.indices.len() % 3 != 0 {
        return Err(AtlasError::invalid(
            "index buffer must hold a non-empty triangle list",
        ));
    }
    let n = desc.positions.len() as u32;
    if desc.indices.iter().any(|&i| i >= n) {
        return Err(AtlasError::invalid("vertex index out of range"));
    }
    if let Some(adj) = desc.adjacency {
        if adj.len() != desc.indices.len() {
            return Err(AtlasError::invalid("adjacency size mismatch"));
        }
    }
    if let Some(fe) = desc.false_edges {
        if fe.len() != desc.indices.len() {
            return Err(AtlasError::invalid("false-edge array size mismatch"));
        }
    }
    if let Some(imt) = desc.imt {
        if imt.len() != desc.indices.len() / 3 {
            return Err(AtlasError::invalid("IMT array size mismatch"));
        }
    }
    if let Some(rv) = desc.reserve_verts {
        if rv.iter().any(|&v| v >= n) {
            return Err(AtlasError::invalid("reserved vertex out of range"));
        }
    }
    if options.width == 0 || options.height == 0 {
        return Err(AtlasError::invalid("atlas dimensions must be positive"));
    }
    if !(0.0..=1.0).contains(&options.max_stretch) {
        return Err(AtlasError::invalid("max_stretch must lie in [0, 1]"));
    }
    if options.gutter < 0.0 {
        return Err(AtlasError::invalid("gutter must be non-negative"));
    }
    if !(0.0..=1.0).contains(&options.callback_frequency) {
        return Err(AtlasError::invalid("callback frequency must lie in [0, 1]"));
    }
    Ok(())
}

/// Face neighbor across each of the three edges, `INVALID_ID` on boundary.
fn face_adjacency(mesh: &ChartMesh) -> Vec<[u32; 3]> {
    mesh.faces
        .iter()
        .map(|face| {
            let mut adj = [INVALID_ID; 3];
            for (k, &e) in face.edges.iter().enumerate() {
                adj[k] = mesh.edges[e as usize].other_face(face.id);
            }
            adj
        })
        .collect()
}

/// Edge-connected face components of the root mesh.
fn connected_components(mesh: &ChartMesh) -> Vec<Vec<u32>> {
    let mut seen = vec![false; mesh.face_count()];
    let mut components = Vec::new();
    for f in 0..mesh.face_count() as u32 {
        if seen[f as usize] {
            continue;
        }
        let mut component = vec![f];
        seen[f as usize] = true;
        let mut head = 0usize;
        while head < component.len() {
            let cur = component[head];
            head += 1;
            for &e in &mesh.faces[cur as usize].edges {
                let adj = mesh.edges[e as usize].other_face(cur);
                if adj != INVALID_ID && !seen[adj as usize] {
                    seen[adj as usize] = true;
                    component.push(adj);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Bring one chart to its measured state: isomap, parameterization when it
/// is a disk, stretch optimization. Charts that cannot be parameterized yet
/// carry infinite stretch so the partition loop schedules them first.
fn process_chart(
    chart: &mut Chart,
    base: &BaseMesh,
    options: &AtlasOptions,
    engine: EngineChoice,
) -> Result<(), AtlasError> {
    if chart.is_optimized {
        return Ok(());
    }
    prepare_isomap(chart, base, &options.partition, engine)?;
    let boundaries = boundary_loops(&chart.mesh).len();
    if boundaries != 1 {
        chart.l2_stretch = INFINITE_STRETCH;
        chart.is_optimized = true;
        return Ok(());
    }
    match parameterize_chart(chart, base, &options.optimize)? {
        ParamOutcome::Parameterized => {
            optimize_chart_stretch(chart, base, &options.optimize, false, f64::INFINITY);
            chart.l2_stretch = chart_l2_geo_squared_stretch(&chart.mesh, base);
            if options.limit_face_stretch && face_stretch_exceeded(chart, base) {
                chart.l2_stretch = INFINITE_STRETCH;
            }
        }
        ParamOutcome::Overlapping => {
            chart.l2_stretch = INFINITE_STRETCH;
        }
    }
    chart.is_optimized = true;
    Ok(())
}

/// Per-face floor check: any face whose normalized stretch stays above the
/// chart average by an order of magnitude keeps the chart splittable.
fn face_stretch_exceeded(chart: &Chart, base: &BaseMesh) -> bool {
    let mut f2d = 0.0;
    for face in &chart.mesh.faces {
        let area = base.face_areas[face.root_id as usize];
        if area <= 0.0 {
            continue;
        }
        let s = crate::chart::face_l2_squared_stretch(
            &chart.mesh,
            base,
            face,
            chart.mesh.verts[face.verts[0] as usize].uv,
            chart.mesh.verts[face.verts[1] as usize].uv,
            chart.mesh.verts[face.verts[2] as usize].uv,
            &mut f2d,
        );
        if s / area > 10.0 {
            return true;
        }
    }
    false
}

/// Weighted average L² squared stretch over all charts, after normalizing
/// each chart to its stretch-neutral scale.
fn average_stretch(charts: &[Chart], base: &BaseMesh) -> f64 {
    if base.mesh_area <= 0.0 {
        return 1.0;
    }
    let mut total = 0.0;
    for chart in charts {
        if !chart.is_parameterized {
            return f64::INFINITY;
        }
        if !chart.l2_stretch.is_finite() {
            return f64::INFINITY;
        }
        // Optimally scaled contribution: √(E·a) accumulates per chart.
        let a = chart.area_2d.abs().max(0.0);
        total += (chart.l2_stretch * a).max(0.0).sqrt();
    }
    (total / base.mesh_area).powi(2)
}

/// Worst splittable chart, by current stretch.
fn best_partition_candidate(charts: &[Chart]) -> Option<usize> {
    let mut best = None;
    let mut best_stretch = -1.0f64;
    for (i, chart) in charts.iter().enumerate() {
        if chart.unsplittable || chart.face_count() <= 1 {
            continue;
        }
        if chart.is_parameterized && chart.l2_stretch <= chart.base_l2_stretch {
            // Already at the isometric lower bound.
            continue;
        }
        let s = if chart.l2_stretch.is_finite() {
            chart.l2_stretch
        } else {
            f64::MAX
        };
        if s > best_stretch {
            best_stretch = s;
            best = Some(i);
        }
    }
    best
}

/// Final buffers, face-aligned with the input.
fn assemble(
    charts: &[Chart],
    desc: &MeshDesc<'_>,
    chart_count: usize,
    achieved: f64,
) -> Result<Atlas, AtlasError> {
    let face_total = desc.indices.len() / 3;
    let mut atlas = Atlas {
        indices: vec![0; face_total * 3],
        face_partition: vec![0; face_total],
        chart_count,
        stretch: achieved,
        ..Atlas::default()
    };
    let mut seen_face = vec![false; face_total];
    for (ci, chart) in charts.iter().enumerate() {
        // Each chart contributes one atlas vertex per chart vertex.
        let vert_base = atlas.positions.len() as u32;
        for v in &chart.mesh.verts {
            let input = v.root_id as usize;
            atlas.positions.push(desc.positions[input]);
            atlas.uvs.push([v.uv.x as f32, v.uv.y as f32]);
            atlas.vertex_remap.push(v.root_id);
        }
        for face in &chart.mesh.faces {
            let root = face.root_id as usize;
            if root >= face_total || seen_face[root] {
                return Err(AtlasError::topology("face lost during partitioning"));
            }
            seen_face[root] = true;
            atlas.face_partition[root] = ci as u32;
            for k in 0..3 {
                atlas.indices[root * 3 + k] = vert_base + face.verts[k];
            }
        }
    }
    if seen_face.iter().any(|&s| !s) {
        return Err(AtlasError::topology("face lost during partitioning"));
    }
    Ok(atlas)
}
