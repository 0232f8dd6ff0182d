//! Boundary loops and the cut that reduces a chart to a single boundary.
//!
//! A parameterizable chart must be a disk. When a chart has several boundary
//! loops, the reducer repeatedly connects two loops by the longest
//! minimum-distance path over edge lengths and cuts the chart open along it
//! by vertex duplication, until one loop remains.

use crate::atlas::AtlasError;

use super::base::BaseMesh;
use super::build::{build_connectivity, ProtoMesh};
use super::types::{ChartMesh, INVALID_ID};

/// Ordered boundary loops; each loop lists vertex ids walking the boundary
/// with the surface on the left.
pub fn boundary_loops(mesh: &ChartMesh) -> Vec<Vec<u32>> {
    let mut visited = vec![false; mesh.verts.len()];
    let mut loops = Vec::new();
    for start in 0..mesh.verts.len() {
        if visited[start] || !mesh.verts[start].is_boundary {
            continue;
        }
        let mut cycle = Vec::new();
        let mut cur = start as u32;
        loop {
            visited[cur as usize] = true;
            cycle.push(cur);
            // The fan starts at the incoming boundary edge, so the first
            // ordered neighbor is the next vertex along the directed loop.
            let next = mesh.verts[cur as usize].vert_adj[0];
            if next == start as u32 {
                break;
            }
            if visited[next as usize] {
                // Defensive: malformed loop, stop rather than spin.
                break;
            }
            cur = next;
        }
        loops.push(cycle);
    }
    loops
}

/// Distances and predecessor links from a multi-source Dijkstra run.
pub struct DijkstraOutcome {
    pub dist: Vec<f64>,
    pub prev: Vec<u32>,
}

impl DijkstraOutcome {
    /// Path from a source to `target` (inclusive), or None if unreached.
    pub fn path_to(&self, target: u32) -> Option<Vec<u32>> {
        if !self.dist[target as usize].is_finite() {
            return None;
        }
        let mut path = vec![target];
        let mut cur = target;
        while self.prev[cur as usize] != INVALID_ID {
            cur = self.prev[cur as usize];
            path.push(cur);
        }
        path.reverse();
        Some(path)
    }
}

/// Multi-source Dijkstra over the vertex graph weighted by edge length.
///
/// `passable` filters the edges the path may use; `terminal` marks vertices
/// that may be reached but not traversed (used to stop paths at foreign
/// boundary loops).
pub fn shortest_path(
    mesh: &ChartMesh,
    sources: &[u32],
    mut passable: impl FnMut(u32) -> bool,
    mut terminal: impl FnMut(u32) -> bool,
) -> DijkstraOutcome {
    let n = mesh.verts.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev = vec![INVALID_ID; n];
    let mut done = vec![false; n];
    let mut heap = crate::numeric::MaxHeap::new();
    for &s in sources {
        dist[s as usize] = 0.0;
        heap.push(0.0, s);
    }
    while let Some((neg_d, v)) = heap.pop() {
        let d = -neg_d;
        if done[v as usize] || d > dist[v as usize] {
            continue;
        }
        done[v as usize] = true;
        if terminal(v) && d > 0.0 {
            continue;
        }
        for &e in &mesh.verts[v as usize].edge_adj {
            if !passable(e) {
                continue;
            }
            let edge = &mesh.edges[e as usize];
            let w = edge.other_vert(v);
            let nd = d + edge.length;
            if nd < dist[w as usize] {
                dist[w as usize] = nd;
                prev[w as usize] = v;
                heap.push(-nd, w);
            }
        }
    }
    DijkstraOutcome { dist, prev }
}

/// Reduce `mesh` to a single boundary loop, cutting along connecting paths.
///
/// Paths avoid non-splittable edges; when no two loops can be connected
/// without crossing one, the reduction fails with `NonSplittableBlocked`.
pub fn cut_to_single_boundary(
    mesh: ChartMesh,
    base: &BaseMesh,
) -> Result<ChartMesh, AtlasError> {
    let mut mesh = mesh;
    loop {
        let loops = boundary_loops(&mesh);
        if loops.len() <= 1 {
            return Ok(mesh);
        }
        let path = longest_connecting_path(&mesh, &loops)?;
        mesh = cut_along_path(mesh, &path, base)?;
    }
}

/// Among all loop pairs, the minimum-distance connecting path of maximum
/// length, restricted to splittable interior edges.
fn longest_connecting_path(
    mesh: &ChartMesh,
    loops: &[Vec<u32>],
) -> Result<Vec<u32>, AtlasError> {
    let mut loop_of = vec![INVALID_ID; mesh.verts.len()];
    for (li, lp) in loops.iter().enumerate() {
        for &v in lp {
            loop_of[v as usize] = li as u32;
        }
    }
    let mut best: Option<(f64, Vec<u32>)> = None;
    for (li, lp) in loops.iter().enumerate() {
        let li = li as u32;
        let outcome = shortest_path(
            mesh,
            lp,
            |e| {
                let edge = &mesh.edges[e as usize];
                edge.splittable && !edge.is_boundary
            },
            |v| loop_of[v as usize] != INVALID_ID && loop_of[v as usize] != li,
        );
        // Closest touch point on every other loop.
        for (lj, lq) in loops.iter().enumerate() {
            if lj as u32 <= li {
                continue;
            }
            let touch = lq
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    outcome.dist[a as usize]
                        .partial_cmp(&outcome.dist[b as usize])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap();
            let d = outcome.dist[touch as usize];
            if !d.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |(bd, _)| d > *bd) {
                let path = outcome
                    .path_to(touch)
                    .ok_or_else(|| AtlasError::topology("unreachable boundary loop"))?;
                best = Some((d, path));
            }
        }
    }
    match best {
        Some((_, path)) => Ok(path),
        // Loops exist but every connecting path crosses a forbidden edge.
        None => Err(AtlasError::NonSplittableBlocked),
    }
}

/// Open the mesh along `path` (first and last vertices on two different
/// boundary loops) by duplicating every path vertex onto the right side.
fn cut_along_path(
    mesh: ChartMesh,
    path: &[u32],
    base: &BaseMesh,
) -> Result<ChartMesh, AtlasError> {
    if path.len() < 2 {
        return Err(AtlasError::topology("cut path too short"));
    }
    let mut verts: Vec<(u32, u32, i32)> = mesh
        .verts
        .iter()
        .map(|v| (v.root_id, v.father_id, v.importance))
        .collect();
    let mut tris: Vec<[u32; 3]> = mesh.faces.iter().map(|f| f.verts).collect();

    for (i, &v) in path.iter().enumerate() {
        let vert = &mesh.verts[v as usize];
        let fan_faces = &vert.face_adj;
        let fan_edges = &vert.edge_adj;
        let k = fan_faces.len();
        if k == 0 {
            return Err(AtlasError::topology("cut path touches an isolated vertex"));
        }
        // Fan positions of the path edges at this vertex.
        let pos_of = |other: u32| -> Result<usize, AtlasError> {
            fan_edges
                .iter()
                .position(|&e| mesh.edges[e as usize].has_vert(other))
                .ok_or_else(|| AtlasError::topology("cut path edge missing from fan"))
        };
        // Right-side faces: complement of the counter-clockwise arc from the
        // outgoing path edge to the incoming one.
        let right: Vec<u32> = if i == 0 {
            let p = pos_of(path[1])?;
            // Open fan: faces before the outgoing edge.
            fan_faces[..p].to_vec()
        } else if i + 1 == path.len() {
            let p = pos_of(path[i - 1])?;
            // Open fan: faces from the incoming edge on.
            fan_faces[p..].to_vec()
        } else {
            let p_next = pos_of(path[i + 1])?;
            let p_prev = pos_of(path[i - 1])?;
            // Closed fan: walk cyclically from the incoming edge up to the
            // outgoing edge; those faces lie right of the directed path.
            let mut faces = Vec::new();
            let mut t = p_prev;
            while t != p_next {
                faces.push(fan_faces[t % k]);
                t = (t + 1) % k;
            }
            faces
        };
        if right.is_empty() || right.len() == fan_faces.len() {
            return Err(AtlasError::topology("cut path does not separate the fan"));
        }
        let dup = verts.len() as u32;
        verts.push(verts[v as usize]);
        for &f in &right {
            for slot in tris[f as usize].iter_mut() {
                if *slot == v {
                    *slot = dup;
                }
            }
        }
    }

    let face_root = mesh.faces.iter().map(|f| f.root_id).collect();
    let face_father = mesh.faces.iter().map(|f| f.father_id).collect();
    build_connectivity(
        ProtoMesh {
            verts,
            tris,
            face_root,
            face_father,
        },
        base,
    )
}
