//! Connectivity construction: edges, ordered fans, bowtie repair.
//!
//! Build runs in rounds. Each round scans the faces, hashes edges by
//! unordered vertex pair, and walks the fan around every vertex using the
//! directed-edge map. A vertex whose incident faces fall into more than one
//! edge-connected fan is a bowtie; the extra fans are rewritten onto a fresh
//! duplicate vertex and the round repeats. Once every vertex is single-fan,
//! the final pass materializes edge records, ordered adjacency, boundary
//! flags, and cached lengths.

use std::collections::HashMap;

use crate::atlas::AtlasError;

use super::base::BaseMesh;
use super::types::{ChartMesh, Edge, Face, Vertex, INVALID_ID};

/// Triangle soup in chart-local vertex ids, carrying the identity mapping
/// each chart keeps toward its root and father meshes.
pub struct ProtoMesh {
    /// (root_id, father_id, importance) per local vertex.
    pub verts: Vec<(u32, u32, i32)>,
    /// Local vertex ids, counter-clockwise.
    pub tris: Vec<[u32; 3]>,
    /// Root face id per triangle.
    pub face_root: Vec<u32>,
    /// Father face id per triangle.
    pub face_father: Vec<u32>,
}

/// Build full connectivity from a triangle soup, repairing bowties by
/// vertex duplication. Fails with `InvalidTopology` on inconsistent
/// orientation or an edge shared by more than two faces.
pub fn build_connectivity(proto: ProtoMesh, base: &BaseMesh) -> Result<ChartMesh, AtlasError> {
    let ProtoMesh {
        mut verts,
        mut tris,
        face_root,
        face_father,
    } = proto;

    for tri in &tris {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            return Err(AtlasError::topology("degenerate face (repeated vertex)"));
        }
    }

    // Bowtie repair loop. Each round either terminates cleanly or strictly
    // grows the vertex array, so it runs at most a handful of times.
    let max_rounds = tris.len() * 3 + 2;
    let mut round = 0;
    loop {
        round += 1;
        if round > max_rounds {
            return Err(AtlasError::topology("bowtie repair did not converge"));
        }
        let split = split_one_bowtie_round(&mut verts, &mut tris)?;
        if !split {
            break;
        }
    }

    finalize(verts, tris, face_root, face_father, base)
}

/// Map each directed edge `(a, b)` to the face that walks it. Two faces on
/// the same directed edge means inconsistent orientation.
fn directed_edge_map(tris: &[[u32; 3]]) -> Result<HashMap<(u32, u32), u32>, AtlasError> {
    let mut map = HashMap::with_capacity(tris.len() * 3);
    for (f, tri) in tris.iter().enumerate() {
        for k in 0..3 {
            let a = tri[k];
            let b = tri[(k + 1) % 3];
            if map.insert((a, b), f as u32).is_some() {
                return Err(AtlasError::topology(
                    "inconsistent face orientation (directed edge reused)",
                ));
            }
        }
    }
    Ok(map)
}

/// Walk the fan of every vertex once; split the first multi-fan vertex found.
/// Returns whether a split happened (caller repeats until clean).
fn split_one_bowtie_round(
    verts: &mut Vec<(u32, u32, i32)>,
    tris: &mut [[u32; 3]],
) -> Result<bool, AtlasError> {
    let directed = directed_edge_map(tris)?;
    let mut vert_faces: Vec<Vec<u32>> = vec![Vec::new(); verts.len()];
    for (f, tri) in tris.iter().enumerate() {
        for &v in tri {
            vert_faces[v as usize].push(f as u32);
        }
    }

    for v in 0..verts.len() as u32 {
        let incident = &vert_faces[v as usize];
        if incident.len() <= 1 {
            continue;
        }
        let fans = collect_fans(v, incident, tris, &directed)?;
        if fans.len() <= 1 {
            continue;
        }
        // Keep fan 0 on the original vertex; each extra fan gets a duplicate.
        for fan in &fans[1..] {
            let dup = verts.len() as u32;
            let src = verts[v as usize];
            verts.push(src);
            for &f in fan {
                for slot in tris[f as usize].iter_mut() {
                    if *slot == v {
                        *slot = dup;
                    }
                }
            }
        }
        return Ok(true);
    }
    Ok(false)
}

/// Partition the faces incident to `v` into edge-connected fans, each walked
/// in counter-clockwise order starting from a boundary edge when the fan is
/// open.
fn collect_fans(
    v: u32,
    incident: &[u32],
    tris: &[[u32; 3]],
    directed: &HashMap<(u32, u32), u32>,
) -> Result<Vec<Vec<u32>>, AtlasError> {
    let mut remaining: Vec<u32> = incident.to_vec();
    let mut fans = Vec::new();
    while !remaining.is_empty() {
        // Prefer a start face whose entry edge (v, next(v)) has no face on
        // the opposite directed edge, i.e. the clockwise-most face of an
        // open fan. A closed fan can start anywhere.
        let start = remaining
            .iter()
            .copied()
            .find(|&f| {
                let next = next_vert(tris[f as usize], v);
                !directed.contains_key(&(next, v))
            })
            .unwrap_or(remaining[0]);
        let mut fan = Vec::new();
        let mut cur = start;
        loop {
            fan.push(cur);
            let pos = remaining.iter().position(|&f| f == cur).ok_or_else(|| {
                AtlasError::topology("fan walk revisited a face from another fan")
            })?;
            remaining.swap_remove(pos);
            // Exit via the counter-clockwise edge (v, prev(v)'s successor).
            let exit = prev_vert(tris[cur as usize], v);
            match directed.get(&(v, exit)) {
                Some(&f) if f != start => {
                    if !remaining.contains(&f) {
                        return Err(AtlasError::topology("fan walk left the vertex star"));
                    }
                    cur = f;
                }
                _ => break,
            }
        }
        fans.push(fan);
    }
    Ok(fans)
}

/// Vertex following `v` in counter-clockwise corner order.
#[inline]
fn next_vert(tri: [u32; 3], v: u32) -> u32 {
    let k = tri.iter().position(|&w| w == v).unwrap();
    tri[(k + 1) % 3]
}

/// Vertex preceding `v` in counter-clockwise corner order.
#[inline]
fn prev_vert(tri: [u32; 3], v: u32) -> u32 {
    let k = tri.iter().position(|&w| w == v).unwrap();
    tri[(k + 2) % 3]
}

/// Materialize edge records and ordered adjacency for a bowtie-free soup.
fn finalize(
    verts: Vec<(u32, u32, i32)>,
    tris: Vec<[u32; 3]>,
    face_root: Vec<u32>,
    face_father: Vec<u32>,
    base: &BaseMesh,
) -> Result<ChartMesh, AtlasError> {
    let mut mesh = ChartMesh {
        verts: verts
            .iter()
            .enumerate()
            .map(|(i, &(root_id, father_id, importance))| {
                let mut v = Vertex::new(i as u32, root_id, father_id);
                v.importance = importance;
                v
            })
            .collect(),
        faces: Vec::with_capacity(tris.len()),
        edges: Vec::new(),
    };

    // Edge hashing by unordered vertex pair; attach faces to the two slots.
    let mut edge_of: HashMap<(u32, u32), u32> = HashMap::with_capacity(tris.len() * 3 / 2);
    for (f, tri) in tris.iter().enumerate() {
        let mut face = Face {
            id: f as u32,
            root_id: face_root[f],
            father_id: face_father[f],
            verts: *tri,
            edges: [INVALID_ID; 3],
        };
        for k in 0..3 {
            let a = tri[k];
            let b = tri[(k + 1) % 3];
            let opposite = tri[(k + 2) % 3];
            let key = if a < b { (a, b) } else { (b, a) };
            let eid = match edge_of.get(&key) {
                Some(&eid) => {
                    let edge = &mut mesh.edges[eid as usize];
                    if edge.faces[1] != INVALID_ID {
                        return Err(AtlasError::topology("edge shared by more than two faces"));
                    }
                    edge.faces[1] = f as u32;
                    edge.opposites[1] = opposite;
                    eid
                }
                None => {
                    let eid = mesh.edges.len() as u32;
                    edge_of.insert(key, eid);
                    mesh.edges.push(Edge {
                        id: eid,
                        verts: [a, b],
                        faces: [f as u32, INVALID_ID],
                        opposites: [opposite, INVALID_ID],
                        length: 0.0,
                        signal_length: 0.0,
                        is_boundary: false,
                        splittable: true,
                    });
                    eid
                }
            };
            face.edges[k] = eid;
        }
        mesh.faces.push(face);
    }

    for edge in &mut mesh.edges {
        edge.is_boundary = edge.faces[1] == INVALID_ID;
        let ra = mesh.verts[edge.verts[0] as usize].root_id;
        let rb = mesh.verts[edge.verts[1] as usize].root_id;
        edge.length = (base.position(ra) - base.position(rb)).norm();
        edge.signal_length = signal_edge_length(edge, &mesh.faces, base);
        // Boundary edges are always cuttable; interior edges obey the host.
        edge.splittable = edge.is_boundary || !base.is_nonsplit_pair(ra, rb);
        if edge.is_boundary {
            mesh.verts[edge.verts[0] as usize].is_boundary = true;
            mesh.verts[edge.verts[1] as usize].is_boundary = true;
        }
    }

    order_adjacency(&mut mesh)?;
    Ok(mesh)
}

/// Edge length under the per-face metric tensor, averaged over the incident
/// faces; falls back to the Euclidean length without an IMT.
fn signal_edge_length(edge: &Edge, faces: &[Face], base: &BaseMesh) -> f64 {
    let (Some(imt), Some(canonical)) = (base.imt.as_ref(), base.canonical_uv.as_ref()) else {
        return edge.length;
    };
    let mut total = 0.0;
    let mut count = 0;
    for &f in &edge.faces {
        if f == INVALID_ID {
            continue;
        }
        let face = &faces[f as usize];
        let root = face.root_id as usize;
        let (Some(i), Some(j)) = (face.corner_of(edge.verts[0]), face.corner_of(edge.verts[1]))
        else {
            continue;
        };
        let uv = &canonical[root];
        let d = uv[j] - uv[i];
        let [m00, m01, m11] = imt[root];
        let q = m00 * d.x * d.x + 2.0 * m01 * d.x * d.y + m11 * d.y * d.y;
        total += q.max(0.0).sqrt();
        count += 1;
    }
    if count > 0 {
        total / f64::from(count)
    } else {
        edge.length
    }
}

/// Fill the three per-vertex adjacency lists in fan order.
///
/// Interior vertex with k faces: k faces, k edges, k neighbor vertices,
/// cyclic. Boundary vertex with k faces: k faces, k+1 edges, k+1 neighbors,
/// starting at one boundary edge and ending at the other.
fn order_adjacency(mesh: &mut ChartMesh) -> Result<(), AtlasError> {
    let mut directed: HashMap<(u32, u32), u32> = HashMap::with_capacity(mesh.faces.len() * 3);
    for face in &mesh.faces {
        for k in 0..3 {
            directed.insert((face.verts[k], face.verts[(k + 1) % 3]), face.id);
        }
    }
    let mut vert_faces: Vec<Vec<u32>> = vec![Vec::new(); mesh.verts.len()];
    for face in &mesh.faces {
        for &v in &face.verts {
            vert_faces[v as usize].push(face.id);
        }
    }

    for v in 0..mesh.verts.len() as u32 {
        let incident = &vert_faces[v as usize];
        if incident.is_empty() {
            continue;
        }
        let start = incident
            .iter()
            .copied()
            .find(|&f| {
                let next = next_vert(mesh.faces[f as usize].verts, v);
                !directed.contains_key(&(next, v))
            })
            .unwrap_or(incident[0]);
        let open = {
            let next = next_vert(mesh.faces[start as usize].verts, v);
            !directed.contains_key(&(next, v))
        };

        let mut face_order = Vec::with_capacity(incident.len());
        let mut vert_order = Vec::with_capacity(incident.len() + 1);
        let mut edge_order = Vec::with_capacity(incident.len() + 1);

        let mut cur = start;
        loop {
            if face_order.len() > incident.len() {
                return Err(AtlasError::topology("fan walk did not close"));
            }
            let tri = mesh.faces[cur as usize].verts;
            let entry = next_vert(tri, v);
            let exit = prev_vert(tri, v);
            face_order.push(cur);
            vert_order.push(entry);
            edge_order.push(
                mesh.edge_between(v, entry)
                    .ok_or_else(|| AtlasError::topology("missing fan edge"))?,
            );
            match directed.get(&(v, exit)) {
                Some(&f) if f != start => cur = f,
                Some(_) => break,
                None => {
                    // Open fan: close the lists with the terminal edge.
                    vert_order.push(exit);
                    edge_order.push(
                        mesh.edge_between(v, exit)
                            .ok_or_else(|| AtlasError::topology("missing fan edge"))?,
                    );
                    break;
                }
            }
        }

        if face_order.len() != incident.len() {
            return Err(AtlasError::topology("bowtie survived repair"));
        }
        let vert = &mut mesh.verts[v as usize];
        if vert.is_boundary && !open {
            return Err(AtlasError::topology(
                "boundary vertex with a closed fan (more than two boundary edges)",
            ));
        }
        vert.face_adj = face_order;
        vert.vert_adj = vert_order;
        vert.edge_adj = edge_order;
    }

    // Index integrity: every boundary vertex carries exactly two boundary
    // edges in its fan.
    for vert in &mesh.verts {
        if !vert.is_boundary {
            continue;
        }
        let boundary_edges = vert
            .edge_adj
            .iter()
            .filter(|&&e| mesh.edges[e as usize].is_boundary)
            .count();
        if boundary_edges != 2 {
            return Err(AtlasError::topology(
                "boundary vertex with more than two boundary edges",
            ));
        }
    }
    Ok(())
}

/// Convenience: proto-mesh for the root chart, straight from input indices.
pub fn root_proto(indices: &[[u32; 3]], vert_count: usize, base: &BaseMesh) -> ProtoMesh {
    let verts = (0..vert_count as u32)
        .map(|v| (v, v, base.importance[v as usize]))
        .collect();
    ProtoMesh {
        verts,
        tris: indices.to_vec(),
        face_root: (0..indices.len() as u32).collect(),
        face_father: (0..indices.len() as u32).collect(),
    }
}

/// Proto-mesh for a sub-chart: the subset of `parent`'s faces listed in
/// `face_ids`, with vertices compacted and father links recorded.
pub fn sub_proto(parent: &ChartMesh, face_ids: &[u32]) -> ProtoMesh {
    let mut local_of = vec![INVALID_ID; parent.verts.len()];
    let mut verts = Vec::new();
    let mut tris = Vec::with_capacity(face_ids.len());
    let mut face_root = Vec::with_capacity(face_ids.len());
    let mut face_father = Vec::with_capacity(face_ids.len());
    for &f in face_ids {
        let face = &parent.faces[f as usize];
        let mut tri = [0u32; 3];
        for (k, &pv) in face.verts.iter().enumerate() {
            if local_of[pv as usize] == INVALID_ID {
                let vert = &parent.verts[pv as usize];
                local_of[pv as usize] = verts.len() as u32;
                verts.push((vert.root_id, vert.id, vert.importance));
            }
            tri[k] = local_of[pv as usize];
        }
        tris.push(tri);
        face_root.push(face.root_id);
        face_father.push(face.id);
    }
    ProtoMesh {
        verts,
        tris,
        face_root,
        face_father,
    }
}
