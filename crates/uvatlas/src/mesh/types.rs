//! Core connectivity records: vertex, face, edge, and the chart mesh store.

use nalgebra::Vector2;

/// Absent-id sentinel shared by all id spaces (vertex, face, edge).
pub const INVALID_ID: u32 = u32::MAX;

/// Importance value marking a vertex that must be kept as a landmark.
pub const MUST_RESERVE: i32 = -1;

/// A vertex of a chart mesh.
///
/// `root_id` indexes the shared geometry arrays in
/// [`BaseMesh`](super::BaseMesh); `father_id` is the id this vertex had in
/// the chart it was split from. The three adjacency lists are ordered
/// consistently with the local fan around the vertex (counter-clockwise with
/// respect to face orientation; open fans start at a boundary edge).
#[derive(Clone, Debug)]
pub struct Vertex {
    pub id: u32,
    pub root_id: u32,
    pub father_id: u32,
    pub uv: Vector2<f64>,
    pub is_boundary: bool,
    /// Index into the owning chart's landmark list, or `INVALID_ID`.
    pub landmark: u32,
    /// Importance order; `MUST_RESERVE` pins the vertex as a landmark.
    pub importance: i32,
    pub vert_adj: Vec<u32>,
    pub face_adj: Vec<u32>,
    pub edge_adj: Vec<u32>,
}

impl Vertex {
    pub fn new(id: u32, root_id: u32, father_id: u32) -> Self {
        Self {
            id,
            root_id,
            father_id,
            uv: Vector2::zeros(),
            is_boundary: false,
            landmark: INVALID_ID,
            importance: 0,
            vert_adj: Vec::new(),
            face_adj: Vec::new(),
            edge_adj: Vec::new(),
        }
    }

    #[inline]
    pub fn is_landmark(&self) -> bool {
        self.landmark != INVALID_ID
    }
}

/// A triangle: vertex and edge ids in counter-clockwise order.
#[derive(Clone, Debug)]
pub struct Face {
    pub id: u32,
    pub root_id: u32,
    pub father_id: u32,
    pub verts: [u32; 3],
    pub edges: [u32; 3],
}

impl Face {
    /// Local index (0..3) of vertex `v` in this face.
    #[inline]
    pub fn corner_of(&self, v: u32) -> Option<usize> {
        self.verts.iter().position(|&w| w == v)
    }
}

/// An edge; `faces[1] == INVALID_ID` marks a boundary edge.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id: u32,
    pub verts: [u32; 2],
    pub faces: [u32; 2],
    /// Vertex opposite this edge in `faces[0]` / `faces[1]`.
    pub opposites: [u32; 2],
    pub length: f64,
    pub signal_length: f64,
    pub is_boundary: bool,
    /// False when the host forbids cutting along this edge.
    pub splittable: bool,
}

impl Edge {
    #[inline]
    pub fn other_vert(&self, v: u32) -> u32 {
        if self.verts[0] == v {
            self.verts[1]
        } else {
            self.verts[0]
        }
    }

    #[inline]
    pub fn other_face(&self, f: u32) -> u32 {
        if self.faces[0] == f {
            self.faces[1]
        } else {
            self.faces[0]
        }
    }

    #[inline]
    pub fn has_vert(&self, v: u32) -> bool {
        self.verts[0] == v || self.verts[1] == v
    }
}

/// Connectivity store of one chart: flat vertex/face/edge arrays.
#[derive(Clone, Debug, Default)]
pub struct ChartMesh {
    pub verts: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub edges: Vec<Edge>,
}

impl ChartMesh {
    #[inline]
    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edge between two vertices, if present.
    pub fn edge_between(&self, a: u32, b: u32) -> Option<u32> {
        self.verts[a as usize]
            .edge_adj
            .iter()
            .copied()
            .find(|&e| self.edges[e as usize].has_vert(b))
    }

    /// Ids of boundary vertices, in array order.
    pub fn boundary_verts(&self) -> Vec<u32> {
        self.verts
            .iter()
            .filter(|v| v.is_boundary)
            .map(|v| v.id)
            .collect()
    }
}
