//! Classical MDS of the landmark distance matrix and the Nyström embedding.

use nalgebra::{DMatrix, SymmetricEigen};

use crate::atlas::AtlasError;
use crate::geodesic::LandmarkDistances;
use crate::mesh::ChartMesh;

/// Near-zero eigenvalue cutoff (distances live on the canonical model scale,
/// so absolute tolerance is meaningful).
const EIGEN_ZERO_EPS: f64 = 1e-6;

/// Eigen state of one chart's landmark embedding.
///
/// `eigen_vectors` is row-major: vector `k` occupies
/// `[k*landmark_count, (k+1)*landmark_count)`. `avg_column[j]` is the mean of
/// the squared distances from landmark `j` to every landmark; it is what the
/// Nyström formula needs, so it is kept after the matrix itself is dropped.
#[derive(Clone, Debug)]
pub struct Isomap {
    pub landmark_count: usize,
    /// Number of non-degenerate dimensions actually computed (≤ requested).
    pub dimension: usize,
    /// Positive eigenvalues, descending.
    pub eigen_values: Vec<f64>,
    /// Unit eigenvectors matching `eigen_values`, row-major.
    pub eigen_vectors: Vec<f64>,
    pub avg_column: Vec<f64>,
}

impl Isomap {
    /// Double-center the squared landmark distance matrix and take its top
    /// eigen-pairs.
    ///
    /// `distances` is the landmark-to-landmark block (row-major,
    /// `n × n`); `max_dimension` caps the retained spectrum.
    pub fn new(n: usize, distances: &[f64], max_dimension: usize) -> Result<Self, AtlasError> {
        debug_assert_eq!(distances.len(), n * n);
        if n == 0 {
            return Err(AtlasError::invalid("isomap needs at least one landmark"));
        }
        let mut sq = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let d = distances[i * n + j];
                sq[(i, j)] = d * d;
            }
        }
        let avg_column: Vec<f64> = (0..n).map(|j| sq.column(j).sum() / n as f64).collect();
        let total_avg = avg_column.iter().sum::<f64>() / n as f64;
        let mut b = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                b[(i, j)] = -0.5 * (sq[(i, j)] - avg_column[i] - avg_column[j] + total_avg);
            }
        }

        let eigen = SymmetricEigen::try_new(b, 1e-12, 10_000)
            .ok_or_else(|| AtlasError::numeric("symmetric eigen-decomposition stalled"))?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &bb| {
            eigen.eigenvalues[bb]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut eigen_values = Vec::new();
        let mut eigen_vectors = Vec::new();
        for &k in order.iter().take(max_dimension) {
            let lambda = eigen.eigenvalues[k];
            if lambda <= EIGEN_ZERO_EPS {
                break;
            }
            eigen_values.push(lambda);
            eigen_vectors.extend(eigen.eigenvectors.column(k).iter().copied());
        }

        Ok(Self {
            landmark_count: n,
            dimension: eigen_values.len(),
            eigen_values,
            eigen_vectors,
            avg_column,
        })
    }

    /// λ-padded accessor: eigenvalue `k` or zero beyond the spectrum.
    #[inline]
    pub fn eigen_value(&self, k: usize) -> f64 {
        self.eigen_values.get(k).copied().unwrap_or(0.0)
    }

    /// Landmark `j`'s coordinate along eigen-direction `k`: `√λ_k · v_k[j]`.
    #[inline]
    pub fn landmark_coord(&self, j: usize, k: usize) -> f64 {
        self.eigen_values[k].sqrt() * self.eigen_vectors[k * self.landmark_count + j]
    }

    /// Dimensions needed to capture `energy_fraction` of the spectrum.
    pub fn primary_dimension(&self, energy_fraction: f64) -> usize {
        let total: f64 = self.eigen_values.iter().sum();
        if total <= 0.0 {
            return 0;
        }
        let mut acc = 0.0;
        for (k, lambda) in self.eigen_values.iter().enumerate() {
            acc += lambda;
            if acc >= energy_fraction * total {
                return k + 1;
            }
        }
        self.dimension
    }

    /// Nyström out-of-sample coordinate of a vertex along direction `k`,
    /// from its distances to every landmark.
    pub fn embed_coord(&self, dist_to_landmarks: &[f64], k: usize) -> f64 {
        let n = self.landmark_count;
        let vec = &self.eigen_vectors[k * n..(k + 1) * n];
        let mut acc = 0.0;
        for j in 0..n {
            let d = dist_to_landmarks[j];
            acc += (self.avg_column[j] - d * d) * vec[j];
        }
        acc / (2.0 * self.eigen_values[k].sqrt())
    }
}

/// Embed every vertex of a chart into `dim` coordinates (row-major,
/// `vert_count × dim`): landmarks by their spectral coordinates, the rest by
/// Nyström. The second axis is sign-flipped if most triangles would
/// otherwise wind negatively, establishing a canonical handedness.
pub fn embed_vertices(
    mesh: &ChartMesh,
    iso: &Isomap,
    landmarks: &[u32],
    distances: &LandmarkDistances,
    dim: usize,
) -> Vec<f64> {
    let n = mesh.vert_count();
    if iso.dimension == 0 {
        // Point-like chart: every vertex embeds at the origin.
        return vec![0.0; n * dim.max(1)];
    }
    let dim = dim.min(iso.dimension).max(1);
    let mut coords = vec![0.0f64; n * dim];

    let mut landmark_slot = vec![usize::MAX; n];
    for (j, &lm) in landmarks.iter().enumerate() {
        landmark_slot[lm as usize] = j;
    }

    let mut dist_buf = vec![0.0f64; landmarks.len()];
    for v in 0..n {
        let row = &mut coords[v * dim..(v + 1) * dim];
        let slot = landmark_slot[v];
        if slot != usize::MAX {
            for (k, c) in row.iter_mut().enumerate() {
                *c = iso.landmark_coord(slot, k);
            }
        } else {
            for (j, d) in dist_buf.iter_mut().enumerate() {
                *d = distances.dist(j, v as u32);
            }
            for (k, c) in row.iter_mut().enumerate() {
                *c = iso.embed_coord(&dist_buf, k);
            }
        }
    }

    if dim >= 2 {
        let mut positive = 0usize;
        for face in &mesh.faces {
            let p = |v: u32| (coords[v as usize * dim], coords[v as usize * dim + 1]);
            let (x0, y0) = p(face.verts[0]);
            let (x1, y1) = p(face.verts[1]);
            let (x2, y2) = p(face.verts[2]);
            let cross = (x1 - x0) * (y2 - y0) - (y1 - y0) * (x2 - x0);
            if cross >= 0.0 {
                positive += 1;
            }
        }
        if positive < mesh.face_count() - positive {
            for v in 0..n {
                coords[v * dim + 1] = -coords[v * dim + 1];
            }
        }
    }
    coords
}
