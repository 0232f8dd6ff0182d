//! Geodesic distance engines.
//!
//! Purpose
//! - Produce one-to-all surface distances from a source vertex, the raw
//!   material of the Isomap embedding. Two engines share one contract:
//!   a fast Dijkstra variant augmented with the triangle-fan update of
//!   Kimmel–Sethian, and a quality engine that iterates the fan update to a
//!   fixed point over the whole mesh.
//! - Engines are pure: they read a connectivity snapshot and return a fresh
//!   distance field, so a caller can swap in an external provider.
//!
//! When an integrated metric tensor is supplied, signal distances ride along
//! the Dijkstra pass over the cached signal edge lengths and are blended
//! with the geodesic field by a fixed weight.

mod approx;
mod quality;

pub use approx::{dijkstra_abc, ApproxEngine, DistanceField};
pub use quality::QualityEngine;

use crate::mesh::{BaseMesh, ChartMesh};

/// Blend factor between geodesic and signal distance.
pub const SIGNAL_DISTANCE_WEIGHT: f64 = 0.30;

/// Face count below which the default mode picks the quality engine.
pub const LIMIT_FACENUM_QUALITY_GEODESIC: usize = 25_000;

/// Near-zero guard shared by the distance kernels.
pub(crate) const ZERO_EPS: f64 = 1e-6;

/// Engine selection, mirroring the public option flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeodesicMode {
    /// Pick by face count: quality below the limit, fast above.
    #[default]
    Default,
    /// Force the Dijkstra + fan-update engine.
    Fast,
    /// Force the iterated quality engine.
    Quality,
}

/// One-to-all distances from a source vertex over a connectivity snapshot.
/// Unreachable vertices report `f64::INFINITY`.
pub trait GeodesicEngine {
    fn one_to_all(&self, mesh: &ChartMesh, base: &BaseMesh, source: u32) -> Vec<f64>;
}

/// Resolve the engine for one chart. Signal distances only ride the fast
/// engine, so an IMT forces it regardless of mode.
pub fn choose_engine(mode: GeodesicMode, root_face_count: usize, has_imt: bool) -> EngineChoice {
    if has_imt {
        return EngineChoice::Fast;
    }
    match mode {
        GeodesicMode::Fast => EngineChoice::Fast,
        GeodesicMode::Quality => EngineChoice::Quality,
        GeodesicMode::Default => {
            if root_face_count < LIMIT_FACENUM_QUALITY_GEODESIC {
                EngineChoice::Quality
            } else {
                EngineChoice::Fast
            }
        }
    }
}

/// Concrete engine picked for a chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineChoice {
    Fast,
    Quality,
}

impl EngineChoice {
    pub fn field(
        self,
        mesh: &ChartMesh,
        base: &BaseMesh,
        source: u32,
        with_signal: bool,
    ) -> DistanceField {
        match self {
            EngineChoice::Fast => dijkstra_abc(mesh, base, source, with_signal),
            EngineChoice::Quality => QualityEngine::default().field(mesh, base, source),
        }
    }
}

/// Landmark-to-all distance matrices (row per landmark, `vert_count` wide).
#[derive(Clone, Debug)]
pub struct LandmarkDistances {
    pub geodesic: Vec<f64>,
    /// Blended geodesic/signal distance; a copy of `geodesic` without IMT.
    pub combined: Vec<f64>,
    pub vert_count: usize,
}

impl LandmarkDistances {
    #[inline]
    pub fn geo(&self, landmark: usize, vert: u32) -> f64 {
        self.geodesic[landmark * self.vert_count + vert as usize]
    }

    #[inline]
    pub fn dist(&self, landmark: usize, vert: u32) -> f64 {
        self.combined[landmark * self.vert_count + vert as usize]
    }

    /// Exchange two landmark rows, tracking a reorder of the landmark list.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let n = self.vert_count;
        for k in 0..n {
            self.geodesic.swap(a * n + k, b * n + k);
            self.combined.swap(a * n + k, b * n + k);
        }
    }
}

/// Compute the landmark distance block: one engine run per landmark,
/// signal blending, and symmetrization at landmark pairs.
pub fn landmark_distances(
    mesh: &ChartMesh,
    base: &BaseMesh,
    landmarks: &[u32],
    engine: EngineChoice,
) -> LandmarkDistances {
    let n = mesh.vert_count();
    let with_signal = base.imt.is_some();
    let mut geodesic = Vec::with_capacity(landmarks.len() * n);
    let mut signal = if with_signal {
        Vec::with_capacity(landmarks.len() * n)
    } else {
        Vec::new()
    };
    for &lm in landmarks {
        let f = engine.field(mesh, base, lm, with_signal);
        geodesic.extend_from_slice(&f.geodesic);
        if with_signal {
            signal.extend_from_slice(&f.signal);
        }
    }
    let mut combined = if with_signal {
        let mut combined = signal;
        combine_signal(&geodesic, &mut combined);
        combined
    } else {
        geodesic.clone()
    };
    symmetrize(&mut geodesic, landmarks, n);
    symmetrize(&mut combined, landmarks, n);
    LandmarkDistances {
        geodesic,
        combined,
        vert_count: n,
    }
}

/// Blend the signal matrix toward the geodesic one:
/// `combined = (1−w)·geo + w·(geoAvg/sigAvg)·sig`. A near-zero signal mean
/// degenerates to the plain geodesic distances.
pub fn combine_signal(geodesic: &[f64], signal: &mut [f64]) {
    debug_assert_eq!(geodesic.len(), signal.len());
    if signal.is_empty() {
        return;
    }
    let count = signal.len() as f64;
    let sig_avg = signal.iter().sum::<f64>() / count;
    let geo_avg = geodesic.iter().sum::<f64>() / count;
    if sig_avg > ZERO_EPS {
        let ratio = geo_avg / sig_avg;
        let w = SIGNAL_DISTANCE_WEIGHT;
        for (s, &g) in signal.iter_mut().zip(geodesic) {
            *s = g * (1.0 - w) + ratio * *s * w;
        }
    } else {
        signal.copy_from_slice(geodesic);
    }
}

/// Distances between two landmarks depend on which was the source; keep the
/// smaller of the two measurements on both sides.
fn symmetrize(matrix: &mut [f64], landmarks: &[u32], vert_count: usize) {
    for i in 0..landmarks.len() {
        for j in i..landmarks.len() {
            let ij = i * vert_count + landmarks[j] as usize;
            let ji = j * vert_count + landmarks[i] as usize;
            let d = matrix[ij].min(matrix[ji]);
            matrix[ij] = d;
            matrix[ji] = d;
        }
    }
}

#[cfg(test)]
mod tests;
