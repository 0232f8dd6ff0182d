//! Sander-style stretch metrics of the 2D→3D map.
//!
//! Per face, the partial derivatives Ss = ∂S/∂u and St = ∂S/∂v of the
//! surface w.r.t. the parameterization give the first fundamental form
//! `(a, b, c) = (Ss·Ss, Ss·St, St·St)`. The L² squared stretch is the
//! integral `(a+c)/2 · area3D`; the L∞ stretch is the larger singular value.
//! A folded or collapsed triangle has infinite stretch.

use nalgebra::{Vector2, Vector3};

use crate::mesh::{BaseMesh, ChartMesh, Face};

/// Stretch of a folded triangle.
pub const INFINITE_STRETCH: f64 = f64::INFINITY;

/// Squared-epsilon guard for degenerate 2D areas.
pub(crate) const ZERO_EPS2: f64 = 1e-12;

/// Signal stretch never drops below this fraction of the geometric stretch,
/// so a flat signal cannot collapse a chart.
const MIN_SIG_GEO_RATIO: f64 = 0.01;

/// Signed area of a (u,v) triangle.
#[inline]
pub fn signed_area_2d(v0: Vector2<f64>, v1: Vector2<f64>, v2: Vector2<f64>) -> f64 {
    0.5 * ((v1.x - v0.x) * (v2.y - v0.y) - (v1.y - v0.y) * (v2.x - v0.x))
}

/// Partial derivatives of the 3D position w.r.t. (u, v) over one triangle.
fn partial_derivatives(
    f2d: f64,
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    q0: Vector3<f64>,
    q1: Vector3<f64>,
    q2: Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let inv = 1.0 / (2.0 * f2d);
    let ss = (q0 * (v1.y - v2.y) + q1 * (v2.y - v0.y) + q2 * (v0.y - v1.y)) * inv;
    let st = (q0 * (v2.x - v1.x) + q1 * (v0.x - v2.x) + q2 * (v1.x - v0.x)) * inv;
    (ss, st)
}

/// Fundamental form (a, b, c) of one face under the current uv assignment,
/// or None when the triangle is degenerate in (u,v).
fn fundamental_form(
    mesh: &ChartMesh,
    base: &BaseMesh,
    face: &Face,
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    f2d: f64,
) -> Option<(f64, f64, f64)> {
    if f2d.abs() <= f64::MIN_POSITIVE {
        return None;
    }
    let q = |k: usize| base.position(mesh.verts[face.verts[k] as usize].root_id);
    let (ss, st) = partial_derivatives(f2d, v0, v1, v2, q(0), q(1), q(2));
    Some((ss.dot(&ss), ss.dot(&st), st.dot(&st)))
}

/// L² squared stretch of one face (integral form: already multiplied by the
/// 3D area). Returns the signed 2D area through `f2d`.
pub fn face_l2_squared_stretch(
    mesh: &ChartMesh,
    base: &BaseMesh,
    face: &Face,
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    f2d: &mut f64,
) -> f64 {
    let f3d = base.face_areas[face.root_id as usize];
    *f2d = signed_area_2d(v0, v1, v2);
    if f3d == 0.0 {
        // A zero-area face has no meaningful stretch.
        0.0
    } else if *f2d < 0.0 || (*f2d < ZERO_EPS2 && *f2d < f3d / 2.0) {
        INFINITE_STRETCH
    } else if f2d.abs() <= ZERO_EPS2 && f3d <= ZERO_EPS2 {
        0.0
    } else {
        match fundamental_form(mesh, base, face, v0, v1, v2, *f2d) {
            Some((a, _, c)) => (a + c) * f3d / 2.0,
            None => INFINITE_STRETCH,
        }
    }
}

/// L∞ squared-form stretch of one face: the larger singular value of the
/// 2D→3D map under `scale`, folded with the reciprocal of the smaller one so
/// both stretching and shrinking count.
pub fn face_ln_squared_stretch(
    mesh: &ChartMesh,
    base: &BaseMesh,
    face: &Face,
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    scale: f64,
    f2d: &mut f64,
) -> f64 {
    let f3d = base.face_areas[face.root_id as usize];
    *f2d = signed_area_2d(v0, v1, v2);
    if f3d == 0.0 {
        1.0
    } else if *f2d < 0.0 || (*f2d < ZERO_EPS2 && *f2d < f3d / 2.0) {
        INFINITE_STRETCH
    } else if f2d.abs() <= ZERO_EPS2 && f3d <= ZERO_EPS2 {
        1.0
    } else {
        let Some((a, b, c)) = fundamental_form(mesh, base, face, v0, v1, v2, *f2d) else {
            return INFINITE_STRETCH;
        };
        let disc = ((a - c) * (a - c) + 4.0 * b * b).max(0.0).sqrt();
        let sigma_max = ((a + c + disc) / 2.0).max(0.0).sqrt();
        let mut stretch = scale * sigma_max;
        let sigma_min_sq = (a + c - disc) / 2.0;
        if sigma_min_sq >= 0.0 {
            let shrink = scale * sigma_min_sq.sqrt();
            if shrink > f64::MIN_POSITIVE {
                stretch = stretch.max(1.0 / shrink);
            } else {
                stretch = INFINITE_STRETCH;
            }
        } else if stretch < 1.0 {
            stretch = 1.0 / stretch;
        }
        stretch
    }
}

/// Signal-specialized L² stretch: the IMT pulled back through the current
/// parameterization, combined with the geometric stretch through a bounded
/// ratio. Also returns the geometric form through `geo_form` for callers
/// accumulating whole-chart statistics.
pub fn face_signal_squared_stretch(
    mesh: &ChartMesh,
    base: &BaseMesh,
    face: &Face,
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    f2d: &mut f64,
    geo_form: Option<&mut [f64; 3]>,
) -> f64 {
    let root = face.root_id as usize;
    let f3d = base.face_areas[root];
    *f2d = signed_area_2d(v0, v1, v2);
    let (Some(imt), Some(canonical)) = (base.imt.as_ref(), base.canonical_uv.as_ref()) else {
        return face_l2_squared_stretch(mesh, base, face, v0, v1, v2, f2d);
    };
    if f3d == 0.0 {
        if let Some(g) = geo_form {
            *g = [1.0, 0.0, 1.0];
        }
        return 0.0;
    }
    if *f2d < 0.0 || (*f2d < ZERO_EPS2 && f3d > ZERO_EPS2) {
        return INFINITE_STRETCH;
    }
    if f2d.abs() <= ZERO_EPS2 {
        return 0.0;
    }

    let Some((a, b, c)) = fundamental_form(mesh, base, face, v0, v1, v2, *f2d) else {
        return INFINITE_STRETCH;
    };
    if let Some(g) = geo_form {
        *g = [a, b, c];
    }
    let geo_stretch = (a + c) / 2.0 * f3d;

    // Pull the per-face metric (integrated tensor averaged over the face)
    // back through the affine map (u,v) → canonical frame.
    let [m00, m01, m11] = imt[root];
    let m = [m00 / f3d, m01 / f3d, m11 / f3d];
    let uv = &canonical[root];
    let Some(j) = affine_jacobian(v0, v1, v2, uv[0], uv[1], uv[2]) else {
        return INFINITE_STRETCH;
    };
    // M' = Jᵀ M J, J = [j00 j01; j10 j11] mapping (u,v) derivatives.
    let col0 = (j[0], j[2]);
    let col1 = (j[1], j[3]);
    let mul = |x: (f64, f64), y: (f64, f64)| {
        x.0 * (m[0] * y.0 + m[1] * y.1) + x.1 * (m[1] * y.0 + m[2] * y.1)
    };
    let m00p = mul(col0, col0);
    let m11p = mul(col1, col1);
    let sig_stretch = (m00p + m11p) / 2.0 * f3d;

    sig_stretch.max(geo_stretch * MIN_SIG_GEO_RATIO)
}

/// 2×2 Jacobian of the affine map taking uv corners to canonical corners,
/// row-major `[j00, j01, j10, j11]`.
fn affine_jacobian(
    v0: Vector2<f64>,
    v1: Vector2<f64>,
    v2: Vector2<f64>,
    w0: Vector2<f64>,
    w1: Vector2<f64>,
    w2: Vector2<f64>,
) -> Option<[f64; 4]> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let det = e1.x * e2.y - e1.y * e2.x;
    if det.abs() <= f64::MIN_POSITIVE {
        return None;
    }
    let f1 = w1 - w0;
    let f2 = w2 - w0;
    // Solve J·[e1 e2] = [f1 f2].
    let inv = 1.0 / det;
    Some([
        (f1.x * e2.y - f2.x * e1.y) * inv,
        (f2.x * e1.x - f1.x * e2.x) * inv,
        (f1.y * e2.y - f2.y * e1.y) * inv,
        (f2.y * e1.x - f1.y * e2.x) * inv,
    ])
}

/// Whole-chart L² squared stretch (integral); `∞` as soon as a face folds.
pub fn chart_l2_geo_squared_stretch(mesh: &ChartMesh, base: &BaseMesh) -> f64 {
    let mut total = 0.0;
    let mut f2d = 0.0;
    for face in &mesh.faces {
        let s = face_l2_squared_stretch(
            mesh,
            base,
            face,
            mesh.verts[face.verts[0] as usize].uv,
            mesh.verts[face.verts[1] as usize].uv,
            mesh.verts[face.verts[2] as usize].uv,
            &mut f2d,
        );
        if s >= INFINITE_STRETCH {
            return INFINITE_STRETCH;
        }
        total += s;
    }
    total
}

/// Whole-chart L∞ stretch: worst face under the area-preserving scale.
pub fn chart_ln_squared_stretch(mesh: &ChartMesh, base: &BaseMesh) -> f64 {
    let mut area2d = 0.0;
    let mut area3d = 0.0;
    for face in &mesh.faces {
        area3d += base.face_areas[face.root_id as usize];
        area2d += signed_area_2d(
            mesh.verts[face.verts[0] as usize].uv,
            mesh.verts[face.verts[1] as usize].uv,
            mesh.verts[face.verts[2] as usize].uv,
        );
    }
    if area3d <= 0.0 || area2d <= 0.0 {
        return 1.0;
    }
    let scale = (area2d / area3d).sqrt();
    let mut worst = 1.0f64;
    let mut f2d = 0.0;
    for face in &mesh.faces {
        let s = face_ln_squared_stretch(
            mesh,
            base,
            face,
            mesh.verts[face.verts[0] as usize].uv,
            mesh.verts[face.verts[1] as usize].uv,
            mesh.verts[face.verts[2] as usize].uv,
            scale,
            &mut f2d,
        );
        if s >= INFINITE_STRETCH {
            return INFINITE_STRETCH;
        }
        worst = worst.max(s);
    }
    worst
}

/// Per-vertex stretch over the one-ring: max of face stretches in L∞ mode,
/// sum otherwise.
pub fn vertex_stretch(mesh: &ChartMesh, face_stretch: &[f64], vert: u32, ln_mode: bool) -> f64 {
    let faces = &mesh.verts[vert as usize].face_adj;
    if ln_mode {
        faces
            .iter()
            .map(|&f| face_stretch[f as usize])
            .fold(0.0, f64::max)
    } else {
        let mut total = 0.0;
        for &f in faces {
            let s = face_stretch[f as usize];
            if s >= INFINITE_STRETCH {
                return INFINITE_STRETCH;
            }
            total += s;
        }
        total
    }
}
