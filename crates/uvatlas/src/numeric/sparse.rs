//! Row-major sparse matrix and conjugate gradient on normal equations.
//!
//! The parameterizers assemble rectangular systems `A·x = b` (one row per
//! constraint) and solve the SPD normal equations `AᵀA·x = Aᵀb` without ever
//! materializing `AᵀA`: the CG loop applies `Aᵀ(A·d)` row-wise.

/// One stored entry of a sparse row.
#[derive(Clone, Copy, Debug)]
struct RowItem {
    col: usize,
    value: f64,
}

/// Row-major sparse matrix with per-row entry lists.
///
/// Rows are short (a handful of entries per constraint), so lookups scan
/// linearly instead of keeping the entries sorted.
#[derive(Clone, Debug, Default)]
pub struct SparseMatrix {
    rows: Vec<Vec<RowItem>>,
    cols: usize,
}

impl SparseMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: vec![Vec::new(); rows],
            cols,
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn col_count(&self) -> usize {
        self.cols
    }

    /// Set entry (row, col), replacing an existing value.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.rows.len() && col < self.cols);
        let items = &mut self.rows[row];
        match items.iter_mut().find(|it| it.col == col) {
            Some(it) => it.value = value,
            None => items.push(RowItem { col, value }),
        }
    }

    /// Add `delta` onto entry (row, col), creating it if absent.
    pub fn add(&mut self, row: usize, col: usize, delta: f64) {
        debug_assert!(row < self.rows.len() && col < self.cols);
        let items = &mut self.rows[row];
        match items.iter_mut().find(|it| it.col == col) {
            Some(it) => it.value += delta,
            None => items.push(RowItem { col, value: delta }),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row]
            .iter()
            .find(|it| it.col == col)
            .map_or(0.0, |it| it.value)
    }

    /// `dest = A · v`.
    pub fn mul_vec(&self, v: &[f64], dest: &mut Vec<f64>) {
        debug_assert_eq!(v.len(), self.cols);
        dest.clear();
        dest.resize(self.rows.len(), 0.0);
        for (out, row) in dest.iter_mut().zip(&self.rows) {
            let mut acc = 0.0;
            for it in row {
                acc += it.value * v[it.col];
            }
            *out = acc;
        }
    }

    /// `dest = Aᵀ · v`.
    pub fn mul_trans_vec(&self, v: &[f64], dest: &mut Vec<f64>) {
        debug_assert_eq!(v.len(), self.rows.len());
        dest.clear();
        dest.resize(self.cols, 0.0);
        for (row, &vi) in self.rows.iter().zip(v) {
            for it in row {
                dest[it.col] += it.value * vi;
            }
        }
    }

    /// `dest = AᵀA · v` without forming `AᵀA`.
    pub fn mul_normal_vec(&self, v: &[f64], scratch: &mut Vec<f64>, dest: &mut Vec<f64>) {
        self.mul_vec(v, scratch);
        self.mul_trans_vec(scratch, dest);
    }
}

/// Result of a conjugate-gradient run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CgOutcome {
    /// Residual dropped below the relative tolerance.
    Converged { iterations: usize },
    /// Iteration cap reached first.
    Exhausted,
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `AᵀA·x = Aᵀb` by conjugate gradient.
///
/// `x` carries the initial guess (zero-filled to the right size if empty) and
/// receives the solution. Convergence uses the relative criterion
/// `‖r‖² ≤ ε²·‖r₀‖²`; the residual is recomputed from scratch every ten
/// iterations to shed accumulated drift.
pub fn solve_normal_cg(
    a: &SparseMatrix,
    b: &[f64],
    x: &mut Vec<f64>,
    max_iterations: usize,
    epsilon: f64,
) -> CgOutcome {
    let n = a.col_count();
    if x.len() != n {
        x.clear();
        x.resize(n, 0.0);
    }

    let mut rhs = Vec::new();
    a.mul_trans_vec(b, &mut rhs);

    let mut scratch = Vec::new();
    let mut ax = Vec::new();
    a.mul_normal_vec(x, &mut scratch, &mut ax);

    let mut r: Vec<f64> = rhs.iter().zip(&ax).map(|(bi, ai)| bi - ai).collect();
    let mut d = r.clone();
    let mut q = Vec::new();

    let mut delta_new = dot(&r, &r);
    let delta_zero = delta_new;
    let err_bound = delta_zero * epsilon * epsilon;

    let mut iter = 0;
    while iter < max_iterations && delta_new > err_bound {
        a.mul_normal_vec(&d, &mut scratch, &mut q);
        let dq = dot(&d, &q);
        if dq.abs() <= f64::MIN_POSITIVE {
            break;
        }
        let alpha = delta_new / dq;
        for (xi, di) in x.iter_mut().zip(&d) {
            *xi += alpha * di;
        }
        if iter % 10 == 0 {
            a.mul_normal_vec(x, &mut scratch, &mut ax);
            for ((ri, bi), ai) in r.iter_mut().zip(&rhs).zip(&ax) {
                *ri = bi - ai;
            }
        } else {
            for (ri, qi) in r.iter_mut().zip(&q) {
                *ri -= alpha * qi;
            }
        }
        let delta_old = delta_new;
        delta_new = dot(&r, &r);
        let beta = delta_new / delta_old;
        for (di, ri) in d.iter_mut().zip(&r) {
            *di = ri + beta * *di;
        }
        iter += 1;
    }

    if delta_new <= err_bound {
        CgOutcome::Converged { iterations: iter }
    } else {
        CgOutcome::Exhausted
    }
}
