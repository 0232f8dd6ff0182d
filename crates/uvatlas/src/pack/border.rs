//! Sampled monotone border polylines.
//!
//! A border maps a pixel-sized tangent slot to the outermost radial
//! coordinate the shape reaches inside that slot. Sampling at the pixel
//! grid keeps every border monotone along the tangent axis by construction
//! and turns the envelope merge into a pointwise min/max walk.

use nalgebra::Vector2;

use crate::mesh::ChartMesh;

/// One directional border: radial extremes per tangent slot, with a signed
/// slot offset so the range can grow in both directions.
#[derive(Clone, Debug)]
pub struct BorderProfile {
    values: Vec<f64>,
    start: i64,
    /// +1 keeps maxima (top/right borders), −1 keeps minima (bottom/left).
    sign: f64,
}

impl BorderProfile {
    pub fn new(outer_is_max: bool) -> Self {
        Self {
            values: Vec::new(),
            start: 0,
            sign: if outer_is_max { 1.0 } else { -1.0 },
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn slot_range(&self) -> (i64, i64) {
        (self.start, self.start + self.values.len() as i64)
    }

    /// Outer radial value of a slot, if the border covers it.
    #[inline]
    pub fn get(&self, slot: i64) -> Option<f64> {
        if slot < self.start {
            return None;
        }
        let i = (slot - self.start) as usize;
        let v = *self.values.get(i)?;
        if v.is_finite() {
            Some(v)
        } else {
            None
        }
    }

    /// Merge `value` into a slot, keeping the radially-outer envelope and
    /// growing the covered range as needed.
    pub fn merge(&mut self, slot: i64, value: f64) {
        if self.values.is_empty() {
            self.start = slot;
            self.values.push(value);
            return;
        }
        if slot < self.start {
            let grow = (self.start - slot) as usize;
            let mut fresh = vec![f64::NEG_INFINITY * self.sign; grow];
            fresh.extend_from_slice(&self.values);
            self.values = fresh;
            self.start = slot;
        }
        let i = (slot - self.start) as usize;
        if i >= self.values.len() {
            self.values.resize(i + 1, f64::NEG_INFINITY * self.sign);
        }
        let v = &mut self.values[i];
        if !v.is_finite() || (value - *v) * self.sign > 0.0 {
            *v = value;
        }
    }
}

/// The four borders of one chart pose, sampled at `pixel` resolution with
/// the bounding box anchored at the origin.
#[derive(Clone, Debug)]
pub struct ChartBorders {
    pub width: f64,
    pub height: f64,
    /// Outermost y per x-slot.
    pub top: Vec<f64>,
    /// Innermost y per x-slot.
    pub bottom: Vec<f64>,
    /// Innermost x per y-slot.
    pub left: Vec<f64>,
    /// Outermost x per y-slot.
    pub right: Vec<f64>,
}

impl ChartBorders {
    /// Rasterize the boundary of `mesh` under the vertex placement `uv`
    /// (already anchored at the origin).
    pub fn build(mesh: &ChartMesh, uv: &[Vector2<f64>], width: f64, height: f64, pixel: f64) -> Self {
        let cols = (width / pixel).ceil().max(1.0) as usize + 1;
        let rows = (height / pixel).ceil().max(1.0) as usize + 1;
        let mut borders = Self {
            width,
            height,
            top: vec![f64::NEG_INFINITY; cols],
            bottom: vec![f64::INFINITY; cols],
            left: vec![f64::INFINITY; rows],
            right: vec![f64::NEG_INFINITY; rows],
        };
        for edge in &mesh.edges {
            if !edge.is_boundary {
                continue;
            }
            let a = uv[edge.verts[0] as usize];
            let b = uv[edge.verts[1] as usize];
            borders.rasterize_segment(a, b, pixel);
        }
        if mesh.edges.iter().all(|e| !e.is_boundary) {
            // Closed charts cannot appear here, but stay safe: use every
            // edge instead.
            for edge in &mesh.edges {
                let a = uv[edge.verts[0] as usize];
                let b = uv[edge.verts[1] as usize];
                borders.rasterize_segment(a, b, pixel);
            }
        }
        // Uncovered slots fall back to the full box: conservative, so a
        // sampling gap can never cause an overlap.
        for (t, b) in borders.top.iter_mut().zip(&mut borders.bottom) {
            if !t.is_finite() {
                *t = height;
            }
            if !b.is_finite() {
                *b = 0.0;
            }
        }
        for (l, r) in borders.left.iter_mut().zip(&mut borders.right) {
            if !l.is_finite() {
                *l = 0.0;
            }
            if !r.is_finite() {
                *r = width;
            }
        }
        borders
    }

    fn rasterize_segment(&mut self, a: Vector2<f64>, b: Vector2<f64>, pixel: f64) {
        // March the segment at sub-pixel steps, updating the slot extremes
        // of every sample.
        let len = (b - a).norm();
        let steps = (len / (pixel * 0.5)).ceil().max(1.0) as usize;
        for s in 0..=steps {
            let t = s as f64 / steps as f64;
            let p = a + (b - a) * t;
            let col = ((p.x / pixel) as i64).clamp(0, self.top.len() as i64 - 1) as usize;
            let row = ((p.y / pixel) as i64).clamp(0, self.left.len() as i64 - 1) as usize;
            if p.y > self.top[col] {
                self.top[col] = p.y;
            }
            if p.y < self.bottom[col] {
                self.bottom[col] = p.y;
            }
            if p.x < self.left[row] {
                self.left[row] = p.x;
            }
            if p.x > self.right[row] {
                self.right[row] = p.x;
            }
        }
    }
}
