//! Atlas packing: four-direction border scan with rotation trials.
//!
//! Purpose
//! - Place every parameterized chart into one rectangular atlas so that no
//!   two charts come closer than the gutter, while keeping the overall
//!   width/height close to the requested aspect ratio.
//!
//! Method
//! - Each chart is aligned to its principal axis, then described by four
//!   monotone border polylines (top, bottom, left, right) sampled at pixel
//!   resolution. The growing atlas keeps the same four borders. Depending on
//!   which atlas axis lags the target aspect, the chart is test-inserted
//!   from the right, left, top, or bottom: it slides along the facing
//!   border in pixel steps, is pushed radially until it rests gutter-deep
//!   against the atlas border, and the candidate with the least enclosing-
//!   box waste wins (integrated gap along the touching profile breaks
//!   ties). The winning chart's borders then merge into the atlas borders
//!   as the radially-outer envelope.

mod border;
mod packer;

pub use border::{BorderProfile, ChartBorders};
pub use packer::{pack_charts, PackCfg, PackStats};

#[cfg(test)]
mod tests;
