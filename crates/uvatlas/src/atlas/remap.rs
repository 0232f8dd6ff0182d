//! Replaying the atlas vertex duplication onto caller data.

use super::error::AtlasError;

/// Build a new per-vertex buffer following a vertex remap.
///
/// `remap[i]` names the source vertex of atlas vertex `i`; `stride` is the
/// byte size of one vertex record in `src`. The output holds one record per
/// remap entry, so attributes of a vertex the atlas split appear once per
/// copy.
pub fn apply_remap(remap: &[u32], stride: usize, src: &[u8]) -> Result<Vec<u8>, AtlasError> {
    if stride == 0 {
        return Err(AtlasError::invalid("vertex stride must be positive"));
    }
    if src.len() % stride != 0 {
        return Err(AtlasError::invalid(
            "source buffer size is not a multiple of the stride",
        ));
    }
    let src_count = src.len() / stride;
    let mut out = Vec::with_capacity(remap.len() * stride);
    for &from in remap {
        let from = from as usize;
        if from >= src_count {
            return Err(AtlasError::invalid(format!(
                "remap entry {from} out of range ({src_count} source vertices)"
            )));
        }
        out.extend_from_slice(&src[from * stride..(from + 1) * stride]);
    }
    Ok(out)
}
