//! Landmark selection by vertex importance.

use crate::geodesic::LandmarkDistances;
use crate::mesh::{ChartMesh, MUST_RESERVE};

/// Floor on the number of landmarks per chart.
pub const MIN_LANDMARK_NUMBER: usize = 10;

/// Pick landmark vertices: must-reserve vertices unconditionally, then the
/// most important vertices until the floor is met. Selection never splits a
/// run of equal importance, so the cut point is deterministic.
///
/// The returned list is ordered: must-reserve first, importance
/// non-increasing after.
pub fn select_landmarks(mesh: &ChartMesh, min_count: usize) -> Vec<u32> {
    let n = mesh.vert_count();
    let mut order: Vec<u32> = (0..n as u32).collect();
    if n <= min_count {
        return order;
    }
    order.sort_by(|&a, &b| {
        let ia = mesh.verts[a as usize].importance;
        let ib = mesh.verts[b as usize].importance;
        rank(ib).cmp(&rank(ia)).then(a.cmp(&b))
    });
    let mut count = 1;
    while count < n {
        let cur = mesh.verts[order[count - 1] as usize].importance;
        let prev = mesh.verts[order[count.saturating_sub(2)] as usize].importance;
        if cur > 0 && count >= min_count && count > 2 && cur != prev {
            break;
        }
        count += 1;
    }
    order.truncate(count);
    order
}

/// Sort key: must-reserve above everything, then raw importance.
#[inline]
fn rank(importance: i32) -> i64 {
    if importance == MUST_RESERVE {
        i64::MAX
    } else {
        i64::from(importance)
    }
}

/// Move the geodesically farthest pair of landmarks to the head of the
/// list, keeping the distance rows aligned. The pair seeds bi-partitioning
/// of the chart's children.
pub fn reserve_farthest_pair(landmarks: &mut [u32], distances: &mut LandmarkDistances) {
    if landmarks.len() < 3 {
        return;
    }
    let mut best = f64::NEG_INFINITY;
    let mut pair = (0usize, 1usize);
    for i in 0..landmarks.len() - 1 {
        for j in i + 1..landmarks.len() {
            let d = distances.geo(i, landmarks[j]);
            if d.is_finite() && d > best {
                best = d;
                pair = (i, j);
            }
        }
    }
    // pair.1 > pair.0, so the first swap cannot displace it.
    landmarks.swap(0, pair.0);
    distances.swap_rows(0, pair.0);
    let second = pair.1.max(1);
    landmarks.swap(1, second);
    distances.swap_rows(1, second);
}
