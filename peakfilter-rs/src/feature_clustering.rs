//! Feature clustering: split mass clusters into RT-contiguous runs
//!
//! The table must already be sorted by `(mz_cluster_id, rt, mz)`, which is the
//! order [`cluster_by_mz`](crate::mass_clustering::cluster_by_mz) leaves it in.

use itertools::Itertools;
use log::info;

use crate::errors::Result;
use crate::model::{Frame, FrameTable};
use crate::tolerance::{round_to, rt_delta, MZ_PRECISION};

/// True when a new feature cluster starts at `next`
///
/// `max_gap` is the already rounded RT threshold; the gap itself is rounded
/// the same way before comparing.
pub fn is_feature_boundary(previous: &Frame, next: &Frame, max_gap: f64) -> bool {
    previous.mz_cluster_id != next.mz_cluster_id
        || round_to(next.rt - previous.rt, MZ_PRECISION) > max_gap
}

/// Assign `feature_cluster_id` to every frame
///
/// Ids are dense, start at 1 and follow row order.
pub fn cluster_by_features(table: &mut FrameTable, max_rt_diff_adjacent_frame: f64) -> Result<()> {
    let max_gap = rt_delta(max_rt_diff_adjacent_frame)?;
    table.ensure_sorted_by_cluster()?;

    let boundaries: Vec<bool> = table
        .frames()
        .iter()
        .tuple_windows()
        .map(|(previous, next)| is_feature_boundary(previous, next, max_gap))
        .collect();

    let mut current = 1;
    for (idx, frame) in table.frames_mut().iter_mut().enumerate() {
        if idx > 0 && boundaries[idx - 1] {
            current += 1;
        }
        frame.feature_cluster_id = Some(current);
    }

    info!(
        "feature clustering: {} mass clusters split into {} feature clusters",
        table.mass_cluster_count(),
        table.feature_cluster_count()
    );
    Ok(())
}

/// Give every frame its own feature cluster
///
/// Used when the input already reports one feature per row, so there is
/// nothing left to consolidate.
pub fn assign_feature_per_frame(table: &mut FrameTable) {
    for (idx, frame) in table.frames_mut().iter_mut().enumerate() {
        frame.feature_cluster_id = Some(idx as u32 + 1);
    }
    info!("feature clustering: {} frames kept as single features", table.len());
}
