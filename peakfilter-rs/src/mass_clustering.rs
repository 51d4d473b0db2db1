//! Mass clustering: group frames whose m/z values agree within tolerance
//!
//! The m/z-sorted table is first cut into sections. A section boundary is only
//! placed between two frames whose tolerance windows cannot touch, so no mass
//! cluster ever spans two sections. Each section is then clustered on its own
//! with complete linkage, cutting the dendrogram at twice the tolerance
//! half-width of the section's largest m/z.
//!
//! # Example
//!
//! ```
//! use peakfilter::mass_clustering::cluster_by_mz;
//! use peakfilter::model::{Frame, FrameTable};
//! use peakfilter::tolerance::MassTolerance;
//!
//! let frames = vec![
//!     Frame::new(0, 500.1000, 1.0, vec![10.0]),
//!     Frame::new(1, 500.1001, 2.0, vec![10.0]),
//!     Frame::new(2, 500.1003, 3.0, vec![10.0]),
//!     Frame::new(3, 612.3000, 1.5, vec![10.0]),
//! ];
//! let mut table = FrameTable::new(vec!["R1".to_string()], frames).unwrap();
//!
//! let tolerance = MassTolerance::new(0.0, 5.0).unwrap();
//! cluster_by_mz(&mut table, &tolerance, 49).unwrap();
//! assert_eq!(table.mass_cluster_count(), 2);
//! ```

use std::ops::Range;

use log::{debug, info};

use crate::errors::{PeakFilterError, Result};
use crate::linkage::{complete_linkage, flat_clusters, CondensedDistances};
use crate::model::FrameTable;
use crate::tolerance::MassTolerance;

/// Default minimum number of frames per section
pub const DEFAULT_MIN_SECTION_SIZE: usize = 49;

/// Split m/z-sorted values into sections that no mass cluster can span
///
/// Every section but the last holds more than `min_section_size` values. The
/// first candidate boundary lies `min_section_size` rows after the section
/// start; from there the section is extended until the gap to the next value
/// exceeds the sum of both tolerance half-widths.
pub fn section_boundaries(
    mzs: &[f64],
    tolerance: &MassTolerance,
    min_section_size: usize,
) -> Vec<Range<usize>> {
    let n = mzs.len();
    let min_size = min_section_size.max(1);
    let mut sections = Vec::new();
    let mut begin = 0;

    while n - begin >= min_size {
        let mut end = begin + min_size;
        while end + 1 < n {
            let gap = mzs[end + 1] - mzs[end];
            if gap > tolerance.delta(mzs[end]) + tolerance.delta(mzs[end + 1]) {
                break;
            }
            end += 1;
        }
        let end = (end + 1).min(n);
        sections.push(begin..end);
        begin = end;
    }
    if begin < n {
        sections.push(begin..n);
    }

    sections
}

/// Cluster one section, returning labels starting at 1
pub fn cluster_section(mzs: &[f64], tolerance: &MassTolerance) -> Vec<u32> {
    match mzs.len() {
        0 => Vec::new(),
        1 => vec![1],
        n => {
            let max_mz = mzs.iter().copied().fold(f64::MIN, f64::max);
            let cut_off = 2.0 * tolerance.delta(max_mz);
            let merges = complete_linkage(CondensedDistances::from_points(mzs));
            flat_clusters(n, &merges, cut_off)
        }
    }
}

/// Assign `mz_cluster_id` to every frame
///
/// The table must be sorted ascending by m/z. On return it is sorted by
/// `(mz_cluster_id, rt, mz)` and ids are dense, starting at 1, numbered in
/// ascending m/z order of each cluster's first frame.
pub fn cluster_by_mz(
    table: &mut FrameTable,
    tolerance: &MassTolerance,
    min_section_size: usize,
) -> Result<()> {
    if min_section_size == 0 {
        return Err(PeakFilterError::parameter(
            "minSectionSize",
            min_section_size,
            "must be at least 1",
        ));
    }
    table.validate()?;
    table.ensure_sorted_by_mz()?;

    if table.is_empty() {
        return Ok(());
    }

    let mzs: Vec<f64> = table.frames().iter().map(|f| f.mz).collect();
    let sections = section_boundaries(&mzs, tolerance, min_section_size);
    debug!("mass clustering: {} frames split into {} sections", mzs.len(), sections.len());

    let mut offset = 0;
    for section in sections {
        let labels = cluster_section(&mzs[section.clone()], tolerance);
        let section_clusters = labels.iter().copied().max().unwrap_or(0);
        debug!(
            "section {}..{} (m/z {:.5}-{:.5}): {} clusters",
            section.start,
            section.end,
            mzs[section.start],
            mzs[section.end - 1],
            section_clusters
        );
        for (frame, label) in table.frames_mut()[section].iter_mut().zip(labels) {
            frame.mz_cluster_id = Some(offset + label);
        }
        offset += section_clusters;
    }

    table.sort_by_cluster();
    renumber_densely(table);

    info!(
        "mass clustering: {} frames grouped into {} mass clusters",
        table.len(),
        table.mass_cluster_count()
    );
    Ok(())
}

/// Renumber consecutive runs of equal mass cluster ids 1, 2, 3, ...
fn renumber_densely(table: &mut FrameTable) {
    let mut previous = None;
    let mut current = 0;
    for frame in table.frames_mut() {
        if frame.mz_cluster_id != previous {
            previous = frame.mz_cluster_id;
            current += 1;
        }
        frame.mz_cluster_id = Some(current);
    }
}
