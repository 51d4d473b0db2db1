//! Mass reassignment: snap every frame of a cluster to its most intense m/z
//!
//! Within each mass cluster (or feature cluster), the frame with the highest
//! sample mean intensity gives its m/z to all the other frames of the group.
//! Sample means average consecutive runs of `replicates_per_sample` replicate
//! columns.
//!
//! # Example
//!
//! ```
//! use peakfilter::mass_reassignment::{reassign_masses, MassGrouping};
//! use peakfilter::model::{Frame, FrameTable};
//!
//! let mut frames = vec![
//!     Frame::new(0, 500.3000, 5.0, vec![10.0]),
//!     Frame::new(1, 500.3010, 5.5, vec![90.0]),
//! ];
//! for frame in frames.iter_mut() {
//!     frame.mz_cluster_id = Some(1);
//! }
//! let mut table = FrameTable::new(vec!["R1".to_string()], frames).unwrap();
//!
//! let changed = reassign_masses(&mut table, MassGrouping::MassCluster, 1).unwrap();
//! assert_eq!(changed, 1);
//! assert!(table.frames().iter().all(|f| f.mz == 500.3010));
//! ```

use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::errors::{PeakFilterError, Result};
use crate::model::{Frame, FrameTable};

/// Cluster level at which masses are reassigned
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
pub enum MassGrouping {
    #[default]
    MassCluster,
    FeatureCluster,
}

impl MassGrouping {
    pub fn from_feat_mass_assignment(feat_mass_assignment: bool) -> Self {
        if feat_mass_assignment {
            MassGrouping::FeatureCluster
        } else {
            MassGrouping::MassCluster
        }
    }

    fn cluster_id(self, frame: &Frame) -> Option<u32> {
        match self {
            MassGrouping::MassCluster => frame.mz_cluster_id,
            MassGrouping::FeatureCluster => frame.feature_cluster_id,
        }
    }
}

/// Highest mean over the samples of one frame
pub fn max_sample_mean(intensities: &[f64], replicates_per_sample: usize) -> f64 {
    intensities
        .chunks(replicates_per_sample.max(1))
        .map(|sample| sample.iter().sum::<f64>() / sample.len() as f64)
        .fold(0.0, f64::max)
}

/// Replace the m/z of every frame by the m/z of its group's most intense frame
///
/// The first frame in row order wins ties. Returns the number of frames whose
/// m/z changed.
pub fn reassign_masses(
    table: &mut FrameTable,
    grouping: MassGrouping,
    replicates_per_sample: usize,
) -> Result<usize> {
    if replicates_per_sample == 0 || table.replicate_count() % replicates_per_sample != 0 {
        return Err(PeakFilterError::parameter(
            "replicatesPerSample",
            replicates_per_sample,
            "must be non-zero and divide the number of replicate columns",
        ));
    }
    table.validate()?;

    let mut groups = Vec::with_capacity(table.len());
    for frame in table.frames() {
        let id = grouping.cluster_id(frame).ok_or_else(|| {
            PeakFilterError::input(format!("frame {} has no {} id", frame.id, grouping))
        })?;
        groups.push(id);
    }

    let means: Vec<f64> = table
        .frames()
        .iter()
        .map(|f| max_sample_mean(&f.intensities, replicates_per_sample))
        .collect();
    let members = groups
        .iter()
        .enumerate()
        .map(|(idx, &id)| (id, idx))
        .into_group_map();

    let mut targets = vec![0.0; table.len()];
    for rows in members.values() {
        let mut best = rows[0];
        for &row in &rows[1..] {
            if means[row] > means[best] {
                best = row;
            }
        }
        let mz = table.frames()[best].mz;
        for &row in rows {
            targets[row] = mz;
        }
    }

    let mut changed = 0;
    for (frame, mz) in table.frames_mut().iter_mut().zip(targets) {
        if frame.mz != mz {
            frame.mz = mz;
            changed += 1;
        }
    }

    info!(
        "mass reassignment: {} of {} frames moved to their {} m/z",
        changed,
        table.len(),
        grouping
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(u32, u32, f64, [f64; 4])]) -> FrameTable {
        let frames = rows
            .iter()
            .enumerate()
            .map(|(id, &(mass, feature, mz, intensities))| {
                let mut frame = Frame::new(id, mz, id as f64, intensities.to_vec());
                frame.mz_cluster_id = Some(mass);
                frame.feature_cluster_id = Some(feature);
                frame
            })
            .collect();
        let replicates = ["S1_1", "S1_2", "S2_1", "S2_2"].map(String::from).to_vec();
        FrameTable::new(replicates, frames).unwrap()
    }

    fn mzs(table: &FrameTable) -> Vec<f64> {
        table.frames().iter().map(|f| f.mz).collect()
    }

    #[test]
    fn test_max_sample_mean() {
        assert_eq!(max_sample_mean(&[10.0, 0.0, 4.0, 4.0], 2), 5.0);
        assert_eq!(max_sample_mean(&[10.0, 0.0, 4.0, 4.0], 1), 10.0);
        assert_eq!(max_sample_mean(&[0.0, 0.0], 2), 0.0);
    }

    #[test]
    fn test_mass_cluster_grouping_uses_sample_means() {
        // Frame 0 has the highest single replicate, frame 1 the highest mean
        let mut table = table(&[
            (1, 1, 300.0001, [90.0, 0.0, 0.0, 0.0]),
            (1, 2, 300.0003, [50.0, 50.0, 0.0, 0.0]),
            (2, 3, 410.2000, [1.0, 1.0, 1.0, 1.0]),
        ]);
        let changed = reassign_masses(&mut table, MassGrouping::MassCluster, 2).unwrap();

        assert_eq!(changed, 1);
        assert_eq!(mzs(&table), vec![300.0003, 300.0003, 410.2]);
    }

    #[test]
    fn test_feature_cluster_grouping() {
        let mut table = table(&[
            (1, 1, 300.0001, [90.0, 0.0, 0.0, 0.0]),
            (1, 2, 300.0003, [50.0, 50.0, 0.0, 0.0]),
            (1, 2, 300.0002, [80.0, 80.0, 0.0, 0.0]),
        ]);
        let changed = reassign_masses(&mut table, MassGrouping::FeatureCluster, 2).unwrap();

        assert_eq!(changed, 1);
        assert_eq!(mzs(&table), vec![300.0001, 300.0002, 300.0002]);
    }

    #[test]
    fn test_first_frame_wins_ties() {
        let mut table = table(&[
            (1, 1, 600.0, [0.0, 0.0, 8.0, 8.0]),
            (1, 1, 600.001, [8.0, 8.0, 0.0, 0.0]),
        ]);
        reassign_masses(&mut table, MassGrouping::MassCluster, 2).unwrap();
        assert_eq!(mzs(&table), vec![600.0, 600.0]);
    }

    #[test]
    fn test_grouping_from_parameter() {
        assert_eq!(MassGrouping::from_feat_mass_assignment(true), MassGrouping::FeatureCluster);
        assert_eq!(MassGrouping::from_feat_mass_assignment(false), MassGrouping::MassCluster);
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let mut table = table(&[(1, 1, 300.0, [1.0, 0.0, 0.0, 0.0])]);
        assert!(matches!(
            reassign_masses(&mut table, MassGrouping::MassCluster, 3),
            Err(PeakFilterError::InvalidParameter { name: "replicatesPerSample", .. })
        ));
        assert!(reassign_masses(&mut table, MassGrouping::MassCluster, 0).is_err());

        table.frames_mut()[0].feature_cluster_id = None;
        assert!(matches!(
            reassign_masses(&mut table, MassGrouping::FeatureCluster, 2),
            Err(PeakFilterError::InvalidInput(_))
        ));
    }
}
