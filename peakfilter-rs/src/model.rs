//! Core data structures: frames, the frame table and its column layout
//!
//! A [`FrameTable`] is the single structure every stage consumes and returns.
//! Row order matters: the mass clusterer expects frames sorted by m/z and the
//! feature clusterer expects them sorted by `(mz_cluster_id, rt, mz)`.
//!
//! # Example
//!
//! ```
//! use peakfilter::model::{ColumnLayout, FrameTable};
//!
//! let layout = ColumnLayout {
//!     mz_column: "mz".to_string(),
//!     rt_column: "rt".to_string(),
//!     first_replicate_column: 2,
//!     num_samples: 1,
//!     replicates_per_sample: 2,
//! };
//! let header = ["mz", "rt", "S1_R1", "S1_R2"].map(String::from);
//! let rows = vec![vec![500.1, 1.0, 100.0, 80.0], vec![500.2, 1.1, 0.0, 40.0]];
//!
//! let table = FrameTable::from_columns(&layout, &header, &rows).unwrap();
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.replicates(), &["S1_R1", "S1_R2"]);
//! ```

use std::cmp::Ordering;
use std::ops::Range;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::{PeakFilterError, Result};

// ============================================================================
// Frame
// ============================================================================

/// One detected ion observation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Original row index, never changed by any stage
    pub id: usize,
    pub mz: f64,
    /// Retention time in minutes
    pub rt: f64,
    /// One intensity per replicate, 0 meaning "not detected"
    pub intensities: Vec<f64>,
    #[serde(rename = "mzClusterID", default)]
    pub mz_cluster_id: Option<u32>,
    #[serde(rename = "FeatureClusterID", default)]
    pub feature_cluster_id: Option<u32>,
}

impl Frame {
    pub fn new(id: usize, mz: f64, rt: f64, intensities: Vec<f64>) -> Self {
        Self {
            id,
            mz,
            rt,
            intensities,
            mz_cluster_id: None,
            feature_cluster_id: None,
        }
    }

    /// True when every replicate intensity is zero
    pub fn is_empty(&self) -> bool {
        self.intensities.iter().all(|&i| i == 0.0)
    }

    /// Sum of the replicate intensities
    pub fn total_intensity(&self) -> f64 {
        self.intensities.iter().sum()
    }
}

// ============================================================================
// Column layout
// ============================================================================

/// Where the frame fields live in a raw numeric table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    /// Name of the m/z column
    pub mz_column: String,
    /// Name of the retention time column
    pub rt_column: String,
    /// 0-based index of the first replicate intensity column
    pub first_replicate_column: usize,
    /// Number of samples
    pub num_samples: usize,
    /// Technical replicates per sample
    pub replicates_per_sample: usize,
}

impl ColumnLayout {
    /// Number of replicate intensity columns
    pub fn replicate_count(&self) -> usize {
        self.num_samples * self.replicates_per_sample
    }

    /// Column range holding the replicate intensities
    pub fn replicate_columns(&self) -> Range<usize> {
        self.first_replicate_column..self.first_replicate_column + self.replicate_count()
    }
}

// ============================================================================
// Frame table
// ============================================================================

/// Ordered collection of frames sharing the same replicate columns
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTable {
    replicates: Vec<String>,
    frames: Vec<Frame>,
}

impl FrameTable {
    /// Create a table, checking that every frame has one intensity per replicate
    pub fn new(replicates: Vec<String>, frames: Vec<Frame>) -> Result<Self> {
        let table = Self { replicates, frames };
        table.check_widths()?;
        Ok(table)
    }

    /// Build a table from a header and numeric rows using `layout`
    ///
    /// Frame ids are the row positions in `rows`.
    pub fn from_columns<S: AsRef<str>>(
        layout: &ColumnLayout,
        header: &[S],
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        let position = |name: &str| {
            header
                .iter()
                .position(|h| h.as_ref() == name)
                .ok_or_else(|| PeakFilterError::input(format!("missing required column '{name}'")))
        };
        let mz_idx = position(layout.mz_column.as_str())?;
        let rt_idx = position(layout.rt_column.as_str())?;

        if layout.replicate_count() == 0 {
            return Err(PeakFilterError::parameter(
                "numSamples",
                layout.replicate_count(),
                "at least one replicate column is required",
            ));
        }
        let columns = layout.replicate_columns();
        if columns.end > header.len() {
            return Err(PeakFilterError::input(format!(
                "expected {} replicate columns starting at column {}, but the header has {} columns",
                layout.replicate_count(),
                layout.first_replicate_column,
                header.len()
            )));
        }
        if columns.contains(&mz_idx) || columns.contains(&rt_idx) {
            return Err(PeakFilterError::input(
                "m/z and RT columns overlap the replicate columns",
            ));
        }

        let replicates = header[columns.clone()]
            .iter()
            .map(|h| h.as_ref().to_string())
            .collect();

        let mut frames = Vec::with_capacity(rows.len());
        for (id, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(PeakFilterError::input(format!(
                    "row {id} has {} values but the header has {} columns",
                    row.len(),
                    header.len()
                )));
            }
            frames.push(Frame::new(
                id,
                row[mz_idx],
                row[rt_idx],
                row[columns.clone()].to_vec(),
            ));
        }

        let table = Self { replicates, frames };
        table.validate()?;
        Ok(table)
    }

    pub fn replicates(&self) -> &[String] {
        &self.replicates
    }

    pub fn replicate_count(&self) -> usize {
        self.replicates.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Intensities of one replicate column, in row order
    pub fn replicate_column(&self, replicate: usize) -> Vec<f64> {
        self.frames
            .iter()
            .map(|f| f.intensities[replicate])
            .collect()
    }

    /// Sum of one replicate column
    pub fn replicate_total(&self, replicate: usize) -> f64 {
        self.frames.iter().map(|f| f.intensities[replicate]).sum()
    }

    /// Keep only the frames for which `keep` returns true, preserving order
    pub(crate) fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Frame) -> bool,
    {
        self.frames.retain(keep);
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn check_widths(&self) -> Result<()> {
        let width = self.replicates.len();
        match self.frames.iter().find(|f| f.intensities.len() != width) {
            Some(frame) => Err(PeakFilterError::input(format!(
                "frame {} has {} intensities but the table has {} replicates",
                frame.id,
                frame.intensities.len(),
                width
            ))),
            None => Ok(()),
        }
    }

    /// Check widths, finite m/z and RT values and finite non-negative intensities
    pub fn validate(&self) -> Result<()> {
        self.check_widths()?;
        for frame in &self.frames {
            if !frame.mz.is_finite() || !frame.rt.is_finite() {
                return Err(PeakFilterError::input(format!(
                    "frame {} has a non-finite m/z or RT (mz = {}, rt = {})",
                    frame.id, frame.mz, frame.rt
                )));
            }
            if let Some(bad) = frame
                .intensities
                .iter()
                .find(|i| !i.is_finite() || **i < 0.0)
            {
                return Err(PeakFilterError::input(format!(
                    "frame {} has an invalid intensity {}",
                    frame.id, bad
                )));
            }
        }
        Ok(())
    }

    /// Fail unless the frames are sorted ascending by m/z
    pub fn ensure_sorted_by_mz(&self) -> Result<()> {
        match self
            .frames
            .iter()
            .tuple_windows()
            .find(|(a, b)| !(a.mz <= b.mz))
        {
            Some((a, b)) => Err(PeakFilterError::input(format!(
                "frames are not sorted by m/z: frame {} (mz = {}) precedes frame {} (mz = {})",
                a.id, a.mz, b.id, b.mz
            ))),
            None => Ok(()),
        }
    }

    /// Fail unless every frame has a mass cluster and the table is sorted by
    /// `(mz_cluster_id, rt, mz)`
    pub fn ensure_sorted_by_cluster(&self) -> Result<()> {
        if let Some(frame) = self.frames.iter().find(|f| f.mz_cluster_id.is_none()) {
            return Err(PeakFilterError::input(format!(
                "frame {} has no mass cluster id",
                frame.id
            )));
        }
        match self
            .frames
            .iter()
            .tuple_windows()
            .find(|(a, b)| cluster_order(a, b) == Ordering::Greater)
        {
            Some((a, b)) => Err(PeakFilterError::input(format!(
                "frames are not sorted by (mzClusterID, RT, m/z): frame {} precedes frame {}",
                a.id, b.id
            ))),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Sorting
    // ========================================================================

    /// Stable sort by m/z; fails on non-finite values
    pub fn sort_by_mz(&mut self) -> Result<()> {
        self.validate()?;
        self.frames.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Ok(())
    }

    /// Stable sort by `(mz_cluster_id, rt, mz)`
    pub(crate) fn sort_by_cluster(&mut self) {
        self.frames.sort_by(cluster_order);
    }

    // ========================================================================
    // Feature cluster access
    // ========================================================================

    /// Row ranges of consecutive frames sharing a feature cluster id
    ///
    /// Frames without a feature cluster id form single-row ranges.
    pub fn feature_cluster_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for idx in 1..=self.frames.len() {
            let boundary = idx == self.frames.len()
                || self.frames[idx].feature_cluster_id.is_none()
                || self.frames[idx].feature_cluster_id != self.frames[start].feature_cluster_id;
            if boundary {
                ranges.push(start..idx);
                start = idx;
            }
        }
        ranges
    }

    /// Number of distinct mass clusters
    pub fn mass_cluster_count(&self) -> usize {
        self.frames
            .iter()
            .filter_map(|f| f.mz_cluster_id)
            .unique()
            .count()
    }

    /// Number of distinct feature clusters
    pub fn feature_cluster_count(&self) -> usize {
        self.frames
            .iter()
            .filter_map(|f| f.feature_cluster_id)
            .unique()
            .count()
    }
}

fn cluster_order(a: &Frame, b: &Frame) -> Ordering {
    a.mz_cluster_id
        .cmp(&b.mz_cluster_id)
        .then(a.rt.total_cmp(&b.rt))
        .then(a.mz.total_cmp(&b.mz))
}
