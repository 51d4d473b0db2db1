//! peakfilter-rs: clustering and peak consolidation for LC/MS lipidomics feature tables
//!
//! This library takes a table of detected ion frames (m/z, retention time and
//! one intensity per sample replicate) and removes the redundancy left by the
//! detection step: frames are grouped into mass clusters and RT-contiguous
//! feature clusters, every chromatographic peak is merged into its apex frame
//! and the frames left empty are dropped.
//!
//! # Features
//!
//! - **Tolerance math**: fixed + PPM m/z windows and RT windows with consistent rounding
//! - **Mass clustering**: sectioned complete-linkage clustering on m/z
//! - **Feature clustering**: RT run-length segmentation within mass clusters
//! - **Peak consolidation**: per replicate frame categorization state machine
//! - **Empty frame reaping**: with an injectable audit trail of removed rows
//! - **Mass reassignment**: snap each cluster to the m/z of its most intense frame
//! - **Parallelism**: feature clusters consolidated on a rayon pool (`parallelism` feature)
//!
//! # Quick Start
//!
//! ```
//! use peakfilter::{ColumnLayout, FrameTable, LogAuditSink, PeakFilter, PeakFilterParameters};
//!
//! let layout = ColumnLayout {
//!     mz_column: "mz".to_string(),
//!     rt_column: "rt".to_string(),
//!     first_replicate_column: 2,
//!     num_samples: 1,
//!     replicates_per_sample: 1,
//! };
//! let header = ["mz", "rt", "S1"];
//! let rows = vec![
//!     vec![760.5850, 10.00, 20.0],
//!     vec![760.5852, 10.05, 400.0],
//!     vec![760.5849, 10.10, 60.0],
//! ];
//! let table = FrameTable::from_columns(&layout, &header, &rows).unwrap();
//!
//! let filter = PeakFilter::new(PeakFilterParameters::default()).unwrap();
//! let table = filter.run(table, &mut LogAuditSink).unwrap();
//!
//! assert_eq!(table.len(), 1);
//! assert_eq!(table.frames()[0].intensities, vec![460.0]);
//! ```
//!
//! # Module Organization
//!
//! - [`tolerance`]: m/z and RT tolerance windows
//! - [`model`]: Frames, the frame table and its column layout
//! - [`params`]: Parameters and their JSON form
//! - [`linkage`]: Complete-linkage hierarchical clustering
//! - [`mass_clustering`]: Mass clusters
//! - [`feature_clustering`]: Feature clusters
//! - [`peak_consolidation`]: Peak centre detection and intensity merging
//! - [`mass_reassignment`]: Cluster-wide m/z reassignment
//! - [`background`]: Background intensity correction
//! - [`reaper`]: Empty frame removal and audit sinks
//! - [`errors`]: Error types

pub mod background;
pub mod errors;
pub mod feature_clustering;
pub mod linkage;
pub mod mass_clustering;
pub mod mass_reassignment;
pub mod model;
pub mod params;
pub mod peak_consolidation;
pub mod reaper;
pub mod tolerance;

// Re-export main types for convenience
pub use errors::PeakFilterError;
pub use mass_reassignment::MassGrouping;
pub use model::{ColumnLayout, Frame, FrameTable};
pub use params::{PeakFilterParameters, Preprocessing};
pub use peak_consolidation::{
    CategoryEvent, ConsolidationSettings, ConsolidationSummary, FrameCategory, MergePolicy,
};
pub use reaper::{AuditEntry, AuditSink, LogAuditSink, MemoryAuditSink};
pub use tolerance::{MassTolerance, ToleranceWindow};

use anyhow_ext::{Context, Result};
use log::info;

use crate::background::remove_low_intensity_frames;
use crate::feature_clustering::{assign_feature_per_frame, cluster_by_features};
use crate::mass_clustering::cluster_by_mz;
use crate::mass_reassignment::reassign_masses;
use crate::peak_consolidation::consolidate_peaks;
use crate::reaper::drop_empty_frames;

pub const PEAK_CONSOLIDATION_STAGE: &str = "Peak consolidation";

/// Attach the stage name to a stage error
fn in_stage<T>(stage: &'static str, result: errors::Result<T>) -> Result<T> {
    result.map_err(|e| anyhow::Error::new(e).context(stage))
}

/// Main entry point running the PeakFilter stages in order
///
/// Parameters are validated once, when the filter is built; every call to
/// [`run`](PeakFilter::run) then processes one table.
///
/// # Example
///
/// ```
/// use peakfilter::{MemoryAuditSink, PeakFilter, PeakFilterParameters};
///
/// let params = PeakFilterParameters::from_json_str(r#"{ "mzPPMError": 5.0 }"#).unwrap();
/// let filter = PeakFilter::new(params).unwrap();
/// assert_eq!(filter.parameters().mz_ppm_error, 5.0);
///
/// let mut audit = MemoryAuditSink::default();
/// let table = filter.run(Default::default(), &mut audit).unwrap();
/// assert!(table.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct PeakFilter {
    parameters: PeakFilterParameters,
    tolerance: MassTolerance,
    consolidation: ConsolidationSettings,
}

impl PeakFilter {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Build a filter, failing on any out-of-domain parameter
    pub fn new(parameters: PeakFilterParameters) -> Result<Self> {
        in_stage("parameter validation", parameters.validate())?;
        let tolerance = in_stage("parameter validation", parameters.mass_tolerance())?;
        let consolidation = in_stage(
            "parameter validation",
            ConsolidationSettings::from_parameters(&parameters),
        )?;
        Ok(Self {
            parameters,
            tolerance,
            consolidation,
        })
    }

    /// Build a filter from a JSON parameter file
    pub fn from_json_file(path: &str) -> Result<Self> {
        let parameters = PeakFilterParameters::from_json_file(path).dot()?;
        Self::new(parameters)
    }

    pub fn parameters(&self) -> &PeakFilterParameters {
        &self.parameters
    }

    pub fn mass_tolerance(&self) -> &MassTolerance {
        &self.tolerance
    }

    pub fn consolidation_settings(&self) -> &ConsolidationSettings {
        &self.consolidation
    }

    // ========================================================================
    // Stages
    // ========================================================================

    /// Zero intensities below the significance cut-off and drop empty frames
    pub fn correct_background<A: AuditSink + ?Sized>(
        &self,
        table: &mut FrameTable,
        audit: &mut A,
    ) -> Result<Vec<usize>> {
        in_stage(
            "background correction",
            remove_low_intensity_frames(table, self.parameters.intensity_significance_cutoff, audit),
        )
    }

    /// Sort by m/z and assign mass clusters
    pub fn cluster_by_mz(&self, table: &mut FrameTable) -> Result<()> {
        in_stage("sorting by m/z", table.sort_by_mz())?;
        in_stage(
            "mass clustering",
            cluster_by_mz(table, &self.tolerance, self.parameters.min_section_size),
        )
    }

    /// Assign feature clusters, one per frame for XCMS tables
    pub fn cluster_by_features(&self, table: &mut FrameTable) -> Result<()> {
        if self.parameters.is_xcms() {
            assign_feature_per_frame(table);
            return Ok(());
        }
        in_stage(
            "feature clustering",
            cluster_by_features(table, self.parameters.max_rt_diff_adjacent_frame),
        )
    }

    /// Merge each peak into its centre; skipped for XCMS tables
    pub fn consolidate_peaks(&self, table: &mut FrameTable) -> Result<Option<ConsolidationSummary>> {
        if self.parameters.is_xcms() {
            info!("peak consolidation skipped: input holds one feature per row");
            return Ok(None);
        }
        let summary = in_stage("peak consolidation", consolidate_peaks(table, &self.consolidation))?;
        Ok(Some(summary))
    }

    /// Give every frame the m/z of its cluster's most intense frame
    ///
    /// Runs on a table [`run`](PeakFilter::run) already clustered; clusters are
    /// feature clusters when `featMassAssignment` is set. Returns the number of
    /// frames whose m/z changed.
    pub fn reassign_masses(&self, table: &mut FrameTable, replicates_per_sample: usize) -> Result<usize> {
        let grouping = MassGrouping::from_feat_mass_assignment(self.parameters.feat_mass_assignment);
        in_stage(
            "mass reassignment",
            reassign_masses(table, grouping, replicates_per_sample),
        )
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    /// Run every stage on `table`
    ///
    /// Any stage error aborts the run; the partially processed table is dropped.
    pub fn run<A: AuditSink + ?Sized>(&self, mut table: FrameTable, audit: &mut A) -> Result<FrameTable> {
        in_stage("input validation", table.validate())?;
        let input_rows = table.len();

        self.correct_background(&mut table, audit).dot()?;
        self.cluster_by_mz(&mut table).dot()?;
        self.cluster_by_features(&mut table).dot()?;
        self.consolidate_peaks(&mut table).dot()?;
        drop_empty_frames(&mut table, audit, PEAK_CONSOLIDATION_STAGE);

        info!(
            "peak filter: {} frames in, {} frames out ({} mass clusters, {} feature clusters)",
            input_rows,
            table.len(),
            table.mass_cluster_count(),
            table.feature_cluster_count()
        );
        Ok(table)
    }
}
