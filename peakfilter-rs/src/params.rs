//! PeakFilter parameters
//!
//! Parameters are an immutable value passed explicitly to every stage. They
//! deserialize from the camelCase JSON keys used by parameter files; any key
//! left out takes its default.
//!
//! # Example
//!
//! ```
//! use peakfilter::params::{PeakFilterParameters, Preprocessing};
//!
//! let params = PeakFilterParameters::from_json_str(
//!     r#"{ "mzPPMError": 5.0, "peakMinFoldDifference": 2.0 }"#,
//! ).unwrap();
//! assert_eq!(params.mz_ppm_error, 5.0);
//! assert_eq!(params.min_section_size, 49);
//! assert_eq!(params.preprocessing_software, Preprocessing::Other);
//! ```

use std::fs;
use std::path::Path;

use anyhow_ext::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::{self, ensure_non_negative, ensure_positive, PeakFilterError};
use crate::tolerance::MassTolerance;

/// Tool that produced the input feature table
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
pub enum Preprocessing {
    /// Rows are already one feature each; peak consolidation is skipped
    #[strum(serialize = "XCMS")]
    #[serde(rename = "XCMS", alias = "Xcms")]
    Xcms,
    #[default]
    Other,
}

/// Configuration consumed by the PeakFilter stages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeakFilterParameters {
    /// Fixed m/z error in Daltons
    pub mz_fixed_error: f64,
    /// Mass dependent m/z error in parts per million
    #[serde(rename = "mzPPMError")]
    pub mz_ppm_error: f64,
    /// Maximum RT gap (minutes) between frames of one feature cluster
    #[serde(rename = "maxRTDiffAdjacentFrame")]
    pub max_rt_diff_adjacent_frame: f64,
    /// Minimum number of frames per mass clustering section
    pub min_section_size: usize,
    /// Maximum RT width (minutes) of a chromatographic peak
    #[serde(rename = "peakMaxRTWidth")]
    pub peak_max_rt_width: f64,
    /// Fold difference needed to call one frame clearly more intense
    pub peak_min_fold_difference: f64,
    /// Sum every frame of a peak into its centre instead of centre + best flank
    pub concatenate_all_peak_frames: bool,
    /// Intensities below this value are treated as background; 0 disables
    pub intensity_significance_cutoff: f64,
    pub preprocessing_software: Preprocessing,
    /// Reassign masses per feature cluster instead of per mass cluster
    pub feat_mass_assignment: bool,
}

impl Default for PeakFilterParameters {
    fn default() -> Self {
        Self {
            mz_fixed_error: 0.0,
            mz_ppm_error: 4.0,
            max_rt_diff_adjacent_frame: 0.27,
            min_section_size: crate::mass_clustering::DEFAULT_MIN_SECTION_SIZE,
            peak_max_rt_width: 0.6,
            peak_min_fold_difference: 1.5,
            concatenate_all_peak_frames: false,
            intensity_significance_cutoff: 0.0,
            preprocessing_software: Preprocessing::Other,
            feat_mass_assignment: false,
        }
    }
}

impl PeakFilterParameters {
    /// Parse parameters from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json).dot()?;
        params.validate().dot()?;
        Ok(params)
    }

    /// Load parameters from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| anyhow::Error::new(e).context(format!("can't read parameter file {}", path.display())))?;
        Self::from_json_str(&json).dot()
    }

    /// Check every parameter against its domain
    pub fn validate(&self) -> errors::Result<()> {
        self.mass_tolerance()?;
        ensure_positive("maxRTDiffAdjacentFrame", self.max_rt_diff_adjacent_frame)?;
        if self.min_section_size == 0 {
            return Err(PeakFilterError::parameter(
                "minSectionSize",
                self.min_section_size,
                "must be at least 1",
            ));
        }
        self.validate_consolidation()?;
        ensure_non_negative("intensitySignificanceCutoff", self.intensity_significance_cutoff)?;
        Ok(())
    }

    /// Check the parameters used by peak consolidation only
    pub fn validate_consolidation(&self) -> errors::Result<()> {
        ensure_positive("peakMaxRTWidth", self.peak_max_rt_width)?;
        if !(self.peak_min_fold_difference.is_finite() && self.peak_min_fold_difference > 1.0) {
            return Err(PeakFilterError::parameter(
                "peakMinFoldDifference",
                self.peak_min_fold_difference,
                "must be a finite value > 1",
            ));
        }
        Ok(())
    }

    /// Validated m/z tolerance
    pub fn mass_tolerance(&self) -> errors::Result<MassTolerance> {
        MassTolerance::new(self.mz_fixed_error, self.mz_ppm_error)
    }

    /// True when the input holds one feature per row
    pub fn is_xcms(&self) -> bool {
        self.preprocessing_software == Preprocessing::Xcms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = PeakFilterParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.min_section_size, 49);
        assert!(!params.is_xcms());
    }

    #[test]
    fn test_json_keys() {
        let params = PeakFilterParameters::from_json_str(
            r#"{
                "mzFixedError": 0.001,
                "mzPPMError": 2.0,
                "maxRTDiffAdjacentFrame": 0.1,
                "minSectionSize": 10,
                "peakMaxRTWidth": 0.3,
                "peakMinFoldDifference": 2.0,
                "concatenateAllPeakFrames": true,
                "intensitySignificanceCutoff": 500.0,
                "preprocessingSoftware": "XCMS",
                "featMassAssignment": true
            }"#,
        )
        .unwrap();
        assert_eq!(params.mz_fixed_error, 0.001);
        assert_eq!(params.mz_ppm_error, 2.0);
        assert_eq!(params.max_rt_diff_adjacent_frame, 0.1);
        assert_eq!(params.min_section_size, 10);
        assert_eq!(params.peak_max_rt_width, 0.3);
        assert_eq!(params.peak_min_fold_difference, 2.0);
        assert!(params.concatenate_all_peak_frames);
        assert_eq!(params.intensity_significance_cutoff, 500.0);
        assert!(params.is_xcms());
        assert!(params.feat_mass_assignment);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["mzPPMError"], 2.0);
        assert_eq!(json["preprocessingSoftware"], "XCMS");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PeakFilterParameters::from_json_str(r#"{ "peakMinFoldDifference": 1.0 }"#).is_err());
        assert!(PeakFilterParameters::from_json_str(r#"{ "mzFixedError": -0.5 }"#).is_err());
        assert!(PeakFilterParameters::from_json_str(r#"{ "minSectionSize": 0 }"#).is_err());
        assert!(PeakFilterParameters::from_json_str(r#"{ "peakMaxRTWidth": 0.0 }"#).is_err());
        assert!(PeakFilterParameters::from_json_str("not json").is_err());

        let params = PeakFilterParameters {
            max_rt_diff_adjacent_frame: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(PeakFilterError::InvalidParameter { name: "maxRTDiffAdjacentFrame", .. })
        ));
    }

    #[test]
    fn test_preprocessing_names() {
        assert_eq!(Preprocessing::Xcms.to_string(), "XCMS");
        assert_eq!(Preprocessing::Other.to_string(), "Other");
        let parsed: Preprocessing = serde_json::from_str(r#""Xcms""#).unwrap();
        assert_eq!(parsed, Preprocessing::Xcms);
    }

    #[test]
    fn test_missing_file() {
        assert!(PeakFilterParameters::from_json_file("/nonexistent/peakfilter.json").is_err());
    }
}
