//! Tolerance windows for m/z and retention time
//!
//! Every tolerance in the pipeline goes through this module so the same
//! rounding is applied everywhere. Windows are rounded to [`MZ_PRECISION`]
//! decimal digits; the peak width check in the consolidation stage rounds to
//! [`RT_WIDTH_PRECISION`].
//!
//! # Example
//!
//! ```
//! use peakfilter::tolerance::{mz_window, MassTolerance};
//!
//! let window = mz_window(500.0, 0.0, 4.0).unwrap();
//! assert_eq!(window.low, 499.998);
//! assert_eq!(window.high, 500.002);
//!
//! let tolerance = MassTolerance::new(0.001, 5.0).unwrap();
//! assert_eq!(tolerance.delta(200.0), 0.002);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ensure_non_negative, ensure_positive, Result};

/// Decimal digits kept by m/z and RT tolerance windows
pub const MZ_PRECISION: u32 = 5;

/// Decimal digits kept when comparing RT distances against the peak width
pub const RT_WIDTH_PRECISION: u32 = 3;

/// Round `value` to `digits` decimal digits
#[inline]
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

// ============================================================================
// Tolerance window
// ============================================================================

/// Closed interval `[low, high]` around a reference value
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToleranceWindow {
    pub low: f64,
    pub high: f64,
}

impl ToleranceWindow {
    /// Check if `value` lies inside the window (bounds included)
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Width of the window
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Check if two windows overlap
    pub fn overlaps(&self, other: &ToleranceWindow) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

// ============================================================================
// Mass tolerance
// ============================================================================

/// Fixed plus mass dependent (PPM) m/z error
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassTolerance {
    fixed_error: f64,
    ppm_error: f64,
}

impl MassTolerance {
    /// Create a tolerance; both errors must be finite and non-negative
    pub fn new(fixed_error: f64, ppm_error: f64) -> Result<Self> {
        ensure_non_negative("mzFixedError", fixed_error)?;
        ensure_non_negative("mzPPMError", ppm_error)?;
        Ok(Self {
            fixed_error,
            ppm_error,
        })
    }

    pub fn fixed_error(&self) -> f64 {
        self.fixed_error
    }

    pub fn ppm_error(&self) -> f64 {
        self.ppm_error
    }

    /// Half-width of the tolerance window at `mz`
    #[inline]
    pub fn delta(&self, mz: f64) -> f64 {
        round_to(self.fixed_error + mz * self.ppm_error * 1e-6, MZ_PRECISION)
    }

    /// Tolerance window centred on `mz`
    pub fn window(&self, mz: f64) -> ToleranceWindow {
        let delta = self.delta(mz);
        ToleranceWindow {
            low: round_to(mz - delta, MZ_PRECISION),
            high: round_to(mz + delta, MZ_PRECISION),
        }
    }
}

/// Half-width of the m/z tolerance window
pub fn mz_delta(mz: f64, fixed_error: f64, ppm_error: f64) -> Result<f64> {
    Ok(MassTolerance::new(fixed_error, ppm_error)?.delta(mz))
}

/// m/z tolerance window centred on `mz`
pub fn mz_window(mz: f64, fixed_error: f64, ppm_error: f64) -> Result<ToleranceWindow> {
    Ok(MassTolerance::new(fixed_error, ppm_error)?.window(mz))
}

// ============================================================================
// Retention time tolerance
// ============================================================================

/// Maximum RT difference between adjacent frames, rounded like the m/z deltas
pub fn rt_delta(max_adjacent_diff: f64) -> Result<f64> {
    ensure_positive("maxRTDiffAdjacentFrame", max_adjacent_diff)?;
    Ok(round_to(max_adjacent_diff, MZ_PRECISION))
}

/// Symmetric RT window of half-width `max_adjacent_diff`
pub fn rt_window(rt: f64, max_adjacent_diff: f64) -> Result<ToleranceWindow> {
    let delta = rt_delta(max_adjacent_diff)?;
    Ok(ToleranceWindow {
        low: round_to(rt - delta, MZ_PRECISION),
        high: round_to(rt + delta, MZ_PRECISION),
    })
}
