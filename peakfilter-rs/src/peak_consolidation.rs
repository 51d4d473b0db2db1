//! Peak consolidation: merge the frames of each chromatographic peak into its centre
//!
//! Every (feature cluster, replicate) pair is processed on its own. Frames are
//! categorized by a small state machine ([`FrameCategory`] driven by
//! [`CategoryEvent`]) while the most intense uncategorized frame is repeatedly
//! promoted to a peak centre and its peak grown outwards. At the end only peak
//! centres keep an intensity.
//!
//! # Example
//!
//! ```
//! use peakfilter::peak_consolidation::{
//!     consolidate_replicate, ConsolidationSettings, FrameCategory, MergePolicy,
//! };
//!
//! let settings = ConsolidationSettings::new(0.3, 2.0, MergePolicy::CentrePlusBestFrame).unwrap();
//! let mut intensities = [10.0, 100.0, 90.0, 5.0, 0.0];
//! let rts = [1.0, 1.05, 1.10, 1.15, 1.20];
//!
//! let categories = consolidate_replicate(&mut intensities, &rts, &settings);
//! assert_eq!(categories[1], FrameCategory::PeakCentre);
//! assert_eq!(intensities, [0.0, 190.0, 0.0, 0.0, 0.0]);
//! ```

use std::ops::{Add, AddAssign};

use log::{debug, info};
#[cfg(feature = "parallelism")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{PeakFilterError, Result};
use crate::model::{Frame, FrameTable};
use crate::params::PeakFilterParameters;
use crate::tolerance::{round_to, RT_WIDTH_PRECISION};

// ============================================================================
// Frame categories
// ============================================================================

/// Working category of a frame within one (feature cluster, replicate) pair
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum_macros::Display, Serialize, Deserialize)]
pub enum FrameCategory {
    #[default]
    Uncategorized,
    /// Apex of a peak, the only category that keeps an intensity
    PeakCentre,
    /// Flank of a single peak
    PeakFrame,
    /// Flank claimed by two adjacent peaks
    SharedFrame,
    /// Baseline or tail frame that belongs to no peak
    SolventFrame,
}

/// Events driving [`FrameCategory`] transitions
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum CategoryEvent {
    /// The frame is selected as a new peak centre
    ClaimCentre,
    /// The frame falls inside the extent of a peak
    ClaimMember,
    /// The frame is part of a solvent run
    MarkSolvent,
}

impl FrameCategory {
    /// Category after `event`
    pub fn on(self, event: CategoryEvent) -> FrameCategory {
        use CategoryEvent::*;
        use FrameCategory::*;

        match (self, event) {
            (_, MarkSolvent) => SolventFrame,
            (Uncategorized, ClaimCentre) => PeakCentre,
            (other, ClaimCentre) => other,
            (PeakCentre, ClaimMember) => PeakCentre,
            (PeakFrame | SharedFrame, ClaimMember) => SharedFrame,
            (Uncategorized | SolventFrame, ClaimMember) => PeakFrame,
        }
    }

    pub fn keeps_intensity(self) -> bool {
        self == FrameCategory::PeakCentre
    }
}

// ============================================================================
// Settings
// ============================================================================

/// How the intensity of a peak is gathered onto its centre
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Centre plus the most intense `PeakFrame` of the peak
    #[default]
    CentrePlusBestFrame,
    /// Every frame inside the peak extent
    SumAllFrames,
}

impl MergePolicy {
    pub fn from_concatenate_all(concatenate_all: bool) -> Self {
        if concatenate_all {
            MergePolicy::SumAllFrames
        } else {
            MergePolicy::CentrePlusBestFrame
        }
    }
}

/// Validated consolidation parameters
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSettings {
    peak_max_rt_width: f64,
    peak_min_fold_difference: f64,
    merge_policy: MergePolicy,
}

impl ConsolidationSettings {
    pub fn new(
        peak_max_rt_width: f64,
        peak_min_fold_difference: f64,
        merge_policy: MergePolicy,
    ) -> Result<Self> {
        PeakFilterParameters {
            peak_max_rt_width,
            peak_min_fold_difference,
            ..Default::default()
        }
        .validate_consolidation()?;

        Ok(Self {
            peak_max_rt_width,
            peak_min_fold_difference,
            merge_policy,
        })
    }

    pub fn from_parameters(params: &PeakFilterParameters) -> Result<Self> {
        Self::new(
            params.peak_max_rt_width,
            params.peak_min_fold_difference,
            MergePolicy::from_concatenate_all(params.concatenate_all_peak_frames),
        )
    }

    pub fn peak_max_rt_width(&self) -> f64 {
        self.peak_max_rt_width
    }

    pub fn peak_min_fold_difference(&self) -> f64 {
        self.peak_min_fold_difference
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }
}

// ============================================================================
// Per replicate state machine
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn step(self, idx: usize, len: usize) -> Option<usize> {
        match self {
            Side::Left => idx.checked_sub(1),
            Side::Right => (idx + 1 < len).then_some(idx + 1),
        }
    }

    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// RT distance from the peak centre towards this side
    fn rt_distance(self, rt_centre: f64, rt: f64) -> f64 {
        match self {
            Side::Left => rt_centre - rt,
            Side::Right => rt - rt_centre,
        }
    }
}

/// Outcome of the peakiness test on one side of a candidate centre
#[derive(Copy, Clone, Debug, PartialEq)]
enum Probe {
    /// No non-zero neighbour on this side
    Exhausted,
    /// The peak extends to `edge`; `wide` when the neighbour ties with the centre
    Extend { edge: usize, wide: bool, grow: bool },
    /// No clear maximum around the candidate
    Solvent,
}

struct PeakFinder<'a> {
    intensities: &'a mut [f64],
    rts: &'a [f64],
    categories: Vec<FrameCategory>,
    fold: f64,
    half_width: f64,
    merge_policy: MergePolicy,
}

impl<'a> PeakFinder<'a> {
    fn new(intensities: &'a mut [f64], rts: &'a [f64], settings: &ConsolidationSettings) -> Self {
        let categories = vec![FrameCategory::Uncategorized; intensities.len()];
        Self {
            intensities,
            rts,
            categories,
            fold: settings.peak_min_fold_difference,
            half_width: round_to(settings.peak_max_rt_width / 2.0, RT_WIDTH_PRECISION),
            merge_policy: settings.merge_policy,
        }
    }

    /// `a` scaled by the fold difference still reaches `b`
    #[inline]
    fn comparable(&self, a: usize, b: usize) -> bool {
        self.fold * self.intensities[a] >= self.intensities[b]
    }

    /// Adjacent frame on `side`, if it exists and has an intensity
    #[inline]
    fn neighbour(&self, idx: usize, side: Side) -> Option<usize> {
        side.step(idx, self.intensities.len())
            .filter(|&next| self.intensities[next] != 0.0)
    }

    #[inline]
    fn apply(&mut self, idx: usize, event: CategoryEvent) {
        self.categories[idx] = self.categories[idx].on(event);
    }

    /// Most intense uncategorized frame, first one on ties
    fn next_candidate(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for idx in 0..self.intensities.len() {
            if self.categories[idx] != FrameCategory::Uncategorized || self.intensities[idx] == 0.0 {
                continue;
            }
            if best.is_none_or(|b| self.intensities[idx] > self.intensities[b]) {
                best = Some(idx);
            }
        }
        best
    }

    fn run(&mut self) {
        while let Some(centre) = self.next_candidate() {
            self.build_peak(centre);
        }
        for (intensity, category) in self.intensities.iter_mut().zip(&self.categories) {
            if !category.keeps_intensity() {
                *intensity = 0.0;
            }
        }
    }

    fn probe(&self, centre: usize, side: Side, wide_already: bool) -> Probe {
        let Some(first) = self.neighbour(centre, side) else {
            return Probe::Exhausted;
        };
        if !self.comparable(first, centre) {
            return Probe::Extend {
                edge: first,
                wide: false,
                grow: true,
            };
        }
        if wide_already {
            return Probe::Solvent;
        }
        match self.neighbour(first, side) {
            Some(second) if self.comparable(second, first) => Probe::Solvent,
            Some(second) => Probe::Extend {
                edge: second,
                wide: true,
                grow: true,
            },
            // Two comparable frames with nothing around them
            None if self.neighbour(centre, side.opposite()).is_none() => Probe::Solvent,
            None => Probe::Extend {
                edge: first,
                wide: true,
                grow: false,
            },
        }
    }

    fn build_peak(&mut self, centre: usize) {
        self.apply(centre, CategoryEvent::ClaimCentre);

        let mut low = centre;
        let mut high = centre;
        let mut wide: Option<Side> = None;
        let mut grow = [false, false];

        for (slot, side) in [Side::Left, Side::Right].into_iter().enumerate() {
            match self.probe(centre, side, wide.is_some()) {
                Probe::Exhausted => {}
                Probe::Extend {
                    edge,
                    wide: is_wide,
                    grow: can_grow,
                } => {
                    match side {
                        Side::Left => low = edge,
                        Side::Right => high = edge,
                    }
                    if is_wide {
                        wide = Some(side);
                    }
                    grow[slot] = can_grow;
                }
                Probe::Solvent => {
                    self.mark_solvent_run(centre, Side::Left);
                    self.mark_solvent_run(centre, Side::Right);
                    return;
                }
            }
        }

        let rt_centre = match wide.and_then(|side| side.step(centre, self.rts.len())) {
            Some(partner) => (self.rts[centre] + self.rts[partner]) / 2.0,
            None => self.rts[centre],
        };

        for idx in low..=high {
            self.apply(idx, CategoryEvent::ClaimMember);
        }
        if grow[0] {
            low = self.grow(Side::Left, low, rt_centre);
        }
        if grow[1] {
            high = self.grow(Side::Right, high, rt_centre);
        }

        self.merge(centre, low, high);
    }

    /// Extend the peak from `edge` towards `side`, returning the final edge
    fn grow(&mut self, side: Side, mut edge: usize, rt_centre: f64) -> usize {
        while let Some(next) = self.neighbour(edge, side) {
            let distance = round_to(side.rt_distance(rt_centre, self.rts[next]), RT_WIDTH_PRECISION);
            if distance <= self.half_width {
                if self.comparable(next, edge) {
                    if self.comparable(edge, next) {
                        self.mark_solvent_run(next, side);
                    }
                    break;
                }
                edge = next;
                self.apply(edge, CategoryEvent::ClaimMember);
            } else {
                // Tail just outside the allowed width
                if self.categories[next] == FrameCategory::Uncategorized && self.comparable(edge, next) {
                    self.mark_solvent_run(next, side);
                }
                break;
            }
        }
        edge
    }

    /// Tag `start` and the following non-increasing run on `side` as solvent
    fn mark_solvent_run(&mut self, start: usize, side: Side) {
        self.apply(start, CategoryEvent::MarkSolvent);
        let mut current = start;
        while let Some(next) = self.neighbour(current, side) {
            if self.categories[next] != FrameCategory::Uncategorized || !self.comparable(current, next) {
                break;
            }
            current = next;
            self.apply(current, CategoryEvent::MarkSolvent);
        }
    }

    fn merge(&mut self, centre: usize, low: usize, high: usize) {
        match self.merge_policy {
            MergePolicy::SumAllFrames => {
                self.intensities[centre] = self.intensities[low..=high].iter().sum();
            }
            MergePolicy::CentrePlusBestFrame => {
                let best = (low..=high)
                    .filter(|&idx| self.categories[idx] == FrameCategory::PeakFrame)
                    .map(|idx| self.intensities[idx])
                    .max_by(f64::total_cmp);
                if let Some(best) = best {
                    self.intensities[centre] += best;
                }
            }
        }
    }
}

/// Consolidate the intensities of one replicate of one feature cluster
///
/// `rts` must be sorted ascending and match `intensities` in length. With
/// fewer than two non-zero intensities nothing changes and every frame stays
/// `Uncategorized`.
pub fn consolidate_replicate(
    intensities: &mut [f64],
    rts: &[f64],
    settings: &ConsolidationSettings,
) -> Vec<FrameCategory> {
    debug_assert_eq!(intensities.len(), rts.len());

    if intensities.iter().filter(|&&i| i != 0.0).count() < 2 {
        return vec![FrameCategory::Uncategorized; intensities.len()];
    }

    let mut finder = PeakFinder::new(intensities, rts, settings);
    finder.run();
    finder.categories
}

// ============================================================================
// Table level
// ============================================================================

/// Category counts accumulated over a consolidation run
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub feature_clusters: usize,
    pub peak_centres: usize,
    pub peak_frames: usize,
    pub shared_frames: usize,
    pub solvent_frames: usize,
}

impl ConsolidationSummary {
    fn record(&mut self, categories: &[FrameCategory]) {
        for category in categories {
            match category {
                FrameCategory::PeakCentre => self.peak_centres += 1,
                FrameCategory::PeakFrame => self.peak_frames += 1,
                FrameCategory::SharedFrame => self.shared_frames += 1,
                FrameCategory::SolventFrame => self.solvent_frames += 1,
                FrameCategory::Uncategorized => {}
            }
        }
    }
}

impl Add for ConsolidationSummary {
    type Output = ConsolidationSummary;

    fn add(self, other: ConsolidationSummary) -> ConsolidationSummary {
        ConsolidationSummary {
            feature_clusters: self.feature_clusters + other.feature_clusters,
            peak_centres: self.peak_centres + other.peak_centres,
            peak_frames: self.peak_frames + other.peak_frames,
            shared_frames: self.shared_frames + other.shared_frames,
            solvent_frames: self.solvent_frames + other.solvent_frames,
        }
    }
}

impl AddAssign for ConsolidationSummary {
    fn add_assign(&mut self, other: ConsolidationSummary) {
        *self = *self + other;
    }
}

fn consolidate_cluster(frames: &mut [Frame], settings: &ConsolidationSettings) -> ConsolidationSummary {
    let mut summary = ConsolidationSummary {
        feature_clusters: 1,
        ..Default::default()
    };
    let rts: Vec<f64> = frames.iter().map(|f| f.rt).collect();
    let replicate_count = frames.first().map_or(0, |f| f.intensities.len());

    for replicate in 0..replicate_count {
        let mut column: Vec<f64> = frames.iter().map(|f| f.intensities[replicate]).collect();
        let categories = consolidate_replicate(&mut column, &rts, settings);
        for (frame, value) in frames.iter_mut().zip(column) {
            frame.intensities[replicate] = value;
        }
        summary.record(&categories);
    }
    summary
}

fn check_feature_clusters(table: &FrameTable) -> Result<()> {
    if let Some(frame) = table.frames().iter().find(|f| f.feature_cluster_id.is_none()) {
        return Err(PeakFilterError::input(format!(
            "frame {} has no feature cluster id",
            frame.id
        )));
    }
    for range in table.feature_cluster_ranges() {
        let frames = &table.frames()[range];
        if let Some(pair) = frames.windows(2).find(|pair| pair[1].rt < pair[0].rt) {
            return Err(PeakFilterError::input(format!(
                "feature cluster {:?} is not sorted by RT at frame {}",
                pair[0].feature_cluster_id, pair[1].id
            )));
        }
    }
    Ok(())
}

/// Consolidate every feature cluster of the table, replicate by replicate
///
/// Frames sharing a feature cluster id must be consecutive and sorted by RT.
/// Row count and order are unchanged; only intensities are rewritten.
pub fn consolidate_peaks(
    table: &mut FrameTable,
    settings: &ConsolidationSettings,
) -> Result<ConsolidationSummary> {
    table.validate()?;
    check_feature_clusters(table)?;

    let ranges = table.feature_cluster_ranges();
    let mut remaining = table.frames_mut();
    let mut clusters = Vec::with_capacity(ranges.len());
    for range in &ranges {
        let (cluster, tail) = std::mem::take(&mut remaining).split_at_mut(range.len());
        clusters.push(cluster);
        remaining = tail;
    }

    #[cfg(feature = "parallelism")]
    let summary = clusters
        .into_par_iter()
        .map(|cluster| consolidate_cluster(cluster, settings))
        .reduce(ConsolidationSummary::default, |a, b| a + b);

    #[cfg(not(feature = "parallelism"))]
    let summary = clusters
        .into_iter()
        .map(|cluster| consolidate_cluster(cluster, settings))
        .fold(ConsolidationSummary::default(), |a, b| a + b);

    debug!("peak consolidation: {:?}", summary);
    info!(
        "peak consolidation: {} peak centres over {} feature clusters ({} solvent frames)",
        summary.peak_centres, summary.feature_clusters, summary.solvent_frames
    );
    Ok(summary)
}
