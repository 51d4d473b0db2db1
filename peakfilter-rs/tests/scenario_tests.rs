//! Reference scenarios and properties of the clustering and consolidation stages

use itertools::Itertools;
use peakfilter::feature_clustering::cluster_by_features;
use peakfilter::mass_clustering::cluster_by_mz;
use peakfilter::peak_consolidation::{consolidate_peaks, consolidate_replicate};
use peakfilter::reaper::drop_empty_frames;
use peakfilter::tolerance::mz_window;
use peakfilter::{
    ConsolidationSettings, Frame, FrameCategory, FrameTable, MassTolerance, MemoryAuditSink,
    MergePolicy,
};

fn single_replicate_table(points: &[(f64, f64, f64)]) -> FrameTable {
    let frames = points
        .iter()
        .enumerate()
        .map(|(id, &(mz, rt, intensity))| Frame::new(id, mz, rt, vec![intensity]))
        .collect();
    FrameTable::new(vec!["R1".to_string()], frames).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_tight_mz_triplet() {
    let mut table = single_replicate_table(&[
        (500.1000, 1.0, 10.0),
        (500.1001, 1.0, 10.0),
        (500.1003, 1.0, 10.0),
    ]);
    let tolerance = MassTolerance::new(0.0, 5.0).unwrap();

    for section_size in [3, 10, 49] {
        let mut table = table.clone();
        cluster_by_mz(&mut table, &tolerance, section_size).unwrap();
        assert_eq!(table.mass_cluster_count(), 1);
    }

    cluster_by_mz(&mut table, &tolerance, 3).unwrap();
    assert!(table.frames().iter().all(|f| f.mz_cluster_id == Some(1)));
}

#[test]
fn test_scenario_single_peak() {
    let settings = ConsolidationSettings::new(0.3, 2.0, MergePolicy::CentrePlusBestFrame).unwrap();
    let original = [10.0, 100.0, 90.0, 5.0, 0.0];
    let mut intensities = original;
    let rts = [1.0, 1.05, 1.10, 1.15, 1.20];

    let categories = consolidate_replicate(&mut intensities, &rts, &settings);

    assert_eq!(categories[1], FrameCategory::PeakCentre);
    let best_flank = (0..original.len())
        .filter(|&i| categories[i] == FrameCategory::PeakFrame)
        .map(|i| original[i])
        .fold(0.0, f64::max);
    assert_eq!(intensities[1], 100.0 + best_flank);
    for (i, intensity) in intensities.iter().enumerate() {
        if i != 1 {
            assert_eq!(*intensity, 0.0);
        }
    }
}

#[test]
fn test_scenario_no_clear_peak() {
    let settings = ConsolidationSettings::new(0.3, 2.0, MergePolicy::CentrePlusBestFrame).unwrap();
    let mut intensities = [50.0, 48.0];
    let categories = consolidate_replicate(&mut intensities, &[2.0, 2.05], &settings);

    assert_eq!(categories, vec![FrameCategory::SolventFrame; 2]);
    assert_eq!(intensities, [0.0, 0.0]);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_tolerance_window_contains_reference() {
    for mz in [1.0, 73.05, 499.9999, 760.585, 1999.5] {
        for fixed in [0.0, 0.001, 0.05] {
            for ppm in [0.0, 2.0, 4.0, 20.0] {
                let window = mz_window(mz, fixed, ppm).unwrap();
                assert!(window.low <= mz && mz <= window.high, "{mz} {fixed} {ppm}");
            }
        }
    }
}

#[test]
fn test_mass_clusters_match_isolated_groups() {
    // 20 groups of 5 frames; members within 3 ppm of each other, groups 0.37 Da apart
    let points: Vec<(f64, f64, f64)> = (0..100)
        .map(|i| {
            let group = (i / 5) as f64;
            let member = (i % 5) as f64;
            (300.0 + group * 0.37 + member * 0.0002, member * 0.1, 1.0)
        })
        .collect();
    let mut table = single_replicate_table(&points);
    let tolerance = MassTolerance::new(0.0, 4.0).unwrap();
    cluster_by_mz(&mut table, &tolerance, 7).unwrap();

    assert_eq!(table.mass_cluster_count(), 20);
    for frame in table.frames() {
        assert_eq!(frame.mz_cluster_id, Some((frame.id / 5) as u32 + 1));
    }
}

#[test]
fn test_feature_boundaries_on_clustered_table() {
    let points: Vec<(f64, f64, f64)> = vec![
        (420.10, 1.00, 1.0),
        (420.10, 1.20, 1.0),
        (420.10, 1.47, 1.0),
        (420.10, 1.75, 1.0),
        (421.50, 1.80, 1.0),
        (421.50, 1.90, 1.0),
    ];
    let mut table = single_replicate_table(&points);
    let tolerance = MassTolerance::new(0.0, 4.0).unwrap();
    cluster_by_mz(&mut table, &tolerance, 49).unwrap();
    cluster_by_features(&mut table, 0.27).unwrap();

    // Gaps 0.2, 0.27 (kept), 0.28 (split), then a new mass
    let features: Vec<u32> = table.frames().iter().map(|f| f.feature_cluster_id.unwrap()).collect();
    assert_eq!(features, vec![1, 1, 1, 2, 3, 3]);
}

#[test]
fn test_sum_all_frames_conserves_intensity() {
    let points: Vec<(f64, f64, f64)> = [4.0, 12.0, 35.0, 120.0, 40.0, 11.0, 3.0]
        .iter()
        .enumerate()
        .map(|(i, &intensity)| (612.4, 3.0 + i as f64 * 0.04, intensity))
        .collect();
    let total: f64 = points.iter().map(|p| p.2).sum();

    let mut table = single_replicate_table(&points);
    let tolerance = MassTolerance::new(0.0, 4.0).unwrap();
    cluster_by_mz(&mut table, &tolerance, 49).unwrap();
    cluster_by_features(&mut table, 0.27).unwrap();

    let settings = ConsolidationSettings::new(1.0, 2.0, MergePolicy::SumAllFrames).unwrap();
    let summary = consolidate_peaks(&mut table, &settings).unwrap();

    assert_eq!(summary.peak_centres, 1);
    assert_eq!(table.replicate_total(0), total);
    let centre = table.frames().iter().find(|f| f.intensities[0] != 0.0).unwrap();
    assert_eq!(centre.id, 3);
}

#[test]
fn test_only_centres_keep_intensity_per_cluster() {
    let intensities = [5.0, 60.0, 20.0, 0.0, 8.0, 9.0, 80.0, 30.0, 31.0, 2.0];
    let points: Vec<(f64, f64, f64)> = intensities
        .iter()
        .enumerate()
        .map(|(i, &intensity)| (701.2, 6.0 + i as f64 * 0.05, intensity))
        .collect();
    let mut table = single_replicate_table(&points);
    cluster_by_mz(&mut table, &MassTolerance::new(0.0, 4.0).unwrap(), 49).unwrap();
    cluster_by_features(&mut table, 0.27).unwrap();

    let settings = ConsolidationSettings::new(0.6, 1.5, MergePolicy::CentrePlusBestFrame).unwrap();
    let summary = consolidate_peaks(&mut table, &settings).unwrap();

    let non_zero = table.frames().iter().filter(|f| f.intensities[0] != 0.0).count();
    assert_eq!(non_zero, summary.peak_centres);
}

#[test]
fn test_reaping_twice_equals_once() {
    let mut table = single_replicate_table(&[
        (100.0, 1.0, 0.0),
        (101.0, 1.0, 4.0),
        (102.0, 1.0, 0.0),
        (103.0, 1.0, 0.0),
        (104.0, 1.0, 9.0),
    ]);
    let mut audit = MemoryAuditSink::default();
    drop_empty_frames(&mut table, &mut audit, "first pass");
    let once = table.clone();
    drop_empty_frames(&mut table, &mut audit, "second pass");

    assert_eq!(table, once);
    assert_eq!(
        table.frames().iter().map(|f| f.id).collect_vec(),
        vec![1, 4]
    );
}
