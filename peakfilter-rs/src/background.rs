//! Background correction: zero intensities below significance

use log::info;

use crate::errors::{ensure_non_negative, Result};
use crate::model::FrameTable;
use crate::reaper::{drop_empty_frames, AuditSink};

pub const BACKGROUND_STAGE: &str = "Background correction";

/// Zero every replicate intensity strictly below `cutoff`, then drop the
/// frames left empty
///
/// A cut-off of 0 zeroes nothing, but frames that are already empty are still
/// dropped so they never reach mass clustering. Returns the dropped frame ids.
pub fn remove_low_intensity_frames<A: AuditSink + ?Sized>(
    table: &mut FrameTable,
    cutoff: f64,
    audit: &mut A,
) -> Result<Vec<usize>> {
    ensure_non_negative("intensitySignificanceCutoff", cutoff)?;
    table.validate()?;

    let mut zeroed = 0;
    if cutoff > 0.0 {
        for intensity in table
            .frames_mut()
            .iter_mut()
            .flat_map(|f| f.intensities.iter_mut())
        {
            if *intensity > 0.0 && *intensity < cutoff {
                *intensity = 0.0;
                zeroed += 1;
            }
        }
    }

    let dropped = drop_empty_frames(table, audit, BACKGROUND_STAGE);
    info!(
        "background correction: {} intensities below {} zeroed, {} frames removed",
        zeroed,
        cutoff,
        dropped.len()
    );
    Ok(dropped)
}
