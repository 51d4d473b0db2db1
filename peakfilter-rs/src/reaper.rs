//! Removal of empty frames and the audit trail of removed rows
//!
//! A frame is empty when every replicate intensity is zero. Dropped frame ids
//! are handed to an [`AuditSink`] together with the name of the stage that
//! emptied them.
//!
//! # Example
//!
//! ```
//! use peakfilter::model::{Frame, FrameTable};
//! use peakfilter::reaper::{drop_empty_frames, MemoryAuditSink};
//!
//! let frames = vec![
//!     Frame::new(0, 100.0, 1.0, vec![0.0, 0.0]),
//!     Frame::new(1, 200.0, 1.0, vec![0.0, 5.0]),
//! ];
//! let mut table = FrameTable::new(vec!["R1".into(), "R2".into()], frames).unwrap();
//! let mut audit = MemoryAuditSink::default();
//!
//! let dropped = drop_empty_frames(&mut table, &mut audit, "Peak consolidation");
//! assert_eq!(dropped, vec![0]);
//! assert_eq!(table.len(), 1);
//! assert_eq!(audit.entries()[0].stage, "Peak consolidation");
//! ```

use log::info;
use serde::{Deserialize, Serialize};

use crate::model::FrameTable;

/// Receiver of the ids of frames removed by a stage
pub trait AuditSink {
    fn record(&mut self, stage: &str, dropped_ids: &[usize]);
}

/// Writes every audit entry to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&mut self, stage: &str, dropped_ids: &[usize]) {
        info!("{}: {} frames removed {:?}", stage, dropped_ids.len(), dropped_ids);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub stage: String,
    pub dropped_ids: Vec<usize>,
}

/// Keeps the audit entries in memory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAuditSink {
    entries: Vec<AuditEntry>,
}

impl MemoryAuditSink {
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Total number of frames removed over all stages
    pub fn dropped_count(&self) -> usize {
        self.entries.iter().map(|e| e.dropped_ids.len()).sum()
    }

    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&mut self, stage: &str, dropped_ids: &[usize]) {
        self.entries.push(AuditEntry {
            stage: stage.to_string(),
            dropped_ids: dropped_ids.to_vec(),
        });
    }
}

/// Drop the frames whose intensities are all zero
///
/// Survivors keep their relative order and their ids. The dropped ids are
/// returned and, when there are any, reported to `audit` under `stage`.
pub fn drop_empty_frames<A: AuditSink + ?Sized>(
    table: &mut FrameTable,
    audit: &mut A,
    stage: &str,
) -> Vec<usize> {
    let dropped: Vec<usize> = table
        .frames()
        .iter()
        .filter(|f| f.is_empty())
        .map(|f| f.id)
        .collect();

    if !dropped.is_empty() {
        table.retain(|f| !f.is_empty());
        audit.record(stage, &dropped);
    }
    dropped
}
