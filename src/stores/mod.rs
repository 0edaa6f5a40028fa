//! Client-side caches over the defect-tracker API
//!
//! Each store owns its state behind a short-lived lock and exposes clones
//! of it. Locks are never held across a remote call; overlapping calls to
//! the same operation resolve last-writer-wins.

mod defects;
mod projects;
mod revision;

pub use defects::{DefectState, DefectStore};
pub use projects::{ProjectState, ProjectStore};
pub use revision::Revision;

use crate::models::DefectRecord;

pub fn total(items: &[DefectRecord]) -> usize {
    items.len()
}

pub fn critical(items: &[DefectRecord]) -> usize {
    items.iter().filter(|d| d.is_critical()).count()
}

pub fn in_progress(items: &[DefectRecord]) -> usize {
    items.iter().filter(|d| d.is_in_progress()).count()
}

/// Dashboard counters computed from a defect list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefectSummary {
    pub total: usize,
    pub critical: usize,
    pub in_progress: usize,
}

impl DefectSummary {
    pub fn from_items(items: &[DefectRecord]) -> Self {
        Self {
            total: total(items),
            critical: critical(items),
            in_progress: in_progress(items),
        }
    }
}
