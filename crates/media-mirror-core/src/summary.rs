use crate::batch::{AddReport, ItemFailure};
use crate::index::IndexStats;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlaylistStats {
    pub found: usize,
    pub created: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CollectionStats {
    pub found: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ItemAddStats {
    pub bulk_added: usize,
    pub fallback_added: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetadataStats {
    pub scanned: usize,
    pub updated: usize,
    pub fields_written: usize,
    pub fields_failed: usize,
    pub artwork_copied: usize,
    pub artwork_failed: usize,
}

/// A source item no destination item could be matched for.
#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedItem {
    pub title: String,
    /// First GUID in preference order, when the item had any.
    pub guid: Option<String>,
    /// The playlist or collection the item belonged to.
    pub context: String,
}

/// Run-level counters and records. Single writer, append-only: the
/// orchestrator and reconcilers only ever add to it, and the run always
/// ends by presenting it — partial failures land here instead of aborting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub index: IndexStats,
    pub playlists: PlaylistStats,
    pub collections: CollectionStats,
    pub items: ItemAddStats,
    pub metadata: MetadataStats,
    pub unmatched: Vec<UnmatchedItem>,
    pub item_failures: Vec<ItemFailure>,
    /// Phase-level errors that were recovered from (listing failures and
    /// the like); never fatal once the run has started.
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn absorb_report(&mut self, report: &AddReport) {
        self.items.bulk_added += report.bulk_added;
        self.items.fallback_added += report.fallback_added;
        self.items.failed += report.failed.len();
        self.item_failures.extend(report.failed.iter().cloned());
    }

    pub fn record_unmatched(&mut self, title: String, guid: Option<String>, context: &str) {
        self.unmatched.push(UnmatchedItem { title, guid, context: context.to_string() });
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!("{}", error);
        self.errors.push(error);
    }

    pub fn has_partial_failures(&self) -> bool {
        self.items.failed > 0
            || self.playlists.failed > 0
            || self.collections.failed > 0
            || self.metadata.fields_failed > 0
            || self.metadata.artwork_failed > 0
            || !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbing_reports_accumulates() {
        let mut summary = RunSummary::default();
        let mut report = AddReport { bulk_added: 5, fallback_added: 2, ..Default::default() };
        report.failed.push(ItemFailure { title: "X".into(), reason: "boom".into() });
        summary.absorb_report(&report);
        summary.absorb_report(&report);
        assert_eq!(summary.items.bulk_added, 10);
        assert_eq!(summary.items.fallback_added, 4);
        assert_eq!(summary.items.failed, 2);
        assert_eq!(summary.item_failures.len(), 2);
        assert!(summary.has_partial_failures());
    }

    #[test]
    fn clean_summary_has_no_partial_failures() {
        let summary = RunSummary::default();
        assert!(!summary.has_partial_failures());
    }
}
