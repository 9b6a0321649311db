//! Counters reported at the end of a reconciliation run.

use std::fmt;

use super::record::CorrespondenceMap;

/// Outcome counts of one run. Per-record failures only show up here and in
/// the log; they never fail the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub source_identities: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Matched records where more than one candidate qualified.
    pub ambiguous: usize,
    pub group_created: usize,
    pub group_updated: usize,
    pub org_deleted: usize,
    pub org_created: usize,
    /// Writes answered with `409`, counted as success.
    pub conflicts_suppressed: usize,
    pub failures: usize,
}

impl ReconcileSummary {
    /// Match counters derived from a matched correspondence map.
    pub fn from_records(records: &CorrespondenceMap) -> Self {
        let matched = records.values().filter(|r| r.is_matched()).count();
        let ambiguous = records
            .values()
            .filter_map(|r| r.counterpart.as_ref())
            .filter(|c| c.candidates > 1)
            .count();
        Self {
            source_identities: records.len(),
            matched,
            unmatched: records.len() - matched,
            ambiguous,
            ..Self::default()
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Synchronized {}/{} users (unmatched: {}, ambiguous: {}); \
             group memberships created: {}, updated: {}; \
             org memberships deleted: {}, created: {}; \
             conflicts suppressed: {}; failures: {}",
            self.matched,
            self.source_identities,
            self.unmatched,
            self.ambiguous,
            self.group_created,
            self.group_updated,
            self.org_deleted,
            self.org_created,
            self.conflicts_suppressed,
            self.failures
        )
    }
}
