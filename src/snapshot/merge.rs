use std::collections::HashSet;

use crate::page_extractor::ExtractedRecord;

/// Reconcile fresh records with the prior snapshot.
///
/// Existing records are kept as-is and in order. Fresh records are appended
/// in the order given, skipping any identity already present (first write
/// wins, including among the fresh records themselves). Applying the same
/// fresh batch twice changes nothing.
#[must_use]
pub fn merge(existing: Vec<ExtractedRecord>, fresh: Vec<ExtractedRecord>) -> Vec<ExtractedRecord> {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.identity().to_string()).collect();
    let mut merged = existing;
    merged.reserve(fresh.len());

    for record in fresh {
        if seen.insert(record.identity().to_string()) {
            merged.push(record);
        }
    }
    merged
}

/// Number of records `fresh` would add to `existing`.
#[must_use]
pub fn count_new(existing: &[ExtractedRecord], fresh: &[ExtractedRecord]) -> usize {
    let mut seen: HashSet<&str> = existing.iter().map(ExtractedRecord::identity).collect();
    fresh.iter().filter(|r| seen.insert(r.identity())).count()
}
