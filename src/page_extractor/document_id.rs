//! Recovers the tender document id embedded in the page's hydration payload.

use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Scans raw markup for `key: <digits>` (plain or escaped-quoted JSON)
/// and, only if that finds nothing, `key = <digits>` assignments.
///
/// When the page mentions several ids the most frequent wins; ties go to
/// the id seen first.
#[derive(Debug, Clone)]
pub struct DocumentIdResolver {
    json_pattern: Regex,
    assignment_pattern: Regex,
}

impl Default for DocumentIdResolver {
    fn default() -> Self {
        Self::new(crate::utils::DOCUMENT_ID_KEY)
    }
}

impl DocumentIdResolver {
    /// Resolver for an arbitrary key name. The key is matched literally.
    #[must_use]
    pub fn new(key: &str) -> Self {
        let key = regex::escape(key);
        Self {
            json_pattern: Regex::new(&format!(r#"(?:\\"|"){key}(?:\\"|")\s*:\s*(\d+)"#))
                .expect("BUG: escaped key always yields a valid pattern"),
            assignment_pattern: Regex::new(&format!(r"(?i){key}\s*=\s*(\d+)"))
                .expect("BUG: escaped key always yields a valid pattern"),
        }
    }

    #[must_use]
    pub fn resolve(&self, raw_html: &str) -> Option<u64> {
        let ids = Self::candidates(&self.json_pattern, raw_html);
        let ids = if ids.is_empty() {
            Self::candidates(&self.assignment_pattern, raw_html)
        } else {
            ids
        };

        let resolved = majority(&ids);
        debug!(candidates = ids.len(), resolved = ?resolved, "Resolved document id");
        resolved
    }

    /// Digits that overflow `u64` are skipped.
    fn candidates(pattern: &Regex, haystack: &str) -> Vec<u64> {
        pattern
            .captures_iter(haystack)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
            .collect()
    }
}

fn majority(ids: &[u64]) -> Option<u64> {
    let mut counts: HashMap<u64, (usize, usize)> = HashMap::new();
    for (position, id) in ids.iter().enumerate() {
        counts.entry(*id).or_insert((0, position)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(id, _)| id)
}
