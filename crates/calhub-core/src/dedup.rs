//! Source precedence arbitration for the merge-write engine.
//!
//! When two records describe the same real-world event, the per-source
//! priority mapping decides which one survives. Ties go to the incumbent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of arbitrating an incoming record against an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Existing record wins; the incoming one is dropped.
    KeepExisting,
    /// Incoming record wins; the existing row is updated in place.
    Overwrite,
    /// Tie; the incoming record is dropped and the incumbent stays.
    SkipSameSource,
}

/// Per-batch deduplication rules, supplied by the sync adapter performing
/// the write. Not persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupRules {
    /// Source name of the batch currently being written.
    #[serde(default)]
    pub source: String,
    /// Skip candidates that tie with a record from the same source.
    #[serde(default)]
    pub skip_same_source: bool,
    /// Source name -> priority; higher wins, unknown sources rank 0.
    #[serde(default)]
    pub precedence: HashMap<String, i64>,
}

impl DedupRules {
    /// Rules for a plain write with no precedence arbitration.
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn priority_of(&self, source: &str) -> i64 {
        self.precedence.get(source).copied().unwrap_or(0)
    }

    /// Arbitrate the current batch against the source of an existing record.
    ///
    /// With either source absent there is nothing to arbitrate: the write
    /// proceeds as a plain update-in-place, which is what stores predating
    /// the source column expect.
    pub fn resolve(&self, existing_source: &str) -> Resolution {
        if self.source.is_empty() || existing_source.is_empty() {
            return Resolution::Overwrite;
        }

        let current = self.priority_of(&self.source);
        let existing = self.priority_of(existing_source);

        if current < existing {
            Resolution::KeepExisting
        } else if current > existing {
            Resolution::Overwrite
        } else {
            Resolution::SkipSameSource
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(source: &str, skip_same_source: bool, precedence: &[(&str, i64)]) -> DedupRules {
        DedupRules {
            source: source.to_string(),
            skip_same_source,
            precedence: precedence
                .iter()
                .map(|(s, p)| (s.to_string(), *p))
                .collect(),
        }
    }

    #[test]
    fn empty_source_means_plain_update() {
        assert_eq!(DedupRules::default().resolve("outlook"), Resolution::Overwrite);
        assert_eq!(
            rules("outlook", false, &[]).resolve(""),
            Resolution::Overwrite
        );
    }

    #[test]
    fn lower_priority_keeps_existing() {
        let r = rules("ics", false, &[("ics", 1), ("outlook", 2)]);
        assert_eq!(r.resolve("outlook"), Resolution::KeepExisting);
    }

    #[test]
    fn higher_priority_overwrites() {
        let r = rules("outlook", false, &[("ics", 1), ("outlook", 2)]);
        assert_eq!(r.resolve("ics"), Resolution::Overwrite);
    }

    #[test]
    fn tie_goes_to_incumbent() {
        let r = rules("cal1", false, &[("cal1", 1), ("cal2", 1)]);
        assert_eq!(r.resolve("cal2"), Resolution::SkipSameSource);
        // Unknown sources both rank 0: still a tie.
        let r = rules("cal1", false, &[]);
        assert_eq!(r.resolve("cal2"), Resolution::SkipSameSource);
    }

    #[test]
    fn same_source_tie_skips_regardless_of_flag() {
        let r = rules("ics", true, &[]);
        assert_eq!(r.resolve("ics"), Resolution::SkipSameSource);
        let r = rules("ics", false, &[]);
        assert_eq!(r.resolve("ics"), Resolution::SkipSameSource);
    }
}
