//! # History Log
//!
//! Newest-first record of resolved draws. Display only; nothing in the
//! pipeline reads it back.

use std::collections::VecDeque;

use crate::resolver::DrawOutcome;

/// One logged draw.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Draw number, starting at 0 for the first draw of the session.
    pub sequence: u64,
    /// The resolved outcome.
    pub outcome: DrawOutcome,
}

/// Append-only, unbounded, newest first.
#[derive(Clone, Debug, Default)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    next_sequence: u64,
}

impl HistoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `outcome` at the front.
    pub fn append(&mut self, outcome: DrawOutcome) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_front(HistoryEntry { sequence, outcome });
    }

    /// All entries, newest first.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Number of logged draws.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been drawn yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the drawn items' prices.
    #[must_use]
    pub fn total_value(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| e.outcome.entry().price)
            .fold(0, u64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RarityEntry, RarityTier};
    use crate::resolver::DrawSource;

    fn outcome(name: &str, price: u64) -> DrawOutcome {
        DrawOutcome::new(
            RarityEntry::new(name, RarityTier::Common, 0.5, price, ""),
            DrawSource::LocalFallback,
        )
    }

    #[test]
    fn test_newest_first() {
        let mut log = HistoryLog::new();
        assert!(log.is_empty());

        log.append(outcome("first", 5));
        log.append(outcome("second", 15));
        log.append(outcome("third", 50));

        let names: Vec<_> = log.all().map(|e| e.outcome.entry().name.as_str()).collect();
        assert_eq!(names, ["third", "second", "first"]);

        let latest = log.latest().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_value(), 70);
    }

    #[test]
    fn test_no_dedup() {
        let mut log = HistoryLog::new();
        log.append(outcome("same", 5));
        log.append(outcome("same", 5));
        assert_eq!(log.all().len(), 2);
    }
}
