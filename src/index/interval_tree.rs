//! Interval Index - static augmented interval tree
//!
//! Entries are sorted by start time and laid out as an implicit balanced
//! binary tree: the node for `[lo, hi)` is the entry at `mid = (lo + hi) / 2`,
//! its children cover `[lo, mid)` and `[mid + 1, hi)`. Each node also records
//! the largest end time in its subtree, so whole subtrees that finish before
//! the query window are skipped.
//!
//! # Performance
//! - Build: O(n log n)
//! - Overlap query: O(log n + k) where k = results
//!
//! The tree is immutable; administrative changes build a new one.

use crate::waveform::Timestamp;

/// Anything with a closed time interval [start, end]
pub trait Interval {
    fn start(&self) -> Timestamp;
    fn end(&self) -> Timestamp;
}

/// Immutable interval tree over closed intervals
#[derive(Debug, Clone)]
pub struct IntervalIndex<T> {
    entries: Vec<T>,
    max_end: Vec<Timestamp>,
}

impl<T: Interval> IntervalIndex<T> {
    /// Build an index from unsorted entries
    pub fn new(mut entries: Vec<T>) -> Self {
        entries.sort_by_key(|e| (e.start(), e.end()));

        let mut max_end = vec![Timestamp::MIN; entries.len()];
        fill_max_end(&entries, &mut max_end, 0, entries.len());

        Self { entries, max_end }
    }

    /// Number of intervals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in start order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Find every entry accepted by `predicate` whose interval intersects
    /// the closed window [start, end].
    ///
    /// Results come back in start order.
    pub fn find_overlapping<P>(&self, predicate: P, start: Timestamp, end: Timestamp) -> Vec<&T>
    where
        P: Fn(&T) -> bool,
    {
        let mut found = Vec::new();
        if start > end {
            return found;
        }
        self.collect(&predicate, start, end, 0, self.entries.len(), &mut found);
        found
    }

    fn collect<'a, P>(
        &'a self,
        predicate: &P,
        start: Timestamp,
        end: Timestamp,
        lo: usize,
        hi: usize,
        found: &mut Vec<&'a T>,
    ) where
        P: Fn(&T) -> bool,
    {
        if lo >= hi {
            return;
        }

        let mid = lo + (hi - lo) / 2;

        // Everything below this node ends before the window
        if self.max_end[mid] < start {
            return;
        }

        self.collect(predicate, start, end, lo, mid, found);

        let entry = &self.entries[mid];
        // This node and everything to its right starts after the window
        if entry.start() > end {
            return;
        }

        if entry.end() >= start && predicate(entry) {
            found.push(entry);
        }

        self.collect(predicate, start, end, mid + 1, hi, found);
    }
}

fn fill_max_end<T: Interval>(entries: &[T], max_end: &mut [Timestamp], lo: usize, hi: usize) -> Timestamp {
    if lo >= hi {
        return Timestamp::MIN;
    }

    let mid = lo + (hi - lo) / 2;
    let left = fill_max_end(entries, max_end, lo, mid);
    let right = fill_max_end(entries, max_end, mid + 1, hi);
    let subtree_max = entries[mid].end().max(left).max(right);
    max_end[mid] = subtree_max;
    subtree_max
}

impl<T: Interval> Default for IntervalIndex<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Span {
        id: u32,
        start: Timestamp,
        end: Timestamp,
    }

    impl Interval for Span {
        fn start(&self) -> Timestamp {
            self.start
        }
        fn end(&self) -> Timestamp {
            self.end
        }
    }

    fn spans(pairs: &[(Timestamp, Timestamp)]) -> Vec<Span> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| Span {
                id: i as u32,
                start,
                end,
            })
            .collect()
    }

    fn ids(found: Vec<&Span>) -> Vec<u32> {
        let mut ids: Vec<u32> = found.into_iter().map(|s| s.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_empty_index() {
        let index: IntervalIndex<Span> = IntervalIndex::default();
        assert!(index.is_empty());
        assert!(index.find_overlapping(|_| true, 0, 100).is_empty());
    }

    #[test]
    fn test_closed_interval_boundaries() {
        // Last-sample-inclusive spans of seven one-second traces
        let index = IntervalIndex::new(spans(&[
            (0, 9),
            (5, 14),
            (10, 19),
            (-5, 4),
            (2, 9),
            (0, 11),
            (1, 10),
        ]));

        assert_eq!(index.find_overlapping(|_| true, 1, 10).len(), 7);
        assert_eq!(index.find_overlapping(|_| true, 1, 9).len(), 6);
        assert_eq!(index.find_overlapping(|_| true, -10, 0).len(), 3);
        assert_eq!(index.find_overlapping(|_| true, -10, -5).len(), 1);
        assert_eq!(index.find_overlapping(|_| true, 11, 15).len(), 3);
        assert_eq!(index.find_overlapping(|_| true, 19, 20).len(), 1);
        assert_eq!(index.find_overlapping(|_| true, 20, 25).len(), 0);
    }

    #[test]
    fn test_predicate_filters() {
        let index = IntervalIndex::new(spans(&[(0, 10), (0, 10), (0, 10)]));
        let found = index.find_overlapping(|s| s.id != 1, 5, 6);
        assert_eq!(ids(found), vec![0, 2]);
    }

    #[test]
    fn test_inverted_window_finds_nothing() {
        let index = IntervalIndex::new(spans(&[(0, 10)]));
        assert!(index.find_overlapping(|_| true, 6, 5).is_empty());
    }

    #[test]
    fn test_matches_linear_scan() {
        // Deterministic pseudo-random intervals
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |modulus: i64| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % modulus as u64) as i64
        };

        let mut pairs = Vec::new();
        for _ in 0..500 {
            let start = next(10_000) - 5_000;
            let length = next(300);
            pairs.push((start, start + length));
        }
        let all = spans(&pairs);
        let index = IntervalIndex::new(all.clone());

        for _ in 0..200 {
            let start = next(12_000) - 6_000;
            let end = start + next(500);

            let expected: Vec<u32> = all
                .iter()
                .filter(|s| s.start <= end && s.end >= start)
                .map(|s| s.id)
                .collect();

            assert_eq!(ids(index.find_overlapping(|_| true, start, end)), expected);
        }
    }

    #[test]
    fn test_results_in_start_order() {
        let index = IntervalIndex::new(spans(&[(30, 40), (10, 50), (20, 25)]));
        let starts: Vec<Timestamp> = index
            .find_overlapping(|_| true, 0, 100)
            .into_iter()
            .map(|s| s.start)
            .collect();
        assert_eq!(starts, vec![10, 20, 30]);
    }
}
