//! Mapping Resolver - time-variant channel identity renames
//!
//! `MappingTable` answers "what is this identity called at instant t".
//! `MappingCache` materializes that answer for every stored segment: each
//! segment projects to one or more `EffectiveSpan`s, split wherever a
//! mapping's validity starts or ends inside the segment.
//!
//! ```text
//! segment  TA.A25A..BHE   |------------------------------|
//! mapping  -> XX.YY.00.ZZZ          [==========)
//! spans    TA.A25A..BHE   |--------|
//!          XX.YY.00.ZZZ            |----------|
//!          TA.A25A..BHE                       |----------|
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::index::interval_tree::Interval;
use crate::waveform::{ChannelIdentity, ContinuousSegment, Mapping, Timestamp, WaveformError, WaveformResult};

/// Validated set of mappings, grouped by source identity
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    by_source: HashMap<ChannelIdentity, Vec<Mapping>>,
    count: usize,
}

impl MappingTable {
    /// Build a table, rejecting overlapping validity ranges
    pub fn new(mappings: Vec<Mapping>) -> WaveformResult<Self> {
        let mut table = Self::default();
        for mapping in mappings {
            table.insert(mapping)?;
        }
        Ok(table)
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check that a new mapping can be added without overlapping an
    /// existing one for the same source identity
    pub fn check_insert(&self, candidate: &Mapping) -> WaveformResult<()> {
        candidate.validate()?;

        if let Some(existing) = self
            .by_source
            .get(&candidate.source)
            .and_then(|list| list.iter().find(|m| m.overlaps(candidate)))
        {
            return Err(WaveformError::MappingOverlap {
                source_identity: candidate.source.to_string(),
                existing_id: existing.id,
            });
        }

        Ok(())
    }

    fn insert(&mut self, mapping: Mapping) -> WaveformResult<()> {
        self.check_insert(&mapping)?;

        let list = self.by_source.entry(mapping.source.clone()).or_default();
        let at = list.partition_point(|m| m.start < mapping.start);
        list.insert(at, mapping);
        self.count += 1;
        Ok(())
    }

    /// Effective identity of `identity` at instant `at`
    pub fn resolve<'a>(&'a self, identity: &'a ChannelIdentity, at: Timestamp) -> &'a ChannelIdentity {
        self.by_source
            .get(identity)
            .and_then(|list| list.iter().find(|m| m.is_active_at(at)))
            .map_or(identity, |m| &m.target)
    }

    /// Split the closed interval [start, end] of `identity` into spans with
    /// one effective identity each.
    ///
    /// Adjacent spans that resolve to the same identity are merged.
    pub fn project(&self, identity: &ChannelIdentity, start: Timestamp, end: Timestamp) -> Vec<EffectiveSpan> {
        let Some(list) = self.by_source.get(identity) else {
            return vec![EffectiveSpan::new(identity.clone(), start, end)];
        };

        let mut spans: Vec<EffectiveSpan> = Vec::new();
        let mut cursor = start;
        let mut covered = false;

        for mapping in list {
            if mapping.end_or_max() <= cursor {
                continue;
            }
            if mapping.start > end {
                break;
            }

            if mapping.start > cursor {
                push_merged(&mut spans, EffectiveSpan::new(identity.clone(), cursor, mapping.start - 1));
                cursor = mapping.start;
            }

            // Mapping end is exclusive
            let span_end = end.min(mapping.end_or_max() - 1);
            push_merged(&mut spans, EffectiveSpan::new(mapping.target.clone(), cursor, span_end));

            if span_end >= end {
                covered = true;
                break;
            }
            cursor = span_end + 1;
        }

        if !covered {
            push_merged(&mut spans, EffectiveSpan::new(identity.clone(), cursor, end));
        }

        spans
    }
}

fn push_merged(spans: &mut Vec<EffectiveSpan>, span: EffectiveSpan) {
    if let Some(last) = spans.last_mut() {
        if last.identity == span.identity && last.end.checked_add(1) == Some(span.start) {
            last.end = span.end;
            return;
        }
    }
    spans.push(span);
}

/// A sub-interval of a segment carrying one effective identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSpan {
    pub identity: ChannelIdentity,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl EffectiveSpan {
    pub fn new(identity: ChannelIdentity, start: Timestamp, end: Timestamp) -> Self {
        Self { identity, start, end }
    }
}

/// Position of one effective span, used as the interval index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanRef {
    /// Index into the snapshot's segment list
    pub segment: usize,
    /// Index into that segment's projection
    pub span: usize,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Interval for SpanRef {
    fn start(&self) -> Timestamp {
        self.start
    }

    fn end(&self) -> Timestamp {
        self.end
    }
}

/// Effective identities of every stored segment
#[derive(Debug, Clone, Default)]
pub struct MappingCache {
    projections: Vec<Vec<EffectiveSpan>>,
    identities: BTreeSet<ChannelIdentity>,
}

impl MappingCache {
    /// Project every segment through the mapping table
    pub fn recompute_all(table: &MappingTable, segments: &[Arc<ContinuousSegment>]) -> Self {
        let projections: Vec<Vec<EffectiveSpan>> = segments
            .iter()
            .map(|segment| table.project(&segment.identity, segment.start, segment.end))
            .collect();

        let identities = projections
            .iter()
            .flatten()
            .map(|span| span.identity.clone())
            .collect();

        Self {
            projections,
            identities,
        }
    }

    /// Spans of one segment, in time order
    pub fn spans(&self, segment: usize) -> &[EffectiveSpan] {
        self.projections
            .get(segment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve an index entry to its span
    pub fn span(&self, entry: &SpanRef) -> Option<&EffectiveSpan> {
        self.projections.get(entry.segment)?.get(entry.span)
    }

    /// Every distinct effective identity, in NSLC order
    pub fn identities(&self) -> &BTreeSet<ChannelIdentity> {
        &self.identities
    }

    /// Interval index entries for every span
    pub fn span_refs(&self) -> Vec<SpanRef> {
        self.projections
            .iter()
            .enumerate()
            .flat_map(|(segment, spans)| {
                spans.iter().enumerate().map(move |(span, s)| SpanRef {
                    segment,
                    span,
                    start: s.start,
                    end: s.end,
                })
            })
            .collect()
    }

    /// Total number of spans
    pub fn span_count(&self) -> usize {
        self.projections.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::ByteRange;
    use std::path::PathBuf;

    fn old() -> ChannelIdentity {
        ChannelIdentity::new("TA", "A25A", "", "BHE")
    }

    fn new_id() -> ChannelIdentity {
        ChannelIdentity::new("XX", "YY", "00", "ZZZ")
    }

    fn mapping(id: i64, start: Timestamp, end: Option<Timestamp>) -> Mapping {
        let mut m = Mapping::new(old(), new_id(), start, end);
        m.id = id;
        m
    }

    fn segment(identity: ChannelIdentity, start: Timestamp, end: Timestamp) -> Arc<ContinuousSegment> {
        Arc::new(ContinuousSegment {
            id: 1,
            identity,
            start,
            end,
            sampling_rate: 1.0,
            sample_count: 1,
            path: PathBuf::from("/tmp/x"),
            byte_range: ByteRange::new(0, 512),
            record_length: 512,
            quality: None,
        })
    }

    #[test]
    fn test_resolve_boundaries() {
        let table = MappingTable::new(vec![mapping(1, 100, Some(200))]).unwrap();
        let id = old();

        assert_eq!(table.resolve(&id, 99), &old());
        assert_eq!(table.resolve(&id, 100), &new_id());
        assert_eq!(table.resolve(&id, 199), &new_id());
        assert_eq!(table.resolve(&id, 200), &old());

        let other = ChannelIdentity::new("TA", "A25A", "", "BHZ");
        assert_eq!(table.resolve(&other, 150), &other);
    }

    #[test]
    fn test_overlap_rejected() {
        let err = MappingTable::new(vec![mapping(1, 0, Some(100)), mapping(2, 50, None)]).unwrap_err();
        assert!(matches!(err, WaveformError::MappingOverlap { existing_id: 1, .. }));
    }

    #[test]
    fn test_adjacent_allowed() {
        let table = MappingTable::new(vec![mapping(1, 0, Some(100)), mapping(2, 100, None)]).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.check_insert(&mapping(3, -10, Some(0))).is_ok());
        assert!(table.check_insert(&mapping(3, -10, Some(1))).is_err());
    }

    #[test]
    fn test_project_fully_covered() {
        let table = MappingTable::new(vec![mapping(1, 0, Some(1000))]).unwrap();
        let spans = table.project(&old(), 10, 20);
        assert_eq!(spans, vec![EffectiveSpan::new(new_id(), 10, 20)]);
    }

    #[test]
    fn test_project_splits_at_boundaries() {
        let table = MappingTable::new(vec![mapping(1, 100, Some(200))]).unwrap();
        let spans = table.project(&old(), 0, 300);
        assert_eq!(
            spans,
            vec![
                EffectiveSpan::new(old(), 0, 99),
                EffectiveSpan::new(new_id(), 100, 199),
                EffectiveSpan::new(old(), 200, 300),
            ]
        );
    }

    #[test]
    fn test_project_merges_adjacent_same_target() {
        let table = MappingTable::new(vec![mapping(1, 0, Some(100)), mapping(2, 100, None)]).unwrap();
        let spans = table.project(&old(), 50, 150);
        assert_eq!(spans, vec![EffectiveSpan::new(new_id(), 50, 150)]);
    }

    #[test]
    fn test_project_outside_mapping() {
        let table = MappingTable::new(vec![mapping(1, 100, Some(200))]).unwrap();
        assert_eq!(table.project(&old(), 200, 300), vec![EffectiveSpan::new(old(), 200, 300)]);
        assert_eq!(table.project(&old(), 0, 99), vec![EffectiveSpan::new(old(), 0, 99)]);
    }

    #[test]
    fn test_cache_identities_and_refs() {
        let table = MappingTable::new(vec![mapping(1, 100, Some(200))]).unwrap();
        let segments = vec![
            segment(old(), 0, 300),
            segment(ChannelIdentity::new("TA", "A25A", "", "BHZ"), 0, 300),
        ];
        let cache = MappingCache::recompute_all(&table, &segments);

        assert_eq!(cache.spans(0).len(), 3);
        assert_eq!(cache.spans(1).len(), 1);
        assert_eq!(cache.span_count(), 4);
        assert_eq!(cache.identities().len(), 3);

        let refs = cache.span_refs();
        assert_eq!(refs.len(), 4);
        assert_eq!(cache.span(&refs[1]).map(|s| &s.identity), Some(&new_id()));
        assert!(cache.spans(5).is_empty());
    }
}
