//! Snapshot - one consistent view of segments, mappings and restrictions
//!
//! Queries hold an `Arc<Snapshot>` for their whole duration. Administrative
//! changes build a new snapshot and swap it in; parts that did not change
//! are shared with the previous snapshot.
//!
//! ```text
//! Snapshot
//!  ├── segments      Vec<Arc<ContinuousSegment>>
//!  ├── mappings      MappingTable      (validated, no overlaps)
//!  ├── cache         MappingCache      (segment -> effective spans)
//!  ├── index         IntervalIndex<SpanRef>
//!  └── restrictions  RestrictionSet
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::index::interval_tree::IntervalIndex;
use crate::index::mapping::{EffectiveSpan, MappingCache, MappingTable, SpanRef};
use crate::index::restriction::RestrictionSet;
use crate::waveform::{ContinuousSegment, Mapping, Restriction, Timestamp, WaveformResult};

/// Immutable view used by queries
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    segments: Arc<Vec<Arc<ContinuousSegment>>>,
    mappings: Arc<MappingTable>,
    cache: Arc<MappingCache>,
    index: Arc<IntervalIndex<SpanRef>>,
    restrictions: Arc<RestrictionSet>,
}

/// Counters describing a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub generation: u64,
    pub segments: usize,
    pub effective_spans: usize,
    pub effective_identities: usize,
    pub mappings: usize,
    pub restricted_stations: usize,
}

impl Snapshot {
    /// Snapshot with no data
    pub fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            segments: Arc::new(Vec::new()),
            mappings: Arc::new(MappingTable::default()),
            cache: Arc::new(MappingCache::default()),
            index: Arc::new(IntervalIndex::default()),
            restrictions: Arc::new(RestrictionSet::default()),
        }
    }

    /// Build every structure from scratch
    pub fn build(
        generation: u64,
        segments: Vec<ContinuousSegment>,
        mappings: Vec<Mapping>,
        restrictions: Vec<Restriction>,
    ) -> WaveformResult<Self> {
        let segments: Vec<Arc<ContinuousSegment>> = segments.into_iter().map(Arc::new).collect();
        let mappings = MappingTable::new(mappings)?;
        let cache = MappingCache::recompute_all(&mappings, &segments);
        let index = IntervalIndex::new(cache.span_refs());

        Ok(Self {
            generation,
            built_at: Utc::now(),
            segments: Arc::new(segments),
            mappings: Arc::new(mappings),
            cache: Arc::new(cache),
            index: Arc::new(index),
            restrictions: Arc::new(RestrictionSet::new(restrictions)),
        })
    }

    /// New snapshot with different mappings; segments and restrictions are shared
    pub fn with_mappings(&self, mappings: Vec<Mapping>) -> WaveformResult<Self> {
        let mappings = MappingTable::new(mappings)?;
        let cache = MappingCache::recompute_all(&mappings, &self.segments);
        let index = IntervalIndex::new(cache.span_refs());

        Ok(Self {
            generation: self.generation + 1,
            built_at: Utc::now(),
            segments: Arc::clone(&self.segments),
            mappings: Arc::new(mappings),
            cache: Arc::new(cache),
            index: Arc::new(index),
            restrictions: Arc::clone(&self.restrictions),
        })
    }

    /// New snapshot with different restrictions; everything else is shared
    pub fn with_restrictions(&self, restrictions: Vec<Restriction>) -> Self {
        Self {
            generation: self.generation + 1,
            built_at: Utc::now(),
            restrictions: Arc::new(RestrictionSet::new(restrictions)),
            ..self.clone()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn segments(&self) -> &[Arc<ContinuousSegment>] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Arc<ContinuousSegment>> {
        self.segments.get(index)
    }

    pub fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    pub fn cache(&self) -> &MappingCache {
        &self.cache
    }

    pub fn restrictions(&self) -> &RestrictionSet {
        &self.restrictions
    }

    /// Effective span behind an index entry
    pub fn span(&self, entry: &SpanRef) -> Option<&EffectiveSpan> {
        self.cache.span(entry)
    }

    /// Spans accepted by `predicate` that intersect [start, end]
    pub fn find_overlapping<P>(&self, predicate: P, start: Timestamp, end: Timestamp) -> Vec<&SpanRef>
    where
        P: Fn(&SpanRef) -> bool,
    {
        self.index.find_overlapping(predicate, start, end)
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            generation: self.generation,
            segments: self.segments.len(),
            effective_spans: self.index.len(),
            effective_identities: self.cache.identities().len(),
            mappings: self.mappings.len(),
            restricted_stations: self.restrictions.len(),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
