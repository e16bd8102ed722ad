//! Seisvault Index Structures
//!
//! In-memory structures the query planner reads:
//!
//! - **IntervalIndex**: augmented interval tree for O(log n + k) overlap queries
//! - **MappingTable / MappingCache**: time-variant identity renames, materialized per segment
//! - **RestrictionSet**: per-station access lists
//! - **Snapshot**: one immutable bundle of all of the above
//!
//! # Architecture
//!
//! ```text
//! Query: "TA.*.*.BH? from 2012-01-01 to 2012-01-02 as user U"
//!        ↓
//! MappingCache: effective identities matching the patterns
//!        ↓
//! IntervalIndex: effective spans intersecting the window
//!        ↓
//! RestrictionSet: drop spans whose original station U may not see
//!        ↓
//! Planned segments, clipped to the window
//! ```

mod interval_tree;
mod mapping;
mod restriction;
mod snapshot;

pub use interval_tree::{Interval, IntervalIndex};
pub use mapping::{EffectiveSpan, MappingCache, MappingTable, SpanRef};
pub use restriction::RestrictionSet;
pub use snapshot::{Snapshot, SnapshotStats};
