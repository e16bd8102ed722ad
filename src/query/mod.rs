//! Seisvault Query Engine
//!
//! Resolves FDSN dataselect requests into waveform data:
//!
//! - **Pattern**: compile NSLC selector lists (`*`, `?`, `-` exclusion)
//! - **Request**: the query type and its validation
//! - **Planner**: select, authorize, clip and order segment pieces
//! - **Extractor**: stream the bytes of planned pieces lazily
//!
//! # Example
//!
//! ```rust,ignore
//! use seisvault::query::{Query, QueryPlanner};
//!
//! let query = Query::new(start, end)
//!     .network("TA")
//!     .station("A25A")
//!     .channel("BH?,-BHZ")
//!     .requester("random");
//!
//! let outcome = QueryPlanner::new(engine.snapshot().await).plan(&query)?;
//! ```

mod error;
mod extractor;
mod pattern;
mod planner;
mod request;

pub use error::{QueryError, QueryResult};
pub use extractor::{ChunkStream, SegmentExtractor, TraceChunk};
pub use pattern::{matches, Field, PatternList};
pub use planner::{PlanOutcome, PlannedSegment, QueryPlanner};
pub use request::{parse_time_parameter, CompiledQuery, Query};
