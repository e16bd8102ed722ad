//! Seisvault Waveform Layer
//!
//! This module owns stored waveform data and the engine built on it:
//!
//! - **types**: Core data structures (ChannelIdentity, ContinuousSegment, Mapping, Restriction)
//! - **mseed**: miniSEED record headers and file scanning
//! - **catalog**: SQLite catalog of files, segments, mappings and restrictions
//! - **repository**: The storage seam the query engine reads through
//! - **engine**: Orchestrates catalog, snapshots, planner and extractor
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Admin Path:
//!   miniSEED file → scan → Catalog → Snapshot rebuild → atomic swap
//!
//! Read Path:
//!   Query → Snapshot → Planner → Extractor → chunk stream
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use seisvault::waveform::{EngineConfig, QueryResponse, WaveformEngine};
//! use seisvault::query::Query;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = WaveformEngine::new(EngineConfig::new("./data")).await?;
//!
//!     engine.index_file("/archive/TA.A25A.2012.001.mseed").await?;
//!
//!     let start = seisvault::waveform::parse_timestamp("2012-01-01").unwrap_or_default();
//!     let end = seisvault::waveform::parse_timestamp("2012-01-02").unwrap_or_default();
//!     let query = Query::new(start, end).network("TA").channel("BH?");
//!
//!     match engine.query(&query).await? {
//!         QueryResponse::NoData => println!("no data"),
//!         QueryResponse::Data { segments, .. } => println!("{} segments", segments.len()),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod engine;
pub mod error;
pub mod mseed;
pub mod repository;
pub mod types;

// Re-export commonly used types
pub use catalog::{Catalog, IndexedFile};
pub use engine::{EngineConfig, EngineStats, QueryResponse, WaveformEngine};
pub use error::{WaveformError, WaveformResult};
pub use mseed::{scan_file, RecordHeader};
pub use repository::{CatalogRepository, SegmentRepository};
pub use types::{
    format_timestamp, parse_timestamp, seconds, ByteRange, ChannelIdentity, ContinuousSegment,
    Mapping, Restriction, TimeWindow, Timestamp, MICROS_PER_SECOND,
};
