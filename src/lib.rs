//! # Seisvault
//!
//! Seismological waveform service: resolves FDSN dataselect requests over
//! continuous miniSEED data, with time-bounded channel remapping and
//! per-station access restrictions, plus a pluggable document registry.
//!
//! ## Features
//!
//! - **FDSN selectors**: comma lists, `*`/`?` wildcards and `-` exclusions per NSLC field
//! - **Mappings**: serve a channel under another identity for a time range
//! - **Restrictions**: hide stations from everyone but named users
//! - **Snapshots**: queries read an immutable index swapped atomically on change
//! - **Streaming**: miniSEED records are read lazily and streamed to the client
//!
//! ## Modules
//!
//! - [`waveform`]: Catalog, miniSEED scanning and the engine
//! - [`index`]: Interval index, mapping cache, restriction set and snapshots
//! - [`query`]: Selector patterns, validation, planning and extraction
//! - [`documents`]: Document type registry with validators, indexers and permissions
//! - [`api`]: FDSN and admin HTTP endpoints with Axum
//! - [`config`]: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seisvault::waveform::{parse_timestamp, EngineConfig, WaveformEngine};
//! use seisvault::query::Query;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = WaveformEngine::new(EngineConfig::new("./seisvault_data")).await?;
//!
//!     engine.index_directory("/archive/2010").await?;
//!
//!     let start = parse_timestamp("2010-03-25T00:00:00").ok_or("bad start")?;
//!     let end = parse_timestamp("2010-03-26T00:00:00").ok_or("bad end")?;
//!     let response = engine
//!         .query(&Query::new(start, end).network("TA").channel("BH?,-BHE"))
//!         .await?;
//!
//!     println!("no data: {}", response.is_no_data());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod documents;
pub mod index;
pub mod query;
pub mod waveform;

// Re-export top-level types for convenience
pub use waveform::{
    ChannelIdentity, ContinuousSegment, EngineConfig, EngineStats, Mapping, QueryResponse,
    Restriction, Timestamp, WaveformEngine, WaveformError, WaveformResult,
};

pub use index::{Snapshot, SnapshotStats};

pub use query::{PlanOutcome, PlannedSegment, Query, QueryError, QueryPlanner, TraceChunk};

pub use documents::{DocumentError, DocumentType, PluginRegistry, RetrievePermission};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{
    ApiConfig as ConfigApiConfig, AuthConfig, Config, ConfigError, DocumentsConfig,
    LoggingConfig, StorageConfig,
};
