//! Seisvault Waveform Engine
//!
//! The engine orchestrates all components:
//! - Admin path: file/mapping/restriction change → Catalog → new Snapshot → swap
//! - Read path: Query → Planner (on one Snapshot) → Extractor → chunk stream
//!
//! Queries never block on administrative changes: they clone the current
//! `Arc<Snapshot>` once and keep using it until they finish.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::index::{MappingTable, Snapshot, SnapshotStats};
use crate::query::{ChunkStream, PlanOutcome, PlannedSegment, Query, QueryPlanner, QueryResult, SegmentExtractor};
use crate::waveform::catalog::{Catalog, IndexedFile};
use crate::waveform::error::{WaveformError, WaveformResult};
use crate::waveform::mseed::scan_file;
use crate::waveform::repository::{CatalogRepository, SegmentRepository};
use crate::waveform::types::{ContinuousSegment, Mapping, Restriction};

/// Extensions picked up when scanning directories
const WAVEFORM_EXTENSIONS: [&str; 3] = ["mseed", "miniseed", "msd"];

/// Configuration for the waveform engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for engine state
    pub data_dir: PathBuf,
    /// Catalog file name inside `data_dir`
    pub catalog_file: String,
    /// Record length for records without blockette 1000
    pub default_record_length: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("seisvault_data"),
            catalog_file: "catalog.db".to_string(),
            default_record_length: 4096,
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Get path to the catalog database
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_file)
    }
}

/// Outcome of a query
pub enum QueryResponse {
    /// Nothing matched, or nothing the requester may see
    NoData,
    /// Planned pieces and the lazy stream of their bytes
    Data {
        segments: Vec<PlannedSegment>,
        chunks: ChunkStream,
    },
}

impl QueryResponse {
    pub fn is_no_data(&self) -> bool {
        matches!(self, QueryResponse::NoData)
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub files: usize,
    #[serde(flatten)]
    pub snapshot: SnapshotStats,
    pub snapshot_built_at: chrono::DateTime<Utc>,
}

/// The waveform query engine
pub struct WaveformEngine {
    config: EngineConfig,
    catalog: Arc<Mutex<Catalog>>,
    repository: Arc<dyn SegmentRepository>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Serializes administrative changes
    admin: tokio::sync::Mutex<()>,
}

impl WaveformEngine {
    /// Open the engine on its catalog under `config.data_dir`
    pub async fn new(config: EngineConfig) -> WaveformResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let catalog = Arc::new(Mutex::new(Catalog::open(config.catalog_path())?));
        let repository: Arc<dyn SegmentRepository> = Arc::new(CatalogRepository::new(Arc::clone(&catalog)));
        Self::with_repository(config, catalog, repository).await
    }

    /// Open the engine with an external segment repository.
    ///
    /// Mappings and restrictions still live in `catalog`.
    pub async fn with_repository(
        config: EngineConfig,
        catalog: Arc<Mutex<Catalog>>,
        repository: Arc<dyn SegmentRepository>,
    ) -> WaveformResult<Self> {
        let engine = Self {
            config,
            catalog,
            repository,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            admin: tokio::sync::Mutex::new(()),
        };

        engine.rebuild().await?;

        let stats = engine.snapshot().await.stats();
        tracing::info!(
            "Waveform engine ready: {} segments, {} mappings, {} restricted stations",
            stats.segments,
            stats.mappings,
            stats.restricted_stations
        );

        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    fn lock_catalog(&self) -> WaveformResult<MutexGuard<'_, Catalog>> {
        self.catalog
            .lock()
            .map_err(|e| WaveformError::Lock(e.to_string()))
    }

    // ==================== Read Path ====================

    /// Plan a query without reading any data
    pub async fn plan(&self, query: &Query) -> QueryResult<PlanOutcome> {
        // Fail fast before touching the snapshot or storage
        let compiled = query.validate()?;
        let snapshot = self.snapshot().await;
        Ok(QueryPlanner::new(snapshot).plan_compiled(&compiled))
    }

    /// Run a query, returning a lazy stream of chunks or NoData
    pub async fn query(&self, query: &Query) -> QueryResult<QueryResponse> {
        match self.plan(query).await? {
            PlanOutcome::NoData => Ok(QueryResponse::NoData),
            PlanOutcome::Data(segments) => {
                let chunks = SegmentExtractor::new(Arc::clone(&self.repository)).extract(segments.clone());
                Ok(QueryResponse::Data { segments, chunks })
            }
        }
    }

    // ==================== Files ====================

    /// Scan a miniSEED file and store its segments, replacing earlier scans
    pub async fn index_file(&self, path: impl AsRef<Path>) -> WaveformResult<Vec<ContinuousSegment>> {
        let _guard = self.admin.lock().await;
        let stored = self.index_file_locked(path.as_ref()).await?;
        self.rebuild().await?;
        Ok(stored)
    }

    /// Index every waveform file below a directory.
    ///
    /// Unreadable files are skipped with a warning. Returns the number of
    /// files indexed.
    pub async fn index_directory(&self, dir: impl AsRef<Path>) -> WaveformResult<usize> {
        let _guard = self.admin.lock().await;

        let root = dir.as_ref().to_path_buf();
        let files = tokio::task::spawn_blocking(move || find_waveform_files(&root)).await??;

        let mut indexed = 0;
        for file in files {
            match self.index_file_locked(&file).await {
                Ok(_) => indexed += 1,
                Err(e) => tracing::warn!("Skipping {:?}: {}", file, e),
            }
        }

        self.rebuild().await?;
        tracing::info!("Indexed {} files from {:?}", indexed, dir.as_ref());
        Ok(indexed)
    }

    async fn index_file_locked(&self, path: &Path) -> WaveformResult<Vec<ContinuousSegment>> {
        let path = std::fs::canonicalize(path)?;
        let default_record_length = self.config.default_record_length;

        let scan_path = path.clone();
        let (size, segments) = tokio::task::spawn_blocking(move || {
            let size = std::fs::metadata(&scan_path)?.len();
            let segments = scan_file(&scan_path, default_record_length)?;
            Ok::<_, WaveformError>((size, segments))
        })
        .await??;

        let stored = {
            let mut catalog = self.lock_catalog()?;
            catalog.replace_file(&path, size, Utc::now().timestamp_micros(), segments)?
        };

        tracing::info!("Indexed {} segments from {:?}", stored.len(), path);
        Ok(stored)
    }

    /// Forget a file and its segments
    pub async fn remove_file(&self, path: impl AsRef<Path>) -> WaveformResult<bool> {
        let _guard = self.admin.lock().await;

        // Removed files may no longer exist on disk
        let path = std::fs::canonicalize(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());
        let removed = self.lock_catalog()?.remove_file(&path)?;

        if removed {
            tracing::info!("Removed {:?} from catalog", path);
            self.rebuild().await?;
        }
        Ok(removed)
    }

    /// Files known to the catalog
    pub async fn files(&self) -> WaveformResult<Vec<IndexedFile>> {
        self.lock_catalog()?.files()
    }

    // ==================== Mappings ====================

    /// Add a mapping; overlapping validity for the same source is rejected
    pub async fn add_mapping(&self, mapping: Mapping) -> WaveformResult<Mapping> {
        let _guard = self.admin.lock().await;

        let stored = {
            let mut catalog = self.lock_catalog()?;
            MappingTable::new(catalog.mappings()?)?.check_insert(&mapping)?;
            catalog.insert_mapping(&mapping)?
        };

        tracing::info!(
            "Added mapping {}: {} -> {}",
            stored.id,
            stored.source,
            stored.target
        );
        self.apply_mappings().await?;
        Ok(stored)
    }

    /// Remove a mapping by id
    pub async fn remove_mapping(&self, id: i64) -> WaveformResult<bool> {
        let _guard = self.admin.lock().await;

        let removed = self.lock_catalog()?.delete_mapping(id)?;
        if removed {
            tracing::info!("Removed mapping {}", id);
            self.apply_mappings().await?;
        }
        Ok(removed)
    }

    /// Mappings stored in the catalog
    pub async fn mappings(&self) -> WaveformResult<Vec<Mapping>> {
        self.lock_catalog()?.mappings()
    }

    /// Recompute effective identities after mappings changed elsewhere
    pub async fn on_mapping_changed(&self) -> WaveformResult<()> {
        let _guard = self.admin.lock().await;
        self.apply_mappings().await
    }

    async fn apply_mappings(&self) -> WaveformResult<()> {
        let mappings = self.lock_catalog()?.mappings()?;
        let current = self.snapshot().await;

        let next = tokio::task::spawn_blocking(move || current.with_mappings(mappings)).await??;
        self.swap(next).await;
        Ok(())
    }

    // ==================== Restrictions ====================

    /// Restrict a station to a set of users, merging with an existing restriction
    pub async fn add_restriction(
        &self,
        network: &str,
        station: &str,
        users: BTreeSet<String>,
    ) -> WaveformResult<Restriction> {
        if network.trim().is_empty() || station.trim().is_empty() {
            return Err(WaveformError::InvalidIdentity(
                "restrictions need a network and a station".into(),
            ));
        }

        let _guard = self.admin.lock().await;
        let stored = self
            .lock_catalog()?
            .upsert_restriction(network, station, &users)?;

        tracing::info!(
            "Restricted {}.{} to {} users",
            stored.network,
            stored.station,
            stored.users.len()
        );
        self.apply_restrictions().await?;
        Ok(stored)
    }

    /// Remove a restriction by id
    pub async fn remove_restriction(&self, id: i64) -> WaveformResult<bool> {
        let _guard = self.admin.lock().await;

        let removed = self.lock_catalog()?.delete_restriction(id)?;
        if removed {
            tracing::info!("Removed restriction {}", id);
            self.apply_restrictions().await?;
        }
        Ok(removed)
    }

    /// Restrictions stored in the catalog
    pub async fn restrictions(&self) -> WaveformResult<Vec<Restriction>> {
        self.lock_catalog()?.restrictions()
    }

    /// Reload restrictions after they changed elsewhere
    pub async fn on_restriction_changed(&self) -> WaveformResult<()> {
        let _guard = self.admin.lock().await;
        self.apply_restrictions().await
    }

    async fn apply_restrictions(&self) -> WaveformResult<()> {
        let restrictions = self.lock_catalog()?.restrictions()?;
        let next = self.snapshot().await.with_restrictions(restrictions);
        self.swap(next).await;
        Ok(())
    }

    // ==================== Snapshots ====================

    /// Rebuild the snapshot from the repository and catalog
    pub async fn refresh(&self) -> WaveformResult<()> {
        let _guard = self.admin.lock().await;
        self.rebuild().await
    }

    async fn rebuild(&self) -> WaveformResult<()> {
        let repository = Arc::clone(&self.repository);
        let catalog = Arc::clone(&self.catalog);
        let generation = self.snapshot().await.generation() + 1;

        let next = tokio::task::spawn_blocking(move || {
            let segments = repository.all_segments()?;
            let (mappings, restrictions) = {
                let catalog = catalog
                    .lock()
                    .map_err(|e| WaveformError::Lock(e.to_string()))?;
                (catalog.mappings()?, catalog.restrictions()?)
            };
            Snapshot::build(generation, segments, mappings, restrictions)
        })
        .await??;

        self.swap(next).await;
        Ok(())
    }

    async fn swap(&self, next: Snapshot) {
        tracing::debug!("Swapping in snapshot generation {}", next.generation());
        *self.snapshot.write().await = Arc::new(next);
    }

    /// Get engine statistics
    pub async fn stats(&self) -> WaveformResult<EngineStats> {
        let files = self.lock_catalog()?.files()?.len();
        let snapshot = self.snapshot().await;

        Ok(EngineStats {
            files,
            snapshot: snapshot.stats(),
            snapshot_built_at: snapshot.built_at(),
        })
    }
}

fn find_waveform_files(root: &Path) -> WaveformResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| WAVEFORM_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
