//! Catalog - SQLite-backed store of indexed files and configuration
//!
//! Persists everything the engine needs to rebuild its in-memory snapshot:
//! - `files`: indexed waveform files
//! - `continuous_traces`: one row per continuous segment
//! - `mappings`: identity renames with validity ranges
//! - `restrictions` / `restriction_users`: station access lists
//!
//! Timestamps are stored as INTEGER microseconds.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::waveform::error::{WaveformError, WaveformResult};
use crate::waveform::types::{
    ByteRange, ChannelIdentity, ContinuousSegment, Mapping, Restriction, Timestamp,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY,
        path TEXT NOT NULL UNIQUE,
        size INTEGER NOT NULL,
        indexed_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS continuous_traces (
        id INTEGER PRIMARY KEY,
        file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        network TEXT NOT NULL,
        station TEXT NOT NULL,
        location TEXT NOT NULL,
        channel TEXT NOT NULL,
        start_time INTEGER NOT NULL,
        end_time INTEGER NOT NULL,
        sampling_rate REAL NOT NULL,
        sample_count INTEGER NOT NULL,
        byte_offset INTEGER NOT NULL,
        byte_length INTEGER NOT NULL,
        record_length INTEGER NOT NULL,
        quality TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_traces_identity
        ON continuous_traces(network, station, location, channel);
    CREATE INDEX IF NOT EXISTS idx_traces_file ON continuous_traces(file_id);

    CREATE TABLE IF NOT EXISTS mappings (
        id INTEGER PRIMARY KEY,
        src_network TEXT NOT NULL,
        src_station TEXT NOT NULL,
        src_location TEXT NOT NULL,
        src_channel TEXT NOT NULL,
        dst_network TEXT NOT NULL,
        dst_station TEXT NOT NULL,
        dst_location TEXT NOT NULL,
        dst_channel TEXT NOT NULL,
        start_time INTEGER NOT NULL,
        end_time INTEGER
    );

    CREATE TABLE IF NOT EXISTS restrictions (
        id INTEGER PRIMARY KEY,
        network TEXT NOT NULL,
        station TEXT NOT NULL,
        UNIQUE (network, station)
    );

    CREATE TABLE IF NOT EXISTS restriction_users (
        restriction_id INTEGER NOT NULL REFERENCES restrictions(id) ON DELETE CASCADE,
        username TEXT NOT NULL,
        PRIMARY KEY (restriction_id, username)
    );
";

/// A waveform file known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub id: i64,
    pub path: PathBuf,
    pub size: u64,
    pub segment_count: u64,
    pub indexed_at: Timestamp,
}

/// SQLite catalog of files, segments, mappings and restrictions
pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Create or open a catalog file
    pub fn open(path: impl AsRef<Path>) -> WaveformResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let catalog = Self {
            conn,
            path: Some(path),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Create a catalog that lives only in memory
    pub fn open_in_memory() -> WaveformResult<Self> {
        let catalog = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> WaveformResult<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Location of the catalog file, None when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ========================================================================
    // Files and segments
    // ========================================================================

    /// Store the segments of a file, replacing any previous scan of it.
    ///
    /// Returns the segments with their assigned ids.
    pub fn replace_file(
        &mut self,
        path: &Path,
        size: u64,
        indexed_at: Timestamp,
        segments: Vec<ContinuousSegment>,
    ) -> WaveformResult<Vec<ContinuousSegment>> {
        let path_text = path.to_string_lossy().to_string();
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM files WHERE path = ?", params![path_text])?;
        tx.execute(
            "INSERT INTO files (path, size, indexed_at) VALUES (?, ?, ?)",
            params![path_text, size as i64, indexed_at],
        )?;
        let file_id = tx.last_insert_rowid();

        let mut stored = Vec::with_capacity(segments.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO continuous_traces (
                    file_id, network, station, location, channel,
                    start_time, end_time, sampling_rate, sample_count,
                    byte_offset, byte_length, record_length, quality
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;

            for mut segment in segments {
                stmt.execute(params![
                    file_id,
                    segment.identity.network,
                    segment.identity.station,
                    segment.identity.location,
                    segment.identity.channel,
                    segment.start,
                    segment.end,
                    segment.sampling_rate,
                    segment.sample_count as i64,
                    segment.byte_range.offset as i64,
                    segment.byte_range.length as i64,
                    segment.record_length as i64,
                    segment.quality.map(|q| q.to_string()),
                ])?;
                segment.id = tx.last_insert_rowid();
                segment.path = path.to_path_buf();
                stored.push(segment);
            }
        }

        tx.commit()?;
        Ok(stored)
    }

    /// Forget a file and all its segments
    pub fn remove_file(&mut self, path: &Path) -> WaveformResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM files WHERE path = ?",
            params![path.to_string_lossy().to_string()],
        )?;
        Ok(removed > 0)
    }

    /// List indexed files with their segment counts
    pub fn files(&self) -> WaveformResult<Vec<IndexedFile>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT f.id, f.path, f.size, f.indexed_at, COUNT(t.id)
             FROM files f LEFT JOIN continuous_traces t ON t.file_id = f.id
             GROUP BY f.id
             ORDER BY f.path",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(IndexedFile {
                id: row.get(0)?,
                path: PathBuf::from(row.get::<_, String>(1)?),
                size: row.get::<_, i64>(2)? as u64,
                indexed_at: row.get(3)?,
                segment_count: row.get::<_, i64>(4)? as u64,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Load every segment, ordered by id
    pub fn segments(&self) -> WaveformResult<Vec<ContinuousSegment>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT t.id, t.network, t.station, t.location, t.channel,
                    t.start_time, t.end_time, t.sampling_rate, t.sample_count,
                    t.byte_offset, t.byte_length, t.record_length, t.quality, f.path
             FROM continuous_traces t JOIN files f ON f.id = t.file_id
             ORDER BY t.id",
        )?;

        let rows = stmt.query_map([], segment_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of stored segments
    pub fn segment_count(&self) -> WaveformResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM continuous_traces", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ========================================================================
    // Mappings
    // ========================================================================

    /// Load all mappings, ordered by id
    pub fn mappings(&self) -> WaveformResult<Vec<Mapping>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, src_network, src_station, src_location, src_channel,
                    dst_network, dst_station, dst_location, dst_channel,
                    start_time, end_time
             FROM mappings ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Mapping {
                id: row.get(0)?,
                source: ChannelIdentity::new(
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ),
                target: ChannelIdentity::new(
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ),
                start: row.get(9)?,
                end: row.get(10)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Store a mapping and return it with its id
    pub fn insert_mapping(&mut self, mapping: &Mapping) -> WaveformResult<Mapping> {
        self.conn.execute(
            "INSERT INTO mappings (
                src_network, src_station, src_location, src_channel,
                dst_network, dst_station, dst_location, dst_channel,
                start_time, end_time
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                mapping.source.network,
                mapping.source.station,
                mapping.source.location,
                mapping.source.channel,
                mapping.target.network,
                mapping.target.station,
                mapping.target.location,
                mapping.target.channel,
                mapping.start,
                mapping.end,
            ],
        )?;

        let mut stored = mapping.clone();
        stored.id = self.conn.last_insert_rowid();
        Ok(stored)
    }

    /// Delete a mapping by id
    pub fn delete_mapping(&mut self, id: i64) -> WaveformResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM mappings WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Restrictions
    // ========================================================================

    /// Load all restrictions with their users
    pub fn restrictions(&self) -> WaveformResult<Vec<Restriction>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT r.id, r.network, r.station, u.username
             FROM restrictions r LEFT JOIN restriction_users u ON u.restriction_id = r.id
             ORDER BY r.id, u.username",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut restrictions: Vec<Restriction> = Vec::new();
        for row in rows {
            let (id, network, station, username) = row?;
            if restrictions.last().map(|r| r.id) != Some(id) {
                let mut restriction = Restriction::new(network, station);
                restriction.id = id;
                restrictions.push(restriction);
            }
            if let (Some(user), Some(current)) = (username, restrictions.last_mut()) {
                current.users.insert(user);
            }
        }

        Ok(restrictions)
    }

    /// Restrict a station, adding users to any existing restriction
    pub fn upsert_restriction(
        &mut self,
        network: &str,
        station: &str,
        users: &BTreeSet<String>,
    ) -> WaveformResult<Restriction> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO restrictions (network, station) VALUES (?, ?)",
            params![network, station],
        )?;
        let id: i64 = tx.query_row(
            "SELECT id FROM restrictions WHERE network = ? AND station = ?",
            params![network, station],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO restriction_users (restriction_id, username) VALUES (?, ?)",
            )?;
            for user in users {
                stmt.execute(params![id, user])?;
            }
        }

        tx.commit()?;

        self.restriction(id)?
            .ok_or_else(|| WaveformError::NotFound(format!("restriction {}", id)))
    }

    /// Load one restriction by id
    pub fn restriction(&self, id: i64) -> WaveformResult<Option<Restriction>> {
        let found = self
            .conn
            .query_row(
                "SELECT network, station FROM restrictions WHERE id = ?",
                params![id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((network, station)) = found else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT username FROM restriction_users WHERE restriction_id = ? ORDER BY username",
        )?;
        let users = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(Restriction {
            id,
            network,
            station,
            users,
        }))
    }

    /// Delete a restriction and its users
    pub fn delete_restriction(&mut self, id: i64) -> WaveformResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM restrictions WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<ContinuousSegment> {
    Ok(ContinuousSegment {
        id: row.get(0)?,
        identity: ChannelIdentity::new(
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ),
        start: row.get(5)?,
        end: row.get(6)?,
        sampling_rate: row.get(7)?,
        sample_count: row.get::<_, i64>(8)? as u64,
        byte_range: ByteRange::new(row.get::<_, i64>(9)? as u64, row.get::<_, i64>(10)? as u64),
        record_length: row.get::<_, i64>(11)? as u32,
        quality: row
            .get::<_, Option<String>>(12)?
            .and_then(|q| q.chars().next()),
        path: PathBuf::from(row.get::<_, String>(13)?),
    })
}
