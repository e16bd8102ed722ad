//! Segment repository - the seam between the query engine and stored data
//!
//! The engine only needs two things from storage: the list of continuous
//! segments, and the bytes of a range inside one of them. Both are behind
//! `SegmentRepository` so alternative backends can be plugged in.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::waveform::catalog::Catalog;
use crate::waveform::error::{WaveformError, WaveformResult};
use crate::waveform::types::{ByteRange, ContinuousSegment};

/// Source of segments and their bytes.
///
/// Implementations are called from blocking threads.
pub trait SegmentRepository: Send + Sync {
    /// Every segment currently known
    fn all_segments(&self) -> WaveformResult<Vec<ContinuousSegment>>;

    /// Read `range` from the file backing `segment`.
    ///
    /// `range` must lie inside the segment's byte range.
    fn read_bytes(&self, segment: &ContinuousSegment, range: ByteRange) -> WaveformResult<Vec<u8>>;
}

/// Repository backed by the catalog and the local filesystem
pub struct CatalogRepository {
    catalog: Arc<Mutex<Catalog>>,
}

impl CatalogRepository {
    pub fn new(catalog: Arc<Mutex<Catalog>>) -> Self {
        Self { catalog }
    }
}

impl SegmentRepository for CatalogRepository {
    fn all_segments(&self) -> WaveformResult<Vec<ContinuousSegment>> {
        let catalog = self
            .catalog
            .lock()
            .map_err(|e| WaveformError::Lock(e.to_string()))?;
        catalog.segments()
    }

    fn read_bytes(&self, segment: &ContinuousSegment, range: ByteRange) -> WaveformResult<Vec<u8>> {
        check_bounds(segment, range)?;
        read_file_range(&segment.path, range)
    }
}

/// Reject ranges outside a segment's byte range
pub fn check_bounds(segment: &ContinuousSegment, range: ByteRange) -> WaveformResult<()> {
    if segment.byte_range.contains(&range) {
        Ok(())
    } else {
        Err(WaveformError::RangeOutOfBounds {
            segment_id: segment.id,
            offset: range.offset,
            length: range.length,
        })
    }
}

/// Read an exact byte range from a file
pub fn read_file_range(path: &Path, range: ByteRange) -> WaveformResult<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(range.offset))?;

    let mut buf = vec![0u8; range.length as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::types::ChannelIdentity;
    use tempfile::tempdir;

    fn segment(path: &Path) -> ContinuousSegment {
        ContinuousSegment {
            id: 7,
            identity: ChannelIdentity::new("XX", "TEST", "", "BHZ"),
            start: 0,
            end: 10,
            sampling_rate: 1.0,
            sample_count: 11,
            path: path.to_path_buf(),
            byte_range: ByteRange::new(4, 8),
            record_length: 0,
            quality: None,
        }
    }

    #[test]
    fn test_read_inside_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789abcdef").unwrap();

        let catalog = Arc::new(Mutex::new(Catalog::open_in_memory().unwrap()));
        let repository = CatalogRepository::new(catalog);
        let bytes = repository
            .read_bytes(&segment(&path), ByteRange::new(4, 8))
            .unwrap();
        assert_eq!(bytes, b"456789ab");
    }

    #[test]
    fn test_read_outside_segment_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789abcdef").unwrap();

        let catalog = Arc::new(Mutex::new(Catalog::open_in_memory().unwrap()));
        let repository = CatalogRepository::new(catalog);
        let err = repository
            .read_bytes(&segment(&path), ByteRange::new(0, 8))
            .unwrap_err();
        assert!(matches!(err, WaveformError::RangeOutOfBounds { segment_id: 7, .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.bin");

        let catalog = Arc::new(Mutex::new(Catalog::open_in_memory().unwrap()));
        let repository = CatalogRepository::new(catalog);
        let err = repository
            .read_bytes(&segment(&path), ByteRange::new(4, 8))
            .unwrap_err();
        assert!(matches!(err, WaveformError::Io(_)));
    }
}
