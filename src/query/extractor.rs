//! Segment Extractor
//!
//! Streams the bytes of planned segments lazily. Record-structured segments
//! are read one record at a time and only records whose samples intersect
//! the planned interval are yielded. The first intersecting record is found
//! by binary search over record headers, and reading a segment stops at the
//! first record that starts after the interval. Opaque segments are yielded
//! whole.
//!
//! Reads run on the blocking thread pool. Dropping the stream stops all
//! further reads.

use futures_util::stream::{self, Stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use crate::query::planner::PlannedSegment;
use crate::waveform::mseed::{rewrite_identity, RecordHeader, HEADER_PROBE_SIZE};
use crate::waveform::{
    ByteRange, ChannelIdentity, SegmentRepository, Timestamp, WaveformError, WaveformResult,
};

/// A piece of waveform data ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct TraceChunk {
    /// Identity the data is served under
    pub identity: ChannelIdentity,
    /// Segment the bytes were read from
    pub segment_id: i64,
    /// First sample time covered by the bytes
    pub start: Timestamp,
    /// Last sample time covered by the bytes
    pub end: Timestamp,
    pub data: Vec<u8>,
}

/// Boxed stream of chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = WaveformResult<TraceChunk>> + Send>>;

/// Reads planned segments from a repository.
///
/// Output is record-granular: a record is never split. When a mapping
/// boundary falls inside a record, that record is served whole under the
/// identity of every planned piece it intersects, so samples near the
/// boundary can appear under both the stored and the mapped identity.
#[derive(Clone)]
pub struct SegmentExtractor {
    repository: Arc<dyn SegmentRepository>,
}

struct Cursor {
    planned: PlannedSegment,
    offset: u64,
}

struct ExtractState {
    repository: Arc<dyn SegmentRepository>,
    pending: VecDeque<PlannedSegment>,
    current: Option<Cursor>,
    failed: bool,
}

impl SegmentExtractor {
    pub fn new(repository: Arc<dyn SegmentRepository>) -> Self {
        Self { repository }
    }

    /// Lazily extract the planned segments in order
    pub fn extract(&self, planned: Vec<PlannedSegment>) -> ChunkStream {
        let state = ExtractState {
            repository: Arc::clone(&self.repository),
            pending: planned.into(),
            current: None,
            failed: false,
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            if state.failed {
                return None;
            }
            match next_chunk(&mut state).await {
                Ok(Some(chunk)) => Some((Ok(chunk), state)),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("Extraction aborted: {}", e);
                    state.failed = true;
                    Some((Err(e), state))
                }
            }
        }))
    }
}

async fn next_chunk(state: &mut ExtractState) -> WaveformResult<Option<TraceChunk>> {
    loop {
        let mut cursor = match state.current.take() {
            Some(cursor) => cursor,
            None => match state.pending.pop_front() {
                Some(planned) => Cursor {
                    offset: first_record_offset(&state.repository, &planned).await?,
                    planned,
                },
                None => return Ok(None),
            },
        };

        let segment = Arc::clone(&cursor.planned.segment);

        if !segment.is_record_structured() {
            let data = read(&state.repository, &cursor.planned, segment.byte_range).await?;
            return Ok(Some(chunk(&cursor.planned, data, segment.start, segment.end)));
        }

        let segment_end = segment.byte_range.end();
        if cursor.offset >= segment_end {
            continue;
        }

        let length = (segment.record_length as u64).min(segment_end - cursor.offset);
        let range = ByteRange::new(cursor.offset, length);
        let mut record = read(&state.repository, &cursor.planned, range).await?;
        cursor.offset += length;

        let probe = record.len().min(HEADER_PROBE_SIZE);
        let header = RecordHeader::parse(&record[..probe])?;

        // Records are in time order within a segment
        if header.start > cursor.planned.end {
            continue;
        }

        if header.end() < cursor.planned.start {
            state.current = Some(cursor);
            continue;
        }

        if cursor.planned.is_remapped() {
            rewrite_identity(&mut record, &cursor.planned.identity)?;
        }

        let item = chunk(&cursor.planned, record, header.start, header.end());
        state.current = Some(cursor);
        return Ok(Some(item));
    }
}

/// Offset of the first record whose last sample is at or after the planned
/// start. Probes only record headers.
async fn first_record_offset(
    repository: &Arc<dyn SegmentRepository>,
    planned: &PlannedSegment,
) -> WaveformResult<u64> {
    let segment = &planned.segment;
    let base = segment.byte_range.offset;
    if !segment.is_record_structured() || planned.start <= segment.start {
        return Ok(base);
    }

    let record_length = segment.record_length as u64;
    let segment_end = segment.byte_range.end();
    let (mut lo, mut hi) = (0u64, segment.byte_range.length.div_ceil(record_length));

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = base + mid * record_length;
        let length = (HEADER_PROBE_SIZE as u64).min(segment_end - offset);
        let probe = read(repository, planned, ByteRange::new(offset, length)).await?;
        let header = RecordHeader::parse(&probe)?;

        if header.end() < planned.start {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    Ok(base + lo * record_length)
}

async fn read(
    repository: &Arc<dyn SegmentRepository>,
    planned: &PlannedSegment,
    range: ByteRange,
) -> WaveformResult<Vec<u8>> {
    let repository = Arc::clone(repository);
    let segment = Arc::clone(&planned.segment);
    tokio::task::spawn_blocking(move || repository.read_bytes(&segment, range))
        .await
        .map_err(WaveformError::from)?
}

fn chunk(planned: &PlannedSegment, data: Vec<u8>, start: Timestamp, end: Timestamp) -> TraceChunk {
    TraceChunk {
        identity: planned.identity.clone(),
        segment_id: planned.segment.id,
        start,
        end,
        data,
    }
}
