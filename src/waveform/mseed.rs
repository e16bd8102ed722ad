//! miniSEED record headers and file scanning
//!
//! Only the parts of miniSEED 2 needed for indexing and extraction are
//! handled here. Sample payloads are never decoded.
//!
//! Record layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ FIXED HEADER (48 bytes)                 │
//! │   sequence: [u8; 6] ASCII               │
//! │   quality: u8 (D, R, Q, M)              │
//! │   reserved: u8                          │
//! │   station: [u8; 5]                      │
//! │   location: [u8; 2]                     │
//! │   channel: [u8; 3]                      │
//! │   network: [u8; 2]                      │
//! │   start: BTIME (10 bytes)               │
//! │   sample_count: u16                     │
//! │   rate_factor: i16                      │
//! │   rate_multiplier: i16                  │
//! │   activity/io/quality flags: 3 x u8     │
//! │   blockette_count: u8                   │
//! │   time_correction: i32 (0.0001 s)       │
//! │   data_offset: u16                      │
//! │   first_blockette: u16                  │
//! ├─────────────────────────────────────────┤
//! │ BLOCKETTES (1000: record length,        │
//! │             1001: microsecond offset)   │
//! ├─────────────────────────────────────────┤
//! │ DATA (opaque)                           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Byte order is detected from the BTIME year.

use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::waveform::error::{WaveformError, WaveformResult};
use crate::waveform::types::{
    to_datetime, ByteRange, ChannelIdentity, ContinuousSegment, Timestamp, MICROS_PER_SECOND,
};

/// Size of the fixed section of the data header
pub const FIXED_HEADER_SIZE: usize = 48;

/// Bytes read from the start of a record to find its blockettes
pub const HEADER_PROBE_SIZE: usize = 256;

/// Size of headers produced by `RecordHeader::to_bytes`
pub const WRITTEN_HEADER_SIZE: usize = 64;

const BLOCKETTE_DATA_ONLY: u16 = 1000;
const BLOCKETTE_DATA_EXTENSION: u16 = 1001;
const MAX_BLOCKETTES: usize = 16;

/// Activity flag bit: time correction already applied to start time
const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// Parsed miniSEED record header
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub sequence_number: u32,
    pub quality: char,
    pub identity: ChannelIdentity,
    /// Time of the first sample
    pub start: Timestamp,
    pub sample_count: u32,
    pub sampling_rate: f64,
    /// Record length from blockette 1000, 0 when absent
    pub record_length: u32,
    /// Encoding format from blockette 1000
    pub encoding: Option<u8>,
    pub big_endian: bool,
}

impl RecordHeader {
    /// Create a header for writing records
    pub fn new(identity: ChannelIdentity, start: Timestamp, sample_count: u32, sampling_rate: f64) -> Self {
        Self {
            sequence_number: 1,
            quality: 'D',
            identity,
            start,
            sample_count,
            sampling_rate,
            record_length: 512,
            encoding: Some(3),
            big_endian: true,
        }
    }

    /// Builder: set the record length (must be a power of two)
    pub fn with_record_length(mut self, record_length: u32) -> Self {
        self.record_length = record_length;
        self
    }

    /// Builder: set the quality indicator
    pub fn with_quality(mut self, quality: char) -> Self {
        self.quality = quality;
        self
    }

    /// Time of the last sample (inclusive)
    pub fn end(&self) -> Timestamp {
        if self.sample_count <= 1 || self.sampling_rate <= 0.0 {
            return self.start;
        }
        let span = (self.sample_count - 1) as f64 * MICROS_PER_SECOND as f64 / self.sampling_rate;
        self.start + span.round() as Timestamp
    }

    /// Parse a header from the start of a record.
    ///
    /// `buf` must hold at least the fixed header; blockettes outside `buf`
    /// are ignored.
    pub fn parse(buf: &[u8]) -> WaveformResult<Self> {
        if buf.len() < FIXED_HEADER_SIZE {
            return Err(WaveformError::InvalidRecord(format!(
                "record header needs {} bytes, got {}",
                FIXED_HEADER_SIZE,
                buf.len()
            )));
        }

        let quality = buf[6] as char;
        if !matches!(quality, 'D' | 'R' | 'Q' | 'M') {
            return Err(WaveformError::InvalidRecord(format!(
                "unknown data quality indicator {:?}",
                quality
            )));
        }

        let big_endian = detect_byte_order(buf)?;
        let reader = FieldReader { buf, big_endian };

        let sequence_number = ascii_field(&buf[0..6]).parse().unwrap_or(0);
        let identity = ChannelIdentity::new(
            ascii_field(&buf[18..20]),
            ascii_field(&buf[8..13]),
            ascii_field(&buf[13..15]),
            ascii_field(&buf[15..18]),
        );

        let year = reader.u16(20);
        let day_of_year = reader.u16(22);
        let mut start = btime_to_timestamp(
            year,
            day_of_year,
            buf[24],
            buf[25],
            buf[26],
            reader.u16(28),
        )?;

        let sample_count = reader.u16(30) as u32;
        let sampling_rate = sample_rate(reader.i16(32), reader.i16(34));

        let activity_flags = buf[36];
        let time_correction = reader.i32(40);
        if activity_flags & TIME_CORRECTION_APPLIED == 0 {
            start += time_correction as Timestamp * 100;
        }

        let mut record_length = 0;
        let mut encoding = None;
        let mut next = reader.u16(46) as usize;
        let mut visited = 0;

        while next != 0 && next + 4 <= buf.len() && visited < MAX_BLOCKETTES {
            let blockette_type = reader.u16(next);
            let following = reader.u16(next + 2) as usize;

            match blockette_type {
                BLOCKETTE_DATA_ONLY if next + 7 <= buf.len() => {
                    encoding = Some(buf[next + 4]);
                    let exponent = buf[next + 6];
                    if !(7..=20).contains(&exponent) {
                        return Err(WaveformError::InvalidRecord(format!(
                            "record length exponent {} out of range",
                            exponent
                        )));
                    }
                    record_length = 1u32 << exponent;
                }
                BLOCKETTE_DATA_EXTENSION if next + 6 <= buf.len() => {
                    start += buf[next + 5] as i8 as Timestamp;
                }
                _ => {}
            }

            // Chains must move forward
            if following != 0 && following <= next {
                break;
            }
            next = following;
            visited += 1;
        }

        Ok(Self {
            sequence_number,
            quality,
            identity,
            start,
            sample_count,
            sampling_rate,
            record_length,
            encoding,
            big_endian,
        })
    }

    /// Serialize to a big-endian header with blockettes 1000 and 1001
    pub fn to_bytes(&self) -> WaveformResult<[u8; WRITTEN_HEADER_SIZE]> {
        let mut buf = [b' '; WRITTEN_HEADER_SIZE];

        let sequence = format!("{:06}", self.sequence_number % 1_000_000);
        buf[0..6].copy_from_slice(sequence.as_bytes());
        buf[6] = self.quality as u8;
        write_identity(&mut buf, &self.identity)?;

        let dt = to_datetime(self.start).ok_or_else(|| {
            WaveformError::InvalidRecord(format!("start time {} out of range", self.start))
        })?;
        let micros = dt.timestamp_subsec_micros();
        buf[20..22].copy_from_slice(&(dt.year() as u16).to_be_bytes());
        buf[22..24].copy_from_slice(&(dt.ordinal() as u16).to_be_bytes());
        buf[24] = dt.hour() as u8;
        buf[25] = dt.minute() as u8;
        buf[26] = dt.second() as u8;
        buf[27] = 0;
        buf[28..30].copy_from_slice(&((micros / 100) as u16).to_be_bytes());

        let sample_count = u16::try_from(self.sample_count).map_err(|_| {
            WaveformError::InvalidRecord(format!("{} samples do not fit a record", self.sample_count))
        })?;
        buf[30..32].copy_from_slice(&sample_count.to_be_bytes());

        let (factor, multiplier) = rate_factors(self.sampling_rate);
        buf[32..34].copy_from_slice(&factor.to_be_bytes());
        buf[34..36].copy_from_slice(&multiplier.to_be_bytes());

        buf[36] = 0;
        buf[37] = 0;
        buf[38] = 0;
        buf[39] = 2;
        buf[40..44].copy_from_slice(&0i32.to_be_bytes());
        buf[44..46].copy_from_slice(&(WRITTEN_HEADER_SIZE as u16).to_be_bytes());
        buf[46..48].copy_from_slice(&(FIXED_HEADER_SIZE as u16).to_be_bytes());

        if !self.record_length.is_power_of_two() || self.record_length < WRITTEN_HEADER_SIZE as u32 {
            return Err(WaveformError::InvalidRecord(format!(
                "record length {} is not a supported power of two",
                self.record_length
            )));
        }

        // Blockette 1000
        buf[48..50].copy_from_slice(&BLOCKETTE_DATA_ONLY.to_be_bytes());
        buf[50..52].copy_from_slice(&56u16.to_be_bytes());
        buf[52] = self.encoding.unwrap_or(3);
        buf[53] = 1;
        buf[54] = self.record_length.trailing_zeros() as u8;
        buf[55] = 0;

        // Blockette 1001
        buf[56..58].copy_from_slice(&BLOCKETTE_DATA_EXTENSION.to_be_bytes());
        buf[58..60].copy_from_slice(&0u16.to_be_bytes());
        buf[60] = 0;
        buf[61] = (micros % 100) as i8 as u8;
        buf[62] = 0;
        buf[63] = 0;

        Ok(buf)
    }

    /// Serialize a complete record: header followed by a zeroed payload
    pub fn to_record(&self) -> WaveformResult<Vec<u8>> {
        let header = self.to_bytes()?;
        let mut record = vec![0u8; self.record_length as usize];
        record[..WRITTEN_HEADER_SIZE].copy_from_slice(&header);
        Ok(record)
    }
}

/// Overwrite the NSLC codes in a record's fixed header
pub fn rewrite_identity(record: &mut [u8], identity: &ChannelIdentity) -> WaveformResult<()> {
    if record.len() < FIXED_HEADER_SIZE {
        return Err(WaveformError::InvalidRecord(
            "record too short to rewrite identity".into(),
        ));
    }
    write_identity(record, identity)
}

fn write_identity(buf: &mut [u8], identity: &ChannelIdentity) -> WaveformResult<()> {
    identity.validate()?;
    write_padded(&mut buf[8..13], &identity.station);
    write_padded(&mut buf[13..15], &identity.location);
    write_padded(&mut buf[15..18], &identity.channel);
    write_padded(&mut buf[18..20], &identity.network);
    Ok(())
}

fn write_padded(field: &mut [u8], value: &str) {
    field.fill(b' ');
    field[..value.len()].copy_from_slice(value.as_bytes());
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn detect_byte_order(buf: &[u8]) -> WaveformResult<bool> {
    let plausible = |year: u16| (1900..=2100).contains(&year);

    if plausible(u16::from_be_bytes([buf[20], buf[21]])) {
        Ok(true)
    } else if plausible(u16::from_le_bytes([buf[20], buf[21]])) {
        Ok(false)
    } else {
        Err(WaveformError::InvalidRecord(
            "cannot determine byte order from start year".into(),
        ))
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    big_endian: bool,
}

impl FieldReader<'_> {
    fn u16(&self, at: usize) -> u16 {
        let bytes = [self.buf[at], self.buf[at + 1]];
        if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    }

    fn i16(&self, at: usize) -> i16 {
        self.u16(at) as i16
    }

    fn i32(&self, at: usize) -> i32 {
        let bytes = [self.buf[at], self.buf[at + 1], self.buf[at + 2], self.buf[at + 3]];
        if self.big_endian {
            i32::from_be_bytes(bytes)
        } else {
            i32::from_le_bytes(bytes)
        }
    }
}

fn btime_to_timestamp(
    year: u16,
    day_of_year: u16,
    hour: u8,
    minute: u8,
    second: u8,
    ten_thousandths: u16,
) -> WaveformResult<Timestamp> {
    let date = NaiveDate::from_yo_opt(year as i32, day_of_year as u32).ok_or_else(|| {
        WaveformError::InvalidRecord(format!("invalid date {}-{:03}", year, day_of_year))
    })?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| WaveformError::InvalidRecord("invalid start time".into()))?;

    if hour > 23 || minute > 59 || second > 60 || ten_thousandths > 9999 {
        return Err(WaveformError::InvalidRecord(format!(
            "invalid time {:02}:{:02}:{:02}.{:04}",
            hour, minute, second, ten_thousandths
        )));
    }

    // Leap seconds (second == 60) roll over into the next minute
    let seconds = hour as i64 * 3600 + minute as i64 * 60 + second as i64;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_micros()
        + seconds * MICROS_PER_SECOND
        + ten_thousandths as i64 * 100)
}

/// Nominal sampling rate from the header factor and multiplier
pub fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let (f, m) = (factor as f64, multiplier as f64);
    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (f_, m_) if f_ > 0 && m_ > 0 => f * m,
        (f_, _) if f_ > 0 => -f / m,
        (_, m_) if m_ > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

fn rate_factors(rate: f64) -> (i16, i16) {
    if rate <= 0.0 {
        return (0, 0);
    }
    if rate >= 1.0 && rate.fract() == 0.0 && rate <= i16::MAX as f64 {
        return (rate as i16, 1);
    }
    let period = 1.0 / rate;
    if rate < 1.0 && period.fract() == 0.0 && period <= i16::MAX as f64 {
        return (-(period as i16), 1);
    }
    ((rate * 100.0).round() as i16, -100)
}

/// Nominal spacing between samples
pub fn sample_interval(rate: f64) -> Option<Timestamp> {
    if rate > 0.0 {
        Some((MICROS_PER_SECOND as f64 / rate).round() as Timestamp)
    } else {
        None
    }
}

/// Accumulates consecutive records into one continuous segment
struct SegmentBuilder {
    segment: ContinuousSegment,
}

impl SegmentBuilder {
    fn start(header: &RecordHeader, path: &Path, offset: u64, record_length: u32) -> Self {
        Self {
            segment: ContinuousSegment {
                id: 0,
                identity: header.identity.clone(),
                start: header.start,
                end: header.end(),
                sampling_rate: header.sampling_rate,
                sample_count: header.sample_count as u64,
                path: path.to_path_buf(),
                byte_range: ByteRange::new(offset, record_length as u64),
                record_length,
                quality: Some(header.quality),
            },
        }
    }

    /// Check if a record continues this segment without a gap or overlap
    fn continues_with(&self, header: &RecordHeader, offset: u64, record_length: u32) -> bool {
        let segment = &self.segment;
        if header.identity != segment.identity
            || header.sampling_rate != segment.sampling_rate
            || record_length != segment.record_length
            || Some(header.quality) != segment.quality
            || offset != segment.byte_range.end()
        {
            return false;
        }

        match sample_interval(segment.sampling_rate) {
            Some(interval) => {
                let expected = segment.end + interval;
                (header.start - expected).abs() <= interval / 2
            }
            None => false,
        }
    }

    fn extend(&mut self, header: &RecordHeader, record_length: u32) {
        self.segment.end = header.end();
        self.segment.sample_count += header.sample_count as u64;
        self.segment.byte_range.length += record_length as u64;
    }
}

/// Scan a miniSEED file into continuous segments.
///
/// Consecutive records of the same channel, rate, quality and record length
/// whose start follows the previous record's last sample by one interval
/// (within half a sample) are merged. Records without blockette 1000 use
/// `default_record_length`.
pub fn scan_file(path: impl AsRef<Path>, default_record_length: u32) -> WaveformResult<Vec<ContinuousSegment>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut segments = Vec::new();
    let mut current: Option<SegmentBuilder> = None;
    let mut offset = 0u64;
    let mut probe = vec![0u8; HEADER_PROBE_SIZE];

    while offset < file_len {
        let available = (file_len - offset).min(HEADER_PROBE_SIZE as u64) as usize;
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut probe[..available])?;

        let header = RecordHeader::parse(&probe[..available]).map_err(|e| {
            WaveformError::InvalidRecord(format!("{} at offset {}: {}", path.display(), offset, e))
        })?;

        let record_length = if header.record_length > 0 {
            header.record_length
        } else {
            default_record_length
        };
        if record_length == 0 || offset + record_length as u64 > file_len {
            return Err(WaveformError::InvalidRecord(format!(
                "{}: truncated record at offset {}",
                path.display(),
                offset
            )));
        }

        match current.as_mut() {
            Some(builder) if builder.continues_with(&header, offset, record_length) => {
                builder.extend(&header, record_length);
            }
            _ => {
                if let Some(done) = current.take() {
                    segments.push(done.segment);
                }
                current = Some(SegmentBuilder::start(&header, path, offset, record_length));
            }
        }

        offset += record_length as u64;
    }

    if let Some(done) = current {
        segments.push(done.segment);
    }

    Ok(segments)
}
