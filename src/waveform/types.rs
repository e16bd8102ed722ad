//! Core data types for the seisvault waveform engine
//!
//! This module defines the fundamental types used throughout the waveform layer:
//! - `ChannelIdentity`: The four-part NSLC identifier of a seismic channel
//! - `ContinuousSegment`: One indexed, contiguous run of samples in a file
//! - `Mapping`: A time-bounded rename of a channel identity
//! - `Restriction`: Access control for a network/station pair
//! - `TimeWindow`: A closed time interval for queries
//!
//! All timestamps are microseconds since the Unix epoch (UTC).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::waveform::error::{WaveformError, WaveformResult};

/// Microseconds since the Unix epoch (UTC)
pub type Timestamp = i64;

/// Microseconds per second
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Maximum lengths of the NSLC components (FDSN convention)
pub const MAX_NETWORK_LEN: usize = 2;
pub const MAX_STATION_LEN: usize = 5;
pub const MAX_LOCATION_LEN: usize = 2;
pub const MAX_CHANNEL_LEN: usize = 3;

/// Parse an FDSN time string into a timestamp.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DDTHH:MM:SS.ffffff`, each with an optional trailing `Z`.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);

    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive).timestamp_micros());
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).timestamp_micros())
}

/// Convert a timestamp to a UTC datetime
pub fn to_datetime(timestamp: Timestamp) -> Option<DateTime<Utc>> {
    let secs = timestamp.div_euclid(MICROS_PER_SECOND);
    let nanos = (timestamp.rem_euclid(MICROS_PER_SECOND) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Format a timestamp as an FDSN time string with microsecond precision
pub fn format_timestamp(timestamp: Timestamp) -> String {
    match to_datetime(timestamp) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        None => timestamp.to_string(),
    }
}

/// Convert fractional seconds to a timestamp offset
pub fn seconds(secs: f64) -> Timestamp {
    (secs * MICROS_PER_SECOND as f64).round() as Timestamp
}

/// Network, station, location and channel codes of one seismic channel.
///
/// Equality is exact-string; ordering is lexicographic over
/// (network, station, location, channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelIdentity {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl ChannelIdentity {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }

    /// Check the FDSN length limits of every component
    pub fn validate(&self) -> WaveformResult<()> {
        let limits = [
            ("network", &self.network, MAX_NETWORK_LEN),
            ("station", &self.station, MAX_STATION_LEN),
            ("location", &self.location, MAX_LOCATION_LEN),
            ("channel", &self.channel, MAX_CHANNEL_LEN),
        ];

        for (field, value, max) in limits {
            if value.len() > max {
                return Err(WaveformError::InvalidIdentity(format!(
                    "{} code '{}' is longer than {} characters",
                    field, value, max
                )));
            }
            if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(WaveformError::InvalidIdentity(format!(
                    "{} code '{}' contains invalid characters",
                    field, value
                )));
            }
        }

        Ok(())
    }

    /// Whether two identities belong to the same physical station
    pub fn same_station(&self, other: &ChannelIdentity) -> bool {
        self.network == other.network && self.station == other.station
    }
}

impl std::fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl std::str::FromStr for ChannelIdentity {
    type Err = WaveformError;

    /// Parse `NET.STA.LOC.CHA` (location may be empty)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(WaveformError::InvalidIdentity(format!(
                "expected NET.STA.LOC.CHA, got '{}'",
                s
            )));
        }

        let identity = ChannelIdentity::new(parts[0], parts[1], parts[2], parts[3]);
        identity.validate()?;
        Ok(identity)
    }
}

/// Byte range inside a backing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// First offset past the range
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Check if another range lies completely inside this one
    pub fn contains(&self, other: &ByteRange) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }
}

/// One indexed, contiguous run of samples for a channel.
///
/// `start` and `end` are the times of the first and last sample, both
/// inclusive. Segments of one identity may overlap or leave gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSegment {
    /// Catalog row id (0 until stored)
    pub id: i64,
    /// Channel identity as stored in the file
    pub identity: ChannelIdentity,
    /// Time of the first sample (inclusive)
    pub start: Timestamp,
    /// Time of the last sample (inclusive)
    pub end: Timestamp,
    /// Samples per second
    pub sampling_rate: f64,
    /// Total number of samples
    pub sample_count: u64,
    /// Backing file
    pub path: PathBuf,
    /// Location of the segment's records in the file
    pub byte_range: ByteRange,
    /// Length of each record in bytes; 0 marks an opaque block
    pub record_length: u32,
    /// Data quality indicator (D, R, Q, M)
    pub quality: Option<char>,
}

impl ContinuousSegment {
    /// Check if the closed interval [start, end] intersects this segment
    pub fn overlaps(&self, start: Timestamp, end: Timestamp) -> bool {
        self.start <= end && self.end >= start
    }

    /// Duration between the first and last sample
    pub fn duration_micros(&self) -> i64 {
        self.end - self.start
    }

    /// Whether the byte range is split into fixed-size records
    pub fn is_record_structured(&self) -> bool {
        self.record_length > 0
    }
}

/// Closed time window [start, end] used by queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    /// Create a window, returning None unless start < end
    pub fn try_new(start: Timestamp, end: Timestamp) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Check if a closed interval intersects this window
    pub fn intersects(&self, start: Timestamp, end: Timestamp) -> bool {
        start <= self.end && end >= self.start
    }

    /// Clip a closed interval to this window
    pub fn clip(&self, start: Timestamp, end: Timestamp) -> Option<(Timestamp, Timestamp)> {
        if !self.intersects(start, end) {
            return None;
        }
        Some((start.max(self.start), end.min(self.end)))
    }
}

/// Renames a source identity to a target identity over [start, end).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Catalog row id (0 until stored)
    pub id: i64,
    pub source: ChannelIdentity,
    pub target: ChannelIdentity,
    /// Start of validity (inclusive)
    pub start: Timestamp,
    /// End of validity (exclusive); None means open-ended
    pub end: Option<Timestamp>,
}

impl Mapping {
    pub fn new(
        source: ChannelIdentity,
        target: ChannelIdentity,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> Self {
        Self {
            id: 0,
            source,
            target,
            start,
            end,
        }
    }

    /// Check if the mapping is in effect at an instant
    pub fn is_active_at(&self, at: Timestamp) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }

    /// Exclusive end as a plain timestamp
    pub fn end_or_max(&self) -> Timestamp {
        self.end.unwrap_or(Timestamp::MAX)
    }

    /// Check if two validity ranges share at least one instant.
    ///
    /// Adjacent ranges (one ends exactly where the other starts) do not overlap.
    pub fn overlaps(&self, other: &Mapping) -> bool {
        self.start < other.end_or_max() && other.start < self.end_or_max()
    }

    /// Validate identities and the validity range
    pub fn validate(&self) -> WaveformResult<()> {
        self.source.validate()?;
        self.target.validate()?;

        if let Some(end) = self.end {
            if end <= self.start {
                return Err(WaveformError::InvalidMapping(format!(
                    "mapping for {} ends before it starts",
                    self.source
                )));
            }
        }

        Ok(())
    }
}

/// Limits access to a network/station pair to a set of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    /// Catalog row id (0 until stored)
    pub id: i64,
    pub network: String,
    pub station: String,
    pub users: BTreeSet<String>,
}

impl Restriction {
    pub fn new(network: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            id: 0,
            network: network.into(),
            station: station.into(),
            users: BTreeSet::new(),
        }
    }

    /// Builder: authorize a user
    pub fn user(mut self, username: impl Into<String>) -> Self {
        self.users.insert(username.into());
        self
    }

    /// Check if a requester may see the restricted station
    pub fn permits(&self, requester: Option<&str>) -> bool {
        requester.map_or(false, |user| self.users.contains(user))
    }
}
