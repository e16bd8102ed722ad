//! Query Planner
//!
//! Turns a validated query into the ordered list of segment pieces to send:
//!
//! 1. Pick the effective identities (after mappings) matching the selectors
//! 2. Find effective spans of those identities intersecting the window
//! 3. Drop spans whose original station the requester may not see
//! 4. Clip to the window and order by (identity, start, end, segment id)
//!
//! An empty result is `PlanOutcome::NoData`, not an error.

use std::collections::HashSet;
use std::sync::Arc;

use crate::index::Snapshot;
use crate::query::error::QueryResult;
use crate::query::request::{CompiledQuery, Query};
use crate::waveform::{ChannelIdentity, ContinuousSegment, Timestamp};

/// One piece of a segment selected by a query
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSegment {
    /// Identity the piece is served under
    pub identity: ChannelIdentity,
    /// Stored segment the piece comes from
    pub segment: Arc<ContinuousSegment>,
    /// Window-clipped start (inclusive)
    pub start: Timestamp,
    /// Window-clipped end (inclusive)
    pub end: Timestamp,
}

impl PlannedSegment {
    /// Whether the piece is served under a mapped identity
    pub fn is_remapped(&self) -> bool {
        self.identity != self.segment.identity
    }
}

/// Result of planning a query
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Data(Vec<PlannedSegment>),
    NoData,
}

impl PlanOutcome {
    pub fn is_no_data(&self) -> bool {
        matches!(self, PlanOutcome::NoData)
    }

    /// Planned pieces, empty for NoData
    pub fn segments(&self) -> &[PlannedSegment] {
        match self {
            PlanOutcome::Data(segments) => segments,
            PlanOutcome::NoData => &[],
        }
    }
}

/// Plans queries against one snapshot
pub struct QueryPlanner {
    snapshot: Arc<Snapshot>,
}

impl QueryPlanner {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Validate and plan a query
    pub fn plan(&self, query: &Query) -> QueryResult<PlanOutcome> {
        let compiled = query.validate()?;
        Ok(self.plan_compiled(&compiled))
    }

    /// Plan an already validated query
    pub fn plan_compiled(&self, query: &CompiledQuery) -> PlanOutcome {
        let snapshot = &self.snapshot;

        let matched: HashSet<&ChannelIdentity> = snapshot
            .cache()
            .identities()
            .iter()
            .filter(|identity| query.matches(identity))
            .collect();

        if matched.is_empty() {
            tracing::debug!("No identities match the selectors");
            return PlanOutcome::NoData;
        }

        let requester = query.requester.as_deref();
        let window = query.window;

        let hits = snapshot.find_overlapping(
            |entry| {
                let (Some(span), Some(segment)) = (snapshot.span(entry), snapshot.segment(entry.segment)) else {
                    return false;
                };
                // Restrictions follow the recording station, not the served name
                matched.contains(&span.identity)
                    && snapshot.restrictions().is_authorized(
                        &segment.identity.network,
                        &segment.identity.station,
                        requester,
                    )
            },
            window.start,
            window.end,
        );

        let mut planned: Vec<PlannedSegment> = hits
            .into_iter()
            .filter_map(|entry| {
                let span = snapshot.span(entry)?;
                let segment = snapshot.segment(entry.segment)?;
                let (start, end) = window.clip(span.start, span.end)?;
                Some(PlannedSegment {
                    identity: span.identity.clone(),
                    segment: Arc::clone(segment),
                    start,
                    end,
                })
            })
            .collect();

        planned.sort_by(|a, b| {
            a.identity
                .cmp(&b.identity)
                .then(a.start.cmp(&b.start))
                .then(a.end.cmp(&b.end))
                .then(a.segment.id.cmp(&b.segment.id))
        });

        tracing::debug!(
            identities = matched.len(),
            segments = planned.len(),
            generation = snapshot.generation(),
            "Planned query"
        );

        if planned.is_empty() {
            PlanOutcome::NoData
        } else {
            PlanOutcome::Data(planned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::error::QueryError;
    use crate::waveform::{seconds, ByteRange, Mapping, Restriction, MICROS_PER_SECOND};
    use std::path::PathBuf;

    fn segment(id: i64, identity: &str, start: f64, samples: u64) -> ContinuousSegment {
        let start = seconds(start);
        ContinuousSegment {
            id,
            identity: identity.parse().unwrap(),
            start,
            end: start + (samples as i64 - 1) * MICROS_PER_SECOND,
            sampling_rate: 1.0,
            sample_count: samples,
            path: PathBuf::from("/tmp/data.mseed"),
            byte_range: ByteRange::new(0, 512),
            record_length: 512,
            quality: Some('D'),
        }
    }

    /// Seven 1 Hz traces starting at 0, 5, 10, -5, 2, 0 and 1 s
    fn seven_traces() -> Vec<ContinuousSegment> {
        [(0.0, 10), (5.0, 10), (10.0, 10), (-5.0, 10), (2.0, 8), (0.0, 12), (1.0, 10)]
            .iter()
            .enumerate()
            .map(|(i, &(start, n))| segment(i as i64 + 1, "XX.YY..EHZ", start, n))
            .collect()
    }

    fn planner(segments: Vec<ContinuousSegment>, mappings: Vec<Mapping>, restrictions: Vec<Restriction>) -> QueryPlanner {
        QueryPlanner::new(Arc::new(Snapshot::build(1, segments, mappings, restrictions).unwrap()))
    }

    fn count(planner: &QueryPlanner, start: f64, end: f64) -> usize {
        let query = Query::new(seconds(start), seconds(end))
            .network("XX")
            .station("YY")
            .location("")
            .channel("EHZ");
        planner.plan(&query).unwrap().segments().len()
    }

    #[test]
    fn test_overlapping_traces_windows() {
        let planner = planner(seven_traces(), vec![], vec![]);

        let cases = [
            (1.0, 10.0, 7),
            (1.0, 9.0, 6),
            (-10.0, 0.0, 3),
            (-10.0, -1.0, 1),
            (-10.0, -4.0, 1),
            (-10.0, -5.0, 1),
            (-10.0, -5.5, 0),
            (10.0, 15.0, 4),
            (4.0, 5.0, 6),
            (-6.0, -5.0, 1),
            (-6.0, -1.0, 1),
            (-6.0, 0.0, 3),
            (11.0, 15.0, 3),
            (12.0, 15.0, 2),
            (14.0, 17.0, 2),
            (15.0, 17.0, 1),
            (18.0, 20.0, 1),
            (19.0, 20.0, 1),
            (19.5, 20.0, 0),
        ];

        for (start, end, expected) in cases {
            assert_eq!(
                count(&planner, start, end),
                expected,
                "window [{}, {}]",
                start,
                end
            );
        }
    }

    #[test]
    fn test_clipped_and_ordered() {
        let planner = planner(seven_traces(), vec![], vec![]);
        let outcome = planner
            .plan(&Query::new(seconds(1.0), seconds(10.0)))
            .unwrap();

        let segments = outcome.segments();
        assert!(segments
            .iter()
            .all(|p| p.start >= seconds(1.0) && p.end <= seconds(10.0)));
        assert!(segments.windows(2).all(|w| (w[0].start, w[0].end) <= (w[1].start, w[1].end)));

        let mut ids: Vec<i64> = segments.iter().map(|p| p.segment.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    #[test]
    fn test_no_data_outside() {
        let planner = planner(seven_traces(), vec![], vec![]);
        let outcome = planner
            .plan(&Query::new(seconds(100.0), seconds(200.0)))
            .unwrap();
        assert!(outcome.is_no_data());

        let outcome = planner
            .plan(&Query::new(seconds(0.0), seconds(10.0)).network("T"))
            .unwrap();
        assert!(outcome.is_no_data());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let planner = planner(seven_traces(), vec![], vec![]);
        let err = planner.plan(&Query::new(10, 10)).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTimeRange));
    }

    #[test]
    fn test_identity_ordering_across_channels() {
        let planner = planner(
            vec![
                segment(1, "TA.A25A..BHZ", 0.0, 10),
                segment(2, "TA.A25A..BHE", 5.0, 10),
                segment(3, "TA.A25A..BHN", 0.0, 10),
                segment(4, "TA.A25A..BHE", 0.0, 10),
            ],
            vec![],
            vec![],
        );

        let outcome = planner.plan(&Query::new(0, seconds(100.0))).unwrap();
        let order: Vec<(String, i64)> = outcome
            .segments()
            .iter()
            .map(|p| (p.identity.channel.clone(), p.segment.id))
            .collect();
        assert_eq!(
            order,
            vec![
                ("BHE".to_string(), 4),
                ("BHE".to_string(), 2),
                ("BHN".to_string(), 3),
                ("BHZ".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_mapping_interaction() {
        let mapping = Mapping::new(
            "TA.A25A..BHE".parse().unwrap(),
            "XX.YY.00.ZZZ".parse().unwrap(),
            seconds(-1000.0),
            Some(seconds(1000.0)),
        );
        let planner = planner(
            vec![
                segment(1, "TA.A25A..BHE", 0.0, 10),
                segment(2, "TA.A25A..BHZ", 0.0, 10),
                segment(3, "TA.A25A..BHN", 0.0, 10),
            ],
            vec![mapping],
            vec![],
        );
        let window = Query::new(0, seconds(20.0));

        let old = planner
            .plan(&window.clone().network("TA").station("*").location("*").channel("BHE"))
            .unwrap();
        assert!(old.is_no_data());

        let new = planner
            .plan(&window.clone().network("XX").station("YY").location("00").channel("ZZZ"))
            .unwrap();
        assert_eq!(new.segments().len(), 1);
        assert!(new.segments()[0].is_remapped());
        assert_eq!(new.segments()[0].segment.id, 1);

        let siblings = planner
            .plan(&window.network("TA").station("A25A").channel("BH?"))
            .unwrap();
        assert_eq!(siblings.segments().len(), 2);
    }

    #[test]
    fn test_partial_mapping_splits_segment() {
        let mapping = Mapping::new(
            "TA.A25A..BHE".parse().unwrap(),
            "XX.YY.00.ZZZ".parse().unwrap(),
            seconds(5.0),
            None,
        );
        let planner = planner(vec![segment(1, "TA.A25A..BHE", 0.0, 10)], vec![mapping], vec![]);

        let outcome = planner.plan(&Query::new(0, seconds(20.0))).unwrap();
        let pieces: Vec<(String, Timestamp, Timestamp)> = outcome
            .segments()
            .iter()
            .map(|p| (p.identity.to_string(), p.start, p.end))
            .collect();
        assert_eq!(
            pieces,
            vec![
                ("TA.A25A..BHE".to_string(), 0, seconds(5.0) - 1),
                ("XX.YY.00.ZZZ".to_string(), seconds(5.0), seconds(9.0)),
            ]
        );
    }

    #[test]
    fn test_restriction_uses_original_station() {
        let mapping = Mapping::new(
            "TA.A25A..BHE".parse().unwrap(),
            "XX.YY.00.ZZZ".parse().unwrap(),
            seconds(-1000.0),
            None,
        );
        let planner = planner(
            vec![
                segment(1, "TA.A25A..BHE", 0.0, 10),
                segment(2, "TA.A25A..BHZ", 0.0, 10),
                segment(3, "TA.RJOB..BHZ", 0.0, 10),
            ],
            vec![mapping],
            vec![Restriction::new("TA", "A25A").user("random")],
        );
        let window = Query::new(0, seconds(20.0));

        let anonymous = planner.plan(&window.clone().network("TA").station("A25A")).unwrap();
        assert!(anonymous.is_no_data());

        let other = planner
            .plan(&window.clone().network("TA").station("A25A").requester("some_dude"))
            .unwrap();
        assert!(other.is_no_data());

        let authorized = planner
            .plan(&window.clone().network("TA").station("A25A").requester("random"))
            .unwrap();
        assert_eq!(authorized.segments().len(), 1);

        // The mapped name does not escape the restriction
        let mapped = planner.plan(&window.clone().network("XX")).unwrap();
        assert!(mapped.is_no_data());

        let public = planner.plan(&window.station("RJOB")).unwrap();
        assert_eq!(public.segments().len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let planner = planner(seven_traces(), vec![], vec![]);
        let query = Query::new(seconds(1.0), seconds(10.0));
        assert_eq!(planner.plan(&query).unwrap(), planner.plan(&query).unwrap());
    }
}
