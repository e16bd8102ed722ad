//! Dataselect query requests
//!
//! A `Query` is what a caller asks for; `Query::validate` turns it into a
//! `CompiledQuery` the planner can run, or fails with the message the
//! client should see.

use crate::query::error::{QueryError, QueryResult};
use crate::query::pattern::{Field, PatternList};
use crate::waveform::{parse_timestamp, ChannelIdentity, TimeWindow, Timestamp};

/// A waveform request: NSLC selectors, a time window and who is asking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Selector lists; None means "any"
    pub network: Option<String>,
    pub station: Option<String>,
    pub location: Option<String>,
    pub channel: Option<String>,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Authenticated user, None for anonymous requests
    pub requester: Option<String>,
}

impl Query {
    /// Query every channel in a time window
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            network: None,
            station: None,
            location: None,
            channel: None,
            start,
            end,
            requester: None,
        }
    }

    pub fn network(mut self, selector: impl Into<String>) -> Self {
        self.network = Some(selector.into());
        self
    }

    pub fn station(mut self, selector: impl Into<String>) -> Self {
        self.station = Some(selector.into());
        self
    }

    pub fn location(mut self, selector: impl Into<String>) -> Self {
        self.location = Some(selector.into());
        self
    }

    pub fn channel(mut self, selector: impl Into<String>) -> Self {
        self.channel = Some(selector.into());
        self
    }

    pub fn requester(mut self, user: impl Into<String>) -> Self {
        self.requester = Some(user.into());
        self
    }

    /// Check the request and compile its selectors
    pub fn validate(&self) -> QueryResult<CompiledQuery> {
        let window = TimeWindow::try_new(self.start, self.end).ok_or(QueryError::InvalidTimeRange)?;

        let required = [
            (Field::Network, &self.network),
            (Field::Station, &self.station),
            (Field::Channel, &self.channel),
        ];
        for (field, selector) in required {
            if selector.as_deref().is_some_and(|s| s.trim().is_empty()) {
                return Err(QueryError::EmptyIdentifier(field));
            }
        }

        let compile = |field: Field, selector: &Option<String>| -> QueryResult<PatternList> {
            match selector {
                Some(list) => PatternList::for_field(field, list),
                None => Ok(PatternList::any()),
            }
        };

        Ok(CompiledQuery {
            network: compile(Field::Network, &self.network)?,
            station: compile(Field::Station, &self.station)?,
            location: compile(Field::Location, &self.location)?,
            channel: compile(Field::Channel, &self.channel)?,
            window,
            requester: self.requester.clone(),
        })
    }
}

/// A validated query
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub network: PatternList,
    pub station: PatternList,
    pub location: PatternList,
    pub channel: PatternList,
    pub window: TimeWindow,
    pub requester: Option<String>,
}

impl CompiledQuery {
    /// Check all four selectors against an identity
    pub fn matches(&self, identity: &ChannelIdentity) -> bool {
        self.network.matches(&identity.network)
            && self.station.matches(&identity.station)
            && self.location.matches(&identity.location)
            && self.channel.matches(&identity.channel)
    }
}

/// Parse a required time parameter (`starttime` or `endtime`)
pub fn parse_time_parameter(parameter: &str, value: Option<&str>) -> QueryResult<Timestamp> {
    let value = match value {
        Some(v) => v,
        None if parameter == "starttime" => return Err(QueryError::MissingStartTime),
        None => return Err(QueryError::MissingEndTime),
    };

    parse_timestamp(value).ok_or_else(|| QueryError::InvalidTimestamp {
        parameter: parameter.to_string(),
        value: value.to_string(),
    })
}
