//! Restriction Filter - per-station access lists
//!
//! Stations without a restriction are public. Restricted stations are
//! visible only to the users listed on the restriction.

use std::collections::{BTreeSet, HashMap};

use crate::waveform::Restriction;

/// Lookup table of restricted (network, station) pairs
#[derive(Debug, Clone, Default)]
pub struct RestrictionSet {
    /// network -> station -> authorized users
    by_network: HashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl RestrictionSet {
    pub fn new(restrictions: impl IntoIterator<Item = Restriction>) -> Self {
        let mut by_network: HashMap<String, HashMap<String, BTreeSet<String>>> = HashMap::new();
        for restriction in restrictions {
            by_network
                .entry(restriction.network)
                .or_default()
                .entry(restriction.station)
                .or_default()
                .extend(restriction.users);
        }
        Self { by_network }
    }

    /// Check if `requester` may see data recorded at (network, station)
    pub fn is_authorized(&self, network: &str, station: &str, requester: Option<&str>) -> bool {
        match self
            .by_network
            .get(network)
            .and_then(|stations| stations.get(station))
        {
            None => true,
            Some(users) => requester.map_or(false, |user| users.contains(user)),
        }
    }

    /// Number of restricted stations
    pub fn len(&self) -> usize {
        self.by_network.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_network.is_empty()
    }
}
