//! Category filter: which provider records a stream is interested in.

use std::collections::BTreeSet;

use ingress_core::ProviderRecord;

/// Kind tag of weather measurepoint records.
pub const WEATHER_MEASUREPOINT_KIND: &str = "weatherMeasurepoint";

/// Deviation icon id of road accidents.
pub const ROAD_ACCIDENT_KIND: &str = "roadAccident";

/// Kind tag of municipal city-work features.
pub const CITY_WORK_KIND: &str = "cityWork";

/// Accepted record kinds plus an optional county restriction.
///
/// With a county set, a record must list that county among its county
/// codes; records without county information are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    kinds: BTreeSet<String>,
    county: Option<u32>,
}

impl CategoryFilter {
    pub fn for_kinds<I, K>(kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
            county: None,
        }
    }

    pub fn with_county(mut self, county: Option<u32>) -> Self {
        self.county = county;
        self
    }

    pub fn county(&self) -> Option<u32> {
        self.county
    }

    pub fn accepts(&self, record: &ProviderRecord) -> bool {
        if !self.kinds.contains(&record.kind) {
            return false;
        }
        match self.county {
            Some(county) => record.county_codes.contains(&county),
            None => true,
        }
    }
}
