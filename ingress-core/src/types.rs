//! Domain types shared by the sync engine and its collaborators.
//!
//! Provider-side types ([`ProviderRecord`], [`RecordIdentity`],
//! [`ChangeCursor`]) carry raw strings exactly as received. Store-side types
//! ([`CanonicalEntity`], [`EntityFragment`]) only ever hold normalized values.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::time;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque provider token: everything up to this point has been seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeCursor(pub String);

impl ChangeCursor {
    /// Cursor used for the first poll of a stream ("give me everything").
    pub fn initial() -> Self {
        Self("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for ChangeCursor {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for ChangeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ChangeCursor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ChangeCursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Raw provider record id, used as the dedup key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity(pub String);

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecordIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RecordIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Store-side entity id (`urn:ngsi-ld:<Type>:<namespace><provider id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Derive the entity id for a provider record. Pure: the same inputs
    /// always give the same id, which is what makes upserts idempotent.
    pub fn derive(entity_type: EntityType, namespace: &str, identity: &RecordIdentity) -> Self {
        Self(format!(
            "urn:ngsi-ld:{}:{}{}",
            entity_type.as_str(),
            namespace,
            identity.0
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

/// The value used to decide whether a record is new enough to re-publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FreshnessMarker {
    /// Modification or measurement instant.
    Timestamp(DateTime<Utc>),
    /// Opaque version string, ordered lexicographically.
    Version(String),
}

impl FreshnessMarker {
    /// RFC 3339 strings become timestamps; anything else is a version.
    pub fn parse(raw: &str) -> Self {
        match time::parse_utc("marker", raw) {
            Ok(at) => FreshnessMarker::Timestamp(at),
            Err(_) => FreshnessMarker::Version(raw.trim().to_string()),
        }
    }

    /// Order two markers. `None` means the comparison is ambiguous: mixed
    /// kinds, or an empty version string on either side.
    pub fn compare(&self, other: &FreshnessMarker) -> Option<Ordering> {
        match (self, other) {
            (FreshnessMarker::Timestamp(a), FreshnessMarker::Timestamp(b)) => Some(a.cmp(b)),
            (FreshnessMarker::Version(a), FreshnessMarker::Version(b))
                if !a.is_empty() && !b.is_empty() =>
            {
                Some(a.cmp(b))
            }
            _ => None,
        }
    }
}

impl fmt::Display for FreshnessMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessMarker::Timestamp(at) => f.write_str(&time::format_utc(*at)),
            FreshnessMarker::Version(v) => f.write_str(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider records
// ---------------------------------------------------------------------------

/// Measurement kinds the provider reports. Units are the provider's: °C,
/// percent, degrees and m/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObservationKind {
    Temperature,
    RelativeHumidity,
    WindDirection,
    WindSpeed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub value: f64,
}

/// One provider-reported event or reading, flattened from the provider's
/// response envelope. Times and geometry are kept as raw strings; the
/// mapper validates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: RecordIdentity,
    /// Category tag, e.g. the deviation icon id `roadAccident`.
    pub kind: String,
    #[serde(default)]
    pub county_codes: Vec<u32>,
    /// WKT `POINT (lon lat)`.
    pub geometry: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Vec<Observation>,
    pub observed_at: Option<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub modified_at: Option<String>,
    /// Soft-deleted / resolved at the provider.
    #[serde(default)]
    pub deleted: bool,
}

impl ProviderRecord {
    /// Freshness marker: modification time, else observation time, else
    /// start of validity. `None` when the record carries none of them.
    pub fn marker(&self) -> Option<FreshnessMarker> {
        [&self.modified_at, &self.observed_at, &self.valid_from]
            .into_iter()
            .flatten()
            .find(|raw| !raw.trim().is_empty())
            .map(|raw| FreshnessMarker::parse(raw))
    }

    pub fn observation(&self, kind: ObservationKind) -> Option<f64> {
        self.observations
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.value)
    }
}

// ---------------------------------------------------------------------------
// Canonical entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    WeatherObserved,
    RoadAccident,
    CityWork,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::WeatherObserved => "WeatherObserved",
            EntityType::RoadAccident => "RoadAccident",
            EntityType::CityWork => "CityWork",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Attribute {
    Text {
        value: String,
    },
    Number {
        value: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        observed_at: Option<String>,
    },
    /// Canonical UTC timestamp, see [`crate::time::normalize`].
    DateTime {
        value: String,
    },
    Location {
        value: GeoPoint,
    },
}

impl Attribute {
    pub fn text(value: impl Into<String>) -> Self {
        Attribute::Text {
            value: value.into(),
        }
    }

    pub fn number(value: f64, observed_at: Option<String>) -> Self {
        Attribute::Number { value, observed_at }
    }

    pub fn date_time(value: impl Into<String>) -> Self {
        Attribute::DateTime {
            value: value.into(),
        }
    }

    pub fn location(value: GeoPoint) -> Self {
        Attribute::Location { value }
    }
}

/// A set of attributes to merge into an existing entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFragment {
    pub attributes: BTreeMap<String, Attribute>,
}

impl EntityFragment {
    pub fn with(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// The representation written to the entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub attributes: BTreeMap<String, Attribute>,
}

impl CanonicalEntity {
    pub fn new(id: EntityId, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            attributes: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Merge payload carrying every attribute of the entity.
    pub fn fragment(&self) -> EntityFragment {
        EntityFragment {
            attributes: self.attributes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
