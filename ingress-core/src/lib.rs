//! Ingress core library: domain types, geometry and time normalization.
//!
//! Public API surface:
//! - [`types`]: newtypes, provider records and canonical entities
//! - [`error`]: [`MappingError`]
//! - [`geo`]: well-known-text point parsing
//! - [`time`]: canonical UTC timestamps

pub mod error;
pub mod geo;
pub mod time;
pub mod types;

pub use error::MappingError;
pub use geo::GeoPoint;
pub use types::{
    Attribute, CanonicalEntity, ChangeCursor, EntityFragment, EntityId, EntityType,
    FreshnessMarker, Observation, ObservationKind, ProviderRecord, RecordIdentity,
};
