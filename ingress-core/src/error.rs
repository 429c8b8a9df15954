//! Error types for ingress-core.

use thiserror::Error;

/// A single provider record could not be turned into a canonical entity.
///
/// Always names the offending field so the log line points at the bad data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Geometry missing or not a well-formed WKT point.
    #[error("invalid geometry in {field}: {reason} (value: {value:?})")]
    Geometry {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// Time string that does not parse as RFC 3339.
    #[error("invalid timestamp in {field}: {value:?}")]
    Time { field: &'static str, value: String },

    /// A field the entity type cannot be built without.
    #[error("missing required field {field}")]
    MissingField { field: &'static str },
}

impl MappingError {
    /// Name of the provider field that failed.
    pub fn field(&self) -> &'static str {
        match self {
            MappingError::Geometry { field, .. }
            | MappingError::Time { field, .. }
            | MappingError::MissingField { field } => field,
        }
    }
}
