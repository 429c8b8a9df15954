//! Canonical UTC timestamps.
//!
//! Every time attribute written to the store goes through [`normalize`], so
//! `2022-04-21T20:12:01.000+02:00` and `2022-04-21T18:12:01Z` end up as the
//! same string.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::MappingError;

/// Parse an RFC 3339 timestamp with any offset notation into UTC.
pub fn parse_utc(field: &'static str, raw: &str) -> Result<DateTime<Utc>, MappingError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| MappingError::Time {
            field,
            value: raw.to_string(),
        })
}

/// Render a UTC instant in the canonical textual form.
pub fn format_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse and re-render `raw` in the canonical form.
pub fn normalize(field: &'static str, raw: &str) -> Result<String, MappingError> {
    parse_utc(field, raw).map(format_utc)
}
