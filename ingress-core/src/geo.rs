//! Well-known-text point parsing.
//!
//! Trafikverket publishes WGS84 positions as `POINT (<lon> <lat>)`. The parser
//! accepts any whitespace around the tokens and a case-insensitive `POINT`
//! keyword, and rejects everything else (extra dimensions, empty points,
//! out-of-range coordinates).

use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// GeoJSON coordinate order: `[longitude, latitude]`.
    pub fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Parse a `POINT (lon lat)` string from the provider field `field`.
pub fn parse_point(field: &'static str, raw: &str) -> Result<GeoPoint, MappingError> {
    let fail = |reason: &str| MappingError::Geometry {
        field,
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    let keyword = trimmed.get(..5).ok_or_else(|| fail("expected POINT"))?;
    if !keyword.eq_ignore_ascii_case("point") {
        return Err(fail("expected POINT"));
    }

    let body = trimmed[5..].trim_start();
    let inner = body
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| fail("expected parenthesised coordinates"))?;

    let mut tokens = inner.split_whitespace();
    let (Some(lon), Some(lat), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(fail("expected exactly two coordinates"));
    };

    let longitude: f64 = lon.parse().map_err(|_| fail("longitude is not a number"))?;
    let latitude: f64 = lat.parse().map_err(|_| fail("latitude is not a number"))?;

    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(fail("longitude out of range"));
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(fail("latitude out of range"));
    }

    Ok(GeoPoint {
        latitude,
        longitude,
    })
}
