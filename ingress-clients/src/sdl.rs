//! Sundsvall municipality city-works feed.
//!
//! The feed is a plain GeoJSON `FeatureCollection` fetched with `GET`. It has
//! no change ids, so every poll returns the full set and the batch carries
//! no next cursor.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use ingress_core::{ChangeCursor, ProviderRecord, RecordIdentity};
use ingress_sync::{ChangeBatch, ProviderClient, ProviderError, CITY_WORK_KIND};

/// Published city-works layer of the municipal map service.
pub const DEFAULT_CITY_WORKS_URL: &str =
    "https://karta.sundsvall.se/origoserver/converttogeojson/?q=sundsvallvaxerGC";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Option<Value>,
    #[serde(default)]
    geometries: Vec<Geometry>,
}

impl Geometry {
    /// First point in the geometry, searching collections depth first.
    fn first_point(&self) -> Option<(f64, f64)> {
        if self.kind == "Point" {
            let coords = self.coordinates.as_ref()?.as_array()?;
            return match coords.as_slice() {
                [lon, lat, ..] => Some((lon.as_f64()?, lat.as_f64()?)),
                _ => None,
            };
        }
        self.geometries.iter().find_map(Geometry::first_point)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Properties {
    title: Option<String>,
    description: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

/// City-work features from the municipal GeoJSON endpoint.
#[derive(Clone)]
pub struct SundsvallCityWorks {
    agent: ureq::Agent,
    url: String,
}

impl SundsvallCityWorks {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decode a feature collection. Features without a point are skipped.
    ///
    /// The feed has no ids; a work is identified by its position and dates,
    /// `<lon>:<lat>:<yyyymmdd>:<yyyymmdd>`.
    pub fn parse(body: &str) -> Result<ChangeBatch, ProviderError> {
        let collection: FeatureCollection = serde_json::from_str(body)
            .map_err(|e| ProviderError::Envelope(format!("city works: {e}")))?;

        let mut records = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some((lon, lat)) = feature.geometry.as_ref().and_then(Geometry::first_point) else {
                tracing::warn!(
                    title = feature.properties.title.as_deref().unwrap_or_default(),
                    "city work without point geometry skipped",
                );
                continue;
            };

            let props = feature.properties;
            let start = props.start.unwrap_or_default();
            let end = props.end.unwrap_or_default();
            let id = format!(
                "{lon}:{lat}:{}:{}",
                start.replace('-', ""),
                end.replace('-', "")
            );

            records.push(ProviderRecord {
                id: RecordIdentity::from(id),
                kind: CITY_WORK_KIND.to_string(),
                geometry: Some(format!("POINT ({lon} {lat})")),
                name: props.title,
                description: props.description,
                valid_from: Some(start),
                valid_to: Some(end),
                ..Default::default()
            });
        }

        Ok(ChangeBatch {
            records,
            next_cursor: None,
        })
    }
}

impl ProviderClient for SundsvallCityWorks {
    fn fetch_changes(&self, _cursor: &ChangeCursor) -> Result<ChangeBatch, ProviderError> {
        let body = match self.agent.get(&self.url).call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| ProviderError::Transport(format!("failed to read response: {e}")))?,
            Err(ureq::Error::Status(code, response)) => {
                return Err(ProviderError::Status {
                    code,
                    body: response.into_string().unwrap_or_default(),
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ProviderError::Transport(transport.to_string()))
            }
        };
        tracing::debug!(url = %self.url, bytes = body.len(), "city works received");
        Self::parse(&body)
    }
}
