//! Trafikverket open-data API client.
//!
//! Queries are XML documents posted as `text/xml`; answers are JSON
//! envelopes of the form `{"RESPONSE": {"RESULT": [{<objects>, "INFO": {...}}]}}`.
//! Only the first result set is read, since every request carries one query.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use ingress_core::{ChangeCursor, Observation, ObservationKind, ProviderRecord};
use ingress_sync::{ChangeBatch, ProviderClient, ProviderError, WEATHER_MEASUREPOINT_KIND};

/// SWEREF99TM box around Sundsvall, used when no bounding box is configured.
pub const DEFAULT_WEATHER_BOX: &str = "527000 6879000, 652500 6950000";

/// Deviation message type of accidents.
pub const ACCIDENT_MESSAGE_TYPE: &str = "Olycka";

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Authenticated query transport shared by the Trafikverket streams.
#[derive(Clone)]
pub struct TrafikverketClient {
    agent: ureq::Agent,
    url: String,
    auth_key: String,
}

impl TrafikverketClient {
    pub fn new(url: impl Into<String>, auth_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            url: url.into(),
            auth_key: auth_key.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wrap a `<QUERY>` element into a complete request document.
    pub fn request_body(&self, query: &str) -> String {
        format!(
            "<REQUEST><LOGIN authenticationkey=\"{}\" />{}</REQUEST>",
            escape_xml(&self.auth_key),
            query
        )
    }

    /// Post `query` and return the raw response body.
    pub fn post_query(&self, query: &str) -> Result<String, ProviderError> {
        let response = self
            .agent
            .post(&self.url)
            .set("Content-Type", "text/xml")
            .send_string(&self.request_body(query));

        match response {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|e| ProviderError::Transport(format!("failed to read response: {e}")))?;
                tracing::debug!(url = %self.url, bytes = body.len(), "provider response received");
                Ok(body)
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                // Refused queries come back as 4xx with an ERROR envelope.
                match api_error_message(&body) {
                    Some(message) => Err(ProviderError::Rejected(message)),
                    None => Err(ProviderError::Status { code, body }),
                }
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(ProviderError::Transport(transport.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<R> {
    #[serde(rename = "RESPONSE")]
    response: ResponseBody<R>,
}

#[derive(Debug, Deserialize)]
struct ResponseBody<R> {
    #[serde(rename = "RESULT", default = "Vec::new")]
    result: Vec<ResultSet<R>>,
}

#[derive(Debug, Deserialize)]
struct ResultSet<R> {
    #[serde(flatten)]
    objects: R,
    #[serde(rename = "INFO")]
    info: Option<Info>,
    #[serde(rename = "ERROR")]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Info {
    #[serde(rename = "LASTCHANGEID")]
    last_change_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "MESSAGE")]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NoObjects {}

/// Decode the first result set of `body`, yielding its objects and the
/// next change id.
fn first_result<R: DeserializeOwned>(
    body: &str,
) -> Result<(R, Option<ChangeCursor>), ProviderError> {
    let envelope: Envelope<R> = serde_json::from_str(body)
        .map_err(|e| ProviderError::Envelope(format!("invalid response body: {e}")))?;

    let result = envelope
        .response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Envelope("response has no RESULT".into()))?;

    if let Some(error) = result.error {
        return Err(ProviderError::Rejected(
            error.message.unwrap_or_else(|| "unknown error".into()),
        ));
    }

    let cursor = result
        .info
        .and_then(|info| info.last_change_id)
        .map(ChangeCursor::from)
        .filter(|cursor| !cursor.is_empty());
    Ok((result.objects, cursor))
}

fn api_error_message(body: &str) -> Option<String> {
    match first_result::<NoObjects>(body) {
        Err(ProviderError::Rejected(message)) => Some(message),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct Geometry {
    #[serde(rename = "WGS84")]
    wgs84: Option<String>,
}

// ---------------------------------------------------------------------------
// Weather measurepoints
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct MeasurepointObjects {
    #[serde(rename = "WeatherMeasurepoint", default)]
    measurepoints: Vec<Measurepoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Measurepoint {
    id: String,
    name: Option<String>,
    #[serde(default)]
    deleted: bool,
    geometry: Option<Geometry>,
    observation: Option<MeasurepointObservation>,
    modified_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MeasurepointObservation {
    sample: Option<String>,
    air: Option<Air>,
    #[serde(default)]
    wind: Vec<Wind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Air {
    temperature: Option<Reading>,
    relative_humidity: Option<Reading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Wind {
    direction: Option<Reading>,
    speed: Option<Reading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reading {
    value: Option<f64>,
}

fn reading(kind: ObservationKind, reading: Option<&Reading>) -> Option<Observation> {
    reading
        .and_then(|r| r.value)
        .map(|value| Observation { kind, value })
}

impl Measurepoint {
    fn into_record(self) -> ProviderRecord {
        let observation = self.observation.unwrap_or_default();
        let air = observation.air.unwrap_or_default();
        let wind = observation.wind.first();

        let observations = [
            reading(ObservationKind::Temperature, air.temperature.as_ref()),
            reading(ObservationKind::RelativeHumidity, air.relative_humidity.as_ref()),
            reading(
                ObservationKind::WindDirection,
                wind.and_then(|w| w.direction.as_ref()),
            ),
            reading(ObservationKind::WindSpeed, wind.and_then(|w| w.speed.as_ref())),
        ]
        .into_iter()
        .flatten()
        .collect();

        ProviderRecord {
            id: self.id.into(),
            kind: WEATHER_MEASUREPOINT_KIND.to_string(),
            geometry: self.geometry.and_then(|g| g.wgs84),
            name: self.name,
            observations,
            observed_at: observation.sample,
            modified_at: self.modified_time,
            deleted: self.deleted,
            ..Default::default()
        }
    }
}

/// Weather measurepoints inside a SWEREF99TM bounding box.
pub struct WeatherMeasurepoints {
    client: TrafikverketClient,
    bounding_box: String,
}

impl WeatherMeasurepoints {
    pub fn new(client: TrafikverketClient, bounding_box: impl Into<String>) -> Self {
        Self {
            client,
            bounding_box: bounding_box.into(),
        }
    }

    pub fn query(&self, cursor: &ChangeCursor) -> String {
        format!(
            concat!(
                "<QUERY objecttype=\"WeatherMeasurepoint\" schemaversion=\"2.1\" changeid=\"{}\" includedeletedobjects=\"true\">",
                "<INCLUDE>Deleted</INCLUDE>",
                "<INCLUDE>Id</INCLUDE>",
                "<INCLUDE>Geometry.WGS84</INCLUDE>",
                "<INCLUDE>Observation.Air.RelativeHumidity.Value</INCLUDE>",
                "<INCLUDE>Observation.Air.Temperature.Value</INCLUDE>",
                "<INCLUDE>Observation.Wind.Direction.Value</INCLUDE>",
                "<INCLUDE>Observation.Wind.Speed.Value</INCLUDE>",
                "<INCLUDE>Observation.Sample</INCLUDE>",
                "<INCLUDE>ModifiedTime</INCLUDE>",
                "<INCLUDE>Name</INCLUDE>",
                "<FILTER><WITHIN name=\"Geometry.SWEREF99TM\" shape=\"box\" value=\"{}\" /></FILTER>",
                "</QUERY>",
            ),
            escape_xml(cursor.as_str()),
            escape_xml(&self.bounding_box),
        )
    }

    pub fn parse(body: &str) -> Result<ChangeBatch, ProviderError> {
        let (objects, next_cursor) = first_result::<MeasurepointObjects>(body)?;
        Ok(ChangeBatch {
            records: objects
                .measurepoints
                .into_iter()
                .map(Measurepoint::into_record)
                .collect(),
            next_cursor,
        })
    }
}

impl ProviderClient for WeatherMeasurepoints {
    fn fetch_changes(&self, cursor: &ChangeCursor) -> Result<ChangeBatch, ProviderError> {
        let body = self.client.post_query(&self.query(cursor))?;
        Self::parse(&body)
    }
}

// ---------------------------------------------------------------------------
// Road accidents
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SituationObjects {
    #[serde(rename = "Situation", default)]
    situations: Vec<Situation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Situation {
    #[serde(default)]
    deleted: bool,
    modified_time: Option<String>,
    #[serde(default)]
    deviation: Vec<Deviation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Deviation {
    id: String,
    icon_id: Option<String>,
    message: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    county_no: Vec<u32>,
}

/// Accident deviations, optionally restricted to one county.
pub struct RoadAccidents {
    client: TrafikverketClient,
    county: Option<u32>,
}

impl RoadAccidents {
    pub fn new(client: TrafikverketClient, county: Option<u32>) -> Self {
        Self { client, county }
    }

    pub fn query(&self, cursor: &ChangeCursor) -> String {
        let filter = match self.county {
            Some(county) => format!(
                "<FILTER><AND><EQ name=\"Deviation.MessageType\" value=\"{ACCIDENT_MESSAGE_TYPE}\" /><EQ name=\"Deviation.CountyNo\" value=\"{county}\" /></AND></FILTER>"
            ),
            None => format!(
                "<FILTER><EQ name=\"Deviation.MessageType\" value=\"{ACCIDENT_MESSAGE_TYPE}\" /></FILTER>"
            ),
        };
        format!(
            concat!(
                "<QUERY objecttype=\"Situation\" schemaversion=\"1.2\" changeid=\"{}\" includedeletedobjects=\"true\">",
                "{}",
                "<INCLUDE>Deviation.Id</INCLUDE>",
                "<INCLUDE>Deviation.StartTime</INCLUDE>",
                "<INCLUDE>Deviation.EndTime</INCLUDE>",
                "<INCLUDE>Deviation.Message</INCLUDE>",
                "<INCLUDE>Deviation.IconId</INCLUDE>",
                "<INCLUDE>Deviation.Geometry.WGS84</INCLUDE>",
                "<INCLUDE>Deviation.CountyNo</INCLUDE>",
                "<INCLUDE>ModifiedTime</INCLUDE>",
                "<INCLUDE>Deleted</INCLUDE>",
                "</QUERY>",
            ),
            escape_xml(cursor.as_str()),
            filter,
        )
    }

    /// One record per deviation; each inherits its situation's deletion
    /// flag and modification time.
    pub fn parse(body: &str) -> Result<ChangeBatch, ProviderError> {
        let (objects, next_cursor) = first_result::<SituationObjects>(body)?;

        let mut records = Vec::new();
        for situation in objects.situations {
            for deviation in situation.deviation {
                records.push(ProviderRecord {
                    id: deviation.id.into(),
                    kind: deviation.icon_id.unwrap_or_default(),
                    county_codes: deviation.county_no,
                    geometry: deviation.geometry.and_then(|g| g.wgs84),
                    description: deviation.message,
                    valid_from: deviation.start_time,
                    valid_to: deviation.end_time,
                    modified_at: situation.modified_time.clone(),
                    deleted: situation.deleted,
                    ..Default::default()
                });
            }
        }

        Ok(ChangeBatch {
            records,
            next_cursor,
        })
    }
}

impl ProviderClient for RoadAccidents {
    fn fetch_changes(&self, cursor: &ChangeCursor) -> Result<ChangeBatch, ProviderError> {
        let body = self.client.post_query(&self.query(cursor))?;
        Self::parse(&body)
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not representable in XML 1.0, escaped or not.
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => {}
            _ => out.push(c),
        }
    }
    out
}
