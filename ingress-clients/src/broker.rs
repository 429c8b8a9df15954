//! NGSI-LD context broker client.

use std::time::Duration;

use serde_json::{json, Map, Value};

use ingress_core::{Attribute, CanonicalEntity, EntityFragment, EntityId};
use ingress_sync::{EntityStore, Headers, StoreError};

/// JSON-LD context of the transportation data models.
pub const DEFAULT_CONTEXT: &str =
    "https://raw.githubusercontent.com/smart-data-models/dataModel.Transportation/master/context.jsonld";

pub struct ContextBrokerClient {
    agent: ureq::Agent,
    base_url: String,
    context: String,
}

impl ContextBrokerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            context: DEFAULT_CONTEXT.to_string(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn entities_url(&self) -> String {
        format!("{}/ngsi-ld/v1/entities", self.base_url)
    }

    pub fn attrs_url(&self, id: &EntityId) -> String {
        format!(
            "{}/ngsi-ld/v1/entities/{}/attrs/",
            self.base_url,
            encode_path_segment(id.as_str())
        )
    }

    /// Full NGSI-LD document for create.
    pub fn entity_document(&self, entity: &CanonicalEntity) -> Value {
        let mut doc = Map::new();
        doc.insert("id".into(), Value::String(entity.id.to_string()));
        doc.insert("type".into(), Value::String(entity.entity_type.to_string()));
        for (name, attribute) in &entity.attributes {
            doc.insert(name.clone(), attribute_document(attribute));
        }
        doc.insert("@context".into(), json!([self.context]));
        Value::Object(doc)
    }

    /// Attribute-only NGSI-LD document for merge.
    pub fn fragment_document(&self, fragment: &EntityFragment) -> Value {
        let mut doc = Map::new();
        for (name, attribute) in &fragment.attributes {
            doc.insert(name.clone(), attribute_document(attribute));
        }
        doc.insert("@context".into(), json!([self.context]));
        Value::Object(doc)
    }

    fn post(&self, url: &str, headers: &Headers, body: &str) -> Result<(), ureq::Error> {
        tracing::debug!(url, bytes = body.len(), "posting to context broker");
        let mut request = self.agent.post(url);
        for (name, values) in headers {
            request = request.set(name, &values.join(", "));
        }
        request.send_string(body).map(|_| ())
    }
}

impl EntityStore for ContextBrokerClient {
    fn merge_entity(
        &self,
        id: &EntityId,
        fragment: &EntityFragment,
        headers: &Headers,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(&self.fragment_document(fragment))?;
        match self.post(&self.attrs_url(id), headers, &body) {
            Ok(()) => Ok(()),
            Err(ureq::Error::Status(404, _)) => Err(StoreError::NotFound(id.clone())),
            Err(err) => Err(store_error(err)),
        }
    }

    fn create_entity(&self, entity: &CanonicalEntity, headers: &Headers) -> Result<(), StoreError> {
        let body = serde_json::to_string(&self.entity_document(entity))?;
        match self.post(&self.entities_url(), headers, &body) {
            Ok(()) => Ok(()),
            Err(ureq::Error::Status(409, _)) => Err(StoreError::AlreadyExists(entity.id.clone())),
            Err(err) => Err(store_error(err)),
        }
    }
}

fn store_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(code, response) => StoreError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
    }
}

/// NGSI-LD property or geo-property for one attribute.
pub fn attribute_document(attribute: &Attribute) -> Value {
    match attribute {
        Attribute::Text { value } => json!({ "type": "Property", "value": value }),
        Attribute::Number { value, observed_at } => {
            let mut property = json!({ "type": "Property", "value": value });
            if let Some(observed_at) = observed_at {
                property["observedAt"] = Value::String(observed_at.clone());
            }
            property
        }
        Attribute::DateTime { value } => json!({
            "type": "Property",
            "value": { "@type": "DateTime", "@value": value }
        }),
        Attribute::Location { value } => json!({
            "type": "GeoProperty",
            "value": { "type": "Point", "coordinates": value.coordinates() }
        }),
    }
}

/// Percent-encode everything but RFC 3986 unreserved characters.
fn encode_path_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
