//! Record mappers: provider record → canonical entity.
//!
//! Mapping is pure. Geometry goes through [`ingress_core::geo::parse_point`]
//! and every time attribute through [`ingress_core::time::normalize`], so two
//! observations of the same instant always produce the same entity.

use chrono::{DateTime, Utc};

use ingress_core::{
    geo, time, Attribute, CanonicalEntity, EntityFragment, EntityId, EntityType, MappingError,
    ObservationKind, ProviderRecord, RecordIdentity,
};

/// Per-domain mapping capability used by the generic sync driver.
pub trait RecordMapper: Send {
    fn entity_type(&self) -> EntityType;

    /// Namespace inserted between the entity type and the provider id.
    fn namespace(&self) -> &'static str {
        ""
    }

    fn entity_id(&self, identity: &RecordIdentity) -> EntityId {
        EntityId::derive(self.entity_type(), self.namespace(), identity)
    }

    /// Full attribute set for a live record.
    fn map(&self, record: &ProviderRecord) -> Result<CanonicalEntity, MappingError>;

    /// Status-only fragment for a resolved record. `None` when the entity
    /// type has no resolution semantics.
    fn resolve(&self, _record: &ProviderRecord, _now: DateTime<Utc>) -> Option<EntityFragment> {
        None
    }
}

// ---------------------------------------------------------------------------
// WeatherObserved
// ---------------------------------------------------------------------------

/// Maps weather measurepoints to `WeatherObserved` entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherObservedMapper;

impl WeatherObservedMapper {
    pub const NAMESPACE: &'static str = "se:trafikverket:api:weathermeasurepoint:";
}

impl RecordMapper for WeatherObservedMapper {
    fn entity_type(&self) -> EntityType {
        EntityType::WeatherObserved
    }

    fn namespace(&self) -> &'static str {
        Self::NAMESPACE
    }

    fn map(&self, record: &ProviderRecord) -> Result<CanonicalEntity, MappingError> {
        let raw_point = non_empty(&record.geometry).ok_or(MappingError::MissingField {
            field: "Geometry.WGS84",
        })?;
        let point = geo::parse_point("Geometry.WGS84", raw_point)?;

        let observed = match (non_empty(&record.observed_at), non_empty(&record.modified_at)) {
            (Some(sample), _) => time::normalize("Observation.Sample", sample)?,
            (None, Some(modified)) => time::normalize("ModifiedTime", modified)?,
            (None, None) => {
                return Err(MappingError::MissingField {
                    field: "Observation.Sample",
                })
            }
        };

        let mut entity = CanonicalEntity::new(self.entity_id(&record.id), self.entity_type());
        entity.insert("location", Attribute::location(point));
        entity.insert("dateObserved", Attribute::date_time(observed.clone()));
        if let Some(name) = non_empty(&record.name) {
            entity.insert("name", Attribute::text(name));
        }

        let numbers = [
            ("temperature", ObservationKind::Temperature, 1.0),
            ("humidity", ObservationKind::RelativeHumidity, 100.0),
            ("windDirection", ObservationKind::WindDirection, 1.0),
            ("windSpeed", ObservationKind::WindSpeed, 1.0),
        ];
        // Humidity is published as a fraction, the rest in provider units.
        for (name, kind, divisor) in numbers {
            if let Some(value) = record.observation(kind) {
                entity.insert(name, Attribute::number(value / divisor, Some(observed.clone())));
            }
        }

        Ok(entity)
    }
}

// ---------------------------------------------------------------------------
// RoadAccident
// ---------------------------------------------------------------------------

pub const STATUS_ONGOING: &str = "onGoing";
pub const STATUS_SOLVED: &str = "solved";

/// Maps road-accident deviations to `RoadAccident` entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoadAccidentMapper;

impl RecordMapper for RoadAccidentMapper {
    fn entity_type(&self) -> EntityType {
        EntityType::RoadAccident
    }

    fn map(&self, record: &ProviderRecord) -> Result<CanonicalEntity, MappingError> {
        let mut entity = CanonicalEntity::new(self.entity_id(&record.id), self.entity_type());

        if let Some(raw_point) = non_empty(&record.geometry) {
            let point = geo::parse_point("Deviation.Geometry.WGS84", raw_point)?;
            entity.insert("location", Attribute::location(point));
        }

        if let Some(start) = non_empty(&record.valid_from) {
            let start = time::normalize("Deviation.StartTime", start)?;
            entity.insert("accidentDate", Attribute::date_time(start.clone()));
            entity.insert("dateCreated", Attribute::date_time(start));
        }

        if let Some(description) = non_empty(&record.description) {
            entity.insert("description", Attribute::text(description));
        }
        entity.insert("status", Attribute::text(STATUS_ONGOING));

        Ok(entity)
    }

    /// `status = solved` plus `dateModified`; nothing set at creation time
    /// is touched. The provider's modification time wins over `now`.
    fn resolve(&self, record: &ProviderRecord, now: DateTime<Utc>) -> Option<EntityFragment> {
        let modified = non_empty(&record.modified_at)
            .and_then(|raw| time::parse_utc("ModifiedTime", raw).ok())
            .unwrap_or(now);

        Some(
            EntityFragment::default()
                .with("status", Attribute::text(STATUS_SOLVED))
                .with("dateModified", Attribute::date_time(time::format_utc(modified))),
        )
    }
}

// ---------------------------------------------------------------------------
// CityWork
// ---------------------------------------------------------------------------

/// Maps municipal city-work features to `CityWork` entities.
///
/// City works carry plain calendar dates. A work is active from the start of
/// its first day to the last second of its last day, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct CityWorkMapper;

impl RecordMapper for CityWorkMapper {
    fn entity_type(&self) -> EntityType {
        EntityType::CityWork
    }

    fn map(&self, record: &ProviderRecord) -> Result<CanonicalEntity, MappingError> {
        let raw_point = non_empty(&record.geometry).ok_or(MappingError::MissingField {
            field: "geometry",
        })?;
        let point = geo::parse_point("geometry", raw_point)?;

        let start = non_empty(&record.valid_from).ok_or(MappingError::MissingField {
            field: "properties.start",
        })?;
        let end = non_empty(&record.valid_to).ok_or(MappingError::MissingField {
            field: "properties.end",
        })?;
        let start = time::normalize("properties.start", &format!("{start}T00:00:00Z"))?;
        let end = time::normalize("properties.end", &format!("{end}T23:59:59Z"))?;

        let mut entity = CanonicalEntity::new(self.entity_id(&record.id), self.entity_type());
        entity.insert("location", Attribute::location(point));
        entity.insert("startDate", Attribute::date_time(start));
        entity.insert("endDate", Attribute::date_time(end));
        if let Some(description) = non_empty(&record.description) {
            entity.insert("description", Attribute::text(description));
        }

        Ok(entity)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ingress_core::{GeoPoint, Observation};

    fn measurepoint() -> ProviderRecord {
        ProviderRecord {
            id: RecordIdentity::from("SE_STA_VVIS2213"),
            kind: "weatherMeasurepoint".into(),
            geometry: Some("POINT (17.047550201416016 62.362770080566406)".into()),
            name: Some("Vattjom".into()),
            observations: vec![
                Observation {
                    kind: ObservationKind::Temperature,
                    value: 0.9,
                },
                Observation {
                    kind: ObservationKind::RelativeHumidity,
                    value: 85.0,
                },
            ],
            observed_at: Some("2020-03-16T09:10:00.000+01:00".into()),
            modified_at: Some("2020-03-16T08:15:49.889Z".into()),
            ..Default::default()
        }
    }

    fn deviation() -> ProviderRecord {
        ProviderRecord {
            id: RecordIdentity::from("SE_STA_TRISSID_1_9879392"),
            kind: "roadAccident".into(),
            geometry: Some("POINT (13.0958767 55.9722252)".into()),
            description: Some("Trafikolycka med flera fordon söder om Kågeröd.".into()),
            valid_from: Some("2022-04-21T20:12:01.000+02:00".into()),
            valid_to: Some("2022-04-21T21:15:00.000+02:00".into()),
            ..Default::default()
        }
    }

    #[test]
    fn weather_entity_has_expected_attributes() {
        let entity = WeatherObservedMapper.map(&measurepoint()).expect("map");

        assert_eq!(
            entity.id.as_str(),
            "urn:ngsi-ld:WeatherObserved:se:trafikverket:api:weathermeasurepoint:SE_STA_VVIS2213"
        );
        assert_eq!(entity.entity_type, EntityType::WeatherObserved);
        assert_eq!(
            entity.get("dateObserved"),
            Some(&Attribute::date_time("2020-03-16T08:10:00Z"))
        );
        assert_eq!(
            entity.get("location"),
            Some(&Attribute::location(GeoPoint {
                latitude: 62.362770080566406,
                longitude: 17.047550201416016,
            }))
        );
        assert_eq!(
            entity.get("humidity"),
            Some(&Attribute::number(0.85, Some("2020-03-16T08:10:00Z".into())))
        );
        assert!(entity.get("windSpeed").is_none());
    }

    #[test]
    fn weather_falls_back_to_modified_time() {
        let mut record = measurepoint();
        record.observed_at = None;
        let entity = WeatherObservedMapper.map(&record).expect("map");
        assert_eq!(
            entity.get("dateObserved"),
            Some(&Attribute::date_time("2020-03-16T08:15:49Z"))
        );
    }

    #[test]
    fn weather_requires_geometry() {
        let mut record = measurepoint();
        record.geometry = None;
        let err = WeatherObservedMapper.map(&record).unwrap_err();
        assert_eq!(err.field(), "Geometry.WGS84");
    }

    #[test]
    fn weather_rejects_bad_sample_time() {
        let mut record = measurepoint();
        record.observed_at = Some("16/03/2020".into());
        let err = WeatherObservedMapper.map(&record).unwrap_err();
        assert_eq!(err.field(), "Observation.Sample");
    }

    #[test]
    fn mapping_is_idempotent() {
        let a = serde_json::to_vec(&WeatherObservedMapper.map(&measurepoint()).unwrap()).unwrap();
        let b = serde_json::to_vec(&WeatherObservedMapper.map(&measurepoint()).unwrap()).unwrap();
        assert_eq!(a, b);

        let a = serde_json::to_vec(&RoadAccidentMapper.map(&deviation()).unwrap()).unwrap();
        let b = serde_json::to_vec(&RoadAccidentMapper.map(&deviation()).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn road_accident_entity_is_ongoing_with_utc_dates() {
        let entity = RoadAccidentMapper.map(&deviation()).expect("map");
        assert_eq!(
            entity.id.as_str(),
            "urn:ngsi-ld:RoadAccident:SE_STA_TRISSID_1_9879392"
        );
        assert_eq!(entity.get("status"), Some(&Attribute::text("onGoing")));
        assert_eq!(
            entity.get("accidentDate"),
            Some(&Attribute::date_time("2022-04-21T18:12:01Z"))
        );
        assert_eq!(entity.get("accidentDate"), entity.get("dateCreated"));
    }

    #[test]
    fn road_accident_without_geometry_or_start_is_still_mapped() {
        let record = ProviderRecord {
            id: RecordIdentity::from("X"),
            kind: "roadAccident".into(),
            ..Default::default()
        };
        let entity = RoadAccidentMapper.map(&record).expect("map");
        assert!(entity.get("location").is_none());
        assert!(entity.get("accidentDate").is_none());
        assert!(entity.get("description").is_none());
        assert_eq!(entity.get("status"), Some(&Attribute::text("onGoing")));
    }

    #[test]
    fn road_accident_rejects_truncated_point() {
        let mut record = deviation();
        record.geometry = Some("POINT (13.0958767".into());
        let err = RoadAccidentMapper.map(&record).unwrap_err();
        assert_eq!(err.field(), "Deviation.Geometry.WGS84");
    }

    #[test]
    fn resolution_fragment_only_touches_status() {
        let now = Utc.with_ymd_and_hms(2022, 4, 21, 19, 0, 0).unwrap();
        let fragment = RoadAccidentMapper.resolve(&deviation(), now).expect("fragment");

        let names: Vec<_> = fragment.attributes.keys().cloned().collect();
        assert_eq!(names, vec!["dateModified", "status"]);
        assert_eq!(fragment.get("status"), Some(&Attribute::text("solved")));
        assert_eq!(
            fragment.get("dateModified"),
            Some(&Attribute::date_time("2022-04-21T19:00:00Z"))
        );
    }

    #[test]
    fn resolution_prefers_provider_modified_time() {
        let mut record = deviation();
        record.modified_at = Some("2022-04-21T21:30:00+02:00".into());
        let fragment = RoadAccidentMapper.resolve(&record, Utc::now()).expect("fragment");
        assert_eq!(
            fragment.get("dateModified"),
            Some(&Attribute::date_time("2022-04-21T19:30:00Z"))
        );
    }

    fn city_work() -> ProviderRecord {
        ProviderRecord {
            id: RecordIdentity::from("17.3069:62.3908:20220502:20220630"),
            kind: "cityWork".into(),
            geometry: Some("POINT (17.3069 62.3908)".into()),
            description: Some("Ledningsarbete, ett körfält avstängt".into()),
            valid_from: Some("2022-05-02".into()),
            valid_to: Some("2022-06-30".into()),
            ..Default::default()
        }
    }

    #[test]
    fn city_work_spans_whole_days() {
        let entity = CityWorkMapper.map(&city_work()).expect("map");

        assert_eq!(
            entity.id.as_str(),
            "urn:ngsi-ld:CityWork:17.3069:62.3908:20220502:20220630"
        );
        assert_eq!(
            entity.get("startDate"),
            Some(&Attribute::date_time("2022-05-02T00:00:00Z"))
        );
        assert_eq!(
            entity.get("endDate"),
            Some(&Attribute::date_time("2022-06-30T23:59:59Z"))
        );
        assert_eq!(
            entity.get("description"),
            Some(&Attribute::text("Ledningsarbete, ett körfält avstängt"))
        );
        assert!(CityWorkMapper.resolve(&city_work(), Utc::now()).is_none());
    }

    #[test]
    fn city_work_rejects_bad_dates() {
        let mut record = city_work();
        record.valid_to = Some("30/06/2022".into());
        let err = CityWorkMapper.map(&record).unwrap_err();
        assert_eq!(err.field(), "properties.end");

        record.valid_to = None;
        let err = CityWorkMapper.map(&record).unwrap_err();
        assert_eq!(err.field(), "properties.end");
    }

    #[test]
    fn weather_has_no_resolution() {
        assert!(WeatherObservedMapper
            .resolve(&measurepoint(), Utc::now())
            .is_none());
    }
}
