//! Stream assembly: config + endpoints → boxed sync streams.

use std::fmt;

use serde::Serialize;

use ingress_clients::{
    ContextBrokerClient, RoadAccidents, SundsvallCityWorks, TrafikverketClient,
    WeatherMeasurepoints,
};
use ingress_core::ChangeCursor;
use ingress_sync::{
    CategoryFilter, CityWorkMapper, RoadAccidentMapper, SyncCycle, SyncDriver, SyncStream,
    WeatherObservedMapper, CITY_WORK_KIND, ROAD_ACCIDENT_KIND, WEATHER_MEASUREPOINT_KIND,
};

use crate::config::{Endpoints, IngressConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    Weather,
    RoadAccidents,
    CityWorks,
}

impl StreamKind {
    pub fn all() -> [StreamKind; 3] {
        [
            StreamKind::Weather,
            StreamKind::RoadAccidents,
            StreamKind::CityWorks,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Weather => "weather",
            StreamKind::RoadAccidents => "road-accidents",
            StreamKind::CityWorks => "city-works",
        }
    }

    pub fn enabled(&self, config: &IngressConfig) -> bool {
        match self {
            StreamKind::Weather => config.streams.weather.enabled,
            StreamKind::RoadAccidents => config.streams.road_accidents.enabled,
            StreamKind::CityWorks => config.streams.city_works.enabled,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build one stream starting at `cursor`.
pub fn build_stream(
    kind: StreamKind,
    config: &IngressConfig,
    endpoints: &Endpoints,
    cursor: ChangeCursor,
) -> Box<dyn SyncCycle> {
    let timeout = config.request_timeout();
    let tfv = || TrafikverketClient::new(&endpoints.api_url, &endpoints.auth_key, timeout);
    let broker = ContextBrokerClient::new(&endpoints.broker_url, timeout);

    match kind {
        StreamKind::Weather => {
            let provider = WeatherMeasurepoints::new(tfv(), &config.streams.weather.bounding_box);
            let driver = SyncDriver::new(
                kind.name(),
                provider,
                broker,
                WeatherObservedMapper,
                CategoryFilter::for_kinds([WEATHER_MEASUREPOINT_KIND]),
            );
            Box::new(SyncStream::with_cursor(driver, cursor))
        }
        StreamKind::RoadAccidents => {
            let county = config.streams.road_accidents.county;
            let provider = RoadAccidents::new(tfv(), county);
            let driver = SyncDriver::new(
                kind.name(),
                provider,
                broker,
                RoadAccidentMapper,
                CategoryFilter::for_kinds([ROAD_ACCIDENT_KIND]).with_county(county),
            );
            Box::new(SyncStream::with_cursor(driver, cursor))
        }
        StreamKind::CityWorks => {
            let provider = SundsvallCityWorks::new(&config.streams.city_works.url, timeout);
            let driver = SyncDriver::new(
                kind.name(),
                provider,
                broker,
                CityWorkMapper,
                CategoryFilter::for_kinds([CITY_WORK_KIND]),
            );
            Box::new(SyncStream::with_cursor(driver, cursor))
        }
    }
}

/// Every enabled stream, from the initial cursor.
pub fn build_streams(config: &IngressConfig, endpoints: &Endpoints) -> Vec<Box<dyn SyncCycle>> {
    StreamKind::all()
        .into_iter()
        .filter(|kind| kind.enabled(config))
        .map(|kind| build_stream(kind, config, endpoints, ChangeCursor::initial()))
        .collect()
}
