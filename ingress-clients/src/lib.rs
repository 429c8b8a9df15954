//! # ingress-clients
//!
//! HTTP collaborators of the sync driver: the Trafikverket change feeds
//! ([`WeatherMeasurepoints`], [`RoadAccidents`]), the Sundsvall city-works
//! feed ([`SundsvallCityWorks`]) and the NGSI-LD [`ContextBrokerClient`].

pub mod broker;
pub mod sdl;
pub mod tfv;

pub use broker::{ContextBrokerClient, DEFAULT_CONTEXT};
pub use sdl::{SundsvallCityWorks, DEFAULT_CITY_WORKS_URL};
pub use tfv::{RoadAccidents, TrafikverketClient, WeatherMeasurepoints, DEFAULT_WEATHER_BOX};
