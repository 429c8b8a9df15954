//! # ingress-sync
//!
//! Incremental change sync: filter, dedup, map and merge-or-create.
//!
//! Build a [`SyncDriver`] from a [`ProviderClient`], an [`EntityStore`] and a
//! [`RecordMapper`], wrap it in a [`SyncStream`] and call
//! [`SyncStream::tick`] once per polling interval.

pub mod driver;
pub mod error;
pub mod filter;
pub mod mapper;
pub mod reconciler;
pub mod tracker;

pub use driver::{ChangeBatch, CycleReport, ProviderClient, SyncCycle, SyncDriver, SyncStream};
pub use error::{ProviderError, ReconcileError, StoreError, SyncError};
pub use filter::{CategoryFilter, CITY_WORK_KIND, ROAD_ACCIDENT_KIND, WEATHER_MEASUREPOINT_KIND};
pub use mapper::{CityWorkMapper, RecordMapper, RoadAccidentMapper, WeatherObservedMapper};
pub use reconciler::{EntityStore, Headers, ReconcileOutcome, Reconciler};
pub use tracker::ChangeTracker;
