//! Daemon runtime: per-stream schedulers, status file and signal shutdown.

pub mod config;
mod error;
pub mod paths;
mod runtime;
pub mod scheduler;
pub mod status;
pub mod streams;

pub use config::{Endpoints, IngressConfig};
pub use error::{ConfigError, DaemonError};
pub use runtime::{init_tracing, run, run_once, start_blocking, DaemonOptions, LogFormat};
pub use scheduler::{Scheduler, SchedulerState, StreamStatus};
pub use status::{read_status, DaemonStatus};
pub use streams::{build_stream, build_streams, StreamKind};
