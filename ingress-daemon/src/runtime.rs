//! Daemon runtime: one scheduler per enabled stream, the status publisher
//! and signal-driven shutdown.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};

use ingress_core::ChangeCursor;
use ingress_sync::CycleReport;

use crate::config::{Endpoints, IngressConfig};
use crate::error::{io_err, DaemonError};
use crate::paths::status_path;
use crate::scheduler::{Scheduler, StreamStatus};
use crate::status::publish_status;
use crate::streams::{build_stream, build_streams, StreamKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Everything `run` needs to start the streams.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub state_dir: PathBuf,
    pub config: IngressConfig,
    pub endpoints: Endpoints,
}

/// Start the daemon runtime and block the current thread until it exits.
/// Tracing must already be initialised.
pub fn start_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run a single cycle of one stream on the calling thread.
pub fn run_once(
    kind: StreamKind,
    config: &IngressConfig,
    endpoints: &Endpoints,
    cursor: ChangeCursor,
) -> Result<CycleReport, DaemonError> {
    let mut stream = build_stream(kind, config, endpoints, cursor);
    Ok(stream.tick()?)
}

/// Poll every enabled stream until SIGINT or SIGTERM, or until a scheduler
/// fails. In-flight cycles finish before this returns.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let DaemonOptions {
        state_dir,
        config,
        endpoints,
    } = options;
    config.validate()?;
    fs::create_dir_all(&state_dir).map_err(|e| io_err(&state_dir, e))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let mut schedulers = JoinSet::new();
    let mut receivers = Vec::new();
    for stream in build_streams(&config, &endpoints) {
        let scheduler = Scheduler::new(stream, config.poll_interval());
        receivers.push(scheduler.subscribe());
        schedulers.spawn(scheduler.run(shutdown_tx.subscribe()));
    }
    let publisher = tokio::spawn(publish_status(
        status_path(&state_dir),
        Utc::now(),
        receivers,
    ));

    tracing::info!(
        state_dir = %state_dir.display(),
        streams = schedulers.len(),
        interval_secs = config.poll_interval_secs,
        "daemon started",
    );

    let mut first_error = None;
    tokio::select! {
        signal = shutdown_signal() => match signal {
            Ok(name) => tracing::info!(signal = name, "shutting down"),
            Err(err) => {
                tracing::error!(error = %err, "shutting down");
                first_error = Some(err);
            }
        },
        Some(joined) = schedulers.join_next() => note_stopped(joined, &mut first_error),
    }

    let _ = shutdown_tx.send(());
    while let Some(joined) = schedulers.join_next().await {
        note_stopped(joined, &mut first_error);
    }

    match publisher.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            first_error.get_or_insert(err);
        }
        Err(err) => {
            first_error.get_or_insert(task_failed("status", err));
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn note_stopped(
    joined: Result<Result<StreamStatus, DaemonError>, JoinError>,
    first_error: &mut Option<DaemonError>,
) {
    match joined {
        Ok(Ok(status)) => tracing::info!(
            stream = %status.name,
            cursor = %status.cursor,
            cycles = status.cycles,
            failed_cycles = status.failed_cycles,
            "stream stopped",
        ),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "stream failed");
            first_error.get_or_insert(err);
        }
        Err(err) => {
            first_error.get_or_insert(task_failed("scheduler", err));
        }
    }
}

fn task_failed(task: &str, err: JoinError) -> DaemonError {
    DaemonError::Task {
        task: task.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT").map_err(DaemonError::Signal),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map(|()| "ctrl-c")
        .map_err(DaemonError::Signal)
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
