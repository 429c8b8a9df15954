//! Status file.
//!
//! A running daemon rewrites `<state-dir>/status.json` whenever a stream
//! changes state, and once more with `running: false` after the last
//! scheduler has stopped. `ingress-trafikverket status` only reads the file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::error::{io_err, DaemonError};
use crate::paths::status_path;
use crate::scheduler::StreamStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub streams: Vec<StreamStatus>,
}

impl DaemonStatus {
    pub fn stream(&self, name: &str) -> Option<&StreamStatus> {
        self.streams.iter().find(|status| status.name == name)
    }
}

/// Replace the status file. Readers never see a partial document.
pub fn write_status(path: &Path, status: &DaemonStatus) -> Result<(), DaemonError> {
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(status)?;
    fs::write(&tmp, body).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

/// Last status written under `state_dir`, `None` if no daemon ever ran there.
pub fn read_status(state_dir: &Path) -> Result<Option<DaemonStatus>, DaemonError> {
    let path = status_path(state_dir);
    match fs::read(&path) {
        Ok(body) => Ok(Some(serde_json::from_slice(&body)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Write a snapshot on every scheduler status change until all schedulers
/// have dropped their senders, then write the final stopped snapshot.
pub async fn publish_status(
    path: PathBuf,
    started_at: DateTime<Utc>,
    streams: Vec<watch::Receiver<StreamStatus>>,
) -> Result<(), DaemonError> {
    let (changed_tx, mut changed_rx) = mpsc::channel::<()>(16);
    for mut rx in streams.iter().cloned() {
        let changed_tx = changed_tx.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if changed_tx.send(()).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(changed_tx);

    let snapshot = |running: bool| DaemonStatus {
        running,
        pid: std::process::id(),
        started_at,
        updated_at: Utc::now(),
        streams: streams.iter().map(|rx| rx.borrow().clone()).collect(),
    };

    write_status(&path, &snapshot(true))?;
    while changed_rx.recv().await.is_some() {
        write_status(&path, &snapshot(true))?;
    }
    write_status(&path, &snapshot(false))?;
    tracing::debug!(path = %path.display(), "final status written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use ingress_core::ChangeCursor;
    use ingress_sync::CycleReport;

    use super::*;
    use crate::scheduler::SchedulerState;

    fn idle(name: &str) -> StreamStatus {
        StreamStatus {
            name: name.to_string(),
            state: SchedulerState::Idle,
            cursor: ChangeCursor::initial(),
            cycles: 0,
            failed_cycles: 0,
            last_cycle_at: None,
            last_report: None,
            last_error: None,
        }
    }

    #[test]
    fn missing_file_means_never_started() {
        let dir = TempDir::new().expect("state dir");
        assert_eq!(read_status(dir.path()).expect("read"), None);
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = TempDir::new().expect("state dir");
        fs::write(status_path(dir.path()), "{ not json").expect("write");
        assert!(matches!(read_status(dir.path()), Err(DaemonError::Json(_))));
    }

    #[tokio::test]
    async fn publisher_tracks_streams_and_marks_stop() {
        let dir = TempDir::new().expect("state dir");
        let (weather_tx, weather_rx) = watch::channel(idle("weather"));
        let (accidents_tx, accidents_rx) = watch::channel(idle("road-accidents"));
        let started_at = Utc::now();

        let publisher = tokio::spawn(publish_status(
            status_path(dir.path()),
            started_at,
            vec![weather_rx, accidents_rx],
        ));

        weather_tx.send_modify(|s| {
            s.cycles = 1;
            s.cursor = ChangeCursor::from("6790463425413230597");
            s.last_report = Some(CycleReport {
                next_cursor: ChangeCursor::from("6790463425413230597"),
                fetched: 8,
                created: 8,
                ..Default::default()
            });
        });
        accidents_tx.send_modify(|s| {
            s.cycles = 1;
            s.failed_cycles = 1;
            s.last_error = Some("provider transport error: timed out".into());
        });
        drop(weather_tx);
        drop(accidents_tx);

        publisher.await.expect("join").expect("publish");

        let status = read_status(dir.path()).expect("read").expect("status file");
        assert!(!status.running);
        assert_eq!(status.pid, std::process::id());
        assert_eq!(status.started_at, started_at);

        let weather = status.stream("weather").expect("weather");
        assert_eq!(weather.cursor.as_str(), "6790463425413230597");
        assert_eq!(weather.last_report.as_ref().map(|r| r.created), Some(8));

        let accidents = status.stream("road-accidents").expect("accidents");
        assert_eq!(accidents.failed_cycles, 1);
        assert!(status.stream("city-works").is_none());
        assert!(!dir.path().join("status.json.tmp").exists());
    }
}
