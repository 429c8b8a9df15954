//! Per-stream polling scheduler.
//!
//! One scheduler owns one stream. Cycles run on the blocking pool and are
//! awaited inline, so two cycles of the same stream never overlap. Shutdown
//! is checked between cycles only; a cycle in flight always completes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use ingress_core::ChangeCursor;
use ingress_sync::{CycleReport, SyncCycle};

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub name: String,
    pub state: SchedulerState,
    pub cursor: ChangeCursor,
    pub cycles: u64,
    pub failed_cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
}

pub struct Scheduler {
    stream: Box<dyn SyncCycle>,
    interval: Duration,
    status: watch::Sender<StreamStatus>,
}

impl Scheduler {
    pub fn new(stream: Box<dyn SyncCycle>, interval: Duration) -> Self {
        let (status, _) = watch::channel(StreamStatus {
            name: stream.name().to_string(),
            state: SchedulerState::Idle,
            cursor: stream.cursor().clone(),
            cycles: 0,
            failed_cycles: 0,
            last_cycle_at: None,
            last_report: None,
            last_error: None,
        });
        Self {
            stream,
            interval,
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    /// Tick until `shutdown` fires, then return the final status.
    pub async fn run(
        self,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<StreamStatus, DaemonError> {
        let Scheduler {
            mut stream,
            interval,
            status,
        } = self;
        let name = stream.name().to_string();

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(stream = %name, interval_secs = interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            status.send_modify(|s| s.state = SchedulerState::Running);

            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = stream.tick();
                (stream, result)
            })
            .await
            .map_err(|err| DaemonError::Task {
                task: name.clone(),
                reason: err.to_string(),
            })?;
            stream = returned;

            let cursor = stream.cursor().clone();
            status.send_modify(|s| {
                s.state = SchedulerState::Idle;
                s.cursor = cursor;
                s.cycles += 1;
                s.last_cycle_at = Some(Utc::now());
                match result {
                    Ok(report) => {
                        s.last_report = Some(report);
                        s.last_error = None;
                    }
                    Err(err) => {
                        s.failed_cycles += 1;
                        s.last_error = Some(err.to_string());
                    }
                }
            });
        }

        status.send_modify(|s| s.state = SchedulerState::Stopped);
        let last = status.borrow().clone();
        tracing::info!(
            stream = %name,
            cursor = %last.cursor,
            cycles = last.cycles,
            "scheduler stopped",
        );
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use ingress_sync::{ProviderError, SyncError};
    use tokio::time::Instant;

    use super::*;

    /// Advances the cursor by one per tick; fails on the ticks listed.
    struct CountingCycle {
        ticks: Arc<AtomicUsize>,
        fail_on: Vec<usize>,
        cursor: ChangeCursor,
    }

    impl CountingCycle {
        fn new(ticks: Arc<AtomicUsize>, fail_on: Vec<usize>) -> Self {
            Self {
                ticks,
                fail_on,
                cursor: ChangeCursor::initial(),
            }
        }
    }

    impl SyncCycle for CountingCycle {
        fn name(&self) -> &str {
            "counting"
        }

        fn cursor(&self) -> &ChangeCursor {
            &self.cursor
        }

        fn tick(&mut self) -> Result<CycleReport, SyncError> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&n) {
                return Err(SyncError::Provider(ProviderError::Transport(
                    "timed out".into(),
                )));
            }
            self.cursor = ChangeCursor::from(n.to_string());
            Ok(CycleReport {
                next_cursor: self.cursor.clone(),
                ..Default::default()
            })
        }
    }

    async fn wait_for_cycles(status: &mut watch::Receiver<StreamStatus>, cycles: u64) {
        while status.borrow().cycles < cycles {
            status.changed().await.expect("scheduler alive");
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn ticks_on_interval_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(
            Box::new(CountingCycle::new(ticks.clone(), vec![])),
            Duration::from_secs(30),
        );
        let mut status = scheduler.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let started = Instant::now();
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        wait_for_cycles(&mut status, 1).await;
        assert!(started.elapsed() < Duration::from_secs(30));

        wait_for_cycles(&mut status, 3).await;
        assert!(started.elapsed() >= Duration::from_secs(60));

        shutdown_tx.send(()).expect("send shutdown");
        let last = handle.await.expect("join").expect("run");

        assert_eq!(last.state, SchedulerState::Stopped);
        assert_eq!(last.cycles, ticks.load(Ordering::SeqCst) as u64);
        assert_eq!(last.cursor, ChangeCursor::from(last.cycles.to_string()));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn failed_cycle_keeps_cursor_and_records_error() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(
            Box::new(CountingCycle::new(ticks, vec![2])),
            Duration::from_secs(30),
        );
        let mut status = scheduler.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        wait_for_cycles(&mut status, 2).await;
        {
            let snapshot = status.borrow();
            assert_eq!(snapshot.state, SchedulerState::Idle);
            assert_eq!(snapshot.cursor, ChangeCursor::from("1"));
            assert_eq!(snapshot.failed_cycles, 1);
            assert!(snapshot
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("timed out")));
        }

        wait_for_cycles(&mut status, 3).await;
        assert_eq!(status.borrow().cursor, ChangeCursor::from("3"));
        assert!(status.borrow().last_error.is_none());

        shutdown_tx.send(()).expect("send shutdown");
        handle.await.expect("join").expect("run");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn pending_shutdown_wins_over_first_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(
            Box::new(CountingCycle::new(ticks.clone(), vec![])),
            Duration::from_secs(30),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).expect("send shutdown");

        let last = scheduler.run(shutdown_rx).await.expect("run");

        assert_eq!(last.state, SchedulerState::Stopped);
        assert_eq!(last.cycles, 0);
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
