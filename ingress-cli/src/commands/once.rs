//! `ingress-trafikverket once`: one cycle of one stream, report on stdout.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use ingress_core::ChangeCursor;
use ingress_daemon::{init_tracing, run_once, StreamKind};

use super::{ConnectionArgs, GlobalArgs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamArg {
    Weather,
    RoadAccidents,
    CityWorks,
}

impl From<StreamArg> for StreamKind {
    fn from(arg: StreamArg) -> Self {
        match arg {
            StreamArg::Weather => StreamKind::Weather,
            StreamArg::RoadAccidents => StreamKind::RoadAccidents,
            StreamArg::CityWorks => StreamKind::CityWorks,
        }
    }
}

#[derive(Args, Debug)]
pub struct OnceArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Stream to sync.
    #[arg(long, value_enum)]
    pub stream: StreamArg,

    /// Change id to start from; `0` fetches everything. Ignored by city-works.
    #[arg(long, default_value = "0")]
    pub cursor: String,
}

impl OnceArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        init_tracing(global.log_format.into());
        let state_dir = global.state_dir()?;
        let config = self.connection.load_config(&state_dir)?;
        let kind = StreamKind::from(self.stream);

        let report = run_once(
            kind,
            &config,
            &self.connection.endpoints(),
            ChangeCursor::from(self.cursor),
        )
        .with_context(|| format!("{kind} sync cycle failed"))?;

        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to render cycle report JSON")?
        );
        Ok(())
    }
}
