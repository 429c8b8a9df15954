//! `ingress-trafikverket run`: foreground daemon.

use anyhow::{Context, Result};
use clap::Args;

use ingress_daemon::{init_tracing, start_blocking, DaemonOptions};

use super::{ConnectionArgs, GlobalArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        init_tracing(global.log_format.into());
        let state_dir = global.state_dir()?;
        let config = self.connection.load_config(&state_dir)?;

        let options = DaemonOptions {
            state_dir,
            config,
            endpoints: self.connection.endpoints(),
        };
        start_blocking(options).context("daemon exited with error")
    }
}
