//! `ingress-trafikverket status`: print the daemon's status file.

use anyhow::{bail, Context, Result};
use clap::Args;

use ingress_daemon::paths::status_path;
use ingress_daemon::read_status;

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only report this stream.
    #[arg(long)]
    pub stream: Option<String>,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let state_dir = global.state_dir()?;
        let path = status_path(&state_dir);

        let Some(mut status) = read_status(&state_dir)
            .with_context(|| format!("failed to read {}", path.display()))?
        else {
            let never_started = serde_json::json!({
                "running": false,
                "status_file": path.display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&never_started)?);
            return Ok(());
        };

        if let Some(name) = &self.stream {
            status.streams.retain(|stream| &stream.name == name);
            if status.streams.is_empty() {
                bail!("stream '{name}' is not configured in the running daemon");
            }
        }

        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("failed to render status JSON")?
        );
        Ok(())
    }
}
