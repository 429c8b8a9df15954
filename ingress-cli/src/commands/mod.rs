//! Subcommand implementations and the arguments they share.

pub mod once;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use ingress_daemon::paths::{config_path, default_state_dir};
use ingress_daemon::{Endpoints, IngressConfig, LogFormat};

/// Options accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding the config file and the daemon status file.
    #[arg(long, global = true, env = "INGRESS_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

impl GlobalArgs {
    /// `--state-dir`, else `~/.ingress-trafikverket`.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let home = dirs::home_dir().context("could not determine home directory")?;
                Ok(default_state_dir(&home))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Provider and broker endpoints plus the optional config file.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Trafikverket API authentication key.
    #[arg(long, env = "TFV_API_AUTH_KEY", hide_env_values = true)]
    pub auth_key: String,

    /// Trafikverket API endpoint, e.g. https://api.trafikinfo.trafikverket.se/v2/data.json
    #[arg(long, env = "TFV_API_URL")]
    pub api_url: String,

    /// NGSI-LD context broker base URL.
    #[arg(long, env = "CONTEXT_BROKER_URL")]
    pub broker_url: String,

    /// YAML config file. Defaults to `<state-dir>/config.yaml` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            api_url: self.api_url.clone(),
            auth_key: self.auth_key.clone(),
            broker_url: self.broker_url.clone(),
        }
    }

    /// An explicit `--config` must exist; the default location may not.
    pub fn load_config(&self, state_dir: &Path) -> Result<IngressConfig> {
        match &self.config {
            Some(path) => IngressConfig::load_at(path)
                .with_context(|| format!("failed to load config {}", path.display())),
            None => {
                let path = config_path(state_dir);
                IngressConfig::load_or_default(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))
            }
        }
    }
}
