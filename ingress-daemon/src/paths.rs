use std::path::{Path, PathBuf};

pub const STATE_DIR_NAME: &str = ".ingress-trafikverket";
pub const CONFIG_FILE: &str = "config.yaml";
pub const STATUS_FILE: &str = "status.json";

pub fn default_state_dir(home: &Path) -> PathBuf {
    home.join(STATE_DIR_NAME)
}

pub fn config_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_FILE)
}

/// Written by a running daemon after every cycle.
pub fn status_path(state_dir: &Path) -> PathBuf {
    state_dir.join(STATUS_FILE)
}
