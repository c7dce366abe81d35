//! CLI configuration utilities

use anyhow::{Context, Result};
use rotary_gate_core::GatewayConfig;
use std::path::{Path, PathBuf};

const STATE_DIR_ENV: &str = "ROTARY_GATE_STATE_DIR";
const SESSION_FILE: &str = "session.json";

/// Pick the data directory: the flag, then `ROTARY_GATE_STATE_DIR`, then the
/// platform data dir
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var(STATE_DIR_ENV) {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rotary-gate")
        }
    })
}

/// Where the signed-in session is persisted
pub fn session_file(data_dir: &Path) -> PathBuf {
    data_dir.join(SESSION_FILE)
}

/// Load the gateway configuration from `path`, or from the environment alone
pub fn load_gateway_config(path: Option<&Path>) -> Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => GatewayConfig::from_env().context("loading configuration from environment"),
    }
}

/// A non-zero `--timeout` replaces the configured per-call timeout
pub fn apply_request_timeout(config: &mut GatewayConfig, secs: u64) {
    if secs > 0 {
        config.timeout_secs = Some(secs);
    }
}
