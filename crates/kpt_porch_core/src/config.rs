//! Startup configuration: a `#[serde(default)]` struct with free-function
//! defaults, read via `fs-err` and falling back to `Self::default()` when
//! the file is absent.

use camino::Utf8Path;
use kpt_errors::{Error, ErrorKind, OperationContext as _};
use kpt_render::runtime::NetworkPolicy;
use serde::Deserialize;

fn default_cache_directory() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("kpt").join("repos").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".cache/kpt/repos".to_owned())
}

fn default_function_timeout_secs() -> u64 {
    30
}

fn default_reconcile_timeout_secs() -> u64 {
    120
}

fn default_server_side_apply() -> bool {
    true
}

fn default_network_policy() -> NetworkPolicy {
    NetworkPolicy::None
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    #[serde(rename = "cacheDirectory")]
    pub cache_directory: String,
    #[serde(rename = "functionTimeoutSecs")]
    pub function_timeout_secs: u64,
    #[serde(rename = "reconcileTimeoutSecs")]
    pub reconcile_timeout_secs: u64,
    #[serde(rename = "serverSideApply")]
    pub server_side_apply: bool,
    #[serde(rename = "networkPolicy")]
    pub network_policy: NetworkPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            function_timeout_secs: default_function_timeout_secs(),
            reconcile_timeout_secs: default_reconcile_timeout_secs(),
            server_side_apply: default_server_side_apply(),
            network_policy: default_network_policy(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file doesn't exist since every field already has a sensible one.
    pub fn load(path: &Utf8Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs_err::read_to_string(path)
            .map_err(|e| Error::with_source(ErrorKind::Upstream, format!("failed to read config at {path}"), e))
            .op("load orchestrator config")?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::with_source(ErrorKind::InvalidInput, format!("malformed config at {path}"), e))
            .op("load orchestrator config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = OrchestratorConfig::load(Utf8Path::new("/nonexistent/kpt-config.yaml")).unwrap();
        assert_eq!(config.function_timeout_secs, 30);
        assert_eq!(config.reconcile_timeout_secs, 120);
        assert!(config.server_side_apply);
    }

    #[test]
    fn parses_partial_overrides() {
        let yaml = "functionTimeoutSecs: 45\n";
        let config: OrchestratorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.function_timeout_secs, 45);
        assert_eq!(config.reconcile_timeout_secs, 120);
    }
}
