use std::time::Duration;

use crate::runtime::NetworkPolicy;

/// Render-wide defaults, overridable per function via its manifest entry.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub default_timeout: Duration,
    pub default_network_policy: NetworkPolicy,
    pub default_memory_limit_bytes: Option<i64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            default_network_policy: NetworkPolicy::None,
            default_memory_limit_bytes: None,
        }
    }
}
