use serde::{Deserialize, Serialize};

/// Configuration for the `iam` module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IamConfig {
    /// How long a role's resolved permission set may be served from cache.
    /// Mutations invalidate eagerly; the TTL only bounds staleness across
    /// processes that missed an invalidation.
    #[serde(default = "default_role_cache_ttl_secs")]
    pub role_cache_ttl_secs: u64,
}

impl Default for IamConfig {
    fn default() -> Self {
        Self {
            role_cache_ttl_secs: default_role_cache_ttl_secs(),
        }
    }
}

fn default_role_cache_ttl_secs() -> u64 {
    30
}
