use serde::{Deserialize, Serialize};

/// Configuration for the `tenant_resolver` module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Apex domain tenants get subdomains of (e.g. `stratum.app` for
    /// `acme.stratum.app`).
    #[serde(default = "default_apex_domain")]
    pub apex_domain: String,

    /// Honor the `x-stratum-tenant-id` header. Only enable on listeners
    /// that exclusively receive server-to-server traffic; the header is
    /// trivially spoofable from the public internet.
    #[serde(default)]
    pub trust_internal_header: bool,

    /// Subdomains that never resolve to a tenant.
    #[serde(default = "default_reserved_subdomains")]
    pub reserved_subdomains: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            apex_domain: default_apex_domain(),
            trust_internal_header: false,
            reserved_subdomains: default_reserved_subdomains(),
        }
    }
}

fn default_apex_domain() -> String {
    "stratum.app".to_owned()
}

fn default_reserved_subdomains() -> Vec<String> {
    ["www", "api", "app", "admin", "status", "docs"]
        .map(str::to_owned)
        .to_vec()
}
