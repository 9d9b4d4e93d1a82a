use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use stratum_db::ScopedConn;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::config::IamConfig;
use crate::domain::permission::Permission;

mod permissions;
mod principals;
mod roles;
mod tenants;

pub use tenants::{ProvisionedTenant, SlugDirectory};

/// A role's resolved permission set plus its cache deadline.
struct CachedGrants {
    grants: Arc<HashSet<Permission>>,
    expires_at: Instant,
}

/// The IAM service: permission evaluation, role assignment, principal
/// lifecycle and tenant provisioning. One shared instance serves all
/// requests; per-tenant behavior comes from the ambient context, never
/// from service state.
pub struct IamService {
    conn: Arc<ScopedConn>,
    audit: Arc<dyn AuditSink>,
    config: IamConfig,
    grant_cache: DashMap<Uuid, CachedGrants>,
}

impl IamService {
    pub fn new(conn: Arc<ScopedConn>, audit: Arc<dyn AuditSink>, config: IamConfig) -> Self {
        Self {
            conn,
            audit,
            config,
            grant_cache: DashMap::new(),
        }
    }

    fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config.role_cache_ttl_secs)
    }

    /// Drop the cached grant set for a role. Called on every mutation that
    /// can change what the role grants.
    fn invalidate_role(&self, role_id: Uuid) {
        self.grant_cache.remove(&role_id);
    }
}
