use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition, Set};
use stratum_security::{SecurityContext, tenant_scope};
use tenant_resolver::TenantDirectory;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::domain::assignment::roles;
use crate::domain::error::DomainError;
use crate::domain::permission::Permission;
use crate::infra::storage::entity::principal::{self, PrincipalStatus};
use crate::infra::storage::entity::tenant::{self, TenantStatus};
use crate::infra::storage::entity::{role, role_permission};

use super::IamService;

/// Grant templates for the per-tenant system roles. Instantiated as fresh
/// role rows for every tenant at provisioning (invariant: system roles are
/// per-tenant copies, not shared singletons).
const SYSTEM_ROLE_TEMPLATES: &[(&str, &[(&str, &str, &str)])] = &[
    (roles::SUPER_ADMIN, &[("*", "*", "*")]),
    (
        roles::ADMIN,
        &[
            ("principal", "manage", "tenant"),
            ("role", "manage", "tenant"),
            ("record", "read", "tenant"),
            ("record", "write", "tenant"),
        ],
    ),
    (
        roles::MEMBER,
        &[("record", "read", "tenant"), ("record", "write", "own")],
    ),
];

/// Everything created by a successful provisioning run.
#[derive(Debug)]
pub struct ProvisionedTenant {
    pub tenant: tenant::Model,
    pub owner: principal::Model,
    pub system_roles: Vec<role::Model>,
}

impl ProvisionedTenant {
    /// Convenience accessor for the tenant's system role by name.
    #[must_use]
    pub fn role_named(&self, name: &str) -> Option<&role::Model> {
        self.system_roles.iter().find(|r| r.name == name)
    }
}

impl IamService {
    /// Create a tenant with its system roles, their grants, and the
    /// founding super-admin principal.
    ///
    /// Runs before any context for the new tenant can exist, so it binds
    /// one itself: the tenant row is created unscoped, then everything
    /// tenant-owned is written inside a scope for the fresh tenant ID.
    #[tracing::instrument(skip(self, owner_email))]
    pub async fn provision_tenant(
        &self,
        slug: &str,
        owner_email: &str,
    ) -> Result<ProvisionedTenant, DomainError> {
        validate_slug(slug)?;
        if !owner_email.contains('@') {
            return Err(DomainError::validation("owner_email", "not a valid address"));
        }

        let taken = self
            .conn
            .find_one::<tenant::Entity>(Condition::all().add(tenant::Column::Slug.eq(slug)))
            .await?;
        if taken.is_some() {
            return Err(DomainError::validation("slug", "already in use"));
        }

        let tenant = self
            .conn
            .insert::<tenant::Entity>(tenant::ActiveModel {
                id: Set(Uuid::new_v4()),
                slug: Set(slug.to_owned()),
                status: Set(TenantStatus::Active),
                created_at: Set(OffsetDateTime::now_utc()),
            })
            .await?;

        let owner_id = Uuid::new_v4();
        let provisioning_ctx = SecurityContext::builder()
            .principal_id(owner_id)
            .tenant_id(tenant.id)
            .role_name(roles::SUPER_ADMIN)
            .build();

        let (system_roles, owner) = tenant_scope(provisioning_ctx, async {
            let mut system_roles = Vec::with_capacity(SYSTEM_ROLE_TEMPLATES.len());
            for (name, grants) in SYSTEM_ROLE_TEMPLATES {
                let created = self
                    .conn
                    .insert::<role::Entity>(role::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        tenant_id: Set(Uuid::nil()), // stamped by the gateway
                        name: Set((*name).to_owned()),
                        is_system: Set(true),
                        created_at: Set(OffsetDateTime::now_utc()),
                    })
                    .await?;
                for (resource, action, scope) in *grants {
                    let permission_id = self
                        .ensure_permission(&Permission::new(*resource, *action, *scope))
                        .await?;
                    self.conn
                        .insert::<role_permission::Entity>(role_permission::ActiveModel {
                            role_id: Set(created.id),
                            permission_id: Set(permission_id),
                        })
                        .await?;
                }
                system_roles.push(created);
            }

            let super_admin_role = system_roles
                .iter()
                .find(|r| r.name == roles::SUPER_ADMIN)
                .ok_or(DomainError::not_found("super-admin role"))?;

            let owner = self
                .conn
                .insert::<principal::Entity>(principal::ActiveModel {
                    id: Set(owner_id),
                    tenant_id: Set(Uuid::nil()), // stamped by the gateway
                    role_id: Set(super_admin_role.id),
                    email: Set(owner_email.to_owned()),
                    status: Set(PrincipalStatus::Active),
                    created_at: Set(OffsetDateTime::now_utc()),
                })
                .await?;

            Ok::<_, DomainError>((system_roles, owner))
        })
        .await?;

        self.audit
            .record(
                AuditEvent::new(tenant.id, owner.id, "tenant.provisioned", "tenant")
                    .resource(tenant.id, &tenant.slug)
                    .detail(serde_json::json!({ "owner": owner.email })),
            )
            .await;

        Ok(ProvisionedTenant {
            tenant,
            owner,
            system_roles,
        })
    }
}

fn validate_slug(slug: &str) -> Result<(), DomainError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= 63
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::validation(
            "slug",
            "must be 1-63 lowercase alphanumeric characters or hyphens",
        ))
    }
}

/// Tenant slug lookup for the resolver, backed by the tenant table.
/// Unscoped by design: resolution happens before any context exists.
pub struct SlugDirectory {
    conn: Arc<stratum_db::ScopedConn>,
}

impl SlugDirectory {
    #[must_use]
    pub fn new(conn: Arc<stratum_db::ScopedConn>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TenantDirectory for SlugDirectory {
    async fn tenant_by_slug(&self, slug: &str) -> Option<Uuid> {
        let lookup = self
            .conn
            .find_one::<tenant::Entity>(
                Condition::all()
                    .add(tenant::Column::Slug.eq(slug))
                    .add(tenant::Column::Status.eq(TenantStatus::Active)),
            )
            .await;
        match lookup {
            Ok(found) => found.map(|t| t.id),
            Err(e) => {
                tracing::error!(error = %e, slug, "tenant slug lookup failed");
                None
            }
        }
    }
}
