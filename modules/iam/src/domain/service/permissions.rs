use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use sea_orm::{ColumnTrait, Condition};
use uuid::Uuid;

use crate::domain::error::{DomainError, from_tx};
use crate::domain::permission::Permission;
use crate::infra::storage::entity::principal::{self, PrincipalStatus};
use crate::infra::storage::entity::{permission, role, role_permission};

use super::{CachedGrants, IamService};

impl IamService {
    /// Whether the principal's role grants `permission`, either exactly or
    /// through the wildcard-all triple.
    pub async fn can(
        &self,
        principal_id: Uuid,
        permission: &Permission,
    ) -> Result<bool, DomainError> {
        let principal = self.active_principal(principal_id).await?;
        let grants = self.role_grants(principal.role_id).await?;
        Ok(grants.contains(&Permission::wildcard()) || grants.contains(permission))
    }

    /// Like [`can`](Self::can), failing with [`DomainError::Forbidden`] on
    /// denial. The denied capability stays in the logs only.
    pub async fn assert_can(
        &self,
        principal_id: Uuid,
        permission: &Permission,
    ) -> Result<(), DomainError> {
        if self.can(principal_id, permission).await? {
            Ok(())
        } else {
            tracing::warn!(%principal_id, %permission, "permission denied");
            Err(DomainError::Forbidden)
        }
    }

    /// Load a principal within the current tenant scope. Deleted
    /// principals (and principals of other tenants) read as missing.
    pub(super) async fn active_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<principal::Model, DomainError> {
        let principal = self
            .conn
            .find_by_id::<principal::Entity>(principal_id)
            .await?
            .ok_or(DomainError::not_found("principal"))?;
        if principal.status != PrincipalStatus::Active {
            return Err(DomainError::not_found("principal"));
        }
        Ok(principal)
    }

    /// Load a role within the current tenant scope.
    pub(super) async fn role(&self, role_id: Uuid) -> Result<role::Model, DomainError> {
        self.conn
            .find_by_id::<role::Entity>(role_id)
            .await?
            .ok_or(DomainError::not_found("role"))
    }

    /// The role's permission set, cached per role ID with a TTL and
    /// invalidated eagerly on grant mutation.
    async fn role_grants(&self, role_id: Uuid) -> Result<Arc<HashSet<Permission>>, DomainError> {
        if let Some(cached) = self.grant_cache.get(&role_id)
            && cached.expires_at > Instant::now()
        {
            return Ok(Arc::clone(&cached.grants));
        }

        let links = self
            .conn
            .find_many::<role_permission::Entity>(Some(
                Condition::all().add(role_permission::Column::RoleId.eq(role_id)),
            ))
            .await?;
        let permission_ids: Vec<Uuid> = links.iter().map(|l| l.permission_id).collect();

        let grants: HashSet<Permission> = if permission_ids.is_empty() {
            HashSet::new()
        } else {
            self.conn
                .find_many::<permission::Entity>(Some(
                    Condition::all().add(permission::Column::Id.is_in(permission_ids)),
                ))
                .await?
                .into_iter()
                .map(|m| Permission::new(m.resource, m.action, m.scope))
                .collect()
        };

        let grants = Arc::new(grants);
        self.grant_cache.insert(
            role_id,
            CachedGrants {
                grants: Arc::clone(&grants),
                expires_at: Instant::now() + self.cache_ttl(),
            },
        );
        Ok(grants)
    }

    /// Replace a role's grants with `grants`. The actor needs the
    /// role-management capability; system roles cannot be redefined.
    #[tracing::instrument(skip(self, grants), fields(%actor_id, %role_id))]
    pub async fn update_role_permissions(
        &self,
        actor_id: Uuid,
        role_id: Uuid,
        grants: Vec<Permission>,
    ) -> Result<(), DomainError> {
        self.assert_can(actor_id, &Permission::new("role", "manage", "tenant"))
            .await?;

        let role = self.role(role_id).await?;
        if role.is_system {
            return Err(DomainError::validation(
                "role_id",
                "system roles cannot be redefined",
            ));
        }

        // repeated triples collapse to one link row
        let mut permission_ids = Vec::with_capacity(grants.len());
        for grant in &grants {
            let permission_id = self.ensure_permission(grant).await?;
            if !permission_ids.contains(&permission_id) {
                permission_ids.push(permission_id);
            }
        }

        // one transaction, so a failed insert cannot leave the role
        // half-stripped; the cache is dropped even on failure
        let swapped = self
            .conn
            .transaction(move |tx| {
                Box::pin(async move {
                    tx.delete_many::<role_permission::Entity>(Some(
                        Condition::all().add(role_permission::Column::RoleId.eq(role_id)),
                    ))
                    .await?;
                    tx.insert_many::<role_permission::Entity, _>(permission_ids.into_iter().map(
                        |permission_id| role_permission::ActiveModel {
                            role_id: sea_orm::Set(role_id),
                            permission_id: sea_orm::Set(permission_id),
                        },
                    ))
                    .await?;
                    Ok(())
                })
            })
            .await;
        self.invalidate_role(role_id);
        swapped.map_err(from_tx)?;

        let actor = self.active_principal(actor_id).await?;
        self.audit
            .record(
                crate::audit::AuditEvent::new(
                    actor.tenant_id,
                    actor_id,
                    "role.permissions_updated",
                    "role",
                )
                .resource(role_id, &role.name)
                .detail(serde_json::json!({
                    "grants": grants.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })),
            )
            .await;
        Ok(())
    }

    /// Find or create a catalog row for the triple.
    pub(super) async fn ensure_permission(
        &self,
        permission: &Permission,
    ) -> Result<Uuid, DomainError> {
        let existing = self
            .conn
            .find_one::<permission::Entity>(
                Condition::all()
                    .add(permission::Column::Resource.eq(permission.resource.as_str()))
                    .add(permission::Column::Action.eq(permission.action.as_str()))
                    .add(permission::Column::Scope.eq(permission.scope.as_str())),
            )
            .await?;
        if let Some(row) = existing {
            return Ok(row.id);
        }
        let created = self
            .conn
            .insert::<permission::Entity>(permission::ActiveModel {
                id: sea_orm::Set(Uuid::new_v4()),
                resource: sea_orm::Set(permission.resource.clone()),
                action: sea_orm::Set(permission.action.clone()),
                scope: sea_orm::Set(permission.scope.clone()),
            })
            .await?;
        Ok(created.id)
    }
}
