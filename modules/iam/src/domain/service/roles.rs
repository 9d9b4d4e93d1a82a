use sea_orm::{ColumnTrait, Condition, Set};
use stratum_db::ScopedTx;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::domain::assignment::{can_assign_role, roles};
use crate::domain::error::{DomainError, from_tx};
use crate::domain::permission::Permission;
use crate::infra::storage::entity::principal::{self, PrincipalStatus};
use crate::infra::storage::entity::role;

use super::IamService;

impl IamService {
    /// Create a custom tenant-local role with no grants. Use
    /// [`update_role_permissions`](Self::update_role_permissions) to give
    /// it capabilities.
    #[tracing::instrument(skip(self))]
    pub async fn create_role(&self, actor_id: Uuid, name: &str) -> Result<role::Model, DomainError> {
        self.assert_can(actor_id, &Permission::new("role", "manage", "tenant"))
            .await?;

        if name.is_empty() || name.len() > 64 {
            return Err(DomainError::validation("name", "must be 1-64 characters"));
        }
        let clash = self
            .conn
            .find_one::<role::Entity>(Condition::all().add(role::Column::Name.eq(name)))
            .await?;
        if clash.is_some() {
            return Err(DomainError::validation("name", "already in use"));
        }

        let actor = self.active_principal(actor_id).await?;
        let created = self
            .conn
            .insert::<role::Entity>(role::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(Uuid::nil()), // stamped by the gateway
                name: Set(name.to_owned()),
                is_system: Set(false),
                created_at: Set(OffsetDateTime::now_utc()),
            })
            .await?;

        self.audit
            .record(
                AuditEvent::new(actor.tenant_id, actor_id, "role.created", "role")
                    .resource(created.id, &created.name),
            )
            .await;
        Ok(created)
    }
    /// Assign `role_id` to a principal.
    ///
    /// The actor must be allowed by the capability matrix to assign both
    /// the new role and the role being taken away (an admin cannot strip
    /// someone of super-admin by "assigning" them admin). When the change
    /// demotes a super-admin, the last-super-admin check runs inside the
    /// same serializable transaction as the update, so two concurrent
    /// demotions cannot both see a survivor and race the tenant to zero.
    #[tracing::instrument(skip(self))]
    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        principal_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), DomainError> {
        let actor = self.active_principal(actor_id).await?;
        let actor_role = self.role(actor.role_id).await?;
        let target = self.active_principal(principal_id).await?;
        let current_role = self.role(target.role_id).await?;
        let new_role = self.role(role_id).await?;

        if !can_assign_role(&actor_role.name, &new_role.name)
            || !can_assign_role(&actor_role.name, &current_role.name)
        {
            tracing::warn!(
                actor_role = %actor_role.name,
                from = %current_role.name,
                to = %new_role.name,
                "role assignment denied by capability matrix"
            );
            return Err(DomainError::Forbidden);
        }

        let demotes_super_admin =
            current_role.name == roles::SUPER_ADMIN && new_role.name != roles::SUPER_ADMIN;

        if demotes_super_admin {
            let super_admin_role_id = current_role.id;
            self.conn
                .transaction_serializable(move |tx| {
                    Box::pin(async move {
                        ensure_other_super_admin(tx, super_admin_role_id, principal_id).await?;
                        apply_role(tx, principal_id, role_id).await?;
                        Ok(())
                    })
                })
                .await
                .map_err(from_tx)?;
        } else {
            let change = principal::ActiveModel {
                role_id: Set(role_id),
                ..Default::default()
            };
            self.conn
                .update_by_id::<principal::Entity>(principal_id, change)
                .await?;
        }

        self.audit
            .record(
                AuditEvent::new(target.tenant_id, actor_id, "role.assigned", "principal")
                    .resource(principal_id, &target.email)
                    .detail(serde_json::json!({
                        "previous_role": current_role.name,
                        "new_role": new_role.name,
                    })),
            )
            .await;
        Ok(())
    }
}

async fn apply_role(
    tx: &ScopedTx<'_>,
    principal_id: Uuid,
    role_id: Uuid,
) -> Result<(), DomainError> {
    let change = principal::ActiveModel {
        role_id: Set(role_id),
        ..Default::default()
    };
    tx.update_by_id::<principal::Entity>(principal_id, change)
        .await?;
    Ok(())
}

/// Count active super-admins other than `excluded_principal_id`; zero
/// means the pending demotion/deletion would strand the tenant.
pub(super) async fn ensure_other_super_admin(
    tx: &ScopedTx<'_>,
    super_admin_role_id: Uuid,
    excluded_principal_id: Uuid,
) -> Result<(), DomainError> {
    let others = tx
        .count::<principal::Entity>(Some(
            Condition::all()
                .add(principal::Column::RoleId.eq(super_admin_role_id))
                .add(principal::Column::Status.eq(PrincipalStatus::Active))
                .add(principal::Column::Id.ne(excluded_principal_id)),
        ))
        .await?;
    if others == 0 {
        return Err(DomainError::InvariantViolation);
    }
    Ok(())
}
