use sea_orm::Set;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::domain::assignment::{can_assign_role, roles};
use crate::domain::error::{DomainError, from_tx};
use crate::infra::storage::entity::principal::{self, PrincipalStatus};

use super::IamService;
use super::roles::ensure_other_super_admin;

impl IamService {
    /// Create a principal holding `role_id` in the current tenant.
    #[tracing::instrument(skip(self, email))]
    pub async fn create_principal(
        &self,
        actor_id: Uuid,
        email: &str,
        role_id: Uuid,
    ) -> Result<principal::Model, DomainError> {
        if !email.contains('@') {
            return Err(DomainError::validation("email", "not a valid address"));
        }

        let actor = self.active_principal(actor_id).await?;
        let actor_role = self.role(actor.role_id).await?;
        let new_role = self.role(role_id).await?;
        if !can_assign_role(&actor_role.name, &new_role.name) {
            tracing::warn!(actor_role = %actor_role.name, target_role = %new_role.name, "principal creation denied");
            return Err(DomainError::Forbidden);
        }

        let created = self
            .conn
            .insert::<principal::Entity>(principal::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(Uuid::nil()), // stamped by the gateway
                role_id: Set(role_id),
                email: Set(email.to_owned()),
                status: Set(PrincipalStatus::Active),
                created_at: Set(OffsetDateTime::now_utc()),
            })
            .await?;

        self.audit
            .record(
                AuditEvent::new(created.tenant_id, actor_id, "principal.created", "principal")
                    .resource(created.id, &created.email)
                    .detail(serde_json::json!({ "role": new_role.name })),
            )
            .await;
        Ok(created)
    }

    /// Soft-delete a principal (`status = deleted`; the row stays while
    /// referenced). Deleting a super-admin runs the last-super-admin check
    /// inside the same serializable transaction as the status flip.
    #[tracing::instrument(skip(self))]
    pub async fn delete_principal(
        &self,
        actor_id: Uuid,
        principal_id: Uuid,
    ) -> Result<(), DomainError> {
        let actor = self.active_principal(actor_id).await?;
        let actor_role = self.role(actor.role_id).await?;
        let target = self.active_principal(principal_id).await?;
        let target_role = self.role(target.role_id).await?;

        if !can_assign_role(&actor_role.name, &target_role.name) {
            tracing::warn!(actor_role = %actor_role.name, target_role = %target_role.name, "principal deletion denied");
            return Err(DomainError::Forbidden);
        }

        if target_role.name == roles::SUPER_ADMIN {
            let super_admin_role_id = target_role.id;
            self.conn
                .transaction_serializable(move |tx| {
                    Box::pin(async move {
                        ensure_other_super_admin(tx, super_admin_role_id, principal_id).await?;
                        mark_deleted(tx, principal_id).await?;
                        Ok(())
                    })
                })
                .await
                .map_err(from_tx)?;
        } else {
            self.conn
                .update_by_id::<principal::Entity>(
                    principal_id,
                    principal::ActiveModel {
                        status: Set(PrincipalStatus::Deleted),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.audit
            .record(
                AuditEvent::new(target.tenant_id, actor_id, "principal.deleted", "principal")
                    .resource(principal_id, &target.email),
            )
            .await;
        Ok(())
    }
}

async fn mark_deleted(
    tx: &stratum_db::ScopedTx<'_>,
    principal_id: Uuid,
) -> Result<(), DomainError> {
    tx.update_by_id::<principal::Entity>(
        principal_id,
        principal::ActiveModel {
            status: Set(PrincipalStatus::Deleted),
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}
