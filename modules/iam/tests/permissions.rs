//! Permission evaluation: wildcard grants, the grant cache, and denial
//! behavior.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{ctx, setup};
use iam::domain::assignment::roles;
use iam::{DomainError, Permission};
use stratum_security::tenant_scope;

#[tokio::test]
async fn super_admin_wildcard_grants_everything() {
    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        for perm in [
            Permission::new("record", "read", "tenant"),
            Permission::new("role", "manage", "tenant"),
            Permission::new("anything", "whatsoever", "anywhere"),
        ] {
            assert!(h.svc.can(p1, &perm).await.expect("can"), "{perm} denied");
        }
        h.svc
            .assert_can(p1, &Permission::new("principal", "manage", "tenant"))
            .await
            .expect("assert_can");
    })
    .await;
}

#[tokio::test]
async fn member_grants_are_exact_triples() {
    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;
    let member = acme.role_named(roles::MEMBER).expect("role").id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        let p2 = h.svc.create_principal(p1, "p2@acme.test", member).await.expect("p2");

        assert!(h.svc.can(p2.id, &Permission::new("record", "read", "tenant")).await.expect("can"));
        assert!(h.svc.can(p2.id, &Permission::new("record", "write", "own")).await.expect("can"));
        // same resource/action, wider scope: not granted
        assert!(!h.svc.can(p2.id, &Permission::new("record", "write", "tenant")).await.expect("can"));
        assert!(!h.svc.can(p2.id, &Permission::new("role", "manage", "tenant")).await.expect("can"));

        let err = h
            .svc
            .assert_can(p2.id, &Permission::new("role", "manage", "tenant"))
            .await
            .expect_err("member managing roles");
        assert!(matches!(err, DomainError::Forbidden));
        // the denied capability stays out of the user-facing message
        assert!(!err.to_string().contains("role"));
    })
    .await;
}

#[tokio::test]
async fn grant_mutations_invalidate_the_cache() {
    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        let support = h.svc.create_role(p1, "SUPPORT").await.expect("role");
        h.svc
            .update_role_permissions(
                p1,
                support.id,
                vec![Permission::new("ticket", "resolve", "own")],
            )
            .await
            .expect("grant");

        let p2 = h.svc.create_principal(p1, "s@acme.test", support.id).await.expect("p2");
        let resolve = Permission::new("ticket", "resolve", "own");

        // first call populates the cache
        assert!(h.svc.can(p2.id, &resolve).await.expect("can"));

        // revoking must take effect immediately, TTL notwithstanding
        h.svc
            .update_role_permissions(p1, support.id, vec![])
            .await
            .expect("revoke");
        assert!(!h.svc.can(p2.id, &resolve).await.expect("can"));
    })
    .await;
}

#[tokio::test]
async fn repeated_grants_in_one_update_cannot_corrupt_the_role() {
    use iam::infra::storage::entity::role_permission;
    use sea_orm::{ColumnTrait, Condition};

    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        let support = h.svc.create_role(p1, "SUPPORT").await.expect("role");
        let resolve = Permission::new("ticket", "resolve", "own");
        let p2 = h.svc.create_principal(p1, "s@acme.test", support.id).await.expect("p2");

        // the same triple listed twice collapses to one link row instead
        // of failing halfway through the grant swap
        h.svc
            .update_role_permissions(p1, support.id, vec![resolve.clone(), resolve.clone()])
            .await
            .expect("grant");

        let links = h
            .conn
            .count::<role_permission::Entity>(Some(
                Condition::all().add(role_permission::Column::RoleId.eq(support.id)),
            ))
            .await
            .expect("count");
        assert_eq!(links, 1);
        assert!(h.svc.can(p2.id, &resolve).await.expect("can"));

        // the evaluator never answers from grants the store no longer holds
        h.svc.update_role_permissions(p1, support.id, vec![]).await.expect("revoke");
        assert_eq!(
            h.conn
                .count::<role_permission::Entity>(Some(
                    Condition::all().add(role_permission::Column::RoleId.eq(support.id)),
                ))
                .await
                .expect("count"),
            0
        );
        assert!(!h.svc.can(p2.id, &resolve).await.expect("can"));
    })
    .await;
}

#[tokio::test]
async fn system_roles_cannot_be_redefined() {
    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;
    let admin = acme.role_named(roles::ADMIN).expect("role").id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        let err = h
            .svc
            .update_role_permissions(p1, admin, vec![Permission::wildcard()])
            .await
            .expect_err("redefining a system role");
        assert_eq!(err.code(), "VALIDATION");
    })
    .await;
}

#[tokio::test]
async fn deleted_principals_hold_no_permissions() {
    let h = setup().await;
    let acme = h.svc.provision_tenant("acme", "p1@acme.test").await.expect("provision");
    let p1 = acme.owner.id;
    let member = acme.role_named(roles::MEMBER).expect("role").id;

    tenant_scope(ctx(acme.tenant.id, p1), async {
        let p2 = h.svc.create_principal(p1, "p2@acme.test", member).await.expect("p2");
        h.svc.delete_principal(p1, p2.id).await.expect("delete");

        let err = h
            .svc
            .can(p2.id, &Permission::new("record", "read", "tenant"))
            .await
            .expect_err("deleted principal");
        assert!(matches!(err, DomainError::NotFound { .. }));
    })
    .await;
}
