#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition, ConnectOptions, ConnectionTrait, Database, DbBackend, Schema};
use stratum_db::ScopedConn;
use stratum_security::SecurityContext;
use uuid::Uuid;

use iam::audit::{AuditEvent, AuditSink};
use iam::infra::storage::entity::principal::{self, PrincipalStatus};
use iam::infra::storage::entity::{permission, role, role_permission, tenant};
use iam::{IamConfig, IamService};

/// Sink that keeps every event in memory for assertions.
pub struct CollectingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("sink lock").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for CollectingSink {
    async fn record(&self, event: AuditEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}

pub struct Harness {
    pub conn: Arc<ScopedConn>,
    pub svc: Arc<IamService>,
    pub sink: Arc<CollectingSink>,
}

pub async fn setup() -> Harness {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    // one pooled connection so every statement sees the same memory db
    opts.max_connections(1);
    let db = Database::connect(opts).await.expect("connect sqlite");

    let schema = Schema::new(DbBackend::Sqlite);
    for stmt in [
        schema.create_table_from_entity(tenant::Entity),
        schema.create_table_from_entity(principal::Entity),
        schema.create_table_from_entity(role::Entity),
        schema.create_table_from_entity(permission::Entity),
        schema.create_table_from_entity(role_permission::Entity),
    ] {
        db.execute(db.get_database_backend().build(&stmt))
            .await
            .expect("create table");
    }

    let conn = Arc::new(ScopedConn::new(db));
    let sink = Arc::new(CollectingSink::new());
    let audit: Arc<dyn AuditSink> = sink.clone();
    let svc = Arc::new(IamService::new(Arc::clone(&conn), audit, IamConfig::default()));
    Harness { conn, svc, sink }
}

pub fn ctx(tenant_id: Uuid, principal_id: Uuid) -> SecurityContext {
    SecurityContext::builder()
        .principal_id(principal_id)
        .tenant_id(tenant_id)
        .build()
}

/// Count active principals holding the given role, in the current scope.
pub async fn active_holders(conn: &ScopedConn, role_id: Uuid) -> u64 {
    conn.count::<principal::Entity>(Some(
        Condition::all()
            .add(principal::Column::RoleId.eq(role_id))
            .add(principal::Column::Status.eq(PrincipalStatus::Active)),
    ))
    .await
    .expect("count")
}
