//! Operation implementations shared by [`ScopedConn`] and [`ScopedTx`].
//!
//! Every scoped operation follows the same shape: resolve the ambient
//! tenant first (failing before any I/O when the entity is tenant-owned
//! and no context is active), rewrite the operation, then delegate to the
//! underlying connection or transaction.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

use stratum_security::current_tenant;

use crate::cond::scoped_condition;
use crate::entity_traits::TenantScoped;
use crate::error::ScopeError;
use crate::gateway::{GatewayRunner, Runner};

/// Run a closure body against whichever executor the runner holds.
macro_rules! run {
    ($runner:expr, |$db:ident| $body:expr) => {
        match $runner.runner() {
            Runner::Conn($db) => $body,
            Runner::Tx($db) => $body,
        }
    };
}

/// Resolve the ambient tenant for entity `E`.
///
/// Returns `None` for global entities (no tenant column). For tenant-owned
/// entities a missing context is an error — logged at high severity, since
/// it means a call path reached the store without request wiring.
fn ambient_tenant_for<E: TenantScoped>() -> Result<Option<Uuid>, ScopeError> {
    if E::tenant_col().is_none() {
        return Ok(None);
    }
    match current_tenant() {
        Ok(tenant_id) => Ok(Some(tenant_id)),
        Err(e) => {
            tracing::error!(
                entity = %E::default().table_name(),
                "scoped operation attempted without an active tenant context"
            );
            Err(e.into())
        }
    }
}

/// Stamp the tenant column on an `ActiveModel`, overriding any value the
/// caller put there. A caller can never write into another tenant.
fn stamp_tenant<A>(am: &mut A, tenant_id: Option<Uuid>)
where
    A: ActiveModelTrait,
    A::Entity: TenantScoped,
{
    if let (Some(tenant_col), Some(tenant_id)) = (<A::Entity as TenantScoped>::tenant_col(), tenant_id) {
        am.set(tenant_col, tenant_id.into());
    }
}

/// Reject an `ActiveModel` that tries to move a record across tenants,
/// then drop the tenant column from the write set entirely.
fn enforce_tenant_immutable<A>(am: &mut A, tenant_id: Option<Uuid>) -> Result<(), ScopeError>
where
    A: ActiveModelTrait,
    A::Entity: TenantScoped,
{
    let Some(tenant_col) = <A::Entity as TenantScoped>::tenant_col() else {
        return Ok(());
    };
    if let sea_orm::ActiveValue::Set(value) | sea_orm::ActiveValue::Unchanged(value) =
        am.get(tenant_col)
    {
        let incoming = match value {
            sea_orm::Value::Uuid(Some(u)) => *u,
            _ => return Err(ScopeError::Invalid("tenant_id has unexpected type")),
        };
        if Some(incoming) != tenant_id {
            return Err(ScopeError::TenantImmutable);
        }
    }
    am.not_set(tenant_col);
    Ok(())
}

pub(crate) async fn insert<E, R>(runner: &R, mut am: E::ActiveModel) -> Result<E::Model, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    stamp_tenant(&mut am, tenant_id);
    run!(runner, |db| Ok(am.insert(db).await?))
}

pub(crate) async fn insert_many<E, R, I>(runner: &R, ams: I) -> Result<u64, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    R: GatewayRunner,
    I: IntoIterator<Item = E::ActiveModel>,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let stamped: Vec<E::ActiveModel> = ams
        .into_iter()
        .map(|mut am| {
            stamp_tenant(&mut am, tenant_id);
            am
        })
        .collect();
    if stamped.is_empty() {
        return Ok(0);
    }
    let insert = E::insert_many(stamped);
    run!(runner, |db| Ok(insert.exec_without_returning(db).await?))
}

/// Insert with conflict resolution (upsert).
///
/// The create branch is stamped like a plain insert. The conflict target
/// must include the tenant column (or a primary key that is only reachable
/// within the tenant), otherwise a global unique key could match another
/// tenant's row.
pub(crate) async fn upsert<E, R>(
    runner: &R,
    mut am: E::ActiveModel,
    on_conflict: OnConflict,
) -> Result<E::Model, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    E::Model: IntoActiveModel<E::ActiveModel>,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    stamp_tenant(&mut am, tenant_id);
    let insert = E::insert(am).on_conflict(on_conflict);
    run!(runner, |db| Ok(insert.exec_with_returning(db).await?))
}

pub(crate) async fn find_by_id<E, R>(runner: &R, id: Uuid) -> Result<Option<E::Model>, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let resource_col = E::resource_col()
        .ok_or(ScopeError::Invalid("entity has no resource column for by-id access"))?;
    let cond = scoped_condition::<E>(
        Some(Condition::all().add(resource_col.eq(id))),
        tenant_id.unwrap_or_default(),
    );
    let select = E::find().filter(cond);
    run!(runner, |db| Ok(select.one(db).await?))
}

pub(crate) async fn find_one<E, R>(
    runner: &R,
    filter: Condition,
) -> Result<Option<E::Model>, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let select = E::find().filter(scoped_condition::<E>(Some(filter), tenant_id.unwrap_or_default()));
    run!(runner, |db| Ok(select.one(db).await?))
}

pub(crate) async fn find_many<E, R>(
    runner: &R,
    filter: Option<Condition>,
) -> Result<Vec<E::Model>, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let select = E::find().filter(scoped_condition::<E>(filter, tenant_id.unwrap_or_default()));
    run!(runner, |db| Ok(select.all(db).await?))
}

pub(crate) async fn count<E, R>(runner: &R, filter: Option<Condition>) -> Result<u64, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::Model: sea_orm::FromQueryResult + Send + Sync,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let select = E::find().filter(scoped_condition::<E>(filter, tenant_id.unwrap_or_default()));
    run!(runner, |db| Ok(select.count(db).await?))
}

/// Update one record by ID within the current tenant scope.
///
/// The record is first re-read through the scoped filter, so a record
/// belonging to another tenant is indistinguishable from a missing one.
/// Changing `tenant_id` is rejected.
pub(crate) async fn update_by_id<E, R>(
    runner: &R,
    id: Uuid,
    mut am: E::ActiveModel,
) -> Result<E::Model, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    E::Model: IntoActiveModel<E::ActiveModel> + ModelTrait<Entity = E>,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let existing = find_by_id::<E, R>(runner, id).await?;
    if existing.is_none() {
        return Err(ScopeError::NotFound);
    }

    enforce_tenant_immutable(&mut am, tenant_id)?;

    let resource_col = E::resource_col()
        .ok_or(ScopeError::Invalid("entity has no resource column for by-id access"))?;
    am.set(resource_col, id.into());

    run!(runner, |db| Ok(am.update(db).await?))
}

pub(crate) async fn update_many<E, R>(
    runner: &R,
    filter: Option<Condition>,
    mut am: E::ActiveModel,
) -> Result<u64, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    enforce_tenant_immutable(&mut am, tenant_id)?;

    let update = E::update_many()
        .set(am)
        .filter(scoped_condition::<E>(filter, tenant_id.unwrap_or_default()));
    run!(runner, |db| Ok(update.exec(db).await?.rows_affected))
}

pub(crate) async fn delete_by_id<E, R>(runner: &R, id: Uuid) -> Result<bool, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let resource_col = E::resource_col()
        .ok_or(ScopeError::Invalid("entity has no resource column for by-id access"))?;
    let delete = E::delete_many().filter(scoped_condition::<E>(
        Some(Condition::all().add(resource_col.eq(id))),
        tenant_id.unwrap_or_default(),
    ));
    let rows = run!(runner, |db| delete.exec(db).await?.rows_affected);
    Ok(rows > 0)
}

pub(crate) async fn delete_many<E, R>(
    runner: &R,
    filter: Option<Condition>,
) -> Result<u64, ScopeError>
where
    E: TenantScoped,
    E::Column: ColumnTrait + Copy,
    R: GatewayRunner,
{
    let tenant_id = ambient_tenant_for::<E>()?;
    let delete =
        E::delete_many().filter(scoped_condition::<E>(filter, tenant_id.unwrap_or_default()));
    run!(runner, |db| Ok(delete.exec(db).await?.rows_affected))
}
