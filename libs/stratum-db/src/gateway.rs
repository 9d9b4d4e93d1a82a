use std::pin::Pin;

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    AccessMode, ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection,
    DatabaseTransaction, IntoActiveModel, IsolationLevel, ModelTrait, TransactionTrait,
};
use uuid::Uuid;

use crate::entity_traits::TenantScoped;
use crate::error::ScopeError;
use crate::ops;

/// Executor behind a scoped call. Internal plumbing for the shared op
/// implementations; not part of the public surface.
#[doc(hidden)]
pub enum Runner<'a> {
    Conn(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}

/// Anything the scoped operations can run against.
///
/// Implemented by [`ScopedConn`] and [`ScopedTx`]. Consumers never call
/// [`runner`](GatewayRunner::runner) directly.
pub trait GatewayRunner: Send + Sync {
    #[doc(hidden)]
    fn runner(&self) -> Runner<'_>;
}

/// The single entry point to the data store.
///
/// Owns the `SeaORM` connection and exposes only tenant-scoped operations.
/// The raw connection is deliberately unreachable from here: if code needs
/// an unscoped query, that is a design conversation, not an accessor.
#[derive(Debug)]
pub struct ScopedConn {
    conn: DatabaseConnection,
}

/// A scoped view over an open transaction, handed to transaction closures.
/// Same operation surface as [`ScopedConn`].
pub struct ScopedTx<'a> {
    tx: &'a DatabaseTransaction,
}

impl GatewayRunner for ScopedConn {
    fn runner(&self) -> Runner<'_> {
        Runner::Conn(&self.conn)
    }
}

impl GatewayRunner for ScopedTx<'_> {
    fn runner(&self) -> Runner<'_> {
        Runner::Tx(self.tx)
    }
}

type TxClosure<'a, T> =
    Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

impl ScopedConn {
    #[must_use]
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Run `f` inside a transaction with the default isolation level.
    /// Commits on `Ok`, rolls back on `Err`.
    pub async fn transaction<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a ScopedTx<'a>) -> TxClosure<'a, T> + Send,
    {
        let tx = self.conn.begin().await?;
        Self::run_in_tx(tx, f).await
    }

    /// Run `f` inside a `SERIALIZABLE` read-write transaction.
    ///
    /// Used where a decision depends on a predicate over other rows (for
    /// example "is this the last record of its kind"), so two concurrent
    /// transactions cannot both observe the old state and both proceed.
    pub async fn transaction_serializable<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a ScopedTx<'a>) -> TxClosure<'a, T> + Send,
    {
        let tx = self
            .conn
            .begin_with_config(Some(IsolationLevel::Serializable), Some(AccessMode::ReadWrite))
            .await?;
        Self::run_in_tx(tx, f).await
    }

    async fn run_in_tx<T, F>(tx: DatabaseTransaction, f: F) -> anyhow::Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a ScopedTx<'a>) -> TxClosure<'a, T> + Send,
    {
        let result = {
            let scoped = ScopedTx { tx: &tx };
            f(&scoped).await
        };
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(error = %rb, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

macro_rules! scoped_ops {
    ($ty:ty) => {
        impl $ty {
            /// Create a record. `tenant_id` is stamped with the ambient
            /// tenant regardless of what the caller set.
            pub async fn insert<E>(&self, am: E::ActiveModel) -> Result<E::Model, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
                E::Model: IntoActiveModel<E::ActiveModel>,
            {
                ops::insert::<E, _>(self, am).await
            }

            /// Create a batch of records, each stamped with the ambient
            /// tenant. Returns the number of inserted rows.
            pub async fn insert_many<E, I>(&self, ams: I) -> Result<u64, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
                E::Model: IntoActiveModel<E::ActiveModel>,
                I: IntoIterator<Item = E::ActiveModel> + Send,
            {
                ops::insert_many::<E, _, I>(self, ams).await
            }

            /// Insert-or-update. See the conflict-target caveat on the
            /// module docs: the target must be tenant-qualified.
            pub async fn upsert<E>(
                &self,
                am: E::ActiveModel,
                on_conflict: OnConflict,
            ) -> Result<E::Model, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
                E::Model: IntoActiveModel<E::ActiveModel>,
            {
                ops::upsert::<E, _>(self, am, on_conflict).await
            }

            /// Fetch one record by ID within the current tenant scope.
            /// A record owned by another tenant reads as `None`.
            pub async fn find_by_id<E>(&self, id: Uuid) -> Result<Option<E::Model>, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
            {
                ops::find_by_id::<E, _>(self, id).await
            }

            /// Fetch the first record matching `filter` within the current
            /// tenant scope.
            pub async fn find_one<E>(
                &self,
                filter: Condition,
            ) -> Result<Option<E::Model>, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
            {
                ops::find_one::<E, _>(self, filter).await
            }

            /// Fetch all records matching `filter` (or every record when
            /// `None`) within the current tenant scope.
            pub async fn find_many<E>(
                &self,
                filter: Option<Condition>,
            ) -> Result<Vec<E::Model>, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
            {
                ops::find_many::<E, _>(self, filter).await
            }

            /// Count records matching `filter` within the current tenant
            /// scope.
            pub async fn count<E>(&self, filter: Option<Condition>) -> Result<u64, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::Model: sea_orm::FromQueryResult + Send + Sync,
            {
                ops::count::<E, _>(self, filter).await
            }

            /// Update one record by ID. Fails with [`ScopeError::NotFound`]
            /// if the record is absent or owned by another tenant, and with
            /// [`ScopeError::TenantImmutable`] if the change tries to move
            /// the record across tenants.
            pub async fn update_by_id<E>(
                &self,
                id: Uuid,
                am: E::ActiveModel,
            ) -> Result<E::Model, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
                E::Model: IntoActiveModel<E::ActiveModel> + ModelTrait<Entity = E>,
            {
                ops::update_by_id::<E, _>(self, id, am).await
            }

            /// Apply `am` to every record matching `filter` within the
            /// current tenant scope. Returns the number of updated rows.
            pub async fn update_many<E>(
                &self,
                filter: Option<Condition>,
                am: E::ActiveModel,
            ) -> Result<u64, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
                E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
            {
                ops::update_many::<E, _>(self, filter, am).await
            }

            /// Delete one record by ID within the current tenant scope.
            /// Returns whether a row was deleted.
            pub async fn delete_by_id<E>(&self, id: Uuid) -> Result<bool, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
            {
                ops::delete_by_id::<E, _>(self, id).await
            }

            /// Delete every record matching `filter` within the current
            /// tenant scope. Returns the number of deleted rows.
            pub async fn delete_many<E>(
                &self,
                filter: Option<Condition>,
            ) -> Result<u64, ScopeError>
            where
                E: TenantScoped,
                E::Column: ColumnTrait + Copy,
            {
                ops::delete_many::<E, _>(self, filter).await
            }
        }
    };
}

scoped_ops!(ScopedConn);
scoped_ops!(ScopedTx<'_>);
