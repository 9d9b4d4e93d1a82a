//! Tenant-scoped data gateway.
//!
//! [`ScopedConn`] wraps one shared `SeaORM` connection and presents the
//! full data-store surface (create, read, update, delete, count, upsert)
//! for entities implementing [`TenantScoped`]. Every call reads the ambient
//! tenant from the task-local context at call time and rewrites the
//! operation before it reaches the store:
//!
//! - writes stamp `tenant_id` with the ambient tenant, overriding anything
//!   the caller supplied;
//! - reads, updates and deletes AND the caller's filter with a tenant
//!   equality constraint;
//! - any scoped call without an active context fails with
//!   [`ScopeError::MissingContext`] before issuing I/O.
//!
//! Entities whose [`TenantScoped::tenant_col`] is `None` are outside the
//! tenant-owned allow-list and pass through unmodified.
//!
//! Centralizing the rewrite here is the point: call sites never repeat
//! ad-hoc tenant filters, so there is no call site to forget one at.

mod cond;
mod entity_traits;
mod error;
mod gateway;
mod ops;

pub use cond::scoped_condition;
pub use entity_traits::TenantScoped;
pub use error::ScopeError;
pub use gateway::{GatewayRunner, Runner, ScopedConn, ScopedTx};
