//! Identity and access management.
//!
//! Owns the tenancy data model (tenants, principals, roles, permissions),
//! the permission evaluator, tenant provisioning with per-tenant system
//! roles, and the audit emitter interface. All storage access goes through
//! the tenant-scoped gateway; the only deliberately unscoped entities are
//! the tenant table itself and the shared permission catalog.

pub mod audit;
pub mod config;
pub mod domain;
pub mod infra;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use config::IamConfig;
pub use domain::error::DomainError;
pub use domain::permission::Permission;
pub use domain::service::{IamService, ProvisionedTenant, SlugDirectory};
