use stratum_security::ContextError;
use thiserror::Error;

/// Failures raised by the scoped gateway.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A scoped operation ran on a task with no active tenant context.
    /// No I/O was issued. Treated as a programming defect.
    #[error("scoped operation attempted without an active tenant context")]
    MissingContext(#[from] ContextError),

    /// An update attempted to move a record to a different tenant.
    #[error("tenant_id is immutable")]
    TenantImmutable,

    /// The target record does not exist within the current tenant scope.
    #[error("record not found in the current tenant scope")]
    NotFound,

    /// The operation is malformed for this entity (e.g. a by-id call on an
    /// entity with no resource column).
    #[error("{0}")]
    Invalid(&'static str),

    /// Underlying store failure.
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

impl ScopeError {
    /// Stable machine-readable code for boundary responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingContext(_) => "MISSING_TENANT_CONTEXT",
            Self::TenantImmutable | Self::Invalid(_) => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::Db(_) => "INTERNAL",
        }
    }
}
