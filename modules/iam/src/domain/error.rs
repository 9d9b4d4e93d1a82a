use stratum_db::ScopeError;

/// Domain-level failures for IAM operations.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// The acting principal lacks the required capability. The message is
    /// deliberately generic; the denied capability is logged, not shown.
    #[error("access denied")]
    Forbidden,

    /// The operation would leave the tenant without a super-admin.
    #[error("this principal is the tenant's last super-admin; assign another super-admin first")]
    InvariantViolation,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Gateway failure (missing context, tenant immutability, storage).
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for boundary responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "FORBIDDEN",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION",
            Self::Scope(e) => e.code(),
            Self::Internal(_) => "INTERNAL",
        }
    }
}

/// Recover a `DomainError` carried through a transaction closure's
/// `anyhow` boundary; anything else is an infrastructure failure.
pub(crate) fn from_tx(e: anyhow::Error) -> DomainError {
    match e.downcast::<DomainError>() {
        Ok(domain) => domain,
        Err(other) => DomainError::Internal(other),
    }
}
