//! Implicit per-request context propagation.
//!
//! Each inbound request runs as one logical tokio task. Binding a
//! [`SecurityContext`] to that task with [`tenant_scope`] makes it visible to
//! every function the request transitively calls — through any number of
//! await points — without threading a tenant parameter through signatures.
//! Concurrent scopes are fully independent: the context lives in a
//! `task_local`, not in shared mutable state, so no locking is involved and
//! nothing can leak between in-flight requests.
//!
//! Futures moved onto a *new* task with `tokio::spawn` do not inherit the
//! scope; re-bind explicitly:
//!
//! ```ignore
//! let ctx = current_context()?;
//! tokio::spawn(tenant_scope(ctx, async move { /* ... */ }));
//! ```

use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use crate::context::SecurityContext;

tokio::task_local! {
    static CURRENT: SecurityContext;
}

/// Raised when code reaches for the ambient context outside any scope.
///
/// This is a programming defect, not a user error: some call path performed
/// a tenant-scoped operation without the request wiring that binds a
/// context. It must fail loudly rather than fall back to an unscoped view.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no tenant context is active on this task")]
    Missing,
}

impl ContextError {
    /// Stable machine-readable code for boundary responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "MISSING_TENANT_CONTEXT",
        }
    }
}

/// Run `fut` with `ctx` bound as the ambient security context.
///
/// Everything awaited inside `fut` — nested calls, suspensions at I/O,
/// collaborator futures — observes exactly this context through
/// [`current_context`] / [`current_tenant`]. The binding ends when the
/// future completes; nothing is left behind on the task.
pub async fn tenant_scope<F>(ctx: SecurityContext, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, fut).await
}

/// The security context bound to the current task.
///
/// # Errors
///
/// Returns [`ContextError::Missing`] outside any [`tenant_scope`].
pub fn current_context() -> Result<SecurityContext, ContextError> {
    CURRENT.try_with(Clone::clone).map_err(|_| ContextError::Missing)
}

/// The tenant ID bound to the current task.
///
/// An anonymous context (nil tenant) is treated as no context at all:
/// the nil UUID must never become a query value.
///
/// # Errors
///
/// Returns [`ContextError::Missing`] outside any scope, or when the bound
/// context carries no real tenant.
pub fn current_tenant() -> Result<Uuid, ContextError> {
    let tenant_id = CURRENT
        .try_with(SecurityContext::tenant_id)
        .map_err(|_| ContextError::Missing)?;
    if tenant_id.is_nil() {
        return Err(ContextError::Missing);
    }
    Ok(tenant_id)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn ctx_for(tenant_id: Uuid) -> SecurityContext {
        SecurityContext::builder()
            .principal_id(Uuid::new_v4())
            .tenant_id(tenant_id)
            .build()
    }

    #[test]
    fn current_tenant_outside_scope_is_missing() {
        assert_eq!(current_tenant(), Err(ContextError::Missing));
        assert_eq!(current_context().unwrap_err().code(), "MISSING_TENANT_CONTEXT");
    }

    #[tokio::test]
    async fn scope_binds_tenant_across_awaits() {
        let tenant = Uuid::new_v4();

        let seen = tenant_scope(ctx_for(tenant), async {
            let before = current_tenant().unwrap();
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            let after = current_tenant().unwrap();
            (before, after)
        })
        .await;

        assert_eq!(seen, (tenant, tenant));
        // Scope has ended; the binding is gone.
        assert_eq!(current_tenant(), Err(ContextError::Missing));
    }

    #[tokio::test]
    async fn anonymous_context_does_not_count_as_tenant() {
        let got = tenant_scope(SecurityContext::anonymous(), async { current_tenant() }).await;
        assert_eq!(got, Err(ContextError::Missing));
    }

    #[tokio::test]
    async fn nested_scope_shadows_then_restores() {
        let outer = Uuid::new_v4();
        let inner = Uuid::new_v4();

        tenant_scope(ctx_for(outer), async {
            assert_eq!(current_tenant().unwrap(), outer);
            tenant_scope(ctx_for(inner), async {
                assert_eq!(current_tenant().unwrap(), inner);
            })
            .await;
            assert_eq!(current_tenant().unwrap(), outer);
        })
        .await;
    }

    /// The core isolation property: many concurrent tasks, each under its
    /// own tenant scope, suspending and resuming at random points, must
    /// only ever observe their own tenant.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_scopes_never_leak() {
        let mut handles = Vec::new();

        for i in 0..64u64 {
            let tenant = Uuid::new_v4();
            handles.push(tokio::spawn(tenant_scope(ctx_for(tenant), async move {
                for round in 0..32u64 {
                    assert_eq!(current_tenant().unwrap(), tenant, "leak on task {i}");
                    if (i + round) % 3 == 0 {
                        tokio::time::sleep(std::time::Duration::from_micros(50)).await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
                tenant
            })));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn spawned_task_does_not_inherit_scope() {
        let tenant = Uuid::new_v4();

        tenant_scope(ctx_for(tenant), async {
            let handle = tokio::spawn(async { current_tenant() });
            assert_eq!(handle.await.unwrap(), Err(ContextError::Missing));

            // Explicit re-binding is the supported hand-off.
            let ctx = current_context().unwrap();
            let handle = tokio::spawn(tenant_scope(ctx, async { current_tenant() }));
            assert_eq!(handle.await.unwrap(), Ok(tenant));
        })
        .await;
    }
}
