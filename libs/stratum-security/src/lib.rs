pub mod carrier;
pub mod context;

pub use carrier::{ContextError, current_context, current_tenant, tenant_scope};
pub use context::SecurityContext;
