//! Tenant resolution for inbound requests.
//!
//! Determines which tenant a request belongs to before any business logic
//! runs. Three strategies are tried in a fixed priority order, first match
//! wins:
//!
//! 1. the `x-stratum-tenant-id` header, honored only from callers the
//!    deployment marks as trusted (server-to-server traffic);
//! 2. the tenant claim of a verified bearer token;
//! 3. the subdomain of the configured apex domain, resolved to a tenant ID
//!    through a [`TenantDirectory`] lookup.
//!
//! A presented-but-invalid token is a hard failure: it never falls through
//! to subdomain resolution, otherwise a forged token on a tenant's vanity
//! domain would still resolve.

pub mod config;
pub mod resolver;
pub mod token;

pub use config::ResolverConfig;
pub use resolver::{
    Resolution, ResolutionSource, ResolveError, TENANT_HEADER, TenantDirectory, TenantResolver,
};
pub use token::{Claims, JwtVerifier, TokenVerifier};
