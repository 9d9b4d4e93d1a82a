use async_trait::async_trait;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ResolverConfig;
use crate::token::{Claims, TokenVerifier};

/// Header carrying an explicit tenant ID on trusted server-to-server calls.
pub const TENANT_HEADER: &str = "x-stratum-tenant-id";

/// Maps a tenant slug (subdomain label) to a tenant ID.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_by_slug(&self, slug: &str) -> Option<Uuid>;
}

/// Which strategy produced the resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    TrustedHeader,
    TokenClaim,
    Subdomain,
}

/// A successful tenant resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub tenant_id: Uuid,
    pub source: ResolutionSource,
    /// Verified token claims, when the token strategy matched. Lets the
    /// caller build the security context without re-verifying.
    pub claims: Option<Claims>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No strategy produced a tenant.
    #[error("no tenant could be resolved for this request")]
    Unauthenticated,

    /// A bearer token was presented but failed verification. Deliberately
    /// terminal: a bad token must not fall through to weaker strategies.
    #[error("bearer token failed verification")]
    InvalidToken,
}

impl ResolveError {
    /// Stable machine-readable code for boundary responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHORIZED",
            Self::InvalidToken => "INVALID_TOKEN",
        }
    }
}

/// Resolves the tenant for an inbound request. See the crate docs for the
/// strategy order.
pub struct TenantResolver<V, D> {
    config: ResolverConfig,
    verifier: V,
    directory: D,
}

impl<V, D> TenantResolver<V, D>
where
    V: TokenVerifier,
    D: TenantDirectory,
{
    pub fn new(config: ResolverConfig, verifier: V, directory: D) -> Self {
        Self {
            config,
            verifier,
            directory,
        }
    }

    /// Resolve the tenant from request headers and the request host.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidToken`] when a presented bearer token fails
    /// verification; [`ResolveError::Unauthenticated`] when no strategy
    /// produces a tenant.
    #[tracing::instrument(skip_all, fields(host = %host))]
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        host: &str,
    ) -> Result<Resolution, ResolveError> {
        if self.config.trust_internal_header
            && let Some(tenant_id) = self.header_tenant(headers)
        {
            return Ok(Resolution {
                tenant_id,
                source: ResolutionSource::TrustedHeader,
                claims: None,
            });
        }

        if let Some(token) = bearer_token(headers) {
            let Some(claims) = self.verifier.verify(token) else {
                tracing::debug!("presented bearer token failed verification");
                return Err(ResolveError::InvalidToken);
            };
            return Ok(Resolution {
                tenant_id: claims.tenant_id,
                source: ResolutionSource::TokenClaim,
                claims: Some(claims),
            });
        }

        if let Some(slug) = self.tenant_slug(host)
            && let Some(tenant_id) = self.directory.tenant_by_slug(&slug).await
        {
            return Ok(Resolution {
                tenant_id,
                source: ResolutionSource::Subdomain,
                claims: None,
            });
        }

        Err(ResolveError::Unauthenticated)
    }

    /// The explicit tenant header, when present and well-formed. A
    /// malformed value is ignored rather than fatal; the remaining
    /// strategies still run.
    fn header_tenant(&self, headers: &HeaderMap) -> Option<Uuid> {
        let raw = headers.get(TENANT_HEADER)?.to_str().ok()?;
        match raw.parse() {
            Ok(tenant_id) => Some(tenant_id),
            Err(_) => {
                tracing::warn!(header = TENANT_HEADER, "ignoring malformed tenant header");
                None
            }
        }
    }

    /// Extract the tenant slug from the request host.
    ///
    /// Only single-label subdomains of the apex domain qualify; the apex
    /// itself, foreign domains, nested subdomains and the reserved list
    /// all yield `None`.
    fn tenant_slug(&self, host: &str) -> Option<String> {
        let host = host.rsplit_once(':').map_or(host, |(h, _)| h);
        let host = host.to_ascii_lowercase();
        let label = host.strip_suffix(&format!(".{}", self.config.apex_domain))?;
        if label.is_empty() || label.contains('.') {
            return None;
        }
        if self.config.reserved_subdomains.iter().any(|r| r == label) {
            return None;
        }
        Some(label.to_owned())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;
    use time::OffsetDateTime;

    /// Verifier that accepts exactly one token string.
    struct OneTokenVerifier {
        token: &'static str,
        claims: Claims,
    }

    impl TokenVerifier for OneTokenVerifier {
        fn verify(&self, token: &str) -> Option<Claims> {
            (token == self.token).then(|| self.claims.clone())
        }
    }

    struct StaticDirectory(HashMap<String, Uuid>);

    #[async_trait]
    impl TenantDirectory for StaticDirectory {
        async fn tenant_by_slug(&self, slug: &str) -> Option<Uuid> {
            self.0.get(slug).copied()
        }
    }

    fn claims_for(tenant_id: Uuid) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            tenant_id,
            exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            scopes: vec!["*".to_owned()],
        }
    }

    struct Fixture {
        token_tenant: Uuid,
        slug_tenant: Uuid,
        resolver: TenantResolver<OneTokenVerifier, StaticDirectory>,
    }

    fn fixture(trust_internal_header: bool) -> Fixture {
        let token_tenant = Uuid::new_v4();
        let slug_tenant = Uuid::new_v4();
        let resolver = TenantResolver::new(
            ResolverConfig {
                trust_internal_header,
                ..ResolverConfig::default()
            },
            OneTokenVerifier {
                token: "good-token",
                claims: claims_for(token_tenant),
            },
            StaticDirectory(HashMap::from([("acme".to_owned(), slug_tenant)])),
        );
        Fixture {
            token_tenant,
            slug_tenant,
            resolver,
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                http::HeaderName::try_from(*name).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    #[tokio::test]
    async fn trusted_header_wins_over_token_and_subdomain() {
        let f = fixture(true);
        let header_tenant = Uuid::new_v4();
        let h = headers(&[
            (TENANT_HEADER, &header_tenant.to_string()),
            ("authorization", "Bearer good-token"),
        ]);

        let r = f.resolver.resolve(&h, "acme.stratum.app").await.unwrap();
        assert_eq!(r.tenant_id, header_tenant);
        assert_eq!(r.source, ResolutionSource::TrustedHeader);
        assert!(r.claims.is_none());
    }

    #[tokio::test]
    async fn header_is_ignored_when_untrusted() {
        let f = fixture(false);
        let h = headers(&[
            (TENANT_HEADER, &Uuid::new_v4().to_string()),
            ("authorization", "Bearer good-token"),
        ]);

        let r = f.resolver.resolve(&h, "acme.stratum.app").await.unwrap();
        assert_eq!(r.tenant_id, f.token_tenant, "must fall through to the token");
        assert_eq!(r.source, ResolutionSource::TokenClaim);
    }

    #[tokio::test]
    async fn malformed_header_falls_through_to_next_strategy() {
        let f = fixture(true);
        let h = headers(&[(TENANT_HEADER, "not-a-uuid")]);

        let r = f.resolver.resolve(&h, "acme.stratum.app").await.unwrap();
        assert_eq!(r.tenant_id, f.slug_tenant);
        assert_eq!(r.source, ResolutionSource::Subdomain);
    }

    #[tokio::test]
    async fn verified_token_carries_its_claims() {
        let f = fixture(false);
        let h = headers(&[("authorization", "Bearer good-token")]);

        let r = f.resolver.resolve(&h, "api.stratum.app").await.unwrap();
        assert_eq!(r.tenant_id, f.token_tenant);
        assert_eq!(r.claims.unwrap().tenant_id, f.token_tenant);
    }

    #[tokio::test]
    async fn invalid_token_never_falls_through_to_subdomain() {
        let f = fixture(false);
        let h = headers(&[("authorization", "Bearer forged-token")]);

        // even though acme.stratum.app would resolve on its own
        let err = f.resolver.resolve(&h, "acme.stratum.app").await.unwrap_err();
        assert_eq!(err, ResolveError::InvalidToken);
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn subdomain_resolves_through_the_directory() {
        let f = fixture(false);

        let r = f
            .resolver
            .resolve(&HeaderMap::new(), "acme.stratum.app:8443")
            .await
            .unwrap();
        assert_eq!(r.tenant_id, f.slug_tenant);
        assert_eq!(r.source, ResolutionSource::Subdomain);
    }

    #[tokio::test]
    async fn reserved_subdomains_do_not_resolve() {
        let f = fixture(false);

        for host in [
            "www.stratum.app",
            "api.stratum.app",
            "app.stratum.app",
            "admin.stratum.app",
            "status.stratum.app",
            "docs.stratum.app",
        ] {
            let err = f.resolver.resolve(&HeaderMap::new(), host).await.unwrap_err();
            assert_eq!(err, ResolveError::Unauthenticated, "{host} must not resolve");
        }
    }

    #[tokio::test]
    async fn apex_foreign_and_nested_hosts_do_not_resolve() {
        let f = fixture(false);

        for host in [
            "stratum.app",
            "evil.example.com",
            "acme.stratum.app.evil.example.com",
            "deep.acme.stratum.app",
        ] {
            let err = f.resolver.resolve(&HeaderMap::new(), host).await.unwrap_err();
            assert_eq!(err, ResolveError::Unauthenticated, "{host} must not resolve");
            assert_eq!(err.code(), "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn unknown_slug_is_unauthenticated() {
        let f = fixture(false);

        let err = f
            .resolver
            .resolve(&HeaderMap::new(), "globex.stratum.app")
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::Unauthenticated);
    }

    #[tokio::test]
    async fn host_matching_is_case_insensitive() {
        let f = fixture(false);

        let r = f
            .resolver
            .resolve(&HeaderMap::new(), "ACME.Stratum.App")
            .await
            .unwrap();
        assert_eq!(r.tenant_id, f.slug_tenant);
    }
}
