use secrecy::SecretString;
use uuid::Uuid;

/// `SecurityContext` carries the authenticated identity for one request.
///
/// Built after tenant resolution and authentication, then bound to the
/// request's task via [`crate::carrier::tenant_scope`]. Everything the data
/// gateway and the permission evaluator need to know about "who is asking"
/// lives here.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SecurityContext {
    /// Principal ID — the authenticated user or service making the request.
    principal_id: Uuid,
    /// The tenant this request is attributed to. Every scoped data
    /// operation is constrained to this tenant.
    tenant_id: Uuid,
    /// Name of the principal's role (e.g. `"SUPER_ADMIN"`), when known.
    role_name: Option<String>,
    /// Token capability restrictions. `["*"]` means first-party / unrestricted.
    #[serde(default)]
    token_scopes: Vec<String>,
    /// Original bearer token for downstream forwarding. Never serialized.
    /// `SecretString` redacts the value in `Debug` output.
    #[serde(skip)]
    bearer_token: Option<SecretString>,
}

impl SecurityContext {
    /// Create a new `SecurityContext` builder.
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// An anonymous context: no principal, no tenant, no capabilities.
    ///
    /// Scoped data operations under an anonymous context fail with a
    /// missing-context error; the nil tenant never acts as a wildcard.
    #[must_use]
    pub fn anonymous() -> Self {
        SecurityContextBuilder::default().build()
    }

    /// The authenticated principal's ID.
    #[must_use]
    pub fn principal_id(&self) -> Uuid {
        self.principal_id
    }

    /// The tenant this request is attributed to.
    #[must_use]
    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// `true` when a real (non-nil) tenant is attached.
    #[must_use]
    pub fn has_tenant(&self) -> bool {
        !self.tenant_id.is_nil()
    }

    /// The principal's role name, when resolved.
    #[must_use]
    pub fn role_name(&self) -> Option<&str> {
        self.role_name.as_deref()
    }

    /// Token scopes. `["*"]` means first-party / unrestricted.
    #[must_use]
    pub fn token_scopes(&self) -> &[String] {
        &self.token_scopes
    }

    /// The original bearer token (for collaborator forwarding).
    #[must_use]
    pub fn bearer_token(&self) -> Option<&SecretString> {
        self.bearer_token.as_ref()
    }
}

#[derive(Default)]
pub struct SecurityContextBuilder {
    principal_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
    role_name: Option<String>,
    token_scopes: Vec<String>,
    bearer_token: Option<SecretString>,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn principal_id(mut self, principal_id: Uuid) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn role_name(mut self, role_name: &str) -> Self {
        self.role_name = Some(role_name.to_owned());
        self
    }

    #[must_use]
    pub fn token_scopes(mut self, scopes: Vec<String>) -> Self {
        self.token_scopes = scopes;
        self
    }

    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<SecretString>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            principal_id: self.principal_id.unwrap_or_default(),
            tenant_id: self.tenant_id.unwrap_or_default(),
            role_name: self.role_name,
            token_scopes: self.token_scopes,
            bearer_token: self.bearer_token,
        }
    }
}
