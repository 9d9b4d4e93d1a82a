use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the principal's ID.
    pub sub: Uuid,
    /// Tenant the token was issued for.
    pub tenant_id: Uuid,
    /// Expiration (Unix timestamp). Checked during verification.
    pub exp: i64,
    /// Issued-at (Unix timestamp).
    #[serde(default)]
    pub iat: i64,
    /// Capability restrictions. `["*"]` means first-party / unrestricted.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Verifies a bearer token and extracts its claims.
///
/// The resolver only cares about "valid and which tenant"; signature
/// scheme, key rotation and the rest stay behind this trait.
pub trait TokenVerifier: Send + Sync {
    /// `Some(claims)` for a valid token, `None` for anything else
    /// (bad signature, expired, malformed).
    fn verify(&self, token: &str) -> Option<Claims>;
}

/// JWT verification via `jsonwebtoken`.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// HS256 verifier over a shared secret.
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// `EdDSA` (Ed25519) verifier over a PEM-encoded public key.
    ///
    /// # Errors
    ///
    /// Fails when the PEM does not contain a valid Ed25519 public key.
    pub fn ed25519_pem(public_key_pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            decoding_key: DecodingKey::from_ed_pem(public_key_pem)?,
            validation: Validation::new(Algorithm::EdDSA),
        })
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<Claims> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                None
            }
        }
    }
}
