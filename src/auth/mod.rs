//! Bearer token verification
//!
//! Tokens are HS256-signed JWTs issued elsewhere. The `sub` claim is the
//! caller's username; nothing else is read.

use crate::errors::{Result, ServiceError};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;

/// Claims read from a bearer token
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Verifies bearer tokens against a fixed symmetric secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for HS256 tokens signed with `secret`
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is enforced when present but not required
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode a token and return the username it was issued to
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            warn!(error = %e, "Token verification failed");
            ServiceError::Unauthorized
        })?;

        match data.claims.sub {
            Some(username) if !username.is_empty() => Ok(username),
            _ => {
                warn!("Token verification failed: no username in token");
                Err(ServiceError::Unauthorized)
            }
        }
    }

    /// Verify the value of an `Authorization` header
    pub fn verify_header(&self, header: Option<&str>) -> Result<String> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!("Missing or malformed Authorization header");
                ServiceError::Unauthorized
            })?;

        self.verify(token)
    }
}
