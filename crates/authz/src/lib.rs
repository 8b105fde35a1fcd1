//! Bearer token verification against a remote JSON Web Key Set.
//!
//! Pure verification: tokens are issued, refreshed, and revoked by the
//! identity provider. This crate resolves the signing key named by a token's
//! `kid`, checks signature, issuer, algorithm and expiry, and hands back the
//! decoded [`Claims`].

use serde::Deserialize;

pub mod cache;
pub mod claims;
pub mod clock;
pub mod error;
pub mod key_source;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CachePolicy, KeyCache};
pub use claims::Claims;
pub use clock::{Clock, SystemClock};
pub use error::{AuthError, KeySourceError};
pub use key_source::{HttpKeySource, KeySource, StaticKeySource};
pub use verifier::{bearer_token, TokenVerifier};

/// Auth section of the layered settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_keycloak_url")]
    pub keycloak_url: String,
    #[serde(default = "AuthSettings::default_realm")]
    pub realm: String,
    #[serde(default = "AuthSettings::default_cache_max_entries")]
    pub cache_max_entries: usize,
    #[serde(default = "AuthSettings::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "AuthSettings::default_jwks_requests_per_minute")]
    pub jwks_requests_per_minute: usize,
    #[serde(default = "AuthSettings::default_jwks_timeout_secs")]
    pub jwks_timeout_secs: u64,
}

impl AuthSettings {
    fn default_keycloak_url() -> String {
        "https://book.s32.horizonoes.com/auth".to_string()
    }

    fn default_realm() -> String {
        "books-realm".to_string()
    }

    fn default_cache_max_entries() -> usize {
        5
    }

    fn default_cache_ttl_secs() -> u64 {
        600
    }

    fn default_jwks_requests_per_minute() -> usize {
        10
    }

    fn default_jwks_timeout_secs() -> u64 {
        10
    }

    /// Expected `iss` claim.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url.trim_end_matches('/'), self.realm)
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }

    /// Upper bound on a single JWKS request.
    pub fn jwks_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.jwks_timeout_secs)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            max_entries: self.cache_max_entries,
            ttl: std::time::Duration::from_secs(self.cache_ttl_secs),
            requests_per_minute: self.jwks_requests_per_minute,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            keycloak_url: Self::default_keycloak_url(),
            realm: Self::default_realm(),
            cache_max_entries: Self::default_cache_max_entries(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            jwks_requests_per_minute: Self::default_jwks_requests_per_minute(),
            jwks_timeout_secs: Self::default_jwks_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_and_jwks_uri_follow_realm_layout() {
        let settings = AuthSettings {
            keycloak_url: "https://id.example.com/auth/".to_string(),
            ..AuthSettings::default()
        };
        assert_eq!(settings.issuer(), "https://id.example.com/auth/realms/books-realm");
        assert_eq!(
            settings.jwks_uri(),
            "https://id.example.com/auth/realms/books-realm/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn default_cache_policy() {
        let policy = AuthSettings::default().cache_policy();
        assert_eq!(policy.max_entries, 5);
        assert_eq!(policy.ttl.as_secs(), 600);
        assert_eq!(policy.requests_per_minute, 10);
    }

    #[test]
    fn jwks_requests_are_bounded_by_default() {
        assert_eq!(AuthSettings::default().jwks_timeout().as_secs(), 10);
    }
}
