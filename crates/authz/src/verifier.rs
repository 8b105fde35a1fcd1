use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, Validation};

use crate::{
    cache::KeyCache, claims::Claims, clock::SystemClock, error::AuthError,
    key_source::HttpKeySource, AuthSettings,
};

/// The only signature algorithm accepted.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies RS256 access tokens issued by a single issuer.
pub struct TokenVerifier {
    keys: Arc<KeyCache>,
    validation: Arc<Validation>,
}

impl Clone for TokenVerifier {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            validation: Arc::clone(&self.validation),
        }
    }
}

impl Debug for TokenVerifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("keys", &self.keys)
            .field("issuer", &self.validation.iss)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(keys: KeyCache, issuer: &str) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(&[issuer]);
        validation.validate_exp = true;

        Self {
            keys: Arc::new(keys),
            validation: Arc::new(validation),
        }
    }

    /// Verifier backed by the identity provider's JWKS endpoint.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let source = HttpKeySource::new(settings.jwks_uri(), settings.jwks_timeout())?;
        tracing::info!(
            issuer = %settings.issuer(),
            jwks_uri = %source.uri(),
            timeout_secs = settings.jwks_timeout_secs,
            "token verifier configured"
        );
        let keys = KeyCache::new(
            Arc::new(source),
            Arc::new(SystemClock),
            settings.cache_policy(),
        );
        Ok(Self::new(keys, &settings.issuer()))
    }

    /// Check signature, issuer, algorithm, and expiry; return the claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::InvalidToken(ErrorKind::InvalidAlgorithm.into()));
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let key = self.keys.get(&kid).await?;
        let data = decode::<Claims>(token, &key, &self.validation)?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::CachePolicy,
        key_source::StaticKeySource,
        testing::{claims_for, sign, sign_with_kid, test_jwk_set},
    };
    use jsonwebtoken::{EncodingKey, Header};

    const ISSUER: &str = "https://book.s32.horizonoes.com/auth/realms/books-realm";

    fn verifier() -> (Arc<StaticKeySource>, TokenVerifier) {
        let source = Arc::new(StaticKeySource::new(test_jwk_set()));
        let keys = KeyCache::new(source.clone(), Arc::new(SystemClock), CachePolicy::default());
        (source, TokenVerifier::new(keys, ISSUER))
    }

    fn kind(err: AuthError) -> ErrorKind {
        match err {
            AuthError::InvalidToken(err) => err.into_kind(),
            other => panic!("expected token error, got {other:?}"),
        }
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
    }

    #[tokio::test]
    async fn valid_token_yields_claims() {
        let (_source, verifier) = verifier();
        let token = sign(&claims_for(ISSUER));

        let claims = verifier.verify(&token).await.unwrap();

        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.principal(), "reader");
        assert_eq!(claims.email.as_deref(), Some("reader@example.com"));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let (_source, verifier) = verifier();
        let token = sign(&claims_for("https://evil.example.com/realms/books-realm"));

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(kind(err), ErrorKind::InvalidIssuer));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let (_source, verifier) = verifier();
        let mut claims = claims_for(ISSUER);
        claims["exp"] = serde_json::json!(jsonwebtoken::get_current_timestamp() - 3600);

        let err = verifier.verify(&sign(&claims)).await.unwrap_err();
        assert!(matches!(kind(err), ErrorKind::ExpiredSignature));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let (_source, verifier) = verifier();
        let token = sign(&claims_for(ISSUER));
        let (signed, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{signed}.{flipped}{}", &signature[1..]);

        let err = verifier.verify(&tampered).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn symmetric_algorithm_is_rejected_without_key_lookup() {
        let (source, verifier) = verifier();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(crate::testing::TEST_KEY_ID.to_string());
        let token = jsonwebtoken::encode(
            &header,
            &claims_for(ISSUER),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(kind(err), ErrorKind::InvalidAlgorithm));
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn token_without_kid_is_rejected() {
        let (_source, verifier) = verifier();
        let token = sign_with_kid(&claims_for(ISSUER), None);

        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingKeyId));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (source, verifier) = verifier();

        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
        assert_eq!(source.fetch_count(), 0);
    }
}
