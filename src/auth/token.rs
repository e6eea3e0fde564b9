use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Failure modes of token handling.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature mismatch, malformed structure or unexpected algorithm.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// The expiry timestamp is at or before the current time.
    #[error("token expired")]
    Expired,
    /// The token could not be encoded.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject of the token: the username it was issued to.
    pub sub: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Issues and validates HS512-signed bearer tokens bound to a username.
///
/// The service is stateless: every result is a pure function of the secret, the
/// configured lifetime, the input and the current time.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    /// Lifetime applied to every issued token.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Generates a signed token for `username`, expiring `lifetime` from now.
    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.lifetime.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies the signature and structure of `token` and checks its expiry.
    ///
    /// Expiry is checked here rather than by `jsonwebtoken` so that a token whose
    /// `exp` equals the current second is already rejected and no leeway applies.
    pub fn parse(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(format!("{:?}", e.kind())))?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// True iff `token` parses, is unexpired and was issued to `expected_username`.
    pub fn validate(&self, token: &str, expected_username: &str) -> bool {
        self.parse(token)
            .map(|claims| claims.sub == expected_username)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_token_service_0123456789";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(24))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();
        let claims = tokens.parse(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, Duration::hours(24).num_seconds());
    }

    #[test]
    fn test_validate_binds_token_to_username() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();
        assert!(tokens.validate(&token, "alice"));
        assert!(!tokens.validate(&token, "bob"));
    }

    #[test]
    fn test_token_expiration() {
        // A zero lifetime puts exp at the issuing second, which already counts as expired.
        let tokens = TokenService::new(SECRET, Duration::zero());
        let token = tokens.issue("alice").unwrap();
        assert!(matches!(tokens.parse(&token), Err(TokenError::Expired)));
        assert!(!tokens.validate(&token, "alice"));
    }

    #[test]
    fn test_expired_token_signed_by_hand() {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "alice".into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(service().parse(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_invalid_token_signature() {
        let other = TokenService::new("a_completely_different_secret_value", Duration::hours(1));
        let token = other.issue("alice").unwrap();
        match service().parse(&token) {
            Err(TokenError::Invalid(kind)) => assert!(kind.contains("InvalidSignature")),
            other => panic!("expected invalid signature, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            service().parse("not.a.token"),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(service().parse(""), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_rejects_other_algorithm() {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "alice".into(),
            iat: now,
            exp: now + 3600,
        };
        let hs256 = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(service().parse(&hs256), Err(TokenError::Invalid(_))));
    }
}
