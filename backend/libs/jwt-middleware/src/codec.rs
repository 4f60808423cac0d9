//! Token signing and verification
//!
//! `verify` runs in a fixed order:
//!
//! 1. decode the header
//! 2. compare the header algorithm with the configured one (algorithm
//!    confusion defence); skipped when an external `KeyResolver` is active
//! 3. verify the signature with the selected key
//! 4. reject a numeric `exp` that lies in the past with `TokenError::Expired`,
//!    which still carries the verified claims so a refresh can use them

use crate::claims::{ClaimSet, EXP};
use crate::clock::Clock;
use crate::error::AuthError;
use crate::keys::SigningKeys;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, Header, Validation};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("signature is invalid")]
    InvalidSignature,

    #[error("invalid signing algorithm")]
    InvalidSigningAlgorithm,

    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    /// Signature verified, but `exp` has passed
    #[error("token is expired")]
    Expired { claims: ClaimSet },
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(_) | TokenError::InvalidSignature => {
                AuthError::InvalidToken(err.to_string())
            }
            TokenError::InvalidSigningAlgorithm => AuthError::InvalidSigningAlgorithm,
            TokenError::KeyResolution(msg) => AuthError::KeyResolution(msg),
            TokenError::Expired { .. } => AuthError::ExpiredToken,
        }
    }
}

pub struct TokenCodec {
    algorithm: Algorithm,
    keys: SigningKeys,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub(crate) fn new(algorithm: Algorithm, keys: SigningKeys, clock: Arc<dyn Clock>) -> Self {
        Self {
            algorithm,
            keys,
            clock,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign a claim set under the configured algorithm
    pub fn sign(&self, claims: &ClaimSet) -> Result<String, AuthError> {
        let key = match &self.keys {
            SigningKeys::Hmac { encoding, .. } | SigningKeys::Rsa { encoding, .. } => encoding,
            SigningKeys::External(resolver) => resolver.encoding_key().ok_or_else(|| {
                tracing::error!("External key resolver provides no signing key");
                AuthError::FailedTokenCreation
            })?,
        };

        encode(&Header::new(self.algorithm), claims, key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign JWT");
            AuthError::FailedTokenCreation
        })
    }

    /// Verify signature and decode the claim set
    pub fn verify(&self, token: &str) -> Result<ClaimSet, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let resolved: DecodingKey;
        let (algorithm, key) = match &self.keys {
            SigningKeys::External(resolver) => {
                resolved = resolver
                    .decoding_key(&header)
                    .map_err(|e| TokenError::KeyResolution(e.to_string()))?;
                (header.alg, &resolved)
            }
            SigningKeys::Hmac { decoding, .. } | SigningKeys::Rsa { decoding, .. } => {
                if header.alg != self.algorithm {
                    return Err(TokenError::InvalidSigningAlgorithm);
                }
                (self.algorithm, decoding)
            }
        };

        // Expiry is checked below against the injected clock
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<ClaimSet>(token, key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::InvalidSigningAlgorithm,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        if let Some(exp) = claims.timestamp(EXP) {
            if exp < self.clock.now().timestamp() {
                return Err(TokenError::Expired { claims });
            }
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimValue, ORIG_IAT};
    use crate::clock::FixedClock;
    use crate::keys::{KeyConfig, KeyMaterial, KeyResolver, RsaKeySource};
    use chrono::{TimeZone, Utc};
    use jsonwebtoken::EncodingKey;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/rsa_private.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/rsa_public.pem");
    const OTHER_PUBLIC_KEY: &str = include_str!("../tests/fixtures/other_rsa_public.pem");
    const NOW: i64 = 1_700_000_000;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.timestamp_opt(NOW, 0).unwrap()))
    }

    fn hmac_codec(algorithm: Algorithm, secret: &[u8]) -> TokenCodec {
        let keys = SigningKeys::load(&KeyConfig::Secret(secret.to_vec()), algorithm).unwrap();
        TokenCodec::new(algorithm, keys, clock())
    }

    fn rsa_codec(public_key: &str) -> TokenCodec {
        let config = KeyConfig::Rsa(RsaKeySource {
            private_key: KeyMaterial::Bytes(PRIVATE_KEY.as_bytes().to_vec()),
            public_key: KeyMaterial::Bytes(public_key.as_bytes().to_vec()),
            passphrase: None,
        });
        let keys = SigningKeys::load(&config, Algorithm::RS256).unwrap();
        TokenCodec::new(Algorithm::RS256, keys, clock())
    }

    fn sample_claims(exp: i64) -> ClaimSet {
        ClaimSet::new()
            .with("identity", "1001")
            .with("admin", false)
            .with(EXP, exp)
            .with(ORIG_IAT, NOW)
    }

    #[test]
    fn test_sign_then_verify_hmac() {
        for algorithm in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
            let codec = hmac_codec(algorithm, b"test-secret");
            let claims = sample_claims(NOW + 3600);
            let token = codec.sign(&claims).unwrap();
            assert_eq!(codec.verify(&token).unwrap(), claims);
        }
    }

    #[test]
    fn test_sign_then_verify_rsa() {
        let codec = rsa_codec(PUBLIC_KEY);
        let claims = sample_claims(NOW + 60);
        let token = codec.sign(&claims).unwrap();

        let decoded = codec.verify(&token).unwrap();
        assert_eq!(decoded.get(EXP), Some(&ClaimValue::Number((NOW + 60) as f64)));
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = hmac_codec(Algorithm::HS256, b"secret-a")
            .sign(&sample_claims(NOW + 60))
            .unwrap();
        let err = hmac_codec(Algorithm::HS256, b"secret-b").verify(&token).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_wrong_public_key_is_invalid_signature() {
        let token = rsa_codec(PUBLIC_KEY).sign(&sample_claims(NOW + 60)).unwrap();
        let err = rsa_codec(OTHER_PUBLIC_KEY).verify(&token).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_algorithm_mismatch() {
        let token = rsa_codec(PUBLIC_KEY).sign(&sample_claims(NOW + 60)).unwrap();
        let err = hmac_codec(Algorithm::HS256, b"secret").verify(&token).unwrap_err();
        assert_eq!(err, TokenError::InvalidSigningAlgorithm);

        let token = hmac_codec(Algorithm::HS512, b"secret")
            .sign(&sample_claims(NOW + 60))
            .unwrap();
        let err = hmac_codec(Algorithm::HS256, b"secret").verify(&token).unwrap_err();
        assert_eq!(err, TokenError::InvalidSigningAlgorithm);
    }

    #[test]
    fn test_malformed_token() {
        let codec = hmac_codec(Algorithm::HS256, b"secret");
        assert!(matches!(
            codec.verify("invalid.token.here"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(codec.verify(""), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_expired_token_keeps_claims() {
        let codec = hmac_codec(Algorithm::HS256, b"secret");
        let claims = sample_claims(NOW - 1);
        let token = codec.sign(&claims).unwrap();

        match codec.verify(&token) {
            Err(TokenError::Expired { claims: decoded }) => assert_eq!(decoded, claims),
            other => panic!("expected expiry, got {other:?}"),
        }
    }

    #[test]
    fn test_expiring_this_second_is_still_valid() {
        let codec = hmac_codec(Algorithm::HS256, b"secret");
        let token = codec.sign(&sample_claims(NOW)).unwrap();
        assert!(codec.verify(&token).is_ok());
    }

    #[test]
    fn test_missing_exp_passes_codec() {
        let codec = hmac_codec(Algorithm::HS256, b"secret");
        let token = codec.sign(&ClaimSet::new().with("identity", "1")).unwrap();
        assert!(codec.verify(&token).is_ok());
    }

    struct StaticResolver {
        encoding: EncodingKey,
        decoding: DecodingKey,
    }

    impl KeyResolver for StaticResolver {
        fn decoding_key(&self, header: &Header) -> crate::error::Result<DecodingKey> {
            if header.alg == Algorithm::HS384 {
                Ok(self.decoding.clone())
            } else {
                Err(AuthError::InvalidSigningAlgorithm)
            }
        }

        fn encoding_key(&self) -> Option<&EncodingKey> {
            Some(&self.encoding)
        }
    }

    #[test]
    fn test_external_resolver_bypasses_key_settings() {
        let resolver = Arc::new(StaticResolver {
            encoding: EncodingKey::from_secret(b"resolved"),
            decoding: DecodingKey::from_secret(b"resolved"),
        });
        let keys = SigningKeys::load(&KeyConfig::External(resolver), Algorithm::HS384).unwrap();
        let codec = TokenCodec::new(Algorithm::HS384, keys, clock());

        let claims = sample_claims(NOW + 60);
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), claims);

        let foreign = hmac_codec(Algorithm::HS256, b"resolved")
            .sign(&claims)
            .unwrap();
        assert!(matches!(
            codec.verify(&foreign),
            Err(TokenError::KeyResolution(_))
        ));
    }

    #[test]
    fn test_error_kinds_map_to_auth_errors() {
        assert_eq!(
            AuthError::from(TokenError::Expired { claims: ClaimSet::new() }),
            AuthError::ExpiredToken
        );
        assert_eq!(
            AuthError::from(TokenError::InvalidSigningAlgorithm),
            AuthError::InvalidSigningAlgorithm
        );
        assert!(matches!(
            AuthError::from(TokenError::InvalidSignature),
            AuthError::InvalidToken(_)
        ));
    }
}
