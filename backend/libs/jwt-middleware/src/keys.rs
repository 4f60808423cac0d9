//! Key material for signing and verification
//!
//! Keys are parsed once while the middleware is built and held for the
//! process lifetime. Nothing here runs on the request path except the
//! external `KeyResolver`, which is the caller's responsibility.
//!
//! ## Modes
//!
//! Exactly one mode is active:
//!
//! - **HMAC**: one shared secret (`HS256`, `HS384`, `HS512`)
//! - **RSA**: PEM key pair (`RS256`, `RS384`, `RS512`); the private key may be
//!   a passphrase protected PKCS#8 document
//! - **External**: a `KeyResolver` picks the verification key per token and
//!   bypasses every other key setting

use crate::error::{AuthError, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where PEM bytes come from
#[derive(Clone)]
pub enum KeyMaterial {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl KeyMaterial {
    fn read(&self, unreadable: AuthError) -> Result<Vec<u8>> {
        match self {
            KeyMaterial::File(path) => std::fs::read(path).map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "Failed to read key file");
                unreadable
            }),
            KeyMaterial::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::File(path) => f.debug_tuple("File").field(path).finish(),
            KeyMaterial::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// RSA key pair source
#[derive(Clone)]
pub struct RsaKeySource {
    pub private_key: KeyMaterial,
    pub public_key: KeyMaterial,
    pub passphrase: Option<String>,
}

impl fmt::Debug for RsaKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeySource")
            .field("private_key", &self.private_key)
            .field("public_key", &self.public_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Caller supplied key lookup, consulted for every verified token
pub trait KeyResolver: Send + Sync {
    fn decoding_key(&self, header: &Header) -> Result<DecodingKey>;

    /// Key used to sign new tokens; without one, issuance fails
    fn encoding_key(&self) -> Option<&EncodingKey> {
        None
    }
}

/// Configured key mode, before parsing
#[derive(Clone, Default)]
pub enum KeyConfig {
    #[default]
    Unset,
    Secret(Vec<u8>),
    Rsa(RsaKeySource),
    External(Arc<dyn KeyResolver>),
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyConfig::Unset => f.write_str("Unset"),
            KeyConfig::Secret(_) => f.write_str("Secret(***)"),
            KeyConfig::Rsa(source) => f.debug_tuple("Rsa").field(source).finish(),
            KeyConfig::External(_) => f.write_str("External(..)"),
        }
    }
}

/// Parsed key handles
#[derive(Clone)]
pub(crate) enum SigningKeys {
    Hmac {
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
    Rsa {
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
    External(Arc<dyn KeyResolver>),
}

impl SigningKeys {
    pub(crate) fn load(config: &KeyConfig, algorithm: Algorithm) -> Result<Self> {
        if let KeyConfig::External(resolver) = config {
            return Ok(SigningKeys::External(resolver.clone()));
        }

        if is_rsa(algorithm) {
            let KeyConfig::Rsa(source) = config else {
                return Err(AuthError::InvalidPrivateKey);
            };
            let encoding = load_private_key(&source.private_key, source.passphrase.as_deref())?;
            let decoding = load_public_key(&source.public_key)?;
            return Ok(SigningKeys::Rsa { encoding, decoding });
        }

        match config {
            KeyConfig::Secret(secret) if !secret.is_empty() => Ok(SigningKeys::Hmac {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            _ => Err(AuthError::MissingSecretKey),
        }
    }
}

/// Supported algorithm names: HS256, HS384, HS512, RS256, RS384, RS512
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    match name.trim() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        _ => Err(AuthError::InvalidSigningAlgorithm),
    }
}

pub fn is_rsa(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
    )
}

fn load_private_key(material: &KeyMaterial, passphrase: Option<&str>) -> Result<EncodingKey> {
    let data = material.read(AuthError::NoPrivateKeyFile)?;

    match passphrase.filter(|p| !p.is_empty()) {
        Some(passphrase) => {
            let pem = std::str::from_utf8(&data).map_err(|_| AuthError::InvalidPrivateKey)?;
            let key = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase.as_bytes())
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to decrypt RSA private key");
                    AuthError::InvalidPrivateKey
                })?;
            let der = key.to_pkcs1_der().map_err(|_| AuthError::InvalidPrivateKey)?;
            Ok(EncodingKey::from_rsa_der(der.as_bytes()))
        }
        None => EncodingKey::from_rsa_pem(&data).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse RSA private key");
            AuthError::InvalidPrivateKey
        }),
    }
}

fn load_public_key(material: &KeyMaterial) -> Result<DecodingKey> {
    let data = material.read(AuthError::NoPublicKeyFile)?;
    DecodingKey::from_rsa_pem(&data).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse RSA public key");
        AuthError::InvalidPublicKey
    })
}
