//! Error kinds surfaced by the JWT middleware
//!
//! Every terminal failure maps to exactly one `AuthError` variant. Variants
//! split into two families:
//!
//! - **configuration** errors, returned by `JwtAuthBuilder::build()` and
//!   fatal at startup (a misdeployment, the service must not start)
//! - **request** errors, turned into a rejected response for one request
//!   (normal traffic shape: bad, missing or expired credentials)

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------
    #[error("secret key is required")]
    MissingSecretKey,

    #[error("authenticator is undefined")]
    MissingAuthenticator,

    #[error("private key file unreadable")]
    NoPrivateKeyFile,

    #[error("public key file unreadable")]
    NoPublicKeyFile,

    #[error("private key invalid")]
    InvalidPrivateKey,

    #[error("public key invalid")]
    InvalidPublicKey,

    #[error("invalid token lookup: {0}")]
    InvalidTokenLookup(String),

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------
    #[error("missing Username or Password")]
    MissingLoginValues,

    #[error("incorrect Username or Password")]
    FailedAuthentication,

    #[error("failed to create JWT Token")]
    FailedTokenCreation,

    // ------------------------------------------------------------------
    // Credential lookup
    // ------------------------------------------------------------------
    #[error("auth header is empty")]
    EmptyAuthHeader,

    #[error("auth header is invalid")]
    InvalidAuthHeader,

    #[error("query token is empty")]
    EmptyQueryToken,

    #[error("cookie token is empty")]
    EmptyCookieToken,

    #[error("parameter token is empty")]
    EmptyParamToken,

    #[error("form post token is empty")]
    EmptyPostFormToken,

    // ------------------------------------------------------------------
    // Verification and claims
    // ------------------------------------------------------------------
    #[error("invalid signing algorithm")]
    InvalidSigningAlgorithm,

    #[error("{0}")]
    InvalidToken(String),

    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    #[error("token is expired")]
    ExpiredToken,

    #[error("missing exp field")]
    MissingExpField,

    #[error("exp must be float64 format")]
    WrongFormatOfExp,

    #[error("orig_iat must be a numeric timestamp")]
    MissingOrigIatField,

    #[error("you don't have permission to access this resource")]
    Forbidden,
}

impl AuthError {
    /// HTTP status used when this error rejects a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingExpField | AuthError::WrongFormatOfExp => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            e if e.is_configuration() => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// True when no credential was supplied by the selected lookup source.
    ///
    /// Only these failures are tolerated on exempt paths.
    pub fn is_empty_credential(&self) -> bool {
        matches!(
            self,
            AuthError::EmptyAuthHeader
                | AuthError::EmptyQueryToken
                | AuthError::EmptyCookieToken
                | AuthError::EmptyParamToken
                | AuthError::EmptyPostFormToken
        )
    }

    /// True for errors that indicate a misconfigured deployment
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::MissingSecretKey
                | AuthError::MissingAuthenticator
                | AuthError::NoPrivateKeyFile
                | AuthError::NoPublicKeyFile
                | AuthError::InvalidPrivateKey
                | AuthError::InvalidPublicKey
                | AuthError::InvalidTokenLookup(_)
        )
    }
}

/// JSON body of a rejected request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        AuthError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let code = AuthError::status_code(self);
        HttpResponse::build(code).json(ErrorResponse {
            code: code.as_u16(),
            message: self.to_string(),
        })
    }
}
