//! Pluggable behaviour injected into `JwtAuth`
//!
//! - `Authenticator`: checks login credentials and builds the token payload
//! - `Authorizer`: decides whether a verified identity may pass (default: allow)
//! - `IdentityHandler`: derives the identity from the claim set
//!   (default: the value under the identity key)
//! - `AuthResponder`: renders rejections and login/refresh/logout replies
//!   (default: JSON)

use crate::claims::{ClaimSet, ClaimValue};
use crate::error::{AuthError, ErrorResponse, Result};
use actix_web::http::StatusCode;
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Login credential check.
///
/// `authenticate` usually looks the user up in a store; the returned user is
/// handed to `payload` to build the application claims of the new token.
#[async_trait(?Send)]
pub trait Authenticator: Send + Sync + 'static {
    type User;

    async fn authenticate(&self, req: &HttpRequest, body: &Bytes) -> Result<Self::User>;

    fn payload(&self, _user: &Self::User) -> ClaimSet {
        ClaimSet::new()
    }
}

/// `Authenticator` with its user type erased
#[async_trait(?Send)]
pub(crate) trait LoginFlow: Send + Sync {
    async fn login_claims(&self, req: &HttpRequest, body: &Bytes) -> Result<ClaimSet>;
}

#[async_trait(?Send)]
impl<A: Authenticator> LoginFlow for A {
    async fn login_claims(&self, req: &HttpRequest, body: &Bytes) -> Result<ClaimSet> {
        let user = self.authenticate(req, body).await?;
        Ok(self.payload(&user))
    }
}

pub trait Authorizer: Send + Sync {
    fn authorize(&self, identity: Option<&ClaimValue>, req: &HttpRequest) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(Option<&ClaimValue>, &HttpRequest) -> bool + Send + Sync,
{
    fn authorize(&self, identity: Option<&ClaimValue>, req: &HttpRequest) -> bool {
        self(identity, req)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _identity: Option<&ClaimValue>, _req: &HttpRequest) -> bool {
        true
    }
}

pub trait IdentityHandler: Send + Sync {
    fn identity(&self, claims: &ClaimSet) -> Option<ClaimValue>;
}

impl<F> IdentityHandler for F
where
    F: Fn(&ClaimSet) -> Option<ClaimValue> + Send + Sync,
{
    fn identity(&self, claims: &ClaimSet) -> Option<ClaimValue> {
        self(claims)
    }
}

/// Identity stored under a single claim name
#[derive(Debug, Clone)]
pub struct ClaimIdentity {
    key: String,
}

impl ClaimIdentity {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl IdentityHandler for ClaimIdentity {
    fn identity(&self, claims: &ClaimSet) -> Option<ClaimValue> {
        claims.get(&self.key).cloned()
    }
}

pub trait AuthResponder: Send + Sync {
    /// User-visible message for a failure
    fn message(&self, err: &AuthError, _req: &HttpRequest) -> String {
        err.to_string()
    }

    fn unauthorized(&self, _req: &HttpRequest, status: StatusCode, message: String) -> HttpResponse {
        HttpResponse::build(status).json(ErrorResponse {
            code: status.as_u16(),
            message,
        })
    }

    fn login(&self, _req: &HttpRequest, token: &str, expire: DateTime<Utc>) -> HttpResponse {
        HttpResponse::Ok().json(TokenResponse::new(token, expire))
    }

    fn refresh(&self, _req: &HttpRequest, token: &str, expire: DateTime<Utc>) -> HttpResponse {
        HttpResponse::Ok().json(TokenResponse::new(token, expire))
    }

    fn logout(&self, _req: &HttpRequest) -> HttpResponse {
        HttpResponse::Ok().json(CodeResponse {
            code: StatusCode::OK.as_u16(),
        })
    }
}

/// `{code, message}` on failure, `{code, token, expire}` on login and refresh
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponder;

impl AuthResponder for JsonResponder {}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub code: u16,
    pub token: String,
    /// RFC 3339, second precision
    pub expire: String,
}

impl TokenResponse {
    pub fn new(token: &str, expire: DateTime<Utc>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            token: token.to_string(),
            expire: expire.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::EXP;
    use chrono::TimeZone;

    #[test]
    fn test_claim_identity() {
        let claims = ClaimSet::new().with("identity", 42i64).with(EXP, 1i64);
        let handler = ClaimIdentity::new("identity");
        assert_eq!(handler.identity(&claims), Some(ClaimValue::Number(42.0)));
        assert_eq!(ClaimIdentity::new("user_id").identity(&claims), None);
    }

    #[test]
    fn test_closure_identity_handler() {
        let handler = |claims: &ClaimSet| claims.get("username").cloned();
        let claims = ClaimSet::new().with("username", "douyin");
        assert_eq!(handler.identity(&claims), Some(ClaimValue::from("douyin")));
    }

    #[test]
    fn test_token_response_expire_format() {
        let expire = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let body = TokenResponse::new("tok", expire);
        assert_eq!(body.expire, "2024-01-02T03:04:05Z");
        assert_eq!(body.code, 200);
    }
}
