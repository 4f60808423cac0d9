//! Values published into the request extensions by the middleware

use crate::claims::{ClaimSet, ClaimValue};
use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};

/// Verified claim set of the current request
#[derive(Debug, Clone, PartialEq)]
pub struct JwtPayload(pub ClaimSet);

/// Identity resolved from the claim set
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub ClaimValue);

/// Raw token string that was verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtToken(pub String);

/// Failure recorded when the middleware is configured not to abort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection {
    pub status: StatusCode,
    pub message: String,
}

/// Claim set of the current request, empty when none was published
pub fn extract_claims(req: &HttpRequest) -> ClaimSet {
    req.extensions()
        .get::<JwtPayload>()
        .map(|payload| payload.0.clone())
        .unwrap_or_default()
}

/// Token string of the current request, if one was verified
pub fn get_token(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<JwtToken>().map(|t| t.0.clone())
}

impl FromRequest for Identity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<Identity>() {
            Some(identity) => ready(Ok(identity.clone())),
            None => ready(Err(actix_web::error::ErrorUnauthorized(
                "User not authenticated",
            ))),
        }
    }
}

impl FromRequest for JwtPayload {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<JwtPayload>() {
            Some(payload) => ready(Ok(payload.clone())),
            None => ready(Err(actix_web::error::ErrorUnauthorized(
                "User not authenticated",
            ))),
        }
    }
}
