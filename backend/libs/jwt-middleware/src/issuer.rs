//! Token issuance and refresh
//!
//! A signed token is never mutated: refresh copies every claim of the
//! presented token into a new set and overwrites only `exp` and `orig_iat`.

use crate::claims::{ClaimSet, EXP, ORIG_IAT};
use crate::clock::Clock;
use crate::codec::{TokenCodec, TokenError};
use crate::config::CookieOptions;
use crate::error::{AuthError, Result};
use actix_web::cookie::{time, Cookie};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expire: DateTime<Utc>,
}

pub struct SessionIssuer {
    codec: Arc<TokenCodec>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_refresh: Duration,
}

impl SessionIssuer {
    pub(crate) fn new(
        codec: Arc<TokenCodec>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        max_refresh: Duration,
    ) -> Self {
        Self {
            codec,
            clock,
            ttl,
            max_refresh,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a fresh token carrying `payload` plus `exp` and `orig_iat`
    pub fn issue(&self, payload: ClaimSet) -> Result<IssuedToken> {
        self.stamp_and_sign(payload)
    }

    /// Exchange a token that is still inside the refresh window
    pub fn refresh(&self, presented: &str) -> Result<IssuedToken> {
        let claims = self.check_refreshable(presented)?;
        self.stamp_and_sign(claims)
    }

    /// Verify `presented`, tolerating only expiry, and check the refresh
    /// window against `orig_iat`.
    pub fn check_refreshable(&self, presented: &str) -> Result<ClaimSet> {
        let claims = match self.codec.verify(presented) {
            Ok(claims) => claims,
            Err(TokenError::Expired { claims }) => claims,
            Err(e) => return Err(e.into()),
        };

        let orig_iat = claims
            .timestamp(ORIG_IAT)
            .ok_or(AuthError::MissingOrigIatField)?;

        let oldest_allowed = (self.clock.now() - self.max_refresh).timestamp();
        if orig_iat < oldest_allowed {
            return Err(AuthError::ExpiredToken);
        }

        Ok(claims)
    }

    fn stamp_and_sign(&self, mut claims: ClaimSet) -> Result<IssuedToken> {
        let now = self.clock.now();
        let expire = now + self.ttl;

        claims.insert(EXP, expire.timestamp());
        claims.insert(ORIG_IAT, now.timestamp());

        let token = self.codec.sign(&claims)?;
        Ok(IssuedToken { token, expire })
    }

    /// Cookie carrying `token`, or `None` when cookies are disabled
    pub fn session_cookie(&self, options: &CookieOptions, token: &str) -> Option<Cookie<'static>> {
        if !options.send {
            return None;
        }
        let max_age = options.max_age.unwrap_or(self.ttl);
        Some(build_cookie(options, token.to_string(), max_age.num_seconds()))
    }
}

/// Cookie that clears the token cookie, or `None` when cookies are disabled
pub fn removal_cookie(options: &CookieOptions) -> Option<Cookie<'static>> {
    options
        .send
        .then(|| build_cookie(options, String::new(), 0))
}

fn build_cookie(options: &CookieOptions, value: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::build(options.name.clone(), value)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .secure(options.secure)
        .http_only(options.http_only)
        .finish();

    if let Some(domain) = &options.domain {
        cookie.set_domain(domain.clone());
    }
    if let Some(same_site) = options.same_site {
        cookie.set_same_site(same_site);
    }
    cookie
}
