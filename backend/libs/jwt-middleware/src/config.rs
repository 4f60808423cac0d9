//! Middleware settings
//!
//! `JwtConfig` is plain data with sensible defaults; it is validated and
//! turned into key handles by `JwtAuth::builder(config).build()`, after
//! which nothing is mutated.

use crate::keys::KeyConfig;
use actix_web::cookie::SameSite;
use chrono::Duration;

pub const DEFAULT_REALM: &str = "nova jwt";
pub const DEFAULT_ALGORITHM: &str = "HS256";
pub const DEFAULT_IDENTITY_KEY: &str = "identity";
pub const DEFAULT_TOKEN_LOOKUP: &str = "header:Authorization";
pub const DEFAULT_TOKEN_HEAD_NAME: &str = "Bearer";
pub const DEFAULT_EXEMPT_PATHS: &str = "/douyin/test";
pub const DEFAULT_COOKIE_NAME: &str = "jwt";
/// Same ceiling actix applies to `web::Form`
pub const DEFAULT_FORM_LIMIT: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Realm named in the `WWW-Authenticate` challenge
    pub realm: String,
    /// HS256, HS384, HS512, RS256, RS384 or RS512
    pub algorithm: String,
    pub keys: KeyConfig,
    /// Token lifetime
    pub ttl: Duration,
    /// How long after the original issue time a token may still be
    /// refreshed. Zero disables refresh past the issuing second.
    pub max_refresh: Duration,
    /// Claim holding the identity
    pub identity_key: String,
    /// Comma separated `<source>:<name>` list; sources are header, query,
    /// cookie, param and form
    pub token_lookup: String,
    /// Scheme expected in front of the token in a header
    pub token_head_name: String,
    /// Comma separated path prefixes where a missing credential is tolerated
    pub exempt_paths: String,
    pub cookie: CookieOptions,
    /// Echo `Authorization: <head> <token>` on every authenticated response
    pub send_authorization: bool,
    /// Stop the request on failure. When false the downstream service still
    /// runs with an `AuthRejection` carrying the responder's message, and
    /// the downstream response is the one sent.
    pub abort_on_failure: bool,
    /// Largest urlencoded body buffered for a `form:` lookup, in bytes
    pub form_limit: usize,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            realm: DEFAULT_REALM.to_string(),
            algorithm: DEFAULT_ALGORITHM.to_string(),
            keys: KeyConfig::Unset,
            ttl: Duration::hours(1),
            max_refresh: Duration::zero(),
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            token_lookup: DEFAULT_TOKEN_LOOKUP.to_string(),
            token_head_name: DEFAULT_TOKEN_HEAD_NAME.to_string(),
            exempt_paths: DEFAULT_EXEMPT_PATHS.to_string(),
            cookie: CookieOptions::default(),
            send_authorization: false,
            abort_on_failure: true,
            form_limit: DEFAULT_FORM_LIMIT,
        }
    }
}

/// Token cookie written on login and refresh
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub send: bool,
    pub name: String,
    /// Defaults to the token ttl
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub domain: Option<String>,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            send: false,
            name: DEFAULT_COOKIE_NAME.to_string(),
            max_age: None,
            secure: false,
            http_only: false,
            domain: None,
            same_site: None,
        }
    }
}

/// Parse a `SameSite` attribute name (case insensitive)
pub fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
