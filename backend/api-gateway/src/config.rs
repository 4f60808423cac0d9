//! Configuration for the API Gateway
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)

use anyhow::{Context, Result};
use chrono::Duration;
use jwt_middleware::config::{
    DEFAULT_IDENTITY_KEY, DEFAULT_REALM, DEFAULT_TOKEN_HEAD_NAME, DEFAULT_TOKEN_LOOKUP,
};
use jwt_middleware::keys::{is_rsa, parse_algorithm};
use jwt_middleware::{
    parse_same_site, CookieOptions, JwtConfig, KeyConfig, KeyMaterial, RsaKeySource,
};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Feed is readable without logging in
pub const DEFAULT_EXEMPT_PATHS: &str = "/douyin/test,/douyin/feed";

#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// JWT configuration
    pub jwt: JwtSettings,

    /// `id:username:argon2-hash` entries separated by `;`
    pub users: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Clone, PartialEq, Eq)]
pub struct JwtSettings {
    pub realm: String,
    pub algorithm: String,
    pub secret: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub private_key_passphrase: Option<String>,
    pub ttl_seconds: i64,
    pub max_refresh_seconds: i64,
    pub identity_key: String,
    pub token_lookup: String,
    pub token_head_name: String,
    pub exempt_paths: String,
    pub send_cookie: bool,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_domain: Option<String>,
    pub cookie_same_site: Option<String>,
    pub send_authorization: bool,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("realm", &self.realm)
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_refresh_seconds", &self.max_refresh_seconds)
            .field("token_lookup", &self.token_lookup)
            .field("exempt_paths", &self.exempt_paths)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
                workers: env::var("SERVER_WORKERS")
                    .ok()
                    .and_then(|w| w.parse().ok())
                    .unwrap_or(num_cpus::get()),
            },
            jwt: Self::jwt_from_env()?,
            users: env::var("GATEWAY_USERS").unwrap_or_default(),
        })
    }

    /// Load JWT configuration from environment variables
    fn jwt_from_env() -> Result<JwtSettings> {
        let algorithm = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());

        let ttl_seconds = env::var("JWT_EXPIRY_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .context("Invalid JWT_EXPIRY_SECONDS")?;

        let max_refresh_seconds = env::var("JWT_MAX_REFRESH_SECONDS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("Invalid JWT_MAX_REFRESH_SECONDS")?;

        info!(algorithm = %algorithm, "Loading JWT configuration from environment variables");

        Ok(JwtSettings {
            realm: env::var("JWT_REALM").unwrap_or_else(|_| DEFAULT_REALM.to_string()),
            algorithm,
            secret: env::var("JWT_SECRET").ok(),
            private_key_path: env::var("JWT_PRIVATE_KEY_FILE").ok().map(PathBuf::from),
            public_key_path: env::var("JWT_PUBLIC_KEY_FILE").ok().map(PathBuf::from),
            private_key_passphrase: env::var("JWT_PRIVATE_KEY_PASSPHRASE").ok(),
            ttl_seconds,
            max_refresh_seconds,
            identity_key: env::var("JWT_IDENTITY_KEY")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_KEY.to_string()),
            token_lookup: env::var("JWT_TOKEN_LOOKUP")
                .unwrap_or_else(|_| DEFAULT_TOKEN_LOOKUP.to_string()),
            token_head_name: env::var("JWT_TOKEN_HEAD_NAME")
                .unwrap_or_else(|_| DEFAULT_TOKEN_HEAD_NAME.to_string()),
            exempt_paths: env::var("JWT_EXEMPT_PATHS")
                .unwrap_or_else(|_| DEFAULT_EXEMPT_PATHS.to_string()),
            send_cookie: env_flag("JWT_SEND_COOKIE", false),
            cookie_name: env::var("JWT_COOKIE_NAME").unwrap_or_else(|_| "jwt".to_string()),
            cookie_secure: env_flag("JWT_COOKIE_SECURE", false),
            cookie_http_only: env_flag("JWT_COOKIE_HTTP_ONLY", true),
            cookie_domain: env::var("JWT_COOKIE_DOMAIN").ok(),
            cookie_same_site: env::var("JWT_COOKIE_SAME_SITE").ok(),
            send_authorization: env_flag("JWT_SEND_AUTHORIZATION", false),
        })
    }
}

impl JwtSettings {
    /// Middleware settings. Key problems surface when the middleware is built.
    pub fn to_jwt_config(&self) -> JwtConfig {
        JwtConfig {
            realm: self.realm.clone(),
            algorithm: self.algorithm.clone(),
            keys: self.key_config(),
            ttl: Duration::seconds(self.ttl_seconds),
            max_refresh: Duration::seconds(self.max_refresh_seconds),
            identity_key: self.identity_key.clone(),
            token_lookup: self.token_lookup.clone(),
            token_head_name: self.token_head_name.clone(),
            exempt_paths: self.exempt_paths.clone(),
            cookie: CookieOptions {
                send: self.send_cookie,
                name: self.cookie_name.clone(),
                max_age: None,
                secure: self.cookie_secure,
                http_only: self.cookie_http_only,
                domain: self.cookie_domain.clone(),
                same_site: self.cookie_same_site.as_deref().and_then(parse_same_site),
            },
            send_authorization: self.send_authorization,
            abort_on_failure: true,
            ..JwtConfig::default()
        }
    }

    fn key_config(&self) -> KeyConfig {
        if parse_algorithm(&self.algorithm).map(is_rsa).unwrap_or(false) {
            match (&self.private_key_path, &self.public_key_path) {
                (Some(private_key), Some(public_key)) => KeyConfig::Rsa(RsaKeySource {
                    private_key: KeyMaterial::File(private_key.clone()),
                    public_key: KeyMaterial::File(public_key.clone()),
                    passphrase: self.private_key_passphrase.clone(),
                }),
                _ => KeyConfig::Unset,
            }
        } else {
            match &self.secret {
                Some(secret) => KeyConfig::Secret(secret.as_bytes().to_vec()),
                None => KeyConfig::Unset,
            }
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const JWT_VARS: &[&str] = &[
        "JWT_SECRET",
        "JWT_ALGORITHM",
        "JWT_EXPIRY_SECONDS",
        "JWT_MAX_REFRESH_SECONDS",
        "JWT_EXEMPT_PATHS",
        "JWT_SEND_COOKIE",
        "JWT_COOKIE_SAME_SITE",
        "JWT_PRIVATE_KEY_FILE",
        "JWT_PUBLIC_KEY_FILE",
    ];

    fn clear_jwt_env() {
        for var in JWT_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env() {
        clear_jwt_env();
        env::set_var("JWT_SECRET", "test-secret-key");
        env::set_var("JWT_EXPIRY_SECONDS", "7200");
        env::set_var("JWT_MAX_REFRESH_SECONDS", "86400");
        env::set_var("JWT_SEND_COOKIE", "true");
        env::set_var("JWT_COOKIE_SAME_SITE", "Lax");

        let settings = Config::jwt_from_env().unwrap();
        assert_eq!(settings.algorithm, "HS256");
        assert_eq!(settings.ttl_seconds, 7200);
        assert_eq!(settings.exempt_paths, DEFAULT_EXEMPT_PATHS);

        let config = settings.to_jwt_config();
        assert_eq!(config.ttl, Duration::hours(2));
        assert_eq!(config.max_refresh, Duration::hours(24));
        assert!(config.cookie.send);
        assert!(config.cookie.http_only);
        assert!(matches!(config.keys, KeyConfig::Secret(ref s) if s == b"test-secret-key"));
        assert_eq!(
            config.cookie.same_site,
            Some(actix_web::cookie::SameSite::Lax)
        );

        clear_jwt_env();
    }

    #[test]
    #[serial]
    fn test_invalid_expiry_is_rejected() {
        clear_jwt_env();
        env::set_var("JWT_EXPIRY_SECONDS", "one hour");

        assert!(Config::jwt_from_env().is_err());

        clear_jwt_env();
    }

    #[test]
    #[serial]
    fn test_rsa_requires_both_key_files() {
        clear_jwt_env();
        env::set_var("JWT_ALGORITHM", "RS256");
        env::set_var("JWT_PRIVATE_KEY_FILE", "/etc/nova/jwt.pem");

        let settings = Config::jwt_from_env().unwrap();
        assert!(matches!(settings.to_jwt_config().keys, KeyConfig::Unset));

        env::set_var("JWT_PUBLIC_KEY_FILE", "/etc/nova/jwt.pub");
        let settings = Config::jwt_from_env().unwrap();
        assert!(matches!(settings.to_jwt_config().keys, KeyConfig::Rsa(_)));

        clear_jwt_env();
    }

    #[test]
    fn test_debug_hides_secret() {
        let settings = JwtSettings {
            secret: Some("do-not-print".to_string()),
            ..test_settings()
        };
        assert!(!format!("{settings:?}").contains("do-not-print"));
    }

    fn test_settings() -> JwtSettings {
        JwtSettings {
            realm: DEFAULT_REALM.to_string(),
            algorithm: "HS256".to_string(),
            secret: None,
            private_key_path: None,
            public_key_path: None,
            private_key_passphrase: None,
            ttl_seconds: 3600,
            max_refresh_seconds: 0,
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
            token_lookup: DEFAULT_TOKEN_LOOKUP.to_string(),
            token_head_name: DEFAULT_TOKEN_HEAD_NAME.to_string(),
            exempt_paths: DEFAULT_EXEMPT_PATHS.to_string(),
            send_cookie: false,
            cookie_name: "jwt".to_string(),
            cookie_secure: false,
            cookie_http_only: true,
            cookie_domain: None,
            cookie_same_site: None,
            send_authorization: false,
        }
    }
}
