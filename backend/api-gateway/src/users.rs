//! Login credential check for the gateway
//!
//! Accounts are loaded at startup from `GATEWAY_USERS`
//! (`id:username:argon2-hash;...`). Passwords are verified against Argon2id
//! PHC strings.

use actix_web::http::header::CONTENT_TYPE;
use actix_web::web::Bytes;
use actix_web::HttpRequest;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use jwt_middleware::{AuthError, Authenticator, ClaimSet};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

// Verified against for unknown usernames so both outcomes cost one Argon2 run
static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("decoy-password").ok());

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("malformed user entry: {0}")]
    MalformedEntry(String),

    #[error("invalid user id in entry: {0}")]
    InvalidId(String),

    #[error("duplicate username: {0}")]
    DuplicateUsername(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password_hash: String,
}

/// In-memory accounts keyed by username
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    accounts: HashMap<String, Account>,
}

impl UserStore {
    /// Parse `id:username:hash` entries separated by `;`
    pub fn parse(entries: &str) -> Result<Self, UserStoreError> {
        let mut store = Self::default();
        for entry in entries.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.splitn(3, ':');
            let (Some(id), Some(username), Some(hash)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(UserStoreError::MalformedEntry(entry.to_string()));
            };

            let id = id
                .trim()
                .parse()
                .map_err(|_| UserStoreError::InvalidId(entry.to_string()))?;
            PasswordHash::new(hash.trim())
                .map_err(|_| UserStoreError::MalformedEntry(entry.to_string()))?;

            store.insert(id, username.trim(), hash.trim().to_string())?;
        }
        Ok(store)
    }

    /// Add an account from a plaintext password
    pub fn with_user(mut self, id: i64, username: &str, password: &str) -> Result<Self, UserStoreError> {
        let hash = hash_password(password)?;
        self.insert(id, username, hash)?;
        Ok(self)
    }

    fn insert(&mut self, id: i64, username: &str, password_hash: String) -> Result<(), UserStoreError> {
        if self.accounts.contains_key(username) {
            return Err(UserStoreError::DuplicateUsername(username.to_string()));
        }
        self.accounts.insert(
            username.to_string(),
            Account {
                user: User {
                    id,
                    username: username.to_string(),
                },
                password_hash,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// The matching user, or `None` for an unknown name or a wrong password
    pub fn verify(&self, username: &str, password: &str) -> Option<User> {
        let Some(account) = self.accounts.get(username) else {
            if let Some(decoy) = DECOY_HASH.as_deref() {
                let _ = verify_password(password, decoy);
            }
            return None;
        };
        match verify_password(password, &account.password_hash) {
            Ok(true) => Some(account.user.clone()),
            Ok(false) => None,
            Err(e) => {
                warn!(username = %username, error = %e, "Stored password hash is unusable");
                None
            }
        }
    }
}

/// Hash a password with Argon2id and a random salt, PHC encoded
pub fn hash_password(password: &str) -> Result<String, UserStoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserStoreError::Hashing(e.to_string()))
}

/// Constant time check of `password` against a PHC hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, UserStoreError> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| UserStoreError::Hashing(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(UserStoreError::Hashing(e.to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginValues {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Checks `username`/`password` from the query string, an urlencoded form
/// or a JSON body
pub struct PasswordAuthenticator {
    store: UserStore,
    identity_key: String,
}

impl PasswordAuthenticator {
    pub fn new(store: UserStore, identity_key: impl Into<String>) -> Self {
        Self {
            store,
            identity_key: identity_key.into(),
        }
    }

    fn login_values(req: &HttpRequest, body: &Bytes) -> LoginValues {
        let from_query: LoginValues =
            serde_urlencoded::from_str(req.query_string()).unwrap_or_default();
        if !from_query.username.is_empty() {
            return from_query;
        }

        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            serde_json::from_slice(body).unwrap_or_default()
        } else {
            serde_urlencoded::from_bytes(body).unwrap_or_default()
        }
    }
}

#[async_trait(?Send)]
impl Authenticator for PasswordAuthenticator {
    type User = User;

    async fn authenticate(&self, req: &HttpRequest, body: &Bytes) -> Result<User, AuthError> {
        let values = Self::login_values(req, body);
        if values.username.is_empty() || values.password.is_empty() {
            return Err(AuthError::MissingLoginValues);
        }

        match self.store.verify(&values.username, &values.password) {
            Some(user) => {
                debug!(user_id = user.id, "Login credentials accepted");
                Ok(user)
            }
            None => Err(AuthError::FailedAuthentication),
        }
    }

    fn payload(&self, user: &User) -> ClaimSet {
        ClaimSet::new()
            .with(self.identity_key.as_str(), user.id)
            .with("username", user.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn store() -> UserStore {
        UserStore::default().with_user(7, "douyin", "Passw0rd!").unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Passw0rd!", &hash).unwrap());
        assert!(!verify_password("passw0rd!", &hash).unwrap());
    }

    #[test]
    fn test_parse_user_entries() {
        let hash = hash_password("secret").unwrap();
        let store = UserStore::parse(&format!("1:alice:{hash}; 2:bob:{hash};")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.verify("bob", "secret"),
            Some(User {
                id: 2,
                username: "bob".to_string()
            })
        );
        assert!(UserStore::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        let hash = hash_password("secret").unwrap();
        assert!(matches!(
            UserStore::parse("alice"),
            Err(UserStoreError::MalformedEntry(_))
        ));
        assert!(matches!(
            UserStore::parse(&format!("x:alice:{hash}")),
            Err(UserStoreError::InvalidId(_))
        ));
        assert!(matches!(
            UserStore::parse("1:alice:not-a-hash"),
            Err(UserStoreError::MalformedEntry(_))
        ));
        assert!(matches!(
            UserStore::parse(&format!("1:alice:{hash};2:alice:{hash}")),
            Err(UserStoreError::DuplicateUsername(_))
        ));
    }

    #[actix_web::test]
    async fn test_authenticate_from_query() {
        let auth = PasswordAuthenticator::new(store(), "identity");
        let req = TestRequest::post()
            .uri("/douyin/user/login/?username=douyin&password=Passw0rd!")
            .to_http_request();

        let user = auth.authenticate(&req, &Bytes::new()).await.unwrap();
        assert_eq!(user.id, 7);

        let claims = auth.payload(&user);
        assert_eq!(claims.timestamp("identity"), Some(7));
        assert_eq!(claims.get("username").and_then(|v| v.as_str()), Some("douyin"));
    }

    #[actix_web::test]
    async fn test_authenticate_from_json_and_form() {
        let auth = PasswordAuthenticator::new(store(), "identity");

        let req = TestRequest::post()
            .insert_header((CONTENT_TYPE, "application/json"))
            .to_http_request();
        let body = Bytes::from_static(br#"{"username":"douyin","password":"Passw0rd!"}"#);
        assert!(auth.authenticate(&req, &body).await.is_ok());

        let req = TestRequest::post()
            .insert_header((CONTENT_TYPE, "application/x-www-form-urlencoded"))
            .to_http_request();
        let body = Bytes::from_static(b"username=douyin&password=wrong");
        assert_eq!(
            auth.authenticate(&req, &body).await,
            Err(AuthError::FailedAuthentication)
        );
    }

    #[actix_web::test]
    async fn test_missing_login_values() {
        let auth = PasswordAuthenticator::new(store(), "identity");
        let req = TestRequest::post()
            .uri("/douyin/user/login/?username=douyin")
            .to_http_request();
        assert_eq!(
            auth.authenticate(&req, &Bytes::new()).await,
            Err(AuthError::MissingLoginValues)
        );
    }

    #[test]
    fn test_unknown_user_still_runs_password_check() {
        let store = store();
        assert!(DECOY_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2id$")));
        assert_eq!(store.verify("nobody", "Passw0rd!"), None);
        assert_eq!(store.verify("nobody", "decoy-password"), None);
    }
}
