//! # JWT Middleware
//!
//! Token authentication for Nova Actix services
//!
//! ## Modules
//! - `locator`: finds the credential in the header, query, cookie, path or form
//! - `codec`: signs and verifies tokens (HMAC, RSA or an external key resolver)
//! - `validator`: checks the `exp` claim
//! - `policy`: path prefixes where a missing credential is tolerated
//! - `issuer`: login token issuance and refresh window
//! - `middleware`: the actix `Transform` gating a scope
//! - `handlers`: login, refresh and logout endpoints
//!
//! ## Example
//!
//! ```ignore
//! let auth = Arc::new(
//!     JwtAuth::builder(JwtConfig {
//!         keys: KeyConfig::Secret(secret),
//!         ..JwtConfig::default()
//!     })
//!     .authenticator(users)
//!     .build()?,
//! );
//!
//! App::new()
//!     .app_data(web::Data::from(auth.clone()))
//!     .route("/login", web::post().to(login_handler))
//!     .service(web::scope("/api").wrap(JwtAuthMiddleware::new(auth.clone())))
//! ```

pub mod auth;
pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod identity;
pub mod issuer;
pub mod keys;
pub mod locator;
pub mod middleware;
pub mod policy;
pub mod validator;

pub use auth::{JwtAuth, JwtAuthBuilder, Session};
pub use claims::{ClaimSet, ClaimValue};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{TokenCodec, TokenError};
pub use config::{parse_same_site, CookieOptions, JwtConfig};
pub use error::{AuthError, ErrorResponse, Result};
pub use handlers::{login_handler, logout_handler, refresh_handler};
pub use hooks::{
    AllowAll, AuthResponder, Authenticator, Authorizer, ClaimIdentity, IdentityHandler,
    JsonResponder, TokenResponse,
};
pub use identity::{extract_claims, get_token, AuthRejection, Identity, JwtPayload, JwtToken};
pub use issuer::{IssuedToken, SessionIssuer};
pub use keys::{KeyConfig, KeyMaterial, KeyResolver, RsaKeySource};
pub use middleware::JwtAuthMiddleware;
