//! Composition root of the middleware
//!
//! `JwtAuth` owns the locator, codec, policy and issuer together with the
//! injected hooks. It is built once at startup, shared read-only behind an
//! `Arc` and never mutated afterwards.

use crate::claims::{ClaimSet, ClaimValue};
use crate::clock::{Clock, SystemClock};
use crate::codec::TokenCodec;
use crate::config::{JwtConfig, DEFAULT_IDENTITY_KEY, DEFAULT_TOKEN_HEAD_NAME};
use crate::error::{AuthError, Result};
use crate::hooks::{
    AllowAll, AuthResponder, Authenticator, Authorizer, ClaimIdentity, IdentityHandler,
    JsonResponder, LoginFlow,
};
use crate::identity::AuthRejection;
use crate::issuer::{removal_cookie, IssuedToken, SessionIssuer};
use crate::keys::{parse_algorithm, SigningKeys};
use crate::locator::{
    form_fields, parse_token_lookups, CredentialLocator, CredentialSource, RequestCredentials,
};
use crate::policy::ExemptPaths;
use crate::validator::validate_claims;
use actix_web::cookie::Cookie;
use actix_web::http::header::{HeaderValue, WWW_AUTHENTICATE};
use actix_web::web::Bytes;
use actix_web::{HttpRequest, HttpResponse};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A request that passed verification
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub claims: ClaimSet,
    pub identity: Option<ClaimValue>,
}

pub struct JwtAuth {
    config: JwtConfig,
    locator: CredentialLocator,
    codec: Arc<TokenCodec>,
    issuer: SessionIssuer,
    policy: ExemptPaths,
    clock: Arc<dyn Clock>,
    login: Box<dyn LoginFlow>,
    authorizer: Box<dyn Authorizer>,
    identity: Box<dyn IdentityHandler>,
    responder: Box<dyn AuthResponder>,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth").finish_non_exhaustive()
    }
}

pub struct JwtAuthBuilder {
    config: JwtConfig,
    login: Option<Box<dyn LoginFlow>>,
    authorizer: Box<dyn Authorizer>,
    identity: Option<Box<dyn IdentityHandler>>,
    responder: Box<dyn AuthResponder>,
    clock: Arc<dyn Clock>,
}

impl JwtAuthBuilder {
    pub fn authenticator<A: Authenticator>(mut self, authenticator: A) -> Self {
        self.login = Some(Box::new(authenticator));
        self
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer + 'static) -> Self {
        self.authorizer = Box::new(authorizer);
        self
    }

    pub fn identity_handler(mut self, handler: impl IdentityHandler + 'static) -> Self {
        self.identity = Some(Box::new(handler));
        self
    }

    pub fn responder(mut self, responder: impl AuthResponder + 'static) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate settings and load key material.
    ///
    /// Any error here is a deployment mistake; the service must not start.
    pub fn build(self) -> Result<JwtAuth> {
        let mut config = self.config;

        let algorithm = parse_algorithm(&config.algorithm)?;
        let lookups = parse_token_lookups(&config.token_lookup)?;

        config.token_head_name = config.token_head_name.trim().to_string();
        if config.token_head_name.is_empty() {
            config.token_head_name = DEFAULT_TOKEN_HEAD_NAME.to_string();
        }
        if config.identity_key.is_empty() {
            config.identity_key = DEFAULT_IDENTITY_KEY.to_string();
        }
        if config.ttl <= Duration::zero() {
            config.ttl = Duration::hours(1);
        }

        let keys = SigningKeys::load(&config.keys, algorithm)?;
        let login = self.login.ok_or(AuthError::MissingAuthenticator)?;

        let codec = Arc::new(TokenCodec::new(algorithm, keys, self.clock.clone()));
        let issuer = SessionIssuer::new(
            codec.clone(),
            self.clock.clone(),
            config.ttl,
            config.max_refresh,
        );
        let identity = self
            .identity
            .unwrap_or_else(|| Box::new(ClaimIdentity::new(config.identity_key.clone())));

        let auth = JwtAuth {
            locator: CredentialLocator::new(lookups, config.token_head_name.clone()),
            policy: ExemptPaths::parse(&config.exempt_paths),
            codec,
            issuer,
            clock: self.clock,
            login,
            authorizer: self.authorizer,
            identity,
            responder: self.responder,
            config,
        };

        info!(
            realm = %auth.config.realm,
            algorithm = ?algorithm,
            ttl_secs = auth.config.ttl.num_seconds(),
            max_refresh_secs = auth.config.max_refresh.num_seconds(),
            exempt_paths = ?auth.policy.prefixes(),
            "JWT middleware initialized"
        );

        Ok(auth)
    }
}

impl JwtAuth {
    pub fn builder(config: JwtConfig) -> JwtAuthBuilder {
        JwtAuthBuilder {
            config,
            login: None,
            authorizer: Box::new(AllowAll),
            identity: None,
            responder: Box::new(JsonResponder),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    pub fn policy(&self) -> &ExemptPaths {
        &self.policy
    }

    pub(crate) fn reads_form(&self) -> bool {
        self.locator.reads_form()
    }

    /// Decide whether a request is admitted.
    ///
    /// `Ok(None)` admits without identity (missing credential on an exempt
    /// path), `Ok(Some(_))` admits with a verified session, `Err` rejects.
    pub fn evaluate(
        &self,
        req: &HttpRequest,
        source: &impl CredentialSource,
    ) -> Result<Option<Session>> {
        let path = req.path();

        let token = match self.locator.locate(source) {
            Ok(token) => token,
            Err(e) if self.policy.tolerates(path, &e) => {
                debug!(path = %path, reason = %e, "No credential on exempt path, admitting anonymously");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let claims = self.codec.verify(&token)?;
        validate_claims(&claims, self.clock.now())?;

        let identity = self.identity.identity(&claims);
        if !self.authorizer.authorize(identity.as_ref(), req) {
            return Err(AuthError::Forbidden);
        }

        debug!(path = %path, identity = ?identity, "JWT verified");
        Ok(Some(Session {
            token,
            claims,
            identity,
        }))
    }

    /// `<head> <token>` for the Authorization header
    pub fn authorization_value(&self, token: &str) -> String {
        format!("{} {}", self.config.token_head_name, token)
    }

    pub fn challenge(&self) -> HeaderValue {
        HeaderValue::from_str(&format!("JWT realm={}", self.config.realm))
            .unwrap_or_else(|_| HeaderValue::from_static("JWT"))
    }

    /// Rejection response: challenge header plus the responder's body
    pub fn unauthorized(&self, req: &HttpRequest, err: &AuthError) -> HttpResponse {
        let message = self.responder.message(err, req);
        let mut response = self.responder.unauthorized(req, err.status_code(), message);
        response.headers_mut().insert(WWW_AUTHENTICATE, self.challenge());
        response
    }

    /// Failure record for requests that continue after a rejection
    pub fn rejection(&self, req: &HttpRequest, err: &AuthError) -> AuthRejection {
        AuthRejection {
            status: err.status_code(),
            message: self.responder.message(err, req),
        }
    }

    /// Authenticate the login request and issue a token
    pub async fn login(&self, req: &HttpRequest, body: &Bytes) -> HttpResponse {
        let payload = match self.login.login_claims(req, body).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Login rejected");
                return self.unauthorized(req, &e);
            }
        };

        let issued = match self.issuer.issue(payload) {
            Ok(issued) => issued,
            Err(e) => {
                error!(error = %e, "Failed to issue token on login");
                return self.unauthorized(req, &AuthError::FailedTokenCreation);
            }
        };

        let mut response = self.responder.login(req, &issued.token, issued.expire);
        self.attach_cookie(&mut response, self.issuer.session_cookie(&self.config.cookie, &issued.token));
        response
    }

    /// Re-sign the presented token if it is inside the refresh window.
    /// `body` is consulted for `form:` lookups.
    pub fn refresh(&self, req: &HttpRequest, body: &Bytes) -> HttpResponse {
        match self.refresh_token(req, body) {
            Ok(issued) => {
                let mut response = self.responder.refresh(req, &issued.token, issued.expire);
                self.attach_cookie(
                    &mut response,
                    self.issuer.session_cookie(&self.config.cookie, &issued.token),
                );
                response
            }
            Err(e) => {
                warn!(error = %e, "Token refresh rejected");
                self.unauthorized(req, &e)
            }
        }
    }

    /// Locate the presented token in the request and refresh it
    pub fn refresh_token(&self, req: &HttpRequest, body: &[u8]) -> Result<IssuedToken> {
        let form = form_fields(req, body);
        let token = self
            .locator
            .locate(&RequestCredentials::new(req, form.as_ref()))?;
        self.issuer.refresh(&token)
    }

    /// Clear the token cookie
    pub fn logout(&self, req: &HttpRequest) -> HttpResponse {
        let mut response = self.responder.logout(req);
        self.attach_cookie(&mut response, removal_cookie(&self.config.cookie));
        response
    }

    fn attach_cookie(&self, response: &mut HttpResponse, cookie: Option<Cookie<'static>>) {
        if let Some(cookie) = cookie {
            if let Err(e) = response.add_cookie(&cookie) {
                warn!(error = %e, "Failed to set token cookie");
            }
        }
    }
}
