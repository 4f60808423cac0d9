//! Request logging middleware
//!
//! Every request is logged once it completes, together with what the JWT
//! middleware decided about it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use jwt_middleware::{AuthRejection, Identity, JwtToken};
use std::future::{ready, Ready};
use std::time::Instant;

/// What the JWT middleware recorded on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Verified token present
    Authenticated,
    /// Failure recorded but the request kept going
    Rejected,
    /// Unprotected route, exempt path, or rejected before reaching the
    /// handler
    Anonymous,
}

impl AuthOutcome {
    pub fn of(req: &HttpRequest) -> Self {
        let extensions = req.extensions();
        if extensions.contains::<JwtToken>() {
            AuthOutcome::Authenticated
        } else if extensions.contains::<AuthRejection>() {
            AuthOutcome::Rejected
        } else {
            AuthOutcome::Anonymous
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthOutcome::Authenticated => "authenticated",
            AuthOutcome::Rejected => "rejected",
            AuthOutcome::Anonymous => "anonymous",
        }
    }
}

/// Logs method, path, status, latency and auth outcome of every request
#[derive(Clone, Default)]
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingService { service }))
    }
}

pub struct RequestLoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().clone();
        // query strings may carry tokens or passwords
        let path = req.path().to_string();

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status();
            let duration_ms = start.elapsed().as_millis() as u64;
            let auth = AuthOutcome::of(res.request());
            let identity = res
                .request()
                .extensions()
                .get::<Identity>()
                .map(|identity| identity.0.to_string());

            if status.is_client_error() || status.is_server_error() {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms,
                    auth = auth.as_str(),
                    "HTTP request rejected"
                );
            } else {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    duration_ms,
                    auth = auth.as_str(),
                    identity = identity.as_deref().unwrap_or("-"),
                    "HTTP request completed"
                );
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App, HttpResponse};
    use jwt_middleware::ClaimValue;

    #[actix_web::test]
    async fn test_outcome_from_extensions() {
        let req = test::TestRequest::default().to_http_request();
        assert_eq!(AuthOutcome::of(&req), AuthOutcome::Anonymous);

        req.extensions_mut().insert(AuthRejection {
            status: StatusCode::UNAUTHORIZED,
            message: "auth header is empty".to_string(),
        });
        assert_eq!(AuthOutcome::of(&req), AuthOutcome::Rejected);

        req.extensions_mut().insert(JwtToken("abc".to_string()));
        req.extensions_mut().insert(Identity(ClaimValue::from(7i64)));
        assert_eq!(AuthOutcome::of(&req), AuthOutcome::Authenticated);
    }

    #[actix_web::test]
    async fn test_responses_pass_through_unchanged() {
        let app = test::init_service(
            App::new()
                .wrap(RequestLogging)
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().body("fine") }))
                .route(
                    "/denied",
                    web::get().to(|| async { HttpResponse::Unauthorized().finish() }),
                ),
        )
        .await;

        let req = test::TestRequest::get().uri("/ok").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, "fine");

        let req = test::TestRequest::get().uri("/denied").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
