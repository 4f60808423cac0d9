use crate::auth::{JwtAuth, Session};
use crate::identity::{Identity, JwtPayload, JwtToken};
use crate::locator::{form_fields, RequestCredentials, FORM_CONTENT_TYPE};
use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::PayloadError;
use actix_web::http::header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, WWW_AUTHENTICATE};
use actix_web::web::{Bytes, BytesMut};
use actix_web::{Error, HttpMessage, HttpResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use futures::StreamExt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;

/// JWT authentication middleware
///
/// Wrap a scope or resource. With a `form:` lookup, urlencoded bodies larger
/// than `JwtConfig::form_limit` are rejected with 413 before authentication.
/// A `param:` lookup only sees parameters that are
/// already matched, so it needs the middleware on the resource declaring them:
///
/// ```ignore
/// web::scope("/douyin").wrap(JwtAuthMiddleware::new(auth.clone()))
/// web::resource("/video/{token}").wrap(JwtAuthMiddleware::new(auth.clone()))
/// ```
pub struct JwtAuthMiddleware {
    auth: Arc<JwtAuth>,
}

impl JwtAuthMiddleware {
    pub fn new(auth: Arc<JwtAuth>) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<JwtAuth>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let auth = self.auth.clone();

        Box::pin(async move {
            let form = if auth.reads_form() && req.content_type() == FORM_CONTENT_TYPE {
                match buffer_form(&mut req, auth.config().form_limit).await {
                    Ok(body) => form_fields(req.request(), &body),
                    Err(e) => {
                        warn!(path = %req.path(), error = %e, "Form body rejected");
                        return Ok(req.into_response(HttpResponse::from_error(e)));
                    }
                }
            } else {
                None
            };

            // No clone of the HttpRequest may outlive this point: inner
            // scopes need exclusive access to it for routing.
            let outcome = auth.evaluate(
                req.request(),
                &RequestCredentials::new(req.request(), form.as_ref()),
            );

            match outcome {
                Ok(session) => {
                    let authorization = session
                        .as_ref()
                        .filter(|_| auth.config().send_authorization)
                        .and_then(|s| HeaderValue::from_str(&auth.authorization_value(&s.token)).ok());

                    if let Some(session) = session {
                        publish(&req, session);
                    }

                    let mut res = service.call(req).await?;
                    if let Some(value) = authorization {
                        res.headers_mut().insert(AUTHORIZATION, value);
                    }
                    Ok(res.map_into_boxed_body())
                }
                Err(err) => {
                    warn!(
                        path = %req.path(),
                        status = err.status_code().as_u16(),
                        error = %err,
                        "JWT authentication failed"
                    );

                    if auth.config().abort_on_failure {
                        let response = auth.unauthorized(req.request(), &err);
                        return Ok(req.into_response(response.map_into_boxed_body()));
                    }

                    let rejection = auth.rejection(req.request(), &err);
                    req.extensions_mut().insert(rejection);
                    let mut res = service.call(req).await?;
                    res.headers_mut().insert(WWW_AUTHENTICATE, auth.challenge());
                    Ok(res.map_into_boxed_body())
                }
            }
        })
    }
}

fn publish(req: &ServiceRequest, session: Session) {
    let mut extensions = req.extensions_mut();
    if let Some(identity) = session.identity {
        extensions.insert(Identity(identity));
    }
    extensions.insert(JwtPayload(session.claims));
    extensions.insert(JwtToken(session.token));
}

/// Read an urlencoded body of at most `limit` bytes and put it back for
/// downstream extractors
async fn buffer_form(req: &mut ServiceRequest, limit: usize) -> Result<Bytes, PayloadError> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(PayloadError::Overflow);
    }

    let mut payload = req.take_payload();
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(PayloadError::Overflow);
        }
        body.extend_from_slice(&chunk);
    }

    let body = body.freeze();
    req.set_payload(Payload::from(body.clone()));
    Ok(body)
}
