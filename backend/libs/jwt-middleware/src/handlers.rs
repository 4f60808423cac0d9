//! Login, refresh and logout endpoints
//!
//! Mount them with `web::Data<JwtAuth>` in the app data:
//!
//! ```ignore
//! App::new()
//!     .app_data(web::Data::from(auth.clone()))
//!     .route("/login", web::post().to(login_handler))
//! ```

use crate::auth::JwtAuth;
use actix_web::{web, HttpRequest, HttpResponse};

pub async fn login_handler(
    req: HttpRequest,
    body: web::Bytes,
    auth: web::Data<JwtAuth>,
) -> HttpResponse {
    auth.login(&req, &body).await
}

pub async fn refresh_handler(
    req: HttpRequest,
    body: web::Bytes,
    auth: web::Data<JwtAuth>,
) -> HttpResponse {
    auth.refresh(&req, &body)
}

pub async fn logout_handler(req: HttpRequest, auth: web::Data<JwtAuth>) -> HttpResponse {
    auth.logout(&req)
}
