use actix_web::{web, HttpResponse};
use jwt_middleware::{
    login_handler, logout_handler, refresh_handler, Identity, JwtAuth, JwtAuthMiddleware,
    JwtPayload,
};
use serde_json::json;
use std::sync::Arc;

async fn health_check() -> &'static str {
    "ok"
}

/// Profile of the logged in user
async fn current_user(identity: Identity, payload: JwtPayload) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status_code": 0,
        "status_msg": "success",
        "user": {
            "id": identity.0.as_f64().map(|id| id as i64),
            "name": payload.0.get("username").and_then(|v| v.as_str()),
        },
    }))
}

/// Public feed, personalised when a token is presented
async fn feed(identity: Option<Identity>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status_code": 0,
        "video_list": [],
        "viewer_id": identity.and_then(|i| i.0.as_f64()).map(|id| id as i64),
    }))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, auth: Arc<JwtAuth>) {
    cfg.app_data(web::Data::from(auth.clone()));

    cfg.route("/health", web::get().to(health_check));

    // Session endpoints sit outside the authenticated scope
    cfg.route("/douyin/user/login/", web::post().to(login_handler))
        .route("/douyin/auth/refresh_token", web::get().to(refresh_handler))
        .route("/douyin/user/logout/", web::post().to(logout_handler));

    cfg.service(
        web::scope("/douyin")
            .wrap(JwtAuthMiddleware::new(auth))
            .route("/user/", web::get().to(current_user))
            .route("/feed/", web::get().to(feed)),
    );
}
