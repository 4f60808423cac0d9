use actix_web::{App, HttpServer};
use anyhow::Context;
use api_gateway::{build_auth, config::Config, logging::RequestLogging, routes};
use tracing::info;
use tracing_subscriber::prelude::*;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_gateway=debug,jwt_middleware=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();

    info!("Starting API Gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;
    let auth = build_auth(&config)?;

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    info!(
        address = %bind_address,
        workers = config.server.workers,
        realm = %config.jwt.realm,
        "API Gateway listening"
    );

    HttpServer::new(move || {
        let auth = auth.clone();
        App::new()
            .wrap(RequestLogging)
            .configure(move |cfg| routes::configure_routes(cfg, auth))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("Server error")
}
