use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use bitereserve_server::config::CorsConfig;
use bitereserve_server::{configure, maintenance, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // Same-origin only
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .supports_credentials()
    };

    cors.max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!(environment = %config.environment, "Configuration loaded successfully");

    let state = AppState::new(config.clone())
        .await
        .context("failed to initialise application state")?;
    state.db.run_migrations().await.context("failed to run migrations")?;
    info!("Database migrations applied");

    let sweeper = maintenance::spawn(state.clone());

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .with_context(|| format!("failed to bind {}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let cors_config = config.cors.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_config))
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(configure)
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    sweeper.abort();
    state.shutdown().await?;
    info!("Server stopped");
    Ok(())
}
