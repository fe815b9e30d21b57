pub mod analytics;
pub mod auth;
pub mod billing;
pub mod campaigns;
pub mod claims;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod maintenance;
pub mod reservations;
pub mod restaurants;
pub mod tracking;

use std::sync::Arc;
use std::time::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimiter, RateLimitConfig};
pub use billing::StripeClient;
pub use db::DbOperations;
pub use email::{EmailClient, EmailSender};

/// Health check endpoint handler
/// Returns a JSON response with server status, timestamp and pool usage
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let pool = state.db.get_pool_status().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": pool,
    })))
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub stripe: Arc<StripeClient>,
    pub mailer: Arc<dyn EmailSender>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect(&config.database.url)
            .await
            .map_err(|e| AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string())))?;

        let mailer: Arc<dyn EmailSender> = Arc::new(EmailClient::new(&config.email));
        Ok(Self::from_parts(config, pool, mailer))
    }

    /// Wires the services around an existing pool and mail transport.
    pub fn from_parts(config: Settings, pool: PgPool, mailer: Arc<dyn EmailSender>) -> Self {
        let db = DbOperations::new(Arc::new(pool));
        let auth_service = AuthService::new(
            db.clone(),
            config.auth.jwt_secret.clone(),
            config.auth.token_expiry_hours,
        );
        let rate_limiter = RateLimiter::new(RateLimitConfig::new(
            config.tracking.events_per_minute,
            config.tracking.reservations_per_minute,
        ));
        let stripe = StripeClient::new(config.stripe.clone());

        Self {
            config: Arc::new(config),
            db,
            auth_service: Arc::new(auth_service),
            rate_limiter: Arc::new(rate_limiter),
            stripe: Arc::new(stripe),
            mailer,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.db.pool().close().await;
        Ok(())
    }
}

/// Registers every route of the API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/c/{code}", web::get().to(tracking::handlers::campaign_redirect))
        .service(
            web::scope("/api")
                .route("/auth/register", web::post().to(auth::handlers::register))
                .route("/auth/login", web::post().to(auth::handlers::login))
                .route("/auth/logout", web::post().to(auth::handlers::logout))
                .route("/me", web::get().to(auth::handlers::me))
                .route("/track", web::post().to(tracking::handlers::track))
                .route("/restaurants", web::get().to(restaurants::handlers::search))
                .route("/restaurants/by-slug/{slug}", web::get().to(restaurants::handlers::get_by_slug))
                .route("/restaurants/{id}", web::patch().to(restaurants::handlers::update))
                .route("/restaurants/{id}/emails", web::get().to(restaurants::handlers::list_emails))
                .route("/restaurants/{id}/emails", web::post().to(restaurants::handlers::add_email))
                .route("/restaurants/{id}/emails/{email_id}", web::delete().to(restaurants::handlers::delete_email))
                .route("/restaurants/{id}/claim", web::post().to(claims::handlers::request_claim))
                .route("/restaurants/{id}/campaigns", web::get().to(campaigns::handlers::list))
                .route("/restaurants/{id}/campaigns", web::post().to(campaigns::handlers::create))
                .route("/restaurants/{id}/campaigns/{campaign_id}", web::delete().to(campaigns::handlers::delete))
                .route("/restaurants/{id}/reservations", web::post().to(reservations::handlers::create))
                .route("/restaurants/{id}/reservations", web::get().to(reservations::handlers::list))
                .route("/reservations/{id}", web::patch().to(reservations::handlers::update_status))
                .route("/analytics", web::get().to(analytics::handlers::dashboard))
                .route("/billing/checkout", web::post().to(billing::handlers::checkout))
                .route("/billing/portal", web::post().to(billing::handlers::portal))
                .route("/webhooks/stripe", web::post().to(billing::handlers::stripe_webhook))
                .service(
                    web::scope("/admin")
                        .route("/restaurants", web::post().to(restaurants::handlers::create))
                        .route("/claims", web::get().to(claims::handlers::list_pending))
                        .route("/claims/{id}/approve", web::post().to(claims::handlers::approve))
                        .route("/claims/{id}/reject", web::post().to(claims::handlers::reject))
                        .route("/analytics", web::get().to(analytics::handlers::admin_dashboard)),
                ),
        );
}
