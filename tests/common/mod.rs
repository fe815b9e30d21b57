#![allow(dead_code)]

use async_trait::async_trait;
use bitereserve_server::email::{EmailMessage, EmailSender};
use bitereserve_server::error::EmailError;
use bitereserve_server::{AppState, Settings};
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, Mutex};

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|m| m.subject.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        self.sent
            .lock()
            .map_err(|e| EmailError::RequestFailed(e.to_string()))?
            .push(message);
        Ok(())
    }
}

/// State over a pool that never connects unless a handler touches it.
pub fn lazy_state(config: Settings) -> (AppState, Arc<RecordingMailer>) {
    let pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect_lazy(&config.database.url)
        .expect("Failed to create lazy pool");
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::from_parts(config, pool, mailer.clone());
    (state, mailer)
}

/// State over a live database from `DATABASE_URL`, with migrations applied.
pub async fn live_state() -> (AppState, Arc<RecordingMailer>) {
    let mut config = Settings::new_for_test().expect("Failed to load test config");
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("DATABASE_URL must point at a reachable Postgres");
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::from_parts(config, pool, mailer.clone());
    state.db.run_migrations().await.expect("Failed to run migrations");
    (state, mailer)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}+{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}
