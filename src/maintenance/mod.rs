//! Periodic housekeeping run alongside the HTTP server.

use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::AppState;

pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_sessions: u64,
    pub downgraded_trials: u64,
    pub failed_steps: u32,
}

impl MaintenanceReport {
    fn record(&mut self, step: &'static str, outcome: crate::Result<u64>) -> u64 {
        match outcome {
            Ok(rows) => rows,
            Err(e) => {
                warn!(step, error = %e, "Maintenance step failed");
                self.failed_steps += 1;
                0
            }
        }
    }
}

/// One sweep: expired sessions, lapsed trials, idle rate-limit keys. A failed
/// step is logged and counted; the remaining steps still run.
pub async fn run_once(state: &AppState) -> crate::Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();

    let sessions = state.db.cleanup_expired_sessions().await;
    report.expired_sessions = report.record("expired_sessions", sessions);

    let trials = state.db.downgrade_expired_trials(Utc::now()).await;
    report.downgraded_trials = report.record("lapsed_trials", trials);

    state.rate_limiter.cleanup().await;

    Ok(report)
}

/// Runs [`run_once`] every `interval` until the task is dropped. Failures are
/// logged and retried on the next tick.
pub async fn run(state: AppState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match run_once(&state).await {
            Ok(report) => info!(
                expired_sessions = report.expired_sessions,
                downgraded_trials = report.downgraded_trials,
                failed_steps = report.failed_steps,
                "Maintenance sweep finished"
            ),
            Err(e) => error!(error = %e, "Maintenance sweep failed"),
        }
    }
}

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(state, MAINTENANCE_INTERVAL))
}
