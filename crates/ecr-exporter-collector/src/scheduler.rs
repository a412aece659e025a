//! Cron-driven cycle scheduler.
//!
//! Fires a collection cycle on every tick of a six-field cron expression
//! (seconds first) evaluated in UTC. Each cycle's repository listing runs
//! inline on the scheduler task, so two listings never overlap; the image
//! and findings branches a listing dispatches may still be running when the
//! next tick fires.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

use crate::error::{CollectorError, Result};
use crate::repositories::RepositoryCollector;

/// The default schedule: the top of every hour.
pub const DEFAULT_SCHEDULE: &str = "0 0 * * * *";

/// Runs collection cycles on a cron schedule.
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    schedule: Schedule,
}

impl CronScheduler {
    /// Parses a cron expression.
    pub fn new(expression: &str) -> Result<Self> {
        let schedule =
            Schedule::from_str(expression).map_err(|e| CollectorError::InvalidSchedule {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// The expression this scheduler was built from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The next fire time from now.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.schedule.upcoming(Utc).next()
    }

    /// The first fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Fires `collector` on every tick until `cancel` fires.
    pub async fn run(&self, collector: &RepositoryCollector, cancel: &CancellationToken) {
        tracing::info!(schedule = %self.expression, "scheduler started");

        let mut last_fire = Utc::now();

        loop {
            // Sleep timers can wake slightly ahead of the wall clock, so the
            // next tick is always computed past the previous one.
            let from = last_fire.max(Utc::now());
            let Some(next) = self.next_fire_after(from) else {
                tracing::warn!(schedule = %self.expression, "schedule has no further fire times");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::debug!(next = %next, wait_secs = wait.as_secs(), "waiting for next cycle");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("scheduler stopped");
                    return;
                }
                () = tokio::time::sleep(wait) => {}
            }

            last_fire = next;
            tracing::info!(fired_at = %next, "starting scheduled collection cycle");
            collector.run_cycle(cancel).await;
        }
    }
}
