use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{Pipeline, RunFailure, RunReport};

/// Fixed retry count with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

/// Runs the pipeline once a day at a fixed UTC time.
pub struct Scheduler {
    pipeline: Pipeline,
    run_at: NaiveTime,
    retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(config: &Config, pipeline: Pipeline) -> Result<Self> {
        Ok(Self {
            pipeline,
            run_at: config.run_at_time()?,
            retry: config.retry_policy(),
        })
    }

    /// Runs forever. A failed day is logged and the next day's run proceeds;
    /// missed intervals are not caught up.
    pub async fn start(&self) -> Result<()> {
        info!(
            "Starting APOD scheduler: daily at {} UTC, {} retr{} after {:?}",
            self.run_at.format("%H:%M"),
            self.retry.retries,
            if self.retry.retries == 1 { "y" } else { "ies" },
            self.retry.delay
        );

        loop {
            let now = Utc::now();
            let next_run = next_run_after(now, self.run_at);
            let sleep_duration = (next_run - now).to_std().unwrap_or(Duration::from_secs(60));

            info!("Next APOD run scheduled for: {}", next_run);
            sleep(sleep_duration).await;

            match run_with_retry(&self.pipeline, None, &self.retry).await {
                Ok(report) => info!("APOD run completed: record {} for {}", report.record_id, report.date),
                Err(failure) => error!("APOD run marked failed: {}", failure),
            }
        }
    }
}

/// Runs the pipeline, retrying failures that another attempt could fix.
pub async fn run_with_retry(
    pipeline: &Pipeline,
    date: Option<NaiveDate>,
    policy: &RetryPolicy,
) -> std::result::Result<RunReport, RunFailure> {
    let mut attempt = 0;
    loop {
        match pipeline.run_once(date).await {
            Ok(report) => return Ok(report),
            Err(failure) if failure.is_retryable() && attempt < policy.retries => {
                attempt += 1;
                warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt,
                    policy.retries + 1,
                    failure,
                    policy.delay
                );
                sleep(policy.delay).await;
            }
            Err(failure) => return Err(failure),
        }
    }
}

/// The first instant at `run_at` strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(run_at).and_utc();
    if today > now {
        today
    } else {
        (now.date_naive() + chrono::Duration::days(1))
            .and_time(run_at)
            .and_utc()
    }
}
