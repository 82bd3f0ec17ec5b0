use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::apod::{transform, ApodFetcher};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};

/// Where a run currently is. `Failed` is reachable from any working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Fetching,
    Transforming,
    Loading,
    Succeeded,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub record_id: i64,
    pub title: String,
}

#[derive(Debug, Error)]
#[error("run failed while {stage}: {error}")]
pub struct RunFailure {
    /// The stage that was active when the run gave up.
    pub stage: RunState,
    #[source]
    pub error: AppError,
}

impl RunFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Fetch, transform and load a single APOD entry.
pub struct Pipeline {
    fetcher: ApodFetcher,
    repository: Repository,
}

impl Pipeline {
    pub fn new(fetcher: ApodFetcher, repository: Repository) -> Self {
        Self { fetcher, repository }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let fetcher = ApodFetcher::new(&config.api_url, &config.api_key, config.http_timeout())?;
        let repository = Repository::open(&config.db_path).await?;
        Ok(Self::new(fetcher, repository))
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Runs every stage once, stopping at the first failure. The table is
    /// only written by the final upsert, so a failed run leaves no trace.
    pub async fn run_once(&self, date: Option<NaiveDate>) -> std::result::Result<RunReport, RunFailure> {
        let mut state = RunState::Pending;
        match self.run_stages(date, &mut state).await {
            Ok(report) => {
                advance(&mut state, RunState::Succeeded);
                tracing::info!("Loaded APOD for {}: {}", report.date, report.title);
                Ok(report)
            }
            Err(error) => {
                let stage = state;
                advance(&mut state, RunState::Failed);
                tracing::error!("APOD run failed while {}: {}", stage, error);
                Err(RunFailure { stage, error })
            }
        }
    }

    async fn run_stages(&self, date: Option<NaiveDate>, state: &mut RunState) -> Result<RunReport> {
        advance(state, RunState::Fetching);
        let response = self.fetcher.fetch(date).await?;

        advance(state, RunState::Transforming);
        let record = transform(&response)?;
        if let Some(requested) = date {
            if requested != record.date {
                tracing::warn!("Requested APOD for {} but API returned {}", requested, record.date);
            }
        }

        advance(state, RunState::Loading);
        self.repository.ensure_schema().await?;
        let date = record.date;
        let title = record.title.clone();
        let record_id = self.repository.upsert_record(record).await?;

        Ok(RunReport { date, record_id, title })
    }
}

fn advance(state: &mut RunState, next: RunState) {
    tracing::debug!("APOD run: {} -> {}", state, next);
    *state = next;
}
