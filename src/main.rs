use chrono::NaiveDate;

mod apod;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod scheduler;

use config::Config;
use error::{AppError, Result};
use pipeline::Pipeline;
use scheduler::Scheduler;

const DEFAULT_LIST_LIMIT: usize = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info and above unless RUST_LOG says otherwise)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;
    let pipeline = Pipeline::from_config(&config).await?;

    // --list [N]: print the most recent rows and exit
    if args.len() >= 2 && args[1] == "--list" {
        let limit = match args.get(2) {
            Some(n) => n
                .parse()
                .map_err(|_| AppError::Config(format!("--list expects a number, got {:?}", n)))?,
            None => DEFAULT_LIST_LIMIT,
        };
        pipeline.repository().ensure_schema().await?;
        for record in pipeline.repository().recent_records(limit).await? {
            println!(
                "{}  [{}]  {}",
                record.date,
                record.media_type.as_deref().unwrap_or("-"),
                record.title
            );
        }
        return Ok(());
    }

    // --show YYYY-MM-DD: print one stored record as JSON
    if args.len() >= 2 && args[1] == "--show" {
        let date = parse_date(args.get(2).map(String::as_str).unwrap_or_default())?;
        pipeline.repository().ensure_schema().await?;
        match pipeline.repository().get_by_date(date).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("No record stored for {}", date),
        }
        return Ok(());
    }

    // --once [--date YYYY-MM-DD]: single run, failure is the exit status
    if args.len() >= 2 && args[1] == "--once" {
        let date = parse_date_flag(&args[2..])?;
        let report = pipeline.run_once(date).await.map_err(|failure| failure.error)?;
        println!("Loaded {} (record {}): {}", report.date, report.record_id, report.title);
        return Ok(());
    }

    if args.len() >= 2 {
        return Err(AppError::Config(format!(
            "unknown argument {:?}; expected --once [--date YYYY-MM-DD], --list [N] or --show YYYY-MM-DD",
            args[1]
        )));
    }

    let scheduler = Scheduler::new(&config, pipeline)?;
    scheduler.start().await
}

fn parse_date_flag(args: &[String]) -> Result<Option<NaiveDate>> {
    match args {
        [] => Ok(None),
        [flag, value] if flag == "--date" => parse_date(value).map(Some),
        _ => Err(AppError::Config("expected --date YYYY-MM-DD".to_string())),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::Config(format!("invalid date {:?}: {}", value, e)))
}
