use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("APOD API returned HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },

    #[error("Malformed APOD response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid APOD record: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl AppError {
    /// Whether another attempt at the same run could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::HttpStatus { code, .. } => *code == 429 || *code >= 500,
            Self::Database(_) | Self::Sqlite(_) => true,
            Self::Config(_)
            | Self::Io(_)
            | Self::ConfigParse(_)
            | Self::Json(_)
            | Self::Validation(_) => false,
        }
    }
}
