use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("API quota exhausted")]
    QuotaExhausted,

    #[error("Invalid API key: {0}")]
    InvalidCredential(String),

    #[error("Transient API error: {0}")]
    Transient(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transient(_) => true,
            AppError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Errors after which no further provider calls should be made in this run.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, AppError::QuotaExhausted | AppError::InvalidCredential(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(AppError::Transient("HTTP 503".into()).is_retryable());
        assert!(!AppError::QuotaExhausted.is_retryable());
        assert!(!AppError::NotFound("UCx".into()).is_retryable());
    }

    #[test]
    fn quota_and_credential_errors_stop_the_run() {
        assert!(AppError::QuotaExhausted.is_fatal_for_run());
        assert!(AppError::InvalidCredential("bad key".into()).is_fatal_for_run());
        assert!(!AppError::Transient("HTTP 500".into()).is_fatal_for_run());
    }
}
