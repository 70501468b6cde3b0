use thiserror::Error;

/// Centralized error types for the application
///
/// Storage, Bot API and dashboard failures are converted to this enum; the
/// web layer maps each variant to an HTTP status.
///
/// # Example
///
/// ```no_run
/// use econbot::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Chat platform failures that did not come from teloxide
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing bot, profile, account or notification
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request clashes with existing state (plan limit, duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Short label used in metrics and logs.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::DatabasePool(_) | AppError::Migration(_) => "database",
            AppError::Telegram(_) | AppError::Upstream(_) => "upstream",
            AppError::Io(_) | AppError::Url(_) | AppError::Anyhow(_) | AppError::Join(_) => "internal",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = AppError::NotFound("bot 42".to_string());
        assert_eq!(err.to_string(), "Not found: bot 42");
        assert_eq!(err.category(), "not_found");
    }

    #[test]
    fn test_rusqlite_errors_convert() {
        let err: AppError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.category(), "database");
    }
}
