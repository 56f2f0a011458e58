//! Error handling module
//!
//! Provides unified error types for the monitor. Nothing here ever escapes a
//! cycle: the loop logs the error and waits for the next interval.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {entity}: {message}")]
    EntityRead { entity: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cycle cancelled")]
    Cancelled,
}

/// Result type alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

/// Helper function to create a per-entity read error
pub fn entity_read_error(entity: impl Into<String>, message: impl Into<String>) -> AppError {
    AppError::EntityRead {
        entity: entity.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_read_error_names_entity() {
        let err = entity_read_error("\"public\".\"locked\"", "permission denied for table locked");
        assert_eq!(
            err.to_string(),
            "Failed to read \"public\".\"locked\": permission denied for table locked"
        );
    }
}
