//! Ledger Error Types
//!
//! Every failure surfaces as one of four kinds with a stable code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User not authenticated")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store unavailable or write rejected. The detail is for logs only.
    #[error("Write failed: {0}")]
    WriteFailed(String),
}

impl LedgerError {
    /// Stable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthenticated => "UNAUTHENTICATED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::WriteFailed(_) => "WRITE_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::Unauthenticated => 401,
            LedgerError::NotFound(_) => 404,
            LedgerError::InvalidInput(_) => 400,
            LedgerError::WriteFailed(_) => 503,
        }
    }

    /// Message safe to show to a client
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::WriteFailed(_) => "Storage temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }

    pub fn record_not_found(id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(format!("record {id}"))
    }
}

/// PostgreSQL `numeric_value_out_of_range`
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.code().as_deref() == Some(PG_NUMERIC_OUT_OF_RANGE)
        {
            return LedgerError::InvalidInput("balance is out of range".to_string());
        }
        LedgerError::WriteFailed(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        LedgerError::WriteFailed(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::Unauthenticated.code(), "UNAUTHENTICATED");
        assert_eq!(LedgerError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(LedgerError::InvalidInput("x".into()).code(), "INVALID_INPUT");
        assert_eq!(LedgerError::WriteFailed("x".into()).code(), "WRITE_FAILED");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(LedgerError::Unauthenticated.http_status(), 401);
        assert_eq!(LedgerError::NotFound("x".into()).http_status(), 404);
        assert_eq!(LedgerError::InvalidInput("x".into()).http_status(), 400);
        assert_eq!(LedgerError::WriteFailed("x".into()).http_status(), 503);
    }

    #[test]
    fn test_write_failure_detail_is_hidden() {
        let err = LedgerError::WriteFailed("connection refused on 10.0.0.7:5432".into());
        assert!(!err.public_message().contains("10.0.0.7"));
        assert_eq!(
            LedgerError::record_not_found("01J").public_message(),
            "Not found: record 01J"
        );
    }
}
