use sea_orm::{DbErr, TransactionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A node's parent id points at a record that does not exist.
    #[error("Dangling reference: {entity} {id} points at missing parent {parent_id}")]
    DanglingReference {
        entity: &'static str,
        id: i64,
        parent_id: i64,
    },

    /// An assignment transaction was rolled back; nothing was applied.
    #[error("Transaction rolled back: {0}")]
    Transaction(#[source] Box<AppError>),

    #[error("Path cascade aborted: {0}")]
    CascadeAborted(String),

    #[error("Association already exists: {0}")]
    DuplicateAssociation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl AppError {
    /// Unwraps a rolled-back transaction to the error that caused it.
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Transaction(inner) => inner.root_cause(),
            other => other,
        }
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Connection(e) => AppError::Transaction(Box::new(AppError::Database(e))),
            TransactionError::Transaction(e) => AppError::Transaction(Box::new(e)),
        }
    }
}

/// Result type alias for application
pub type AppResult<T> = Result<T, AppError>;

/// Helper trait for converting Option to AppError::NotFound
pub trait OptionExt<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(msg.into()))
    }
}

/// Helper to convert anyhow errors to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_ext() {
        let opt: Option<i32> = None;
        let result = opt.ok_or_not_found("Item not found");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_transaction_error_keeps_cause() {
        let err: AppError =
            TransactionError::Transaction(AppError::NotFound("permission 9".into())).into();
        assert!(matches!(err, AppError::Transaction(_)));
        assert!(matches!(err.root_cause(), AppError::NotFound(_)));
    }

    #[test]
    fn test_dangling_reference_message() {
        let err = AppError::DanglingReference {
            entity: "department",
            id: 4,
            parent_id: 99,
        };
        assert_eq!(
            err.to_string(),
            "Dangling reference: department 4 points at missing parent 99"
        );
    }
}
