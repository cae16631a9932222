//! Query errors

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("malformed {clause} clause '{input}': {reason}")]
    Malformed {
        clause: &'static str,
        input: String,
        reason: String,
    },

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub(crate) fn malformed(clause: &'static str, input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            clause,
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failure is the caller's fault (bad request) rather than the server's
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::UnknownAttribute(_))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
