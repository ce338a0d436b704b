//! Error types for netbackup-state.

use thiserror::Error;

/// Errors that can occur in the state persistence layer.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}
