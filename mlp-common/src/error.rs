//! Common error types for the MLP asset manager

use thiserror::Error;

/// Common result type for MLP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the library
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table has no columns in the live database, or a declared column is missing
    #[error("Schema error: {0}")]
    Schema(String),

    /// Incoming data named a field the model does not declare
    #[error("Unknown field '{field}' for model '{model}'")]
    UnknownField { model: String, field: String },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Owner missing, of the wrong type, or given to a root model
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected by a foreign key ("fkey") or unique ("unique") constraint
    #[error("Conflict ({constraint}): {message}")]
    Conflict {
        constraint: &'static str,
        message: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Reclassify constraint violations reported by PostgreSQL.
    ///
    /// 23503 (foreign_key_violation) and 23505 (unique_violation) become
    /// [`Error::Conflict`]. 22003 (numeric_value_out_of_range) and 22P02
    /// (invalid_text_representation) become [`Error::InvalidInput`].
    /// Anything else is returned unchanged.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23503") => {
                    return Error::Conflict {
                        constraint: "fkey",
                        message: db_err.message().to_string(),
                    };
                }
                Some("23505") => {
                    return Error::Conflict {
                        constraint: "unique",
                        message: db_err.message().to_string(),
                    };
                }
                Some("22003") | Some("22P02") => {
                    return Error::InvalidInput(db_err.message().to_string());
                }
                _ => {}
            }
        }
        Error::Database(err)
    }
}
