//! Unified error type for the budget-streak services.
//!
//! Client-facing failures (`NotFound`, `InvalidState`, `InvalidAmount`) are kept apart
//! from persistence and upstream failures so callers can decide how to surface them.

use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Persistence failure reported by SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A referenced record does not exist (or belongs to another user)
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. `"Goal"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The requested operation violates a business rule
    #[error("Invalid state: {message}")]
    InvalidState {
        /// The rule that was violated
        message: String,
    },

    /// A money amount was zero, negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// The language model could not be reached or answered badly
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Description of the upstream failure
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the caller's input rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidState { .. } | Self::InvalidAmount { .. }
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::UpstreamUnavailable {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// Rejects amounts that are zero, negative, NaN or infinite.
pub fn ensure_positive_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}
