//! # Error Taxonomy
//!
//! The cross-service error type. Event handlers never crash the dispatch
//! loop on these; the loop decides between redelivery and drop based on
//! [`MarketError::is_transient`].

use thiserror::Error;

/// Errors surfaced by service operations and event handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarketError {
    /// Bad field, bad discount range, cart full, invalid patch.
    #[error("validation: {0}")]
    Validation(String),

    /// Role mismatch, invalid or expired token, no such session.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Stale replica or deleted entity.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store or bus unavailable.
    #[error("infrastructure: {0}")]
    Infrastructure(String),
}

impl MarketError {
    /// HTTP status the (out-of-scope) route layer maps this error to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::Infrastructure(_) => 503,
        }
    }

    /// Whether redelivering the event can plausibly heal the failure.
    ///
    /// Not-found failures are usually replica lag (the entity's creation
    /// event has not arrived yet) and are worth a bounded retry.
    /// Validation and authorization failures are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Infrastructure(_))
    }
}
