//! Error types for the position feed and enrichment pipeline.

use thiserror::Error;

/// Errors that can occur while polling positions or enriching them.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// An HTTP request to an external source returned an error status.
    #[error("HTTP error from {source_name} ({status}): {message}")]
    Http {
        source_name: String,
        status: u16,
        message: String,
    },

    /// The external source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The requested entity was not found at the external source.
    #[error("not found: {entity} at {source_name}")]
    NotFound { entity: String, source_name: String },

    /// A response from an external source could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The executor backlog is at its configured maximum.
    #[error("backlog full ({limit} pending tasks)")]
    BacklogFull { limit: usize },
}

impl EnrichError {
    /// Returns `true` when the error is transient and the operation may
    /// succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::BacklogFull { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` when the error indicates the entity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the error is an upstream rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Convenience alias for enrichment results.
pub type EnrichResult<T> = std::result::Result<T, EnrichError>;
