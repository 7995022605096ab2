//! Error types for source adapter operations.

use std::error::Error;

use thiserror::Error;

use crate::model::SourceKind;

/// Primary error type for adapter operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Backend could not be reached or refused our credentials.
    #[error("source unavailable")]
    Unavailable {
        /// Adapter that failed.
        adapter: SourceKind,
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Show or item does not exist in the backend.
    #[error("source item not found")]
    NotFound {
        /// Adapter that was queried.
        adapter: SourceKind,
        /// Operation identifier.
        operation: &'static str,
        /// Reference that could not be resolved.
        reference: String,
    },
    /// Backend answered with a non-success status.
    #[error("source rejected request")]
    Rejected {
        /// Adapter that rejected the request.
        adapter: SourceKind,
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// Backend payload could not be interpreted.
    #[error("source payload invalid")]
    Decode {
        /// Adapter that produced the payload.
        adapter: SourceKind,
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Operation is not offered by this adapter.
    #[error("source operation not supported")]
    Unsupported {
        /// Adapter lacking the capability.
        adapter: SourceKind,
        /// Operation identifier.
        operation: &'static str,
    },
}

impl SourceError {
    /// Build an unavailable error from any failure.
    pub fn unavailable(
        adapter: SourceKind,
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Unavailable {
            adapter,
            operation,
            source: source.into(),
        }
    }

    /// Build a decode error from any failure.
    pub fn decode(
        adapter: SourceKind,
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Decode {
            adapter,
            operation,
            source: source.into(),
        }
    }

    #[must_use]
    /// Whether the error means "skip this source for this run".
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    #[must_use]
    /// Adapter the error originated from.
    pub const fn adapter(&self) -> SourceKind {
        match self {
            Self::Unavailable { adapter, .. }
            | Self::NotFound { adapter, .. }
            | Self::Rejected { adapter, .. }
            | Self::Decode { adapter, .. }
            | Self::Unsupported { adapter, .. } => *adapter,
        }
    }

    /// One-line description including the source chain, for report entries.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut message = match self {
            Self::Unavailable { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Unsupported { operation, .. } => format!("{self} during {operation}"),
            Self::NotFound {
                operation,
                reference,
                ..
            } => format!("{self} during {operation}: {reference}"),
            Self::Rejected {
                operation, status, ..
            } => format!("{self} during {operation}: status {status}"),
        };
        let mut cause = self.source();
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = err.source();
        }
        message
    }
}

/// Convenience alias for adapter results.
pub type SourceResult<T> = Result<T, SourceError>;
