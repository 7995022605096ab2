//! # Design
//!
//! - Centralize application-level errors for bootstrap and command handling.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Each variant maps onto one process exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Exit code for a configuration error.
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit code for an operational failure.
pub const EXIT_OPERATIONAL: i32 = 3;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tidyarr_config::ConfigError,
    },
    /// The engine rejected the run plan.
    #[error("run rejected")]
    Run {
        /// Source run error.
        source: tidyarr_engine::RunError,
    },
    /// Building a source adapter failed.
    #[error("source adapter operation failed")]
    Source {
        /// Operation identifier.
        operation: &'static str,
        /// Source adapter error.
        source: tidyarr_core::SourceError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tidyarr_telemetry::TelemetryError,
    },
    /// Filesystem maintenance failed.
    #[error("filesystem maintenance failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: tidyarr_fsops::FsOpsError,
    },
    /// Rendering output failed.
    #[error("output rendering failed")]
    Render {
        /// Operation identifier.
        operation: &'static str,
        /// Source serialization error.
        source: serde_json::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tidyarr_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn source(operation: &'static str, source: tidyarr_core::SourceError) -> Self {
        Self::Source { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tidyarr_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn render(operation: &'static str, source: serde_json::Error) -> Self {
        Self::Render { operation, source }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Run { .. } => EXIT_CONFIGURATION,
            Self::Source { .. }
            | Self::Telemetry { .. }
            | Self::FsOps { .. }
            | Self::Render { .. }
            | Self::Io { .. } => EXIT_OPERATIONAL,
        }
    }

    /// Operator-facing message including the underlying cause.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::Config { source, .. } => source.describe(),
            Self::Run {
                source:
                    tidyarr_engine::RunError::Configuration {
                        field,
                        reason,
                        value,
                    },
            } => match value {
                Some(value) => format!("{self}: {field} = {value:?}: {reason}"),
                None => format!("{self}: {field}: {reason}"),
            },
            Self::Source { source, .. } => format!("{self}: {}", source.describe()),
            Self::Telemetry { operation, source } => format!("{self} ({operation}): {source}"),
            Self::FsOps { operation, source } => format!("{self} ({operation}): {source}"),
            Self::Render { operation, source } => format!("{self} ({operation}): {source}"),
            Self::Io {
                operation,
                path,
                source,
            } => match path {
                Some(path) => format!("{self} ({operation} {}): {source}", path.display()),
                None => format!("{self} ({operation}): {source}"),
            },
        }
    }
}

impl From<tidyarr_engine::RunError> for AppError {
    fn from(source: tidyarr_engine::RunError) -> Self {
        Self::Run { source }
    }
}
