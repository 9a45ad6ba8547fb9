//! Error types for oxcms-pipeline

use thiserror::Error;

/// Result type for pipeline and tone curve construction
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building curves, stages and pipelines
///
/// Evaluation never produces these; only construction does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Size, domain, monotonicity or degeneracy violation
    #[error("Range error: {0}")]
    Range(String),

    /// Unrecognized parametric curve or interpolation kind
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    /// Invariant violation, e.g. mismatched channels on insertion
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the error code reported to the error sink
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Range(_) => ErrorCode::Range,
            Self::UnknownExtension(_) => ErrorCode::UnknownExtension,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get the message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Range(msg) | Self::UnknownExtension(msg) | Self::Internal(msg) => msg,
        }
    }

    pub(crate) fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    pub(crate) fn unknown_extension(msg: impl Into<String>) -> Self {
        Self::UnknownExtension(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Error class, as seen by an [`ErrorSink`](crate::ErrorSink)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Range,
    UnknownExtension,
    Internal,
}

impl ErrorCode {
    /// Numeric code compatible with ICC engines (`cmsERROR_*`)
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Range => 2,
            Self::Internal => 3,
            Self::UnknownExtension => 8,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Range => "range",
            Self::UnknownExtension => "unknown-extension",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}
