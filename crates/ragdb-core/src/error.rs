use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration `{param}`: {reason}")]
    Configuration { param: String, reason: String },

    #[error("encoding failed: {message}")]
    Encoding {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("corrupt snapshot {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("index not ready: {0}")]
    IndexNotReady(String),

    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument { param: String, reason: String },

    #[error("a build is already in progress on this index")]
    BuildInProgress,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn config(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration { param: param.into(), reason: reason.into() }
    }

    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument { param: param.into(), reason: reason.into() }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding { message: message.into(), source: None }
    }

    /// Wrap an encoder backend failure, keeping it as the error source.
    pub fn encoding_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Encoding { message: message.into(), source: Some(source.into()) }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptSnapshot { path: path.into(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Only encoder failures are worth retrying; everything else needs the
    /// caller to change its input or rebuild.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Encoding { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = Error::config("chunking.overlap", "must be smaller than chunk_size");
        assert_eq!(
            err.to_string(),
            "invalid configuration `chunking.overlap`: must be smaller than chunk_size"
        );
        let err = Error::invalid("k", "must be positive");
        assert_eq!(err.to_string(), "invalid argument `k`: must be positive");
    }

    #[test]
    fn encoding_keeps_source() {
        let err = Error::encoding_with("batch 3 failed", anyhow::anyhow!("connection refused"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("connection refused"));
        assert!(err.is_retryable());
        assert!(!Error::BuildInProgress.is_retryable());
    }
}
