//! Error taxonomy shared by the pipeline, the HTTP server and the CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that callers are expected to branch on.
///
/// Plumbing failures (I/O, SQL, HTTP transport) travel as `anyhow::Error`
/// inside [`RagError::Internal`].
#[derive(Error, Debug)]
pub enum RagError {
    /// Missing provider credential or unusable configuration. Raised when a
    /// component is constructed, never mid-request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The session identifier is not a safe path component.
    #[error("invalid session id: {0:?}")]
    InvalidSession(String),

    /// Requested resource does not exist (e.g. no HTML uploaded for a session).
    #[error("{0}")]
    NotFound(String),

    /// The language-model call failed.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Per-file document loading errors. Never fatal for a batch.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("unsupported file type {extension:?}: {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

impl LoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            LoadError::UnsupportedFormat { path, .. }
            | LoadError::Io { path, .. }
            | LoadError::Parse { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_message() {
        let err = LoadError::UnsupportedFormat {
            path: PathBuf::from("/tmp/tool.exe"),
            extension: ".exe".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported file type \".exe\": /tmp/tool.exe"
        );
        assert_eq!(err.path(), std::path::Path::new("/tmp/tool.exe"));
    }

    #[test]
    fn test_internal_wraps_anyhow() {
        let err: RagError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
