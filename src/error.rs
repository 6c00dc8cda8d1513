use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network, auth or provider-side failure. Not retried.
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response from {provider}: {cause}")]
    ResponseFormat {
        provider: &'static str,
        cause: String,
    },

    #[error("No usable file blocks found in response")]
    EmptyResponse,

    #[error("Unsafe or invalid file path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Cannot read prompt file {}: {reason}", .path.display())]
    PromptFile { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tracking store error: {0}")]
    Tracking(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stable classification of an [`Error`], used in per-item batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    ResponseFormat,
    EmptyResponse,
    MalformedPath,
    PromptFile,
    Config,
    Tracking,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::ResponseFormat { .. } => ErrorKind::ResponseFormat,
            Error::EmptyResponse => ErrorKind::EmptyResponse,
            Error::MalformedPath { .. } => ErrorKind::MalformedPath,
            Error::PromptFile { .. } => ErrorKind::PromptFile,
            Error::Config(_) => ErrorKind::Config,
            Error::Tracking(_) => ErrorKind::Tracking,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::ResponseFormat => "response format",
            ErrorKind::EmptyResponse => "empty response",
            ErrorKind::MalformedPath => "malformed path",
            ErrorKind::PromptFile => "prompt file",
            ErrorKind::Config => "config",
            ErrorKind::Tracking => "tracking",
            ErrorKind::Io => "io",
        };
        f.write_str(name)
    }
}
