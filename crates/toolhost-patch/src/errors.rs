use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A malformed envelope. Raised before any filesystem mutation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid patch at line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Failure of a single directive during apply.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("file already exists: '{path}'")]
    Conflict { path: String },
    #[error("file not found: '{path}'")]
    NotFound { path: String },
    #[error("failed to match hunk {hunk} ('{header}') in '{path}'")]
    HunkMismatch {
        path: String,
        hunk: usize,
        header: String,
    },
    #[error("path '{path}' rejected: {reason}")]
    PathViolation { path: String, reason: String },
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DirectiveError {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> DirectiveErrorKind {
        match self {
            Self::Conflict { .. } => DirectiveErrorKind::Conflict,
            Self::NotFound { .. } => DirectiveErrorKind::NotFound,
            Self::HunkMismatch { .. } => DirectiveErrorKind::HunkMismatch,
            Self::PathViolation { .. } => DirectiveErrorKind::PathViolation,
            Self::Io { .. } => DirectiveErrorKind::Io,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveErrorKind {
    Conflict,
    NotFound,
    HunkMismatch,
    PathViolation,
    Io,
}

/// Top-level error for the tool surface.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
    #[error("invalid patch root '{}': {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
