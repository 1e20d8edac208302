// src/errors.rs

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure of a single resource accessor call.
///
/// Accessors never abort a run; callers turn these into report outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Operation on '{resource}' failed: {reason}")]
    Failed { resource: String, reason: String },
}

impl AccessError {
    pub fn failed(resource: impl Into<String>, reason: impl ToString) -> Self {
        AccessError::Failed {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound(_))
    }
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to create snapshot directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to reset latest snapshot directory '{path}': {source}")]
    ResetLatest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list snapshot directory '{path}': {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read snapshot file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write snapshot file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Snapshot file '{0}' is empty")]
    Empty(PathBuf),

    #[error("Failed to parse snapshot file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot for '{subject}': {source}")]
    Serialize {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to capture prior state of {identity}: {source}")]
    Capture {
        identity: String,
        #[source]
        source: AccessError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("This program must be run in administrator mode.")]
    NotElevated,

    #[error("Unsupported platform '{0}': only Windows is supported.")]
    UnsupportedPlatform(&'static str),
}

/// Errors that stop a run before any resource is mutated.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("Failed to start a snapshot generation: {0}")]
    Snapshot(#[from] SnapshotError),
}
