//! Error types shared across the app, storage and runner layers

use thiserror::Error;

/// Reasons a dispatch can be refused before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The active tab has no URL.
    #[error("cannot send a request without a URL")]
    EmptyUrl,

    /// There is no active tab to send from.
    #[error("no active tab")]
    NoActiveTab,
}

/// Failures reported by an execution runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    /// The runner could not start executing the request.
    #[error("{0}")]
    Initialization(String),

    /// The request failed while it was executing.
    #[error("{0}")]
    Execution(String),

    /// The request was aborted before it completed.
    #[error("request aborted")]
    Aborted,

    /// The abort call itself failed.
    #[error("failed to abort request: {0}")]
    Abort(String),
}

/// Failures of the persistence collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
