//! Network layer - the execution runner boundary
//!
//! The App actor hands a [`RequestDescriptor`] to an [`ExecutionRunner`] and
//! awaits one settled result; progress arrives on a side channel.

pub mod client;
pub mod collector;
pub mod runner;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RunnerError;
use crate::messages::{RequestDescriptor, RequestId, RunResult, RunUpdate};

pub use collector::RunCollector;
pub use runner::HttpRunner;

/// Executes dispatched requests.
#[async_trait]
pub trait ExecutionRunner: Send + Sync {
    /// Run `request` to completion.
    ///
    /// Resolves with a result whenever execution started, including runs
    /// that failed mid-flight or never produced a response. Rejects only
    /// when execution could not start, or when the run was aborted.
    async fn submit(
        &self,
        request: RequestDescriptor,
        updates: mpsc::UnboundedSender<RunUpdate>,
    ) -> Result<RunResult, RunnerError>;

    /// Abort the run for `request_id`. Returns whether a live run was found.
    /// Safe to call for finished or unknown ids.
    fn abort(&self, request_id: RequestId) -> Result<bool, RunnerError>;
}
