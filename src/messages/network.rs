//! Runner messages - communication between the App layer and the execution runner

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::error::RunnerError;
use crate::models::{BodyType, ConsoleLog, FormItem, HttpMethod, KeyValue, ResponseData, TestResult};

/// Identity of one dispatch. Monotonic per session, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the runner needs to execute one dispatch
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<KeyValue>,
    pub body: String,
    pub body_form_data: Vec<FormItem>,
    pub body_url_encoded: Vec<FormItem>,
    pub body_type: BodyType,
    pub pre_request_script: String,
    pub test_script: String,
    pub environment: BTreeMap<String, String>,
    pub request_id: RequestId,
}

/// Normalized outcome of a run
pub type RunResult = ResponseData;

/// Events emitted by an execution engine while a run is in progress
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The engine produced a response
    Response(ResponseData),
    /// A test assertion finished
    Assertion(TestResult),
    /// A script wrote to the console
    Console(ConsoleLog),
    /// Execution failed internally before completion
    Exception(String),
}

/// A run event tagged with the dispatch it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct RunUpdate {
    pub request_id: RequestId,
    pub event: RunEvent,
}

/// A finished dispatch, delivered back to the App layer
#[derive(Debug)]
pub struct Completion {
    pub tab_id: String,
    pub request_id: RequestId,
    pub started_at: Instant,
    pub outcome: Result<RunResult, RunnerError>,
}
