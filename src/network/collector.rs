//! Folds the events of one run into a single result

use tokio::sync::mpsc;

use crate::messages::{RequestId, RunEvent, RunResult, RunUpdate};
use crate::models::{ConsoleLog, ResponseData, TestResult};

/// Accumulates run events and forwards each one as a [`RunUpdate`].
///
/// An engine reports progress through [`record`](RunCollector::record) and
/// signals completion exactly once through [`finish`](RunCollector::finish).
pub struct RunCollector {
    request_id: RequestId,
    response: Option<ResponseData>,
    test_results: Vec<TestResult>,
    console_logs: Vec<ConsoleLog>,
    exception: Option<String>,
    updates: Option<mpsc::UnboundedSender<RunUpdate>>,
}

impl RunCollector {
    pub fn new(request_id: RequestId, updates: Option<mpsc::UnboundedSender<RunUpdate>>) -> Self {
        RunCollector {
            request_id,
            response: None,
            test_results: Vec::new(),
            console_logs: Vec::new(),
            exception: None,
            updates,
        }
    }

    pub fn record(&mut self, event: RunEvent) {
        if let Some(updates) = &self.updates {
            // receiver may already be gone; progress is best effort
            let _ = updates.send(RunUpdate {
                request_id: self.request_id,
                event: event.clone(),
            });
        }

        match event {
            RunEvent::Response(response) => self.response = Some(response),
            RunEvent::Assertion(result) => self.test_results.push(result),
            RunEvent::Console(log) => self.console_logs.push(log),
            RunEvent::Exception(message) => {
                tracing::warn!(request_id = %self.request_id, error = %message, "Run raised an exception");
                // first failure wins
                self.exception.get_or_insert(message);
            }
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Produce the final result. An exception recorded mid-run takes
    /// precedence over `error`.
    pub fn finish(self, error: Option<String>) -> RunResult {
        let error = self.exception.or(error);

        if let Some(message) = error {
            tracing::debug!(request_id = %self.request_id, error = %message, "Run finished with error");
            return ResponseData {
                status: 0,
                status_text: String::from("Error"),
                test_results: self.test_results,
                console_logs: self.console_logs,
                error: Some(message),
                ..ResponseData::default()
            };
        }

        match self.response {
            Some(response) => ResponseData {
                test_results: self.test_results,
                console_logs: self.console_logs,
                ..response
            },
            None => ResponseData::no_response(),
        }
    }
}
