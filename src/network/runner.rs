//! reqwest-backed execution runner with per-request cancellation

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::RunnerError;
use crate::messages::{RequestDescriptor, RequestId, RunResult, RunUpdate};
use crate::network::client::{create_client, execute_request};
use crate::network::ExecutionRunner;

/// Runs requests over HTTP; each in-flight run can be aborted by id
pub struct HttpRunner {
    client: reqwest::Client,
    cancel_handles: Mutex<HashMap<RequestId, oneshot::Sender<()>>>,
}

impl HttpRunner {
    pub fn new(timeout: Duration) -> Self {
        HttpRunner {
            client: create_client(timeout),
            cancel_handles: Mutex::new(HashMap::new()),
        }
    }

    fn handles(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<()>>> {
        self.cancel_handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn in_flight(&self) -> usize {
        self.handles().len()
    }
}

#[async_trait]
impl ExecutionRunner for HttpRunner {
    async fn submit(
        &self,
        request: RequestDescriptor,
        updates: mpsc::UnboundedSender<RunUpdate>,
    ) -> Result<RunResult, RunnerError> {
        let id = request.request_id;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.handles().insert(id, cancel_tx);

        tracing::info!(request_id = %id, url = %request.url, method = %request.method, "Executing request");
        let result = execute_request(&self.client, request, updates, cancel_rx).await;
        match &result {
            Ok(r) => tracing::info!(request_id = %id, status = r.status, "Request completed"),
            Err(e) => tracing::info!(request_id = %id, error = %e, "Request did not complete"),
        }

        self.handles().remove(&id);
        result
    }

    fn abort(&self, request_id: RequestId) -> Result<bool, RunnerError> {
        match self.handles().remove(&request_id) {
            Some(cancel_tx) => {
                tracing::info!(request_id = %request_id, "Cancelling request");
                // the run may have settled already; nothing to signal then
                let _ = cancel_tx.send(());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyType, HttpMethod};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn descriptor(id: u64, url: &str) -> RequestDescriptor {
        RequestDescriptor {
            url: url.to_string(),
            method: HttpMethod::GET,
            headers: Vec::new(),
            body: String::new(),
            body_form_data: Vec::new(),
            body_url_encoded: Vec::new(),
            body_type: BodyType::Text,
            pre_request_script: String::new(),
            test_script: String::new(),
            environment: BTreeMap::new(),
            request_id: RequestId(id),
        }
    }

    #[test]
    fn test_abort_unknown_id_is_false_and_idempotent() {
        let runner = HttpRunner::new(Duration::from_secs(1));
        assert_eq!(runner.abort(RequestId(42)), Ok(false));
        assert_eq!(runner.abort(RequestId(42)), Ok(false));
    }

    #[tokio::test]
    async fn test_completed_run_is_released() {
        let runner = HttpRunner::new(Duration::from_secs(5));
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = runner.submit(descriptor(1, "http://127.0.0.1:9/"), tx).await;
        assert!(result.is_ok());
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(runner.abort(RequestId(1)), Ok(false));
    }

    #[tokio::test]
    async fn test_abort_in_flight_run() {
        // accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let runner = Arc::new(HttpRunner::new(Duration::from_secs(30)));
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = {
            let runner = runner.clone();
            let url = format!("http://{}/slow", addr);
            tokio::spawn(async move { runner.submit(descriptor(5, &url), tx).await })
        };

        while runner.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(runner.abort(RequestId(5)), Ok(true));
        assert_eq!(runner.abort(RequestId(5)), Ok(false));

        let result = task.await.unwrap();
        assert_eq!(result, Err(RunnerError::Aborted));
    }
}
