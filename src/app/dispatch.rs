//! Dispatch and cancellation
//!
//! Every send stamps the tab with a fresh [`RequestId`]. A completion is
//! applied only while the tab still carries that id; anything else is a
//! stale result and is dropped without touching the tab.

use std::collections::BTreeMap;

use crate::app::session::SessionStore;
use crate::app::tab::RequestTab;
use crate::error::DispatchError;
use crate::messages::{Completion, RequestDescriptor, RequestId};
use crate::models::{format_size, ApiKeyLocation, Auth, Environment, KeyValue, ResponseData, ResponseMetrics};
use crate::network::ExecutionRunner;

/// A dispatch that has been started and must be handed to a runner
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub tab_id: String,
    pub request_id: RequestId,
    pub descriptor: RequestDescriptor,
}

/// Outgoing headers and URL for a tab, with auth applied.
/// The tab's own headers are never modified.
fn outgoing(tab: &RequestTab) -> (String, Vec<KeyValue>) {
    let mut url = tab.url().to_string();
    let mut headers: Vec<KeyValue> = tab
        .headers()
        .iter()
        .filter(|h| !h.key.trim().is_empty())
        .cloned()
        .collect();

    if let Auth::ApiKey { api_key: Some(api_key) } = tab.auth() {
        match api_key.add_to {
            ApiKeyLocation::Header => headers.push(KeyValue::new(&api_key.key, &api_key.value)),
            ApiKeyLocation::Query => {
                let separator = if url.contains('?') { '&' } else { '?' };
                url.push(separator);
                url.push_str(&api_key.key);
                url.push('=');
                url.push_str(&api_key.value);
            }
            ApiKeyLocation::Other => {}
        }
    }

    (url, headers)
}

fn descriptor(tab: &RequestTab, environment: BTreeMap<String, String>, request_id: RequestId) -> RequestDescriptor {
    let (url, headers) = outgoing(tab);
    RequestDescriptor {
        url,
        method: tab.method(),
        headers,
        body: tab.body().to_string(),
        body_form_data: tab.body_form_data().to_vec(),
        body_url_encoded: tab.body_url_encoded().to_vec(),
        body_type: tab.body_type(),
        pre_request_script: tab.pre_request_script().to_string(),
        test_script: tab.test_script().to_string(),
        environment,
        request_id,
    }
}

impl SessionStore {
    /// Start a dispatch of the active tab.
    ///
    /// Refused with no state change when the URL is empty. Otherwise the
    /// tab goes to loading, its previous response is cleared and the
    /// request is recorded in the history.
    pub fn send_request(&mut self) -> Result<Dispatch, DispatchError> {
        let tab = self.active_tab().ok_or(DispatchError::NoActiveTab)?;
        if tab.url().is_empty() {
            tracing::warn!(tab_id = %tab.id(), "Refusing to send a request without a URL");
            return Err(DispatchError::EmptyUrl);
        }

        let environment = self
            .active_environment()
            .map(Environment::resolved)
            .unwrap_or_default();
        let request_id = self.next_request_id();

        let tab = self.active_tab_mut().ok_or(DispatchError::NoActiveTab)?;
        tab.active_request_id = Some(request_id);
        tab.loading = true;
        tab.reset_response();
        let dispatch = Dispatch {
            tab_id: tab.id().to_string(),
            request_id,
            descriptor: descriptor(tab, environment, request_id),
        };

        tracing::info!(
            tab_id = %dispatch.tab_id,
            request_id = %request_id,
            method = %dispatch.descriptor.method,
            url = %dispatch.descriptor.url,
            "Dispatching request"
        );
        self.add_to_history();
        Ok(dispatch)
    }

    /// Apply a finished dispatch. Returns false when it was stale.
    pub fn apply_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            tab_id,
            request_id,
            started_at,
            outcome,
        } = completion;

        let Some(tab) = self.tab_mut(&tab_id) else {
            tracing::debug!(tab_id = %tab_id, request_id = %request_id, "Completion for a closed tab");
            return false;
        };
        if tab.active_request_id != Some(request_id) {
            tracing::debug!(tab_id = %tab_id, request_id = %request_id, "Discarding stale completion");
            return false;
        }

        match outcome {
            Ok(result) => {
                tab.metrics = ResponseMetrics {
                    time_ms: Some(started_at.elapsed().as_millis() as u64),
                    size: Some(format_size(result.data.byte_size())),
                };
                tab.error = result.error.clone();
                tab.response = Some(result);
            }
            Err(e) => {
                tracing::error!(tab_id = %tab_id, request_id = %request_id, error = %e, "Request failed");
                let message = e.to_string();
                tab.response = Some(ResponseData::failure(message.clone()));
                tab.error = Some(message);
            }
        }
        tab.loading = false;
        tab.active_request_id = None;
        true
    }

    /// Cancel the in-flight dispatch of the active tab.
    pub fn cancel_request(&mut self, runner: &dyn ExecutionRunner) -> bool {
        let tab_id = self.active_tab_id().to_string();
        self.cancel_request_for(&tab_id, runner)
    }

    /// Cancel the in-flight dispatch of `tab_id`. Returns false when the
    /// tab has nothing in flight.
    pub fn cancel_request_for(&mut self, tab_id: &str, runner: &dyn ExecutionRunner) -> bool {
        let Some(tab) = self.tab_mut(tab_id) else {
            return false;
        };
        let Some(request_id) = tab.active_request_id else {
            return false;
        };

        if let Err(e) = runner.abort(request_id) {
            tracing::error!(tab_id = %tab_id, request_id = %request_id, error = %e, "Failed to cancel");
        }

        tab.loading = false;
        tab.active_request_id = None;
        // a result that already landed stays
        if tab.response.is_none() {
            tab.response = Some(ResponseData::cancelled());
        }
        tracing::info!(tab_id = %tab_id, request_id = %request_id, "Request cancelled");
        true
    }
}
