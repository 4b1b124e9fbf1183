//! App actor - message loop processing UI events and dispatch completions

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::app::dispatch::Dispatch;
use crate::app::session::SessionStore;
use crate::constants::EMPTY_URL_PROMPT;
use crate::error::DispatchError;
use crate::messages::{Completion, DataKind, Notification, RenderState, RunUpdate, UiEvent};
use crate::network::ExecutionRunner;

/// Single writer of the session state.
///
/// Runs are executed on a [`JoinSet`]; their completions come back through
/// the same loop, so every state change happens on this task.
pub struct AppActor {
    store: SessionStore,
    runner: Arc<dyn ExecutionRunner>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    updates_tx: mpsc::UnboundedSender<RunUpdate>,
    updates_rx: mpsc::UnboundedReceiver<RunUpdate>,
    in_flight: JoinSet<Completion>,
}

impl AppActor {
    pub fn new(
        store: SessionStore,
        runner: Arc<dyn ExecutionRunner>,
        notify_tx: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        AppActor {
            store,
            runner,
            notify_tx,
            updates_tx,
            updates_rx,
            in_flight: JoinSet::new(),
        }
    }

    /// Run the actor message loop until `Quit` or the UI hangs up.
    /// Returns the final session state.
    pub async fn run(mut self, mut ui_rx: mpsc::UnboundedReceiver<UiEvent>) -> SessionStore {
        self.render();

        loop {
            tokio::select! {
                event = ui_rx.recv() => {
                    let Some(event) = event else { break };
                    if self.handle_ui_event(event).await {
                        break;
                    }
                    self.render();
                }
                Some(update) = self.updates_rx.recv() => {
                    self.notify(Notification::Run(update));
                }
                Some(joined) = self.in_flight.join_next() => {
                    match joined {
                        Ok(completion) => {
                            if self.store.apply_completion(completion) {
                                self.render();
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Dispatch task failed"),
                    }
                }
            }
        }

        self.shutdown().await;
        self.store
    }

    fn notify(&self, notification: Notification) {
        // the UI going away is handled by the ui_rx branch
        let _ = self.notify_tx.send(notification);
    }

    fn render(&self) {
        self.notify(Notification::Render(RenderState::capture(&self.store)));
    }

    fn spawn(&mut self, dispatch: Dispatch) {
        let runner = self.runner.clone();
        let updates = self.updates_tx.clone();
        self.in_flight.spawn(async move {
            let started_at = Instant::now();
            let outcome = runner.submit(dispatch.descriptor, updates).await;
            Completion {
                tab_id: dispatch.tab_id,
                request_id: dispatch.request_id,
                started_at,
                outcome,
            }
        });
    }

    async fn shutdown(&mut self) {
        for tab in self.store.tabs() {
            if let Some(request_id) = tab.active_request_id() {
                if let Err(e) = self.runner.abort(request_id) {
                    tracing::warn!(request_id = %request_id, error = %e, "Failed to cancel on shutdown");
                }
            }
        }
        self.in_flight.shutdown().await;
        tracing::info!("App actor stopped");
    }

    async fn import(&mut self, kind: DataKind, path: &std::path::Path) {
        let ok = match tokio::fs::read_to_string(path).await {
            Ok(json) => match kind {
                DataKind::Collections => self.store.import_collections(&json),
                DataKind::Environments => self.store.import_environments(&json),
            },
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read import file");
                false
            }
        };
        self.notify(Notification::Imported { kind, ok });
    }

    /// Handle a UI event, returns true if quit was requested
    async fn handle_ui_event(&mut self, event: UiEvent) -> bool {
        let store = &mut self.store;
        match event {
            // Tabs
            UiEvent::AddTab => {
                store.add_tab();
            }
            UiEvent::DuplicateTab(id) => {
                store.duplicate_tab(&id);
            }
            UiEvent::CloseTab(id) => store.close_tab(&id),
            UiEvent::SwitchTab(id) => store.set_active_tab(&id),

            // Active tab editing
            UiEvent::SetMethod(method) => store.set_method(method),
            UiEvent::SetUrl(url) => store.set_url(&url),
            UiEvent::SetQueryParams(params) => store.set_query_params(params),
            UiEvent::RemoveQueryParam(index) => store.remove_query_param(index),
            UiEvent::SetHeaders(headers) => store.set_headers(headers),
            UiEvent::RemoveHeader(index) => store.remove_header(index),
            UiEvent::SetBody(body) => store.set_body(&body),
            UiEvent::SetBodyType(body_type) => store.set_body_type(body_type),
            UiEvent::SetBodyFormData(items) => store.set_body_form_data(items),
            UiEvent::SetBodyUrlEncoded(items) => store.set_body_url_encoded(items),
            UiEvent::SetAuth(auth) => store.set_auth(auth),
            UiEvent::SetPreRequestScript(script) => store.set_pre_request_script(&script),
            UiEvent::SetTestScript(script) => store.set_test_script(&script),

            // Dispatch
            UiEvent::SendRequest => match store.send_request() {
                Ok(dispatch) => self.spawn(dispatch),
                Err(DispatchError::EmptyUrl) => {
                    self.notify(Notification::Prompt(EMPTY_URL_PROMPT.to_string()));
                }
                Err(e) => tracing::warn!(error = %e, "Request not sent"),
            },
            UiEvent::CancelRequest => {
                store.cancel_request(self.runner.as_ref());
            }

            // History
            UiEvent::ClearHistory => store.clear_history(),
            UiEvent::LoadHistoryItem(id) => store.load_history_item_by_id(&id),

            // Collections
            UiEvent::CreateCollection(name) => {
                store.create_collection(&name);
            }
            UiEvent::RenameCollection { id, name } => store.rename_collection(&id, &name),
            UiEvent::DeleteCollection(id) => store.delete_collection(&id),
            UiEvent::SaveRequest { collection_id, name } => {
                store.save_request_to_collection(&collection_id, &name)
            }
            UiEvent::RenameSavedRequest {
                collection_id,
                request_id,
                name,
            } => store.rename_request_in_collection(&collection_id, &request_id, &name),
            UiEvent::DeleteSavedRequest {
                collection_id,
                request_id,
            } => store.delete_request_from_collection(&collection_id, &request_id),
            UiEvent::OpenSavedRequest {
                collection_id,
                request_id,
            } => store.open_saved_request(&collection_id, &request_id),

            // Environments
            UiEvent::CreateEnvironment(name) => {
                store.create_environment(&name);
            }
            UiEvent::UpdateEnvironment { id, name, variables } => {
                store.update_environment(&id, &name, variables)
            }
            UiEvent::DeleteEnvironment(id) => store.delete_environment(&id),
            UiEvent::SetActiveEnvironment(id) => store.set_active_environment(id.as_deref()),

            // Import / export
            UiEvent::Import { kind, path } => self.import(kind, &path).await,
            UiEvent::Export(kind) => {
                let json = match kind {
                    DataKind::Collections => store.export_collections(),
                    DataKind::Environments => store.export_environments(),
                };
                self.notify(Notification::Exported { kind, json });
            }

            // System
            UiEvent::Quit => return true,
        }

        false
    }
}
