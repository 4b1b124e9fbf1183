//! Render state - snapshot sent from the App layer to the presentation layer

use crate::app::session::SessionStore;
use crate::messages::network::{RequestId, RunUpdate};
use crate::messages::ui_events::DataKind;
use crate::models::{Collection, Environment, HistoryItem, RequestDefinition, ResponseData, ResponseMetrics};

/// Everything the presentation layer shows for one tab
#[derive(Debug, Clone, PartialEq)]
pub struct TabView {
    pub id: String,
    pub definition: RequestDefinition,
    pub response: Option<ResponseData>,
    pub error: Option<String>,
    pub metrics: ResponseMetrics,
    pub is_loading: bool,
    pub active_request_id: Option<RequestId>,
}

/// Complete state needed to render the session
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub tabs: Vec<TabView>,
    pub active_tab_id: String,
    pub history: Vec<HistoryItem>,
    pub collections: Vec<Collection>,
    pub environments: Vec<Environment>,
    pub active_environment_id: Option<String>,
}

impl RenderState {
    pub fn capture(store: &SessionStore) -> Self {
        RenderState {
            tabs: store
                .tabs()
                .iter()
                .map(|tab| TabView {
                    id: tab.id().to_string(),
                    definition: tab.definition().clone(),
                    response: tab.response().cloned(),
                    error: tab.error().map(str::to_string),
                    metrics: tab.metrics().clone(),
                    is_loading: tab.is_loading(),
                    active_request_id: tab.active_request_id(),
                })
                .collect(),
            active_tab_id: store.active_tab_id().to_string(),
            history: store.history().to_vec(),
            collections: store.collections().to_vec(),
            environments: store.environments().to_vec(),
            active_environment_id: store.active_environment_id().map(str::to_string),
        }
    }

    pub fn active_tab(&self) -> Option<&TabView> {
        self.tabs.iter().find(|t| t.id == self.active_tab_id)
    }
}

/// Messages published by the App actor
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// State changed; redraw
    Render(RenderState),
    /// Something the user must act on, e.g. an empty URL
    Prompt(String),
    /// Streamed progress of an in-flight run
    Run(RunUpdate),
    Exported { kind: DataKind, json: String },
    Imported { kind: DataKind, ok: bool },
}
