//! Session store - the ordered set of tabs plus persisted user data
//!
//! All state lives here and is only mutated through these methods. Every
//! observable change is written back through the [`Storage`] collaborator.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::tab::RequestTab;
use crate::constants::{
    ACTIVE_ENVIRONMENT_KEY, ACTIVE_TAB_KEY, COLLECTIONS_KEY, ENVIRONMENTS_KEY, HISTORY_KEY,
    MAX_HISTORY, TABS_KEY,
};
use crate::messages::RequestId;
use crate::models::{
    ensure_sentinel, Auth, BodyType, Collection, EditableRow, Environment, FormItem, HistoryItem, HttpMethod,
    KeyValue, RequestDefinition, Variable,
};
use crate::storage::Storage;

/// A tab as it is written to storage: id plus request definition
#[derive(Serialize, Deserialize)]
struct PersistedTab {
    id: String,
    #[serde(flatten)]
    definition: RequestDefinition,
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Owner of all tabs, history, collections and environments
pub struct SessionStore {
    pub(crate) tabs: Vec<RequestTab>,
    pub(crate) active_tab_id: String,
    history: Vec<HistoryItem>,
    collections: Vec<Collection>,
    environments: Vec<Environment>,
    active_environment_id: Option<String>,
    next_request_id: u64,
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    /// Create a store and load everything persisted in `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let mut store = SessionStore {
            tabs: Vec::new(),
            active_tab_id: String::new(),
            history: Vec::new(),
            collections: Vec::new(),
            environments: Vec::new(),
            active_environment_id: None,
            next_request_id: 1,
            storage,
        };
        store.load_history();
        store.load_collections();
        store.load_environments();
        store.load_tabs();
        store
    }

    // ========================
    // Accessors
    // ========================

    pub fn tabs(&self) -> &[RequestTab] {
        &self.tabs
    }

    pub fn active_tab_id(&self) -> &str {
        &self.active_tab_id
    }

    pub fn tab(&self, id: &str) -> Option<&RequestTab> {
        self.tabs.iter().find(|t| t.id() == id)
    }

    pub(crate) fn tab_mut(&mut self, id: &str) -> Option<&mut RequestTab> {
        self.tabs.iter_mut().find(|t| t.id() == id)
    }

    pub fn active_tab(&self) -> Option<&RequestTab> {
        self.tab(&self.active_tab_id)
    }

    pub(crate) fn active_tab_mut(&mut self) -> Option<&mut RequestTab> {
        let id = self.active_tab_id.clone();
        self.tab_mut(&id)
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn active_environment_id(&self) -> Option<&str> {
        self.active_environment_id.as_deref()
    }

    pub fn active_environment(&self) -> Option<&Environment> {
        let id = self.active_environment_id.as_deref()?;
        self.environments.iter().find(|e| e.id == id)
    }

    /// Generate a fresh dispatch identity
    pub(crate) fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    // ========================
    // Tab lifecycle
    // ========================

    /// Append a fresh tab and make it active. Returns its id.
    pub fn add_tab(&mut self) -> String {
        let tab = RequestTab::new(new_id());
        let id = tab.id().to_string();
        self.tabs.push(tab);
        self.active_tab_id = id.clone();
        self.save_tabs();
        id
    }

    /// Copy the request definition of `id` into a new active tab.
    pub fn duplicate_tab(&mut self, id: &str) -> Option<String> {
        let definition = self.tab(id)?.definition().clone();
        let tab = RequestTab::from_definition(new_id(), &definition);
        let new_id = tab.id().to_string();
        self.tabs.push(tab);
        self.active_tab_id = new_id.clone();
        self.save_tabs();
        Some(new_id)
    }

    /// Close a tab. The last remaining tab can never be closed.
    pub fn close_tab(&mut self, id: &str) {
        if self.tabs.len() <= 1 {
            return;
        }
        let Some(index) = self.tabs.iter().position(|t| t.id() == id) else {
            return;
        };
        self.tabs.remove(index);

        if self.active_tab_id == id {
            let next = index.saturating_sub(1).min(self.tabs.len() - 1);
            self.active_tab_id = self.tabs[next].id().to_string();
        }
        self.save_tabs();
    }

    pub fn set_active_tab(&mut self, id: &str) {
        if self.tab(id).is_some() {
            self.active_tab_id = id.to_string();
            self.save_tabs();
        }
    }

    // ========================
    // Active tab editing
    // ========================

    /// Apply `edit` to the active tab and persist the result.
    fn edit_active(&mut self, edit: impl FnOnce(&mut RequestTab)) {
        if let Some(tab) = self.active_tab_mut() {
            edit(tab);
            self.save_tabs();
        }
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        self.edit_active(|tab| tab.set_method(method));
    }

    pub fn set_url(&mut self, url: &str) {
        self.edit_active(|tab| tab.set_url(url));
    }

    pub fn set_query_params(&mut self, params: Vec<KeyValue>) {
        self.edit_active(|tab| tab.set_query_params(params));
    }

    pub fn remove_query_param(&mut self, index: usize) {
        self.edit_active(|tab| tab.remove_query_param(index));
    }

    pub fn remove_header(&mut self, index: usize) {
        self.edit_active(|tab| tab.remove_header(index));
    }

    pub fn set_headers(&mut self, headers: Vec<KeyValue>) {
        self.edit_active(|tab| tab.set_headers(headers));
    }

    pub fn set_body(&mut self, body: &str) {
        self.edit_active(|tab| tab.set_body(body));
    }

    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.edit_active(|tab| tab.set_body_type(body_type));
    }

    pub fn set_body_form_data(&mut self, items: Vec<FormItem>) {
        self.edit_active(|tab| tab.set_body_form_data(items));
    }

    pub fn set_body_url_encoded(&mut self, items: Vec<FormItem>) {
        self.edit_active(|tab| tab.set_body_url_encoded(items));
    }

    pub fn set_auth(&mut self, auth: Auth) {
        self.edit_active(|tab| tab.set_auth(auth));
    }

    pub fn set_pre_request_script(&mut self, script: &str) {
        self.edit_active(|tab| tab.set_pre_request_script(script));
    }

    pub fn set_test_script(&mut self, script: &str) {
        self.edit_active(|tab| tab.set_test_script(script));
    }

    // ========================
    // Tab persistence
    // ========================

    pub fn save_tabs(&self) {
        let persisted: Vec<PersistedTab> = self
            .tabs
            .iter()
            .map(|t| PersistedTab {
                id: t.id().to_string(),
                definition: t.definition().clone(),
            })
            .collect();
        self.write_json(TABS_KEY, &persisted);
        self.write_json(ACTIVE_TAB_KEY, &self.active_tab_id);
    }

    fn load_tabs(&mut self) {
        if let Some(raw) = self.storage.get(TABS_KEY) {
            match serde_json::from_str::<Vec<PersistedTab>>(&raw) {
                Ok(saved) => {
                    self.tabs = saved
                        .iter()
                        .map(|p| RequestTab::from_definition(p.id.clone(), &p.definition))
                        .collect();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load tabs");
                    self.tabs.clear();
                }
            }
        }

        if self.tabs.is_empty() {
            self.add_tab();
            return;
        }

        let stored_active = self
            .storage
            .get(ACTIVE_TAB_KEY)
            .and_then(|raw| serde_json::from_str::<String>(&raw).ok());
        self.active_tab_id = match stored_active {
            Some(id) if self.tab(&id).is_some() => id,
            _ => self.tabs[0].id().to_string(),
        };
    }

    // ========================
    // History
    // ========================

    fn snapshot(&self, name: &str) -> Option<HistoryItem> {
        let tab = self.active_tab()?;
        Some(HistoryItem {
            id: new_id(),
            name: name.to_string(),
            request: tab.definition().clone(),
            date: Utc::now(),
        })
    }

    /// Record the active tab's request at the top of the history.
    pub fn add_to_history(&mut self) {
        let Some(item) = self.snapshot("") else {
            return;
        };
        let (method, url) = (item.request.method, item.request.url.clone());
        self.history
            .retain(|h| !(h.request.method == method && h.request.url == url));
        self.history.insert(0, item);
        self.history.truncate(MAX_HISTORY);
        self.save_history();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.save_history();
    }

    /// Load a history entry (or saved request) into the active tab.
    pub fn load_history_item(&mut self, item: &HistoryItem) {
        self.edit_active(|tab| tab.apply_definition(&item.request));
    }

    pub fn load_history_item_by_id(&mut self, id: &str) {
        if let Some(item) = self.history.iter().find(|h| h.id == id).cloned() {
            self.load_history_item(&item);
        }
    }

    fn save_history(&self) {
        self.write_json(HISTORY_KEY, &self.history);
    }

    fn load_history(&mut self) {
        if let Some(raw) = self.storage.get(HISTORY_KEY) {
            match serde_json::from_str(&raw) {
                Ok(history) => self.history = history,
                Err(e) => tracing::error!(error = %e, "Failed to parse history"),
            }
        }
    }

    // ========================
    // Collections
    // ========================

    pub fn create_collection(&mut self, name: &str) -> String {
        let id = new_id();
        self.collections.push(Collection {
            id: id.clone(),
            name: name.to_string(),
            requests: Vec::new(),
        });
        self.save_collections();
        id
    }

    pub fn rename_collection(&mut self, id: &str, name: &str) {
        if let Some(collection) = self.collections.iter_mut().find(|c| c.id == id) {
            collection.name = name.to_string();
            self.save_collections();
        }
    }

    pub fn delete_collection(&mut self, id: &str) {
        let before = self.collections.len();
        self.collections.retain(|c| c.id != id);
        if self.collections.len() != before {
            self.save_collections();
        }
    }

    /// Snapshot the active tab into a collection. Unknown ids do nothing.
    pub fn save_request_to_collection(&mut self, collection_id: &str, name: &str) {
        let Some(item) = self.snapshot(name) else {
            return;
        };
        if let Some(collection) = self.collections.iter_mut().find(|c| c.id == collection_id) {
            collection.requests.push(item);
            self.save_collections();
        }
    }

    pub fn rename_request_in_collection(&mut self, collection_id: &str, request_id: &str, name: &str) {
        let request = self
            .collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .and_then(|c| c.requests.iter_mut().find(|r| r.id == request_id));
        if let Some(request) = request {
            request.name = name.to_string();
            self.save_collections();
        }
    }

    pub fn delete_request_from_collection(&mut self, collection_id: &str, request_id: &str) {
        if let Some(collection) = self.collections.iter_mut().find(|c| c.id == collection_id) {
            let before = collection.requests.len();
            collection.requests.retain(|r| r.id != request_id);
            if collection.requests.len() != before {
                self.save_collections();
            }
        }
    }

    /// Load a saved request into the active tab.
    pub fn open_saved_request(&mut self, collection_id: &str, request_id: &str) {
        let saved = self
            .collections
            .iter()
            .find(|c| c.id == collection_id)
            .and_then(|c| c.requests.iter().find(|r| r.id == request_id))
            .cloned();
        if let Some(saved) = saved {
            self.load_history_item(&saved);
        }
    }

    /// Append collections from a JSON array, with fresh ids throughout.
    pub fn import_collections(&mut self, json: &str) -> bool {
        let Some(mut imported) = parse_import::<Collection>(json, "collections") else {
            return false;
        };
        for collection in &mut imported {
            collection.id = new_id();
            for request in &mut collection.requests {
                request.id = new_id();
            }
        }
        tracing::info!(count = imported.len(), "Imported collections");
        self.collections.extend(imported);
        self.save_collections();
        true
    }

    pub fn export_collections(&self) -> String {
        serde_json::to_string_pretty(&self.collections).unwrap_or_else(|_| String::from("[]"))
    }

    fn save_collections(&self) {
        self.write_json(COLLECTIONS_KEY, &self.collections);
    }

    fn load_collections(&mut self) {
        if let Some(raw) = self.storage.get(COLLECTIONS_KEY) {
            match serde_json::from_str(&raw) {
                Ok(collections) => self.collections = collections,
                Err(e) => tracing::error!(error = %e, "Failed to parse collections"),
            }
        }
    }

    // ========================
    // Environments
    // ========================

    pub fn create_environment(&mut self, name: &str) -> String {
        let id = new_id();
        self.environments.push(Environment {
            id: id.clone(),
            name: name.to_string(),
            variables: vec![Variable::blank()],
        });
        self.save_environments();
        id
    }

    pub fn update_environment(&mut self, id: &str, name: &str, mut variables: Vec<Variable>) {
        if let Some(env) = self.environments.iter_mut().find(|e| e.id == id) {
            ensure_sentinel(&mut variables);
            env.name = name.to_string();
            env.variables = variables;
            self.save_environments();
        }
    }

    pub fn delete_environment(&mut self, id: &str) {
        let before = self.environments.len();
        self.environments.retain(|e| e.id != id);
        if self.environments.len() == before {
            return;
        }
        self.save_environments();
        if self.active_environment_id.as_deref() == Some(id) {
            self.set_active_environment(None);
        }
    }

    /// Select the environment used for dispatch; unknown ids are ignored.
    pub fn set_active_environment(&mut self, id: Option<&str>) {
        if let Some(id) = id {
            if !self.environments.iter().any(|e| e.id == id) {
                return;
            }
        }
        self.active_environment_id = id.map(str::to_string);
        self.write_json(ACTIVE_ENVIRONMENT_KEY, &self.active_environment_id);
    }

    pub fn import_environments(&mut self, json: &str) -> bool {
        let Some(mut imported) = parse_import::<Environment>(json, "environments") else {
            return false;
        };
        for env in &mut imported {
            env.id = new_id();
            ensure_sentinel(&mut env.variables);
        }
        tracing::info!(count = imported.len(), "Imported environments");
        self.environments.extend(imported);
        self.save_environments();
        true
    }

    pub fn export_environments(&self) -> String {
        serde_json::to_string_pretty(&self.environments).unwrap_or_else(|_| String::from("[]"))
    }

    fn save_environments(&self) {
        self.write_json(ENVIRONMENTS_KEY, &self.environments);
    }

    fn load_environments(&mut self) {
        if let Some(raw) = self.storage.get(ENVIRONMENTS_KEY) {
            match serde_json::from_str(&raw) {
                Ok(envs) => self.environments = envs,
                Err(e) => tracing::error!(error = %e, "Failed to parse environments"),
            }
        }
        // The id is kept even if it points nowhere; dispatch ignores it then
        self.active_environment_id = self
            .storage
            .get(ACTIVE_ENVIRONMENT_KEY)
            .and_then(|raw| serde_json::from_str::<Option<String>>(&raw).ok())
            .flatten();
    }

    // ========================
    // Storage helpers
    // ========================

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(Into::into)
            .and_then(|raw| self.storage.set(key, &raw));
        if let Err(e) = result {
            tracing::error!(key, error = %e, "Failed to persist");
        }
    }
}

/// Parse an import payload, which must be a JSON array of `T`.
fn parse_import<T: for<'de> Deserialize<'de>>(json: &str, subject: &str) -> Option<Vec<T>> {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "Failed to import {}", subject);
            return None;
        }
    };
    if !value.is_array() {
        tracing::error!("Failed to import {}: expected a JSON array", subject);
        return None;
    }
    match serde_json::from_value(value) {
        Ok(items) => Some(items),
        Err(e) => {
            tracing::error!(error = %e, "Failed to import {}", subject);
            None
        }
    }
}
