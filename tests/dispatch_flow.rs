use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use courier::app::{AppActor, SessionStore};
use courier::messages::{
    Completion, DataKind, Notification, RenderState, RequestDescriptor, RequestId, RunEvent, RunResult, RunUpdate, UiEvent,
};
use courier::models::{ApiKeyLocation, Auth, ConsoleLog, ResponseBody, ResponseData};
use courier::network::{ExecutionRunner, RunCollector};
use courier::storage::MemoryStorage;
use courier::RunnerError;

/// Runner whose runs settle only when the test says so
#[derive(Default)]
struct ScriptedRunner {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<Result<RunResult, RunnerError>>>>,
    submitted: Mutex<Vec<RequestDescriptor>>,
    aborted: Mutex<Vec<RequestId>>,
}

impl ScriptedRunner {
    fn complete(&self, id: RequestId, outcome: Result<RunResult, RunnerError>) {
        let tx = self.pending.lock().unwrap().remove(&id).expect("run is pending");
        tx.send(outcome).unwrap();
    }

    async fn wait_submitted(&self, count: usize) -> Vec<RequestDescriptor> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let submitted = self.submitted.lock().unwrap();
                    let pending = self.pending.lock().unwrap();
                    if submitted.len() >= count && submitted.iter().all(|d| pending.contains_key(&d.request_id)) {
                        return submitted.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("runs were submitted")
    }
}

#[async_trait]
impl ExecutionRunner for ScriptedRunner {
    async fn submit(
        &self,
        request: RequestDescriptor,
        updates: mpsc::UnboundedSender<RunUpdate>,
    ) -> Result<RunResult, RunnerError> {
        let (tx, rx) = oneshot::channel();
        let id = request.request_id;
        let _ = updates.send(RunUpdate {
            request_id: id,
            event: RunEvent::Console(ConsoleLog {
                level: "log".into(),
                messages: vec![format!("started {}", id)],
            }),
        });
        self.pending.lock().unwrap().insert(id, tx);
        self.submitted.lock().unwrap().push(request);
        rx.await.unwrap_or(Err(RunnerError::Aborted))
    }

    // Cooperative: the run keeps going until the test settles it
    fn abort(&self, request_id: RequestId) -> Result<bool, RunnerError> {
        self.aborted.lock().unwrap().push(request_id);
        Ok(self.pending.lock().unwrap().contains_key(&request_id))
    }
}

fn ok(status: u16, body: &str) -> RunResult {
    ResponseData {
        status,
        status_text: "OK".into(),
        data: ResponseBody::Text(body.into()),
        ..ResponseData::default()
    }
}

struct Harness {
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    notify_rx: mpsc::UnboundedReceiver<Notification>,
    runner: Arc<ScriptedRunner>,
    app: tokio::task::JoinHandle<SessionStore>,
}

impl Harness {
    fn start() -> Self {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let runner = Arc::new(ScriptedRunner::default());
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let app = tokio::spawn(AppActor::new(store, runner.clone(), notify_tx).run(ui_rx));
        Harness {
            ui_tx,
            notify_rx,
            runner,
            app,
        }
    }

    fn send(&self, event: UiEvent) {
        self.ui_tx.send(event).unwrap();
    }

    async fn wait_for<T>(&mut self, mut pick: impl FnMut(Notification) -> Option<T>) -> T {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notification = self.notify_rx.recv().await.expect("actor is running");
                if let Some(found) = pick(notification) {
                    return found;
                }
            }
        })
        .await
        .expect("notification arrived")
    }

    async fn wait_for_state(&mut self, mut check: impl FnMut(&RenderState) -> bool) -> RenderState {
        self.wait_for(|n| match n {
            Notification::Render(state) if check(&state) => Some(state),
            _ => None,
        })
        .await
    }

    async fn quit(self) -> SessionStore {
        self.send(UiEvent::Quit);
        self.app.await.unwrap()
    }
}

fn active_status_text(state: &RenderState) -> Option<String> {
    state
        .active_tab()
        .and_then(|t| t.response.as_ref())
        .map(|r| r.status_text.clone())
}

#[tokio::test]
async fn test_send_and_complete_through_actor() {
    let mut h = Harness::start();
    h.send(UiEvent::SetUrl("http://a.com".into()));
    h.send(UiEvent::SendRequest);

    let loading = h.wait_for_state(|s| s.active_tab().is_some_and(|t| t.is_loading)).await;
    assert_eq!(loading.history.len(), 1);

    let submitted = h.runner.wait_submitted(1).await;
    let log = h
        .wait_for(|n| match n {
            Notification::Run(RunUpdate {
                event: RunEvent::Console(log),
                ..
            }) => Some(log),
            _ => None,
        })
        .await;
    assert_eq!(log.messages, vec![format!("started {}", submitted[0].request_id)]);

    h.runner.complete(submitted[0].request_id, Ok(ok(200, "hello")));
    let done = h.wait_for_state(|s| s.active_tab().is_some_and(|t| t.response.is_some())).await;
    let tab = done.active_tab().unwrap();
    assert!(!tab.is_loading);
    assert_eq!(tab.response.as_ref().unwrap().status, 200);
    assert_eq!(tab.metrics.size.as_deref(), Some("5 B"));

    h.quit().await;
}

#[tokio::test]
async fn test_empty_url_prompts_without_dispatch() {
    let mut h = Harness::start();
    h.send(UiEvent::SendRequest);

    let prompt = h
        .wait_for(|n| match n {
            Notification::Prompt(message) => Some(message),
            _ => None,
        })
        .await;
    assert_eq!(prompt, "Please enter a URL");

    let store = h.quit().await;
    assert!(store.history().is_empty());
    assert!(!store.active_tab().unwrap().is_loading());
}

#[tokio::test]
async fn test_newer_dispatch_wins_over_older_completion() {
    let mut h = Harness::start();
    h.send(UiEvent::SetUrl("http://a.com".into()));
    h.send(UiEvent::SendRequest);
    h.send(UiEvent::SendRequest);

    let submitted = h.runner.wait_submitted(2).await;
    let (first, second) = (submitted[0].request_id, submitted[1].request_id);
    assert_ne!(first, second);

    h.runner.complete(second, Ok(ok(201, "new")));
    h.wait_for_state(|s| s.active_tab().and_then(|t| t.response.as_ref()).is_some_and(|r| r.status == 201))
        .await;

    h.runner.complete(first, Ok(ok(200, "old")));
    let store = h.quit().await;
    assert_eq!(store.active_tab().unwrap().response().unwrap().status, 201);
}

#[tokio::test]
async fn test_cancel_then_late_success_stays_cancelled() {
    let mut h = Harness::start();
    h.send(UiEvent::SetUrl("http://a.com".into()));
    h.send(UiEvent::SendRequest);
    let submitted = h.runner.wait_submitted(1).await;
    let id = submitted[0].request_id;

    h.send(UiEvent::CancelRequest);
    let state = h
        .wait_for_state(|s| active_status_text(s).as_deref() == Some("Cancelled"))
        .await;
    assert!(!state.active_tab().unwrap().is_loading);
    assert_eq!(*h.runner.aborted.lock().unwrap(), vec![id]);

    h.runner.complete(id, Ok(ok(200, "too late")));
    let store = h.quit().await;
    let tab = store.active_tab().unwrap();
    assert_eq!(tab.response().unwrap().status_text, "Cancelled");
    assert_eq!(tab.active_request_id(), None);
}

#[tokio::test]
async fn test_api_key_query_reaches_runner() {
    let h = Harness::start();
    h.send(UiEvent::SetUrl("http://a.com?x=1".into()));
    h.send(UiEvent::SetAuth(Auth::api_key("k", "v", ApiKeyLocation::Query)));
    h.send(UiEvent::SendRequest);

    let submitted = h.runner.wait_submitted(1).await;
    assert_eq!(submitted[0].url, "http://a.com?x=1&k=v");
    assert!(submitted[0].headers.is_empty());

    let store = h.quit().await;
    assert_eq!(store.active_tab().unwrap().url(), "http://a.com?x=1");
}

#[tokio::test]
async fn test_stale_completions_at_store_level() {
    let runner = ScriptedRunner::default();
    let mut store = SessionStore::new(Arc::new(MemoryStorage::new()));
    store.set_url("http://a.com");

    let first = store.send_request().unwrap();
    let second = store.send_request().unwrap();
    let (updates, _rx) = mpsc::unbounded_channel();

    let run_first = runner.submit(first.descriptor.clone(), updates.clone());
    let run_second = runner.submit(second.descriptor.clone(), updates);
    let settle = async {
        runner.wait_submitted(2).await;
        runner.complete(first.request_id, Err(RunnerError::Execution("boom".into())));
        runner.complete(second.request_id, Ok(ok(204, "")));
    };
    let (outcome_first, outcome_second, ()) = tokio::join!(run_first, run_second, settle);

    let stale = Completion {
        tab_id: first.tab_id.clone(),
        request_id: first.request_id,
        started_at: Instant::now(),
        outcome: outcome_first,
    };
    assert!(!store.apply_completion(stale));
    assert!(store.active_tab().unwrap().response().is_none());
    assert!(store.active_tab().unwrap().is_loading());

    let current = Completion {
        tab_id: second.tab_id,
        request_id: second.request_id,
        started_at: Instant::now(),
        outcome: outcome_second,
    };
    assert!(store.apply_completion(current));
    assert_eq!(store.active_tab().unwrap().response().unwrap().status, 204);
    assert_eq!(store.active_tab().unwrap().metrics().size.as_deref(), Some("0 B"));
}

#[tokio::test]
async fn test_import_reads_file_through_actor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("collections.json");
    std::fs::write(&path, r#"[{"name":"Shared","requests":[{"method":"GET","url":"http://a.com"}]}]"#).unwrap();

    let mut h = Harness::start();
    h.send(UiEvent::Import {
        kind: DataKind::Collections,
        path: path.clone(),
    });
    let ok = h
        .wait_for(|n| match n {
            Notification::Imported { kind: DataKind::Collections, ok } => Some(ok),
            _ => None,
        })
        .await;
    assert!(ok);
    let state = h.wait_for_state(|s| !s.collections.is_empty()).await;
    assert_eq!(state.collections[0].name, "Shared");

    h.send(UiEvent::Import {
        kind: DataKind::Environments,
        path: dir.path().join("missing.json"),
    });
    let ok = h
        .wait_for(|n| match n {
            Notification::Imported { kind: DataKind::Environments, ok } => Some(ok),
            _ => None,
        })
        .await;
    assert!(!ok);

    let store = h.quit().await;
    assert_eq!(store.collections().len(), 1);
    assert!(store.environments().is_empty());
}

#[test]
fn test_no_response_shape_is_exact() {
    let result = RunCollector::new(RequestId(1), None).finish(None);
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({
            "status": 0,
            "statusText": "No Response",
            "headers": {},
            "data": "",
            "testResults": [],
            "consoleLogs": []
        })
    );
}
