//! Courier - actor-based API client console
//!
//! Architecture:
//! - Console - reads command lines from stdin, prints state
//! - App Layer - single-writer session actor
//! - Runner - async HTTP execution with cancellation

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use courier::app::{AppActor, SessionStore};
use courier::config::Config;
use courier::constants::{APP_NAME, APP_VERSION};
use courier::messages::{line_to_ui_event, Notification, RenderState, RunEvent, UiEvent};
use courier::models::ResponseBody;
use courier::network::HttpRunner;
use courier::storage::FileStorage;

const HELP: &str = "\
tabs:        new | dup <id> | close <id> | tab <id>
request:     method <M> | url <url> | params k=v&.. | unparam <n> | headers K: v; .. | unheader <n>
             body <text>
             bodytype text|json|form-data|urlencoded | form k=v&f=@path | urlencoded k=v&..
             auth none|basic <u> [p]|bearer <t>|apikey <k> <v> [header|query]
             pre <script> | test <script>
run:         send | cancel
history:     history <id> | clear-history
collections: col new <name> | col rename <id> <name> | col delete <id> | col save <id> <name>
             col open <cid> <rid> | col drop <cid> <rid> | col rename-request <cid> <rid> <name>
envs:        env new <name> | env set <id> <name> k=v&.. | env use <id>|none | env delete <id>
data:        import collections|environments <file> | export collections|environments
             help | quit";

fn print_state(state: &RenderState) {
    for tab in &state.tabs {
        let marker = if tab.id == state.active_tab_id { '*' } else { ' ' };
        println!("{} {} {} {}", marker, tab.id, tab.definition.method, tab.definition.url);
    }
    let Some(tab) = state.active_tab() else {
        return;
    };
    if tab.is_loading {
        println!("  ... loading");
    } else if let Some(response) = &tab.response {
        println!(
            "  {} {}  {}ms  {}",
            response.status,
            response.status_text,
            tab.metrics.time_ms.unwrap_or_default(),
            tab.metrics.size.as_deref().unwrap_or("-"),
        );
        match &response.data {
            ResponseBody::Json(value) => {
                println!("{}", serde_json::to_string_pretty(value).unwrap_or_default())
            }
            ResponseBody::Text(text) if !text.is_empty() => println!("{}", text),
            ResponseBody::Text(_) => {}
        }
    }
}

fn print_notification(notification: Notification) {
    match notification {
        Notification::Render(state) => print_state(&state),
        Notification::Prompt(message) => println!("! {}", message),
        Notification::Run(update) => match update.event {
            RunEvent::Console(log) => println!("  [{}] {}", log.level, log.messages.join(" ")),
            RunEvent::Assertion(result) => println!(
                "  {} {}",
                if result.passed { "PASS" } else { "FAIL" },
                result.name
            ),
            RunEvent::Exception(message) => println!("  error: {}", message),
            RunEvent::Response(_) => {}
        },
        Notification::Exported { json, .. } => println!("{}", json),
        Notification::Imported { kind, ok } => {
            println!("import {}: {}", kind.as_str(), if ok { "ok" } else { "failed" })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    std::fs::create_dir_all(&config.data_dir)?;

    // Initialize logging to file
    let log_path = config.log_path();
    let log_dir = log_path.parent().unwrap_or(&config.data_dir).to_path_buf();
    let log_name = log_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();
    tracing::info!(version = APP_VERSION, data_dir = %config.data_dir.display(), "Starting {}", APP_NAME);

    // Create channels
    let (ui_tx, ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Notification>();

    // Spawn app actor
    let storage = Arc::new(FileStorage::new(&config.data_dir));
    let store = SessionStore::new(storage);
    let runner = Arc::new(HttpRunner::new(config.request_timeout()));
    let app = tokio::spawn(AppActor::new(store, runner, notify_tx).run(ui_rx));

    println!("{} {} - type 'help' for commands", APP_NAME, APP_VERSION);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "help" {
                    println!("{}", HELP);
                    continue;
                }
                match line_to_ui_event(line) {
                    Some(UiEvent::Quit) => break,
                    Some(event) => {
                        if ui_tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => println!("? unknown command, try 'help'"),
                }
            }
            Some(notification) = notify_rx.recv() => print_notification(notification),
        }
    }

    let _ = ui_tx.send(UiEvent::Quit);
    app.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
