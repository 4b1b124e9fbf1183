//! HTTP client wrapper - builds requests from descriptors and runs them

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use regex::Regex;
use reqwest::multipart;
use tokio::sync::{mpsc, oneshot};

use crate::error::RunnerError;
use crate::messages::{RequestDescriptor, RunEvent, RunResult, RunUpdate};
use crate::models::{BodyType, ConsoleLog, FormItem, FormItemKind, ResponseBody, ResponseData};
use crate::network::collector::RunCollector;

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").ok())
        .as_ref()
}

/// Replace `{{name}}` with environment values. Unknown names are left as-is.
pub fn substitute(template: &str, environment: &BTreeMap<String, String>) -> String {
    let Some(pattern) = placeholder() else {
        return template.to_string();
    };
    if environment.is_empty() || !template.contains("{{") {
        return template.to_string();
    }
    pattern
        .replace_all(template, |caps: &regex::Captures| {
            environment
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn keyed(items: &[FormItem]) -> impl Iterator<Item = &FormItem> {
    items.iter().filter(|item| !item.key.trim().is_empty())
}

async fn multipart_form(
    items: &[FormItem],
    environment: &BTreeMap<String, String>,
) -> Result<multipart::Form, RunnerError> {
    let mut form = multipart::Form::new();
    for item in keyed(items) {
        let key = item.key.trim().to_string();
        form = match item.kind {
            FormItemKind::Text => form.text(key, substitute(&item.value, environment)),
            FormItemKind::File => {
                let path = substitute(&item.value, environment);
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    RunnerError::Initialization(format!("Failed to read file {}: {}", path, e))
                })?;
                let file_name = Path::new(&path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| key.clone());
                form.part(key, multipart::Part::bytes(bytes).file_name(file_name))
            }
        };
    }
    Ok(form)
}

/// Build a request from a descriptor, with environment substitution applied
async fn build_request(
    client: &reqwest::Client,
    request: &RequestDescriptor,
) -> Result<reqwest::RequestBuilder, RunnerError> {
    let env = &request.environment;

    let url = substitute(&request.url, env);
    let url = reqwest::Url::parse(&url)
        .map_err(|e| RunnerError::Initialization(format!("Invalid URL '{}': {}", url, e)))?;
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| RunnerError::Initialization(e.to_string()))?;

    let mut req_builder = client.request(method, url);

    for header in &request.headers {
        let key = header.key.trim();
        if key.is_empty() {
            continue;
        }
        req_builder = req_builder.header(key, substitute(&header.value, env));
    }

    if request.method.has_body() {
        req_builder = match request.body_type {
            BodyType::Text | BodyType::Json if request.body.is_empty() => req_builder,
            BodyType::Text | BodyType::Json => req_builder.body(substitute(&request.body, env)),
            BodyType::FormData => req_builder.multipart(multipart_form(&request.body_form_data, env).await?),
            BodyType::Urlencoded => {
                let pairs: Vec<(String, String)> = keyed(&request.body_url_encoded)
                    .map(|item| (item.key.trim().to_string(), substitute(&item.value, env)))
                    .collect();
                req_builder.form(&pairs)
            }
        };
    }

    Ok(req_builder)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timed out".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        format!("Request failed: {}", e)
    }
}

/// Scripts are not executed; leave a trace in the console instead
fn skipped_scripts(request: &RequestDescriptor) -> Vec<ConsoleLog> {
    [
        ("Pre-request", &request.pre_request_script),
        ("Test", &request.test_script),
    ]
    .into_iter()
    .filter(|(_, script)| !script.trim().is_empty())
    .map(|(label, _)| ConsoleLog {
        level: "warn".to_string(),
        messages: vec![format!("{} script skipped: scripts are not executed", label)],
    })
    .collect()
}

fn decode_body(bytes: &[u8], is_json: bool) -> ResponseBody {
    if is_json {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return ResponseBody::Json(value);
        }
    }
    ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
}

/// Execute a request, streaming its body, until it settles or `cancel_rx` fires.
///
/// Failures before anything is sent are returned as errors. Failures once
/// the request is in flight are folded into the result.
pub async fn execute_request(
    client: &reqwest::Client,
    request: RequestDescriptor,
    updates: mpsc::UnboundedSender<RunUpdate>,
    cancel_rx: oneshot::Receiver<()>,
) -> Result<RunResult, RunnerError> {
    let mut cancel = cancel_rx.fuse();
    let mut collector = RunCollector::new(request.request_id, Some(updates));
    for log in skipped_scripts(&request) {
        collector.record(RunEvent::Console(log));
    }

    let req_builder = build_request(client, &request).await?;

    let result = tokio::select! {
        biased;

        Ok(()) = &mut cancel => return Err(RunnerError::Aborted),
        result = req_builder.send() => result,
    };

    let resp = match result {
        Ok(resp) => resp,
        Err(e) => {
            collector.record(RunEvent::Exception(describe_error(&e)));
            return Ok(collector.finish(None));
        }
    };

    let status = resp.status();
    let mut headers = BTreeMap::new();
    for (name, value) in resp.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let is_json = headers
        .get("content-type")
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));

    let mut stream = resp.bytes_stream();
    let mut body = Vec::new();
    loop {
        tokio::select! {
            biased;

            Ok(()) = &mut cancel => return Err(RunnerError::Aborted),
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => body.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    collector.record(RunEvent::Exception(format!("Error reading body: {}", e)));
                    return Ok(collector.finish(None));
                }
                None => break,
            },
        }
    }

    collector.record(RunEvent::Response(ResponseData {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        data: decode_body(&body, is_json),
        ..ResponseData::default()
    }));
    Ok(collector.finish(None))
}

/// Create an HTTP client with the given request timeout
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
