use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    pub fn has_body(&self) -> bool {
        !matches!(self, HttpMethod::GET | HttpMethod::HEAD | HttpMethod::OPTIONS)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            "HEAD" => Ok(HttpMethod::HEAD),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

// ========================
// Editable rows
// ========================

/// A row of an editable key/value list.
///
/// Every editable list ends in exactly one blank "sentinel" row, which the
/// editor uses as its insertion point.
pub trait EditableRow: Clone {
    fn blank() -> Self;
    fn is_blank(&self) -> bool;
}

/// Drop trailing blank rows and append a single sentinel.
pub fn ensure_sentinel<R: EditableRow>(rows: &mut Vec<R>) {
    while rows.last().is_some_and(R::is_blank) {
        rows.pop();
    }
    rows.push(R::blank());
}

/// Remove the row at `index` and restore the sentinel.
pub fn remove_row<R: EditableRow>(rows: &mut Vec<R>, index: usize) {
    if index < rows.len() {
        rows.remove(index);
    }
    ensure_sentinel(rows);
}

/// Whether `rows` is exactly one sentinel row.
pub fn is_sentinel_only<R: EditableRow>(rows: &[R]) -> bool {
    rows.len() == 1 && rows[0].is_blank()
}

/// HTTP header or query parameter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl EditableRow for KeyValue {
    fn blank() -> Self {
        KeyValue::default()
    }

    fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

/// What a body row's value holds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormItemKind {
    #[default]
    Text,
    /// `value` is a path to a file on disk
    File,
}

/// A multipart or urlencoded body row
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormItem {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: FormItemKind,
}

impl FormItem {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        FormItem {
            key: key.into(),
            value: value.into(),
            kind: FormItemKind::Text,
        }
    }

    pub fn file(key: impl Into<String>, path: impl Into<String>) -> Self {
        FormItem {
            key: key.into(),
            value: path.into(),
            kind: FormItemKind::File,
        }
    }
}

impl EditableRow for FormItem {
    fn blank() -> Self {
        FormItem::default()
    }

    fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

// ========================
// Body & auth
// ========================

/// Request body encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyType {
    #[default]
    Text,
    Json,
    FormData,
    Urlencoded,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Text => "text",
            BodyType::Json => "json",
            BodyType::FormData => "form-data",
            BodyType::Urlencoded => "urlencoded",
        }
    }

    /// The `Content-Type` this body type pins on the request, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        use crate::constants::{JSON_CONTENT_TYPE, URLENCODED_CONTENT_TYPE};
        match self {
            BodyType::Json => Some(JSON_CONTENT_TYPE),
            BodyType::Urlencoded => Some(URLENCODED_CONTENT_TYPE),
            BodyType::Text | BodyType::FormData => None,
        }
    }
}

impl FromStr for BodyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(BodyType::Text),
            "json" => Ok(BodyType::Json),
            "form-data" => Ok(BodyType::FormData),
            "urlencoded" => Ok(BodyType::Urlencoded),
            other => Err(format!("unsupported body type: {}", other)),
        }
    }
}

/// Where an API key is attached to the outgoing request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
    /// Any unrecognised location; the key is not attached anywhere
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub add_to: ApiKeyLocation,
}

/// Authentication settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    #[default]
    None,
    Basic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    Bearer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    ApiKey {
        #[serde(rename = "apiKey", default, skip_serializing_if = "Option::is_none")]
        api_key: Option<ApiKey>,
    },
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer {
            token: Some(token.into()),
        }
    }

    pub fn api_key(key: impl Into<String>, value: impl Into<String>, add_to: ApiKeyLocation) -> Self {
        Auth::ApiKey {
            api_key: Some(ApiKey {
                key: key.into(),
                value: value.into(),
                add_to,
            }),
        }
    }
}

// ========================
// Request definition
// ========================

/// The editable part of a request: everything a tab persists and a
/// history item or saved request snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDefinition {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<KeyValue>,
    pub query_params: Vec<KeyValue>,
    pub body: String,
    pub body_type: BodyType,
    pub body_form_data: Vec<FormItem>,
    pub body_url_encoded: Vec<FormItem>,
    pub auth: Auth,
    pub pre_request_script: String,
    pub test_script: String,
}

impl Default for RequestDefinition {
    fn default() -> Self {
        RequestDefinition {
            method: HttpMethod::GET,
            url: String::new(),
            headers: vec![KeyValue::blank()],
            query_params: vec![KeyValue::blank()],
            body: String::new(),
            body_type: BodyType::Text,
            body_form_data: vec![FormItem::blank()],
            body_url_encoded: vec![FormItem::blank()],
            auth: Auth::None,
            pre_request_script: String::new(),
            test_script: String::new(),
        }
    }
}

/// History entry; also the shape of a request saved in a collection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub request: RequestDefinition,
    #[serde(default)]
    pub date: DateTime<Utc>,
}

pub type SavedRequest = HistoryItem;

/// A named group of saved requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub requests: Vec<SavedRequest>,
}

fn default_enabled() -> bool {
    true
}

/// An environment variable
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

impl EditableRow for Variable {
    fn blank() -> Self {
        Variable::new("", "")
    }

    fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

/// Environment variables
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Environment {
    /// Variables that take part in a request: enabled and keyed.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .filter(|v| v.enabled && !v.key.is_empty())
            .map(|v| (v.key.clone(), v.value.clone()))
            .collect()
    }
}

// ========================
// Response
// ========================

/// Response payload: raw text or parsed JSON
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Json(serde_json::Value),
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Text(String::new())
    }
}

impl ResponseBody {
    /// Size of the body as it would be serialized for display.
    pub fn byte_size(&self) -> usize {
        match self {
            ResponseBody::Text(text) => text.len(),
            ResponseBody::Json(value) => value.to_string().len(),
        }
    }
}

/// Outcome of one test assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One console call made by a script
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLog {
    pub level: String,
    pub messages: Vec<String>,
}

/// A response as the tab shows it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: ResponseBody,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default)]
    pub console_logs: Vec<ConsoleLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseData {
    /// Uniform shape for any failed dispatch.
    pub fn failure(message: impl Into<String>) -> Self {
        ResponseData {
            status: 0,
            status_text: String::from("Error"),
            data: ResponseBody::Text(message.into()),
            ..ResponseData::default()
        }
    }

    /// Completion without a response ever having been produced.
    pub fn no_response() -> Self {
        ResponseData {
            status: 0,
            status_text: String::from("No Response"),
            ..ResponseData::default()
        }
    }

    pub fn cancelled() -> Self {
        ResponseData {
            status: 0,
            status_text: String::from("Cancelled"),
            data: ResponseBody::Text(String::from("Request cancelled by user")),
            ..ResponseData::default()
        }
    }
}

/// Timing and size of the last response
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetrics {
    pub time_ms: Option<u64>,
    pub size: Option<String>,
}

/// Human-readable byte size: `B` below 1 KiB, then `KB`, then `MB`.
pub fn format_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}
