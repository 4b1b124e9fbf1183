//! UI events - messages from the presentation layer to the App layer

use std::path::PathBuf;

use url::form_urlencoded;

use crate::models::{ApiKeyLocation, Auth, BodyType, FormItem, HttpMethod, KeyValue, Variable};

/// Which persisted list an import/export refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Collections,
    Environments,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Collections => "collections",
            DataKind::Environments => "environments",
        }
    }
}

/// Events generated by the user in the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    // Tabs
    AddTab,
    DuplicateTab(String),
    CloseTab(String),
    SwitchTab(String),

    // Active tab editing
    SetMethod(HttpMethod),
    SetUrl(String),
    SetQueryParams(Vec<KeyValue>),
    RemoveQueryParam(usize),
    SetHeaders(Vec<KeyValue>),
    RemoveHeader(usize),
    SetBody(String),
    SetBodyType(BodyType),
    SetBodyFormData(Vec<FormItem>),
    SetBodyUrlEncoded(Vec<FormItem>),
    SetAuth(Auth),
    SetPreRequestScript(String),
    SetTestScript(String),

    // Dispatch
    SendRequest,
    CancelRequest,

    // History
    ClearHistory,
    LoadHistoryItem(String),

    // Collections
    CreateCollection(String),
    RenameCollection { id: String, name: String },
    DeleteCollection(String),
    SaveRequest { collection_id: String, name: String },
    RenameSavedRequest { collection_id: String, request_id: String, name: String },
    DeleteSavedRequest { collection_id: String, request_id: String },
    OpenSavedRequest { collection_id: String, request_id: String },

    // Environments
    CreateEnvironment(String),
    UpdateEnvironment { id: String, name: String, variables: Vec<Variable> },
    DeleteEnvironment(String),
    SetActiveEnvironment(Option<String>),

    // Import / export
    Import { kind: DataKind, path: PathBuf },
    Export(DataKind),

    // System
    Quit,
}

/// Parse `k=v&k2=v2` into key/value rows
fn parse_pairs(input: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(input.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Parse `Name: value; Other: value` into header rows
fn parse_headers(input: &str) -> Vec<KeyValue> {
    input
        .split(';')
        .filter_map(|part| part.split_once(':'))
        .map(|(k, v)| KeyValue::new(k.trim(), v.trim()))
        .collect()
}

/// Form items; a value starting with `@` is a file path
fn parse_form(input: &str) -> Vec<FormItem> {
    parse_pairs(input)
        .into_iter()
        .map(|(k, v)| match v.strip_prefix('@') {
            Some(path) => FormItem::file(k, path),
            None => FormItem::text(k, v),
        })
        .collect()
}

fn parse_auth(args: &str) -> Option<Auth> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        ["none"] => Some(Auth::None),
        ["basic", user] => Some(Auth::basic(*user, "")),
        ["basic", user, pass] => Some(Auth::basic(*user, *pass)),
        ["bearer", token] => Some(Auth::bearer(*token)),
        ["apikey", key, value] => Some(Auth::api_key(*key, *value, ApiKeyLocation::Header)),
        ["apikey", key, value, "header"] => Some(Auth::api_key(*key, *value, ApiKeyLocation::Header)),
        ["apikey", key, value, "query"] => Some(Auth::api_key(*key, *value, ApiKeyLocation::Query)),
        _ => None,
    }
}

fn parse_kind(word: &str) -> Option<DataKind> {
    match word {
        "collections" => Some(DataKind::Collections),
        "environments" | "envs" => Some(DataKind::Environments),
        _ => None,
    }
}

/// Split off the first whitespace-delimited word
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}

fn collection_command(args: &str) -> Option<UiEvent> {
    let (sub, tail) = split_word(args);
    let (id, rest) = split_word(tail);
    match sub {
        "new" if !tail.is_empty() => Some(UiEvent::CreateCollection(tail.to_string())),
        "rename" if !id.is_empty() => Some(UiEvent::RenameCollection {
            id: id.to_string(),
            name: rest.to_string(),
        }),
        "delete" if !id.is_empty() => Some(UiEvent::DeleteCollection(id.to_string())),
        "save" if !id.is_empty() => Some(UiEvent::SaveRequest {
            collection_id: id.to_string(),
            name: rest.to_string(),
        }),
        "open" | "drop" | "rename-request" => {
            let (request_id, name) = split_word(rest);
            if id.is_empty() || request_id.is_empty() {
                return None;
            }
            let (collection_id, request_id) = (id.to_string(), request_id.to_string());
            Some(match sub {
                "open" => UiEvent::OpenSavedRequest { collection_id, request_id },
                "drop" => UiEvent::DeleteSavedRequest { collection_id, request_id },
                _ => UiEvent::RenameSavedRequest {
                    collection_id,
                    request_id,
                    name: name.to_string(),
                },
            })
        }
        _ => None,
    }
}

fn environment_command(args: &str) -> Option<UiEvent> {
    let (sub, rest) = split_word(args);
    match sub {
        "new" if !rest.is_empty() => Some(UiEvent::CreateEnvironment(rest.to_string())),
        "use" if rest == "none" => Some(UiEvent::SetActiveEnvironment(None)),
        "use" if !rest.is_empty() => Some(UiEvent::SetActiveEnvironment(Some(rest.to_string()))),
        "delete" if !rest.is_empty() => Some(UiEvent::DeleteEnvironment(rest.to_string())),
        "set" => {
            let (id, rest) = split_word(rest);
            let (name, vars) = split_word(rest);
            if id.is_empty() || name.is_empty() {
                return None;
            }
            Some(UiEvent::UpdateEnvironment {
                id: id.to_string(),
                name: name.to_string(),
                variables: parse_pairs(vars)
                    .into_iter()
                    .map(|(k, v)| Variable::new(k, v))
                    .collect(),
            })
        }
        _ => None,
    }
}

/// Convert one console line to a UiEvent
pub fn line_to_ui_event(line: &str) -> Option<UiEvent> {
    let (command, args) = split_word(line.trim());
    let event = match command {
        "new" => UiEvent::AddTab,
        "dup" if !args.is_empty() => UiEvent::DuplicateTab(args.to_string()),
        "close" if !args.is_empty() => UiEvent::CloseTab(args.to_string()),
        "tab" if !args.is_empty() => UiEvent::SwitchTab(args.to_string()),

        "method" => UiEvent::SetMethod(args.parse().ok()?),
        "url" => UiEvent::SetUrl(args.to_string()),
        "params" => UiEvent::SetQueryParams(
            parse_pairs(args)
                .into_iter()
                .map(|(k, v)| KeyValue::new(k, v))
                .collect(),
        ),
        "unparam" => UiEvent::RemoveQueryParam(args.parse().ok()?),
        "headers" => UiEvent::SetHeaders(parse_headers(args)),
        "unheader" => UiEvent::RemoveHeader(args.parse().ok()?),
        "body" => UiEvent::SetBody(args.to_string()),
        "bodytype" => UiEvent::SetBodyType(args.parse().ok()?),
        "form" => UiEvent::SetBodyFormData(parse_form(args)),
        "urlencoded" => UiEvent::SetBodyUrlEncoded(parse_form(args)),
        "auth" => UiEvent::SetAuth(parse_auth(args)?),
        "pre" => UiEvent::SetPreRequestScript(args.to_string()),
        "test" => UiEvent::SetTestScript(args.to_string()),

        "send" | "s" => UiEvent::SendRequest,
        "cancel" | "x" => UiEvent::CancelRequest,

        "clear-history" => UiEvent::ClearHistory,
        "history" if !args.is_empty() => UiEvent::LoadHistoryItem(args.to_string()),

        "collection" | "col" => collection_command(args)?,
        "env" => environment_command(args)?,

        "import" => {
            let (kind, path) = split_word(args);
            if path.is_empty() {
                return None;
            }
            UiEvent::Import {
                kind: parse_kind(kind)?,
                path: PathBuf::from(path),
            }
        }
        "export" => UiEvent::Export(parse_kind(args)?),

        "quit" | "q" | "exit" => UiEvent::Quit,
        _ => return None,
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormItemKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_commands() {
        assert_eq!(line_to_ui_event("send"), Some(UiEvent::SendRequest));
        assert_eq!(line_to_ui_event("  x "), Some(UiEvent::CancelRequest));
        assert_eq!(line_to_ui_event("method post"), Some(UiEvent::SetMethod(HttpMethod::POST)));
        assert_eq!(line_to_ui_event("method fetch"), None);
        assert_eq!(line_to_ui_event("unheader 1"), Some(UiEvent::RemoveHeader(1)));
        assert_eq!(line_to_ui_event("unparam x"), None);
        assert_eq!(line_to_ui_event("bogus"), None);
        assert_eq!(line_to_ui_event(""), None);
    }

    #[test]
    fn test_url_keeps_spaces_after_command() {
        assert_eq!(
            line_to_ui_event("url https://x.com?a=1&b=2"),
            Some(UiEvent::SetUrl("https://x.com?a=1&b=2".into()))
        );
    }

    #[test]
    fn test_headers_and_form_parsing() {
        assert_eq!(
            line_to_ui_event("headers Accept: application/json; X-Id: 7"),
            Some(UiEvent::SetHeaders(vec![
                KeyValue::new("Accept", "application/json"),
                KeyValue::new("X-Id", "7"),
            ]))
        );

        let Some(UiEvent::SetBodyFormData(items)) = line_to_ui_event("form name=bob&avatar=@/tmp/a.png") else {
            panic!("expected form data");
        };
        assert_eq!(items[0], FormItem::text("name", "bob"));
        assert_eq!(items[1].kind, FormItemKind::File);
        assert_eq!(items[1].value, "/tmp/a.png");
    }

    #[test]
    fn test_auth_commands() {
        assert_eq!(line_to_ui_event("auth bearer abc"), Some(UiEvent::SetAuth(Auth::bearer("abc"))));
        assert_eq!(
            line_to_ui_event("auth apikey k v query"),
            Some(UiEvent::SetAuth(Auth::api_key("k", "v", ApiKeyLocation::Query)))
        );
        assert_eq!(line_to_ui_event("auth digest"), None);
    }

    #[test]
    fn test_collection_and_environment_commands() {
        assert_eq!(
            line_to_ui_event("col new My APIs"),
            Some(UiEvent::CreateCollection("My APIs".into()))
        );
        assert_eq!(
            line_to_ui_event("col save c1 Get users"),
            Some(UiEvent::SaveRequest {
                collection_id: "c1".into(),
                name: "Get users".into()
            })
        );
        assert_eq!(
            line_to_ui_event("col open c1 r1"),
            Some(UiEvent::OpenSavedRequest {
                collection_id: "c1".into(),
                request_id: "r1".into()
            })
        );
        assert_eq!(line_to_ui_event("col open c1"), None);
        assert_eq!(line_to_ui_event("env use none"), Some(UiEvent::SetActiveEnvironment(None)));
        assert_eq!(
            line_to_ui_event("env set e1 Dev host=localhost&port=8080"),
            Some(UiEvent::UpdateEnvironment {
                id: "e1".into(),
                name: "Dev".into(),
                variables: vec![Variable::new("host", "localhost"), Variable::new("port", "8080")],
            })
        );
    }

    #[test]
    fn test_import_export_commands() {
        assert_eq!(
            line_to_ui_event("import collections ./backup.json"),
            Some(UiEvent::Import {
                kind: DataKind::Collections,
                path: PathBuf::from("./backup.json")
            })
        );
        assert_eq!(line_to_ui_event("import collections"), None);
        assert_eq!(line_to_ui_event("export envs"), Some(UiEvent::Export(DataKind::Environments)));
    }
}
