//! Request tab - one editable request plus its response state
//!
//! The URL's query string and `query_params` are kept as two views of the
//! same data, and the `Content-Type` / `Authorization` headers are derived
//! from the body type and auth settings.

use base64::Engine;
use url::form_urlencoded;

use crate::constants::{AUTHORIZATION, CONTENT_TYPE};
use crate::messages::RequestId;
use crate::models::{
    ensure_sentinel, is_sentinel_only, remove_row, Auth, BodyType, FormItem, HttpMethod, KeyValue,
    RequestDefinition, ResponseData, ResponseMetrics,
};

/// One editing session
#[derive(Clone, Debug)]
pub struct RequestTab {
    id: String,
    definition: RequestDefinition,

    // Volatile state, never persisted
    pub(crate) response: Option<ResponseData>,
    pub(crate) loading: bool,
    pub(crate) error: Option<String>,
    pub(crate) metrics: ResponseMetrics,
    pub(crate) active_request_id: Option<RequestId>,
}

impl RequestTab {
    pub fn new(id: impl Into<String>) -> Self {
        RequestTab {
            id: id.into(),
            definition: RequestDefinition::default(),
            response: None,
            loading: false,
            error: None,
            metrics: ResponseMetrics::default(),
            active_request_id: None,
        }
    }

    /// Build a tab from a stored definition by replaying every field
    /// through the setters, so derived state is recomputed rather than
    /// trusted.
    pub fn from_definition(id: impl Into<String>, definition: &RequestDefinition) -> Self {
        let mut tab = RequestTab::new(id);
        tab.apply_definition(definition);
        tab
    }

    /// Overwrite the request fields with `definition`, via the setters.
    pub fn apply_definition(&mut self, definition: &RequestDefinition) {
        self.set_method(definition.method);
        self.set_headers(definition.headers.clone());
        self.set_url(&definition.url);
        self.set_body(&definition.body);
        self.set_body_form_data(definition.body_form_data.clone());
        self.set_body_url_encoded(definition.body_url_encoded.clone());
        self.set_body_type(definition.body_type);
        self.set_auth(definition.auth.clone());
        self.set_pre_request_script(&definition.pre_request_script);
        self.set_test_script(&definition.test_script);
    }

    // ========================
    // Accessors
    // ========================

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &RequestDefinition {
        &self.definition
    }

    pub fn method(&self) -> HttpMethod {
        self.definition.method
    }

    pub fn url(&self) -> &str {
        &self.definition.url
    }

    pub fn headers(&self) -> &[KeyValue] {
        &self.definition.headers
    }

    pub fn query_params(&self) -> &[KeyValue] {
        &self.definition.query_params
    }

    pub fn body(&self) -> &str {
        &self.definition.body
    }

    pub fn body_type(&self) -> BodyType {
        self.definition.body_type
    }

    pub fn body_form_data(&self) -> &[FormItem] {
        &self.definition.body_form_data
    }

    pub fn body_url_encoded(&self) -> &[FormItem] {
        &self.definition.body_url_encoded
    }

    pub fn auth(&self) -> &Auth {
        &self.definition.auth
    }

    pub fn pre_request_script(&self) -> &str {
        &self.definition.pre_request_script
    }

    pub fn test_script(&self) -> &str {
        &self.definition.test_script
    }

    pub fn response(&self) -> Option<&ResponseData> {
        self.response.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metrics(&self) -> &ResponseMetrics {
        &self.metrics
    }

    pub fn active_request_id(&self) -> Option<RequestId> {
        self.active_request_id
    }

    // ========================
    // Plain setters
    // ========================

    pub fn set_method(&mut self, method: HttpMethod) {
        self.definition.method = method;
    }

    pub fn set_headers(&mut self, mut headers: Vec<KeyValue>) {
        ensure_sentinel(&mut headers);
        self.definition.headers = headers;
    }

    pub fn set_body(&mut self, body: &str) {
        self.definition.body = body.to_string();
    }

    pub fn set_body_form_data(&mut self, mut items: Vec<FormItem>) {
        ensure_sentinel(&mut items);
        self.definition.body_form_data = items;
    }

    pub fn set_body_url_encoded(&mut self, mut items: Vec<FormItem>) {
        ensure_sentinel(&mut items);
        self.definition.body_url_encoded = items;
    }

    pub fn set_pre_request_script(&mut self, script: &str) {
        self.definition.pre_request_script = script.to_string();
    }

    pub fn set_test_script(&mut self, script: &str) {
        self.definition.test_script = script.to_string();
    }

    // ========================
    // URL <-> query params
    // ========================

    /// Store `url` and re-derive the query param rows from its query string.
    pub fn set_url(&mut self, url: &str) {
        self.definition.url = url.to_string();

        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
        if query.is_empty() {
            if !is_sentinel_only(&self.definition.query_params) {
                self.definition.query_params = vec![KeyValue::default()];
            }
            return;
        }

        // Duplicate keys are kept as separate rows, in order
        let mut params: Vec<KeyValue> = form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| KeyValue::new(key, value))
            .collect();
        ensure_sentinel(&mut params);
        self.definition.query_params = params;
    }

    /// Store `params` and rebuild the URL's query string from them.
    ///
    /// Rows with an empty key never reach the URL, even when they carry a
    /// value; they stay in `query_params` so the editor keeps showing them.
    pub fn set_query_params(&mut self, mut params: Vec<KeyValue>) {
        ensure_sentinel(&mut params);

        let base = match self.definition.url.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => self.definition.url.clone(),
        };

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for param in params.iter().filter(|p| !p.key.is_empty()) {
            serializer.append_pair(&param.key, &param.value);
            any = true;
        }

        self.definition.url = if any {
            format!("{}?{}", base, serializer.finish())
        } else {
            base
        };
        self.definition.query_params = params;
    }

    /// Remove a query param row; the URL follows.
    pub fn remove_query_param(&mut self, index: usize) {
        let mut params = self.definition.query_params.clone();
        remove_row(&mut params, index);
        self.set_query_params(params);
    }

    pub fn remove_header(&mut self, index: usize) {
        remove_row(&mut self.definition.headers, index);
    }

    // ========================
    // Derived headers
    // ========================

    /// Set the body type and pin (or drop) the matching `Content-Type`.
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.definition.body_type = body_type;
        let value = body_type.content_type().map(str::to_string);
        self.replace_derived_header(CONTENT_TYPE, value);
    }

    /// Set auth and pin (or drop) the matching `Authorization` header.
    pub fn set_auth(&mut self, auth: Auth) {
        let value = match &auth {
            Auth::Basic { username, password } => {
                let credentials = format!(
                    "{}:{}",
                    username.as_deref().unwrap_or(""),
                    password.as_deref().unwrap_or("")
                );
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {}", encoded))
            }
            Auth::Bearer { token } => Some(format!("Bearer {}", token.as_deref().unwrap_or(""))),
            Auth::ApiKey { .. } | Auth::None => None,
        };
        self.definition.auth = auth;
        self.replace_derived_header(AUTHORIZATION, value);
    }

    /// Remove every `name` header, then insert `value` (if any) at the top.
    fn replace_derived_header(&mut self, name: &str, value: Option<String>) {
        let headers = &mut self.definition.headers;
        headers.retain(|h| !h.key.eq_ignore_ascii_case(name));
        if let Some(value) = value {
            headers.insert(0, KeyValue::new(name, value));
        }
        ensure_sentinel(headers);
    }

    // ========================
    // Volatile state
    // ========================

    /// Clear everything a previous dispatch left behind.
    pub(crate) fn reset_response(&mut self) {
        self.response = None;
        self.error = None;
        self.metrics = ResponseMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EditableRow, FormItemKind};
    use pretty_assertions::assert_eq;

    fn kv(key: &str, value: &str) -> KeyValue {
        KeyValue::new(key, value)
    }

    fn count_headers(tab: &RequestTab, name: &str) -> usize {
        tab.headers().iter().filter(|h| h.key == name).count()
    }

    #[test]
    fn test_set_url_parses_query_params() {
        let mut tab = RequestTab::new("t");
        tab.set_url("https://x.com?a=1&b=2");
        assert_eq!(tab.query_params(), &[kv("a", "1"), kv("b", "2"), kv("", "")]);

        tab.set_query_params(vec![kv("a", "1"), kv("", "")]);
        assert_eq!(tab.url(), "https://x.com?a=1");
    }

    #[test]
    fn test_set_url_keeps_duplicates_and_decodes() {
        let mut tab = RequestTab::new("t");
        tab.set_url("http://a.com/p?tag=x&tag=y&q=hello%20world");
        assert_eq!(
            tab.query_params(),
            &[kv("tag", "x"), kv("tag", "y"), kv("q", "hello world"), kv("", "")]
        );
    }

    #[test]
    fn test_set_url_blank_pair_keeps_single_sentinel() {
        let mut tab = RequestTab::new("t");
        tab.set_url("http://a.com?a=1&=");
        assert_eq!(tab.query_params(), &[kv("a", "1"), kv("", "")]);

        tab.set_url("http://a.com?=");
        assert!(is_sentinel_only(tab.query_params()));

        let restored = RequestTab::from_definition("r", tab.definition());
        assert!(is_sentinel_only(restored.query_params()));
    }

    #[test]
    fn test_set_url_without_query_resets_to_sentinel() {
        let mut tab = RequestTab::new("t");
        tab.set_url("http://a.com?x=1");
        tab.set_url("http://a.com");
        assert_eq!(tab.query_params(), &[kv("", "")]);

        tab.set_url("http://a.com?");
        assert_eq!(tab.query_params(), &[kv("", "")]);
    }

    #[test]
    fn test_set_query_params_drops_keyless_rows_from_url() {
        let mut tab = RequestTab::new("t");
        tab.set_url("http://a.com?old=1");
        tab.set_query_params(vec![kv("", "orphan"), kv("k", "v")]);
        assert_eq!(tab.url(), "http://a.com?k=v");
        // the keyless row stays in the editor
        assert_eq!(tab.query_params(), &[kv("", "orphan"), kv("k", "v"), kv("", "")]);
    }

    #[test]
    fn test_set_query_params_with_no_valid_rows_strips_query() {
        let mut tab = RequestTab::new("t");
        tab.set_url("http://a.com/path?x=1&y=2");
        tab.set_query_params(vec![kv("", "")]);
        assert_eq!(tab.url(), "http://a.com/path");
        assert_eq!(tab.query_params(), &[kv("", "")]);
    }

    #[test]
    fn test_url_params_round_trip_stabilizes() {
        let urls = [
            "http://a.com?q=a b&x=%2F",
            "http://a.com?a=1&a=2&=loose",
            "http://a.com?flag",
            "http://a.com",
        ];
        for url in urls {
            let mut tab = RequestTab::new("t");
            tab.set_url(url);
            let params = tab.query_params().to_vec();
            tab.set_query_params(params);
            let once = tab.url().to_string();

            tab.set_url(&once);
            let params = tab.query_params().to_vec();
            tab.set_query_params(params);
            assert_eq!(tab.url(), once, "unstable round trip for {}", url);
        }
    }

    #[test]
    fn test_body_type_pins_single_content_type() {
        let mut tab = RequestTab::new("t");
        tab.set_headers(vec![kv("X-Trace", "1"), kv("Content-Type", "text/plain")]);

        tab.set_body_type(BodyType::Json);
        assert_eq!(tab.headers()[0], kv("Content-Type", "application/json"));
        assert_eq!(count_headers(&tab, "Content-Type"), 1);

        tab.set_body_type(BodyType::Urlencoded);
        assert_eq!(tab.headers()[0], kv("Content-Type", "application/x-www-form-urlencoded"));
        assert_eq!(count_headers(&tab, "Content-Type"), 1);

        tab.set_body_type(BodyType::FormData);
        assert_eq!(count_headers(&tab, "Content-Type"), 0);
        assert_eq!(tab.headers(), &[kv("X-Trace", "1"), kv("", "")]);
    }

    #[test]
    fn test_auth_header_variants() {
        let mut tab = RequestTab::new("t");

        tab.set_auth(Auth::basic("user", "pass"));
        assert_eq!(tab.headers(), &[kv("Authorization", "Basic dXNlcjpwYXNz"), kv("", "")]);

        tab.set_auth(Auth::bearer("secret-token"));
        assert_eq!(tab.headers()[0], kv("Authorization", "Bearer secret-token"));
        assert_eq!(count_headers(&tab, "Authorization"), 1);

        tab.set_auth(Auth::api_key("k", "v", crate::models::ApiKeyLocation::Header));
        assert_eq!(count_headers(&tab, "Authorization"), 0);
        assert_eq!(tab.headers(), &[kv("", "")]);
    }

    #[test]
    fn test_basic_auth_with_missing_fields_encodes_colon() {
        let mut tab = RequestTab::new("t");
        tab.set_auth(Auth::Basic { username: None, password: None });
        // base64(":")
        assert_eq!(tab.headers(), &[kv("Authorization", "Basic Og=="), kv("", "")]);

        tab.set_auth(Auth::Bearer { token: None });
        assert_eq!(tab.headers(), &[kv("Authorization", "Bearer "), kv("", "")]);
    }

    #[test]
    fn test_derived_headers_coexist_once_each() {
        let mut tab = RequestTab::new("t");
        for _ in 0..3 {
            tab.set_body_type(BodyType::Json);
            tab.set_auth(Auth::bearer("t"));
        }
        assert_eq!(count_headers(&tab, "Content-Type"), 1);
        assert_eq!(count_headers(&tab, "Authorization"), 1);
        assert_eq!(tab.headers()[0].key, "Authorization");
        assert_eq!(tab.headers()[1].key, "Content-Type");
        assert_eq!(tab.headers().len(), 3);
        assert!(tab.headers()[2].is_blank());
    }

    #[test]
    fn test_body_lists_keep_sentinel() {
        let mut tab = RequestTab::new("t");
        tab.set_body_form_data(vec![FormItem::file("upload", "/tmp/a.txt")]);
        assert_eq!(tab.body_form_data().len(), 2);
        assert_eq!(tab.body_form_data()[0].kind, FormItemKind::File);
        assert!(tab.body_form_data()[1].is_blank());

        tab.set_body_url_encoded(vec![FormItem::text("a", "1"), FormItem::blank(), FormItem::blank()]);
        assert_eq!(tab.body_url_encoded().len(), 2);
    }

    #[test]
    fn test_from_definition_recomputes_derived_state() {
        let definition = RequestDefinition {
            url: "http://a.com?x=1".into(),
            // stale params and no derived headers on purpose
            query_params: vec![kv("stale", "1")],
            headers: vec![kv("H1", "V1")],
            body_type: BodyType::Json,
            auth: Auth::bearer("token123"),
            ..RequestDefinition::default()
        };
        let tab = RequestTab::from_definition("t", &definition);

        assert_eq!(tab.query_params(), &[kv("x", "1"), kv("", "")]);
        assert_eq!(
            tab.headers(),
            &[
                kv("Authorization", "Bearer token123"),
                kv("Content-Type", "application/json"),
                kv("H1", "V1"),
                kv("", ""),
            ]
        );
    }

    #[test]
    fn test_remove_rows_keep_url_in_sync() {
        let mut tab = RequestTab::new("t");
        tab.set_url("https://x.com?a=1&b=2");
        tab.remove_query_param(0);
        assert_eq!(tab.url(), "https://x.com?b=2");
        assert_eq!(tab.query_params(), &[kv("b", "2"), kv("", "")]);

        // removing the sentinel itself just restores it
        tab.remove_query_param(1);
        assert_eq!(tab.query_params(), &[kv("b", "2"), kv("", "")]);

        tab.set_headers(vec![kv("A", "1")]);
        tab.remove_header(0);
        assert!(is_sentinel_only(tab.headers()));
        tab.remove_header(5);
        assert!(is_sentinel_only(tab.headers()));
    }
}
