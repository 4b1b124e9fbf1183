//! Application constants
//!
//! Centralized location for storage keys, canonical header values and defaults.

/// Application name
pub const APP_NAME: &str = "courier";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of entries kept in the request history
pub const MAX_HISTORY: usize = 50;

/// Default request timeout for the HTTP runner
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default log file name (relative to the data directory)
pub const DEFAULT_LOG_FILE: &str = "courier.log";

// Persistence keys
pub const TABS_KEY: &str = "requestTabs";
pub const ACTIVE_TAB_KEY: &str = "activeTabId";
pub const HISTORY_KEY: &str = "requestHistory";
pub const COLLECTIONS_KEY: &str = "requestCollections";
pub const ENVIRONMENTS_KEY: &str = "environments";
pub const ACTIVE_ENVIRONMENT_KEY: &str = "activeEnvironmentId";

// Derived headers
pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Shown when a request is sent without a URL
pub const EMPTY_URL_PROMPT: &str = "Please enter a URL";
