//! # Courier
//!
//! A multi-tab API client core, similar to Postman/Insomnia.
//!
//! ## Features
//! - Tabs with URL/query-param sync and derived `Content-Type` / `Authorization` headers
//! - HTTP methods: GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS
//! - Text, JSON, multipart and urlencoded bodies
//! - Auth support (Basic, Bearer, API key)
//! - Request history, collections and environments with import/export
//! - Race-safe dispatch: stale completions are discarded, cancel never clobbers a landed response
//!
//! ## Architecture
//! Actor-based with channels:
//! - Presentation layer - sends [`UiEvent`]s, receives [`Notification`]s
//! - App layer - [`AppActor`] owning the [`SessionStore`]
//! - Runner - [`ExecutionRunner`] boundary, [`HttpRunner`] over reqwest

pub mod constants;
pub mod error;
pub mod models;
pub mod storage;
pub mod config;
pub mod messages;
pub mod app;
pub mod network;

// Re-export commonly used types
pub use models::{Auth, BodyType, Collection, Environment, HttpMethod, KeyValue, RequestDefinition, ResponseData};
pub use messages::{Notification, RenderState, RequestDescriptor, RequestId, UiEvent};
pub use app::{AppActor, RequestTab, SessionStore};
pub use network::{ExecutionRunner, HttpRunner, RunCollector};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use error::{DispatchError, RunnerError, StorageError};
