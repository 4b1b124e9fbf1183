//! Message types for inter-layer communication in the actor-based architecture.
//!
//! This module defines all messages that flow between the presentation layer,
//! the App actor and the execution runner.

pub mod ui_events;
pub mod network;
pub mod render;

pub use ui_events::{line_to_ui_event, DataKind, UiEvent};
pub use network::{Completion, RequestDescriptor, RequestId, RunEvent, RunResult, RunUpdate};
pub use render::{Notification, RenderState, TabView};
