//! App layer - session state, dispatch and the actor that owns them
//!
//! The App actor receives UI events and dispatch completions,
//! updates the session and publishes render state.

pub mod tab;
pub mod session;
pub mod dispatch;
pub mod actor;

pub use tab::RequestTab;
pub use session::SessionStore;
pub use dispatch::Dispatch;
pub use actor::AppActor;
