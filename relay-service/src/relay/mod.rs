//! Callback relay.
//!
//! - [`orchestrator`]: verify, decrypt, forward and acknowledge one callback
//! - [`forwarder`]: deliver plaintext to the tenant's own endpoint

pub mod forwarder;
pub mod orchestrator;

pub use forwarder::{ForwardError, Forwarder};
pub use orchestrator::{CallbackOrchestrator, CallbackQuery, ACK_MESSAGE};
