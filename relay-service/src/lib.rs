//! DingRelay - DingTalk callback receiver.
//!
//! Receives encrypted DingTalk event callbacks, verifies and decrypts
//! them, optionally relays the plaintext to a tenant endpoint, and answers
//! with the encrypted `success` acknowledgement the platform requires.
//!
//! ## Architecture
//!
//! ```text
//! Callback → ConfigResolver → verify → decrypt → Forwarder → seal ack → Response
//!                 │
//!                 └── ConfigStore (PostgreSQL) or inline legacy config
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod model;
pub mod relay;
pub mod resolver;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use crypto::TenantCrypto;
pub use error::{RelayError, RelayResult};
pub use model::{CallbackConfig, CallbackReply, EncryptedReply, Envelope};
pub use relay::{CallbackOrchestrator, Forwarder};
pub use resolver::{ConfigResolver, Resolution};
pub use store::{ConfigStore, MemoryConfigStore, PgConfigStore};
pub use web::AppState;
