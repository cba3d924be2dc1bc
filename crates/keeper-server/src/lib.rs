//! HTTP server for the Keeper ledger.
//!
//! Exposes state sync, event submission, and device pairing over JSON,
//! authenticating every request with a bearer credential.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{CredentialResolver, HexKeyResolver};
pub use config::KeeperConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::KeeperServer;
