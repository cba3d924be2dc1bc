//! Validation, replay, and projection for the Keeper ledger.
//!
//! This crate is the heart of Keeper. It provides:
//! - `AuthoritativeSpace`, the deterministic state machine judging events
//! - `ReplayEngine`, full and checkpoint-resumed replay over a store
//! - `Reconciler`, the append → replay → status write-back loop
//! - `ActorView`, the per-viewer projection of the accepted history
//! - `Keeper`, the service facade used by the HTTP server and the CLI

pub mod error;
pub mod projection;
pub mod reconcile;
pub mod replay;
pub mod service;
pub mod space;

pub use error::{LedgerError, LedgerResult};
pub use projection::{ActorView, VisibleEvent};
pub use reconcile::{ReconcileReport, Reconciler, SubmitOutcome};
pub use replay::{Checkpoint, ReplayEngine, ReplayOutcome, ReplayResult};
pub use service::{Caller, Keeper, OrgaBootstrap};
pub use space::{AuthoritativeSpace, PlayerRecord, Rejection};
