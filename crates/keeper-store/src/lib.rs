//! Storage backends for the Keeper ledger.
//!
//! The store owns three tables and nothing else: the append-only event log,
//! the credential → actor registry, and single-use pairing keys. It never
//! interprets payloads; validation lives in `keeper-ledger`.
//!
//! # Backends
//!
//! - [`InMemoryStore`]: `RwLock`-guarded maps for tests and embedding
//! - [`FileStore`]: the same tables rebuilt from a CRC-framed record log
//!
//! # Design Rules
//!
//! 1. An appended batch becomes visible as a unit or not at all.
//! 2. Sequences are assigned inside the exclusive write section and are
//!    strictly greater than anything already stored.
//! 3. Writers wait for the write section under a bounded busy timeout.
//! 4. Status updates are idempotent single-event writes.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod gate;
pub mod log;
pub mod memory;
mod state;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::{FileStore, FileStoreConfig};
pub use gate::{BusyPolicy, WriteGate};
pub use memory::InMemoryStore;
pub use traits::{IdentityRegistry, KeeperStore, LedgerStore, PairingKeys};
