//! Foundation types for the Keeper event ledger.
//!
//! Every other Keeper crate depends on `keeper-types`. Nothing in here
//! touches storage or performs validation; these are plain values.
//!
//! # Key Types
//!
//! - [`ActorId`]: stable participant identifier, `0` is the root actor
//! - [`Credential`]: raw public key bytes bound to an actor
//! - [`Permission`]: elevated permission tag (`root`, `orga`)
//! - [`Sequence`] / [`SequenceClock`]: total order of ledger events
//! - [`Payload`]: semantic content of an event (closed tagged union)
//! - [`Envelope`]: sequenced, status-tagged record wrapping one payload

pub mod actor;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod sequence;

pub use actor::{ActorId, Credential, Permission};
pub use envelope::{Envelope, EventStatus, StatusMask};
pub use error::TypeError;
pub use payload::{AgeSegment, Payload};
pub use sequence::{Sequence, SequenceClock};
