use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::error::TypeError;
use crate::payload::Payload;
use crate::sequence::Sequence;

/// Replay classification of a ledger event.
///
/// `Pending` transitions to `Accepted` or `Rejected`. A stored `Accepted`
/// must never change again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Accepted,
    Rejected,
}

impl EventStatus {
    pub fn code(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::Rejected => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, TypeError> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Rejected),
            other => Err(TypeError::UnknownStatus(other)),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    fn bit(&self) -> u8 {
        1 << self.code()
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Set of statuses a scan should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusMask(u8);

impl StatusMask {
    pub const NONE: StatusMask = StatusMask(0);
    pub const PENDING: StatusMask = StatusMask(1 << 0);
    pub const ACCEPTED: StatusMask = StatusMask(1 << 1);
    pub const REJECTED: StatusMask = StatusMask(1 << 2);
    pub const ALL: StatusMask = StatusMask(0b111);

    pub fn contains(&self, status: EventStatus) -> bool {
        self.0 & status.bit() != 0
    }
}

impl BitOr for StatusMask {
    type Output = StatusMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        StatusMask(self.0 | rhs.0)
    }
}

impl From<EventStatus> for StatusMask {
    fn from(status: EventStatus) -> Self {
        StatusMask(status.bit())
    }
}

/// An appended event: immutable apart from its `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sequence: Sequence,
    pub source: ActorId,
    pub payload: Payload,
    pub status: EventStatus,
}

impl Envelope {
    /// A freshly appended envelope.
    pub fn pending(sequence: Sequence, source: ActorId, payload: Payload) -> Self {
        Self {
            sequence,
            source,
            payload,
            status: EventStatus::Pending,
        }
    }
}
