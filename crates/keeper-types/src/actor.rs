use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable identifier of a participant (organizer or player).
///
/// Identifiers are allocated by the identity registry and never reused.
/// [`ActorId::ROOT`] is reserved and pre-seeded with [`Permission::Root`].
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl ActorId {
    /// The reserved root actor.
    pub const ROOT: ActorId = ActorId(0);

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }

    /// The identifier allocated after this one.
    pub fn next(&self) -> ActorId {
        ActorId(self.0 + 1)
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

/// Elevated permission held by an actor.
///
/// Absence of a permission means a plain player actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Held only by actor 0. Never granted or revoked by events.
    Root,
    /// Organizer: administers every player.
    Orga,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Orga => "orga",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw public key bytes identifying a caller.
///
/// The ledger never inspects the key material; it is an opaque lookup key
/// that was already verified by the transport layer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Credential(Vec<u8>);

impl Credential {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TypeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TypeError::EmptyCredential);
        }
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Short BLAKE3 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"keeper-credential-v1:");
        hasher.update(&self.0);
        format!("key:{}", hex::encode(&hasher.finalize().as_bytes()[..6]))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}
