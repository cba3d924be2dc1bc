use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::actor::{ActorId, Permission};
use crate::error::TypeError;

/// Age bracket of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeSegment {
    #[serde(rename = "-12")]
    Below12,
    #[serde(rename = "-18")]
    Below18,
    #[serde(rename = "-99")]
    Below99,
}

/// Semantic content of a ledger event.
///
/// Encoded as JSON with a `kind` tag:
///
/// ```json
/// {"kind": "seed_player", "handle": "bob", "player_id": "p1"}
/// ```
///
/// Tags this build does not know decode to [`Payload::Unknown`] instead of
/// failing, so a newer client's events are appended and then rejected by
/// replay rather than refused at the door. The raw object is kept and
/// encodes back unchanged, so a later build can still validate it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Bind the source actor to a handle.
    SeedActor { handle: String },
    /// Grant `permission` to `target_actor_id`. Root only.
    Permission {
        target_actor_id: ActorId,
        permission: Permission,
    },
    /// Register a player owned by the actor bound to `handle`.
    SeedPlayer { handle: String, player_id: String },
    /// Update person attributes of an existing player. Absent fields are
    /// left untouched.
    PlayerPerson {
        player_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        surname: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        age_segment: Option<AgeSegment>,
    },
    /// Clear all derived state. Only accepted from the root actor.
    Reset,
    /// An object whose `kind` this build does not know, as received.
    #[serde(skip)]
    Unknown(Value),
}

const KNOWN_KINDS: [&str; 5] = ["seed_actor", "permission", "seed_player", "player_person", "reset"];

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown(raw) => raw.serialize(serializer),
            known => Payload::serialize(known, serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let unknown = raw
            .get("kind")
            .and_then(Value::as_str)
            .is_some_and(|kind| !KNOWN_KINDS.contains(&kind));
        if unknown {
            return Ok(Self::Unknown(raw));
        }
        Payload::deserialize(raw).map_err(D::Error::custom)
    }
}

impl Payload {
    pub fn seed_actor(handle: impl Into<String>) -> Self {
        Self::SeedActor {
            handle: handle.into(),
        }
    }

    pub fn permission(target_actor_id: ActorId, permission: Permission) -> Self {
        Self::Permission {
            target_actor_id,
            permission,
        }
    }

    pub fn seed_player(handle: impl Into<String>, player_id: impl Into<String>) -> Self {
        Self::SeedPlayer {
            handle: handle.into(),
            player_id: player_id.into(),
        }
    }

    /// A `PlayerPerson` update that only sets the surname.
    pub fn player_surname(player_id: impl Into<String>, surname: impl Into<String>) -> Self {
        Self::PlayerPerson {
            player_id: player_id.into(),
            name: None,
            surname: Some(surname.into()),
            age_segment: None,
        }
    }

    /// Wire tag of this payload.
    pub fn kind(&self) -> &str {
        match self {
            Self::SeedActor { .. } => "seed_actor",
            Self::Permission { .. } => "permission",
            Self::SeedPlayer { .. } => "seed_player",
            Self::PlayerPerson { .. } => "player_person",
            Self::Reset => "reset",
            Self::Unknown(raw) => raw.get("kind").and_then(Value::as_str).unwrap_or("unknown"),
        }
    }

    /// The player this payload refers to, if any.
    pub fn player_id(&self) -> Option<&str> {
        match self {
            Self::SeedPlayer { player_id, .. } | Self::PlayerPerson { player_id, .. } => {
                Some(player_id)
            }
            _ => None,
        }
    }

    /// Canonical JSON encoding used by persistent stores.
    pub fn encode(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
