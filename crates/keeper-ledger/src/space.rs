use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use keeper_types::{ActorId, AgeSegment, Payload, Permission};

/// Why the validation engine refused an event.
///
/// The `Display` strings are surfaced verbatim to submitting callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Rejection {
    #[error("handle is empty")]
    EmptyHandle,

    #[error("handle already exists")]
    HandleTaken,

    #[error("actor already has a handle")]
    ActorHasHandle,

    #[error("not authorized")]
    NotAuthorized,

    #[error("unknown handle")]
    UnknownHandle,

    #[error("player already exists")]
    PlayerExists,

    #[error("unknown player")]
    UnknownPlayer,

    #[error("unknown event kind")]
    UnknownKind,
}

/// A registered player and its person attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub owner: ActorId,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub age_segment: Option<AgeSegment>,
}

impl PlayerRecord {
    fn owned_by(owner: ActorId) -> Self {
        Self {
            owner,
            name: None,
            surname: None,
            age_segment: None,
        }
    }
}

/// Side-state the validation engine needs to judge the next event.
///
/// A plain value: cloning it is a checkpoint, and two spaces built from the
/// same event sequence compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeSpace {
    handle_to_actor: BTreeMap<String, ActorId>,
    actor_to_handle: BTreeMap<ActorId, String>,
    permission_of: BTreeMap<ActorId, Permission>,
    players: BTreeMap<String, PlayerRecord>,
}

impl Default for AuthoritativeSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthoritativeSpace {
    /// Initial state: only the root actor and its permission.
    pub fn new() -> Self {
        let mut permission_of = BTreeMap::new();
        permission_of.insert(ActorId::ROOT, Permission::Root);
        Self {
            handle_to_actor: BTreeMap::new(),
            actor_to_handle: BTreeMap::new(),
            permission_of,
            players: BTreeMap::new(),
        }
    }

    /// Judge `payload` from `source` and apply it if accepted.
    ///
    /// A rejected event leaves the space untouched.
    pub fn process(&mut self, source: ActorId, payload: &Payload) -> Result<(), Rejection> {
        match payload {
            Payload::SeedActor { handle } => {
                if handle.is_empty() {
                    return Err(Rejection::EmptyHandle);
                }
                if self.handle_to_actor.contains_key(handle) {
                    return Err(Rejection::HandleTaken);
                }
                if self.actor_to_handle.contains_key(&source) {
                    return Err(Rejection::ActorHasHandle);
                }
                self.handle_to_actor.insert(handle.clone(), source);
                self.actor_to_handle.insert(source, handle.clone());
            }
            Payload::Permission {
                target_actor_id,
                permission,
            } => {
                if self.permission(source) != Some(Permission::Root)
                    || *permission == Permission::Root
                    || target_actor_id.is_root()
                {
                    return Err(Rejection::NotAuthorized);
                }
                self.permission_of.insert(*target_actor_id, *permission);
            }
            Payload::SeedPlayer { handle, player_id } => {
                let owner = self.actor_for(handle).ok_or(Rejection::UnknownHandle)?;
                if source != owner && !self.is_orga(source) {
                    return Err(Rejection::NotAuthorized);
                }
                if self.players.contains_key(player_id) {
                    return Err(Rejection::PlayerExists);
                }
                self.players
                    .insert(player_id.clone(), PlayerRecord::owned_by(owner));
            }
            Payload::PlayerPerson {
                player_id,
                name,
                surname,
                age_segment,
            } => {
                let orga = self.is_orga(source);
                let player = self
                    .players
                    .get_mut(player_id)
                    .ok_or(Rejection::UnknownPlayer)?;
                if source != player.owner && !orga {
                    return Err(Rejection::NotAuthorized);
                }
                if let Some(name) = name {
                    player.name = Some(name.clone());
                }
                if let Some(surname) = surname {
                    player.surname = Some(surname.clone());
                }
                if let Some(age_segment) = age_segment {
                    player.age_segment = Some(*age_segment);
                }
            }
            Payload::Reset => {
                if !source.is_root() {
                    return Err(Rejection::NotAuthorized);
                }
                *self = Self::new();
            }
            Payload::Unknown(_) => return Err(Rejection::UnknownKind),
        }
        Ok(())
    }

    pub fn permission(&self, actor: ActorId) -> Option<Permission> {
        self.permission_of.get(&actor).copied()
    }

    pub fn is_orga(&self, actor: ActorId) -> bool {
        self.permission(actor) == Some(Permission::Orga)
    }

    pub fn actor_for(&self, handle: &str) -> Option<ActorId> {
        self.handle_to_actor.get(handle).copied()
    }

    pub fn handle_of(&self, actor: ActorId) -> Option<&str> {
        self.actor_to_handle.get(&actor).map(String::as_str)
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.get(player_id)
    }

    pub fn owner_of(&self, player_id: &str) -> Option<ActorId> {
        self.players.get(player_id).map(|player| player.owner)
    }

    pub fn handle_count(&self) -> usize {
        self.handle_to_actor.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}
