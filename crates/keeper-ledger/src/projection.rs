use serde::{Deserialize, Serialize};
use tracing::debug;

use keeper_store::LedgerStore;
use keeper_types::{ActorId, Envelope, Payload, Permission, Sequence, StatusMask};

use crate::error::LedgerResult;
use crate::space::AuthoritativeSpace;

/// One accepted event as shown to a viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleEvent {
    pub sequence: Sequence,
    pub source: ActorId,
    pub payload: Payload,
}

impl From<&Envelope> for VisibleEvent {
    fn from(envelope: &Envelope) -> Self {
        Self {
            sequence: envelope.sequence,
            source: envelope.source,
            payload: envelope.payload.clone(),
        }
    }
}

/// The accepted history filtered down to what one actor may see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorView {
    pub viewer: ActorId,
    /// The viewer's permission at the end of the accepted history.
    pub permission: Option<Permission>,
    pub events: Vec<VisibleEvent>,
}

impl ActorView {
    /// Build the view of `viewer` from the accepted events in `store`.
    pub fn build<S: LedgerStore + ?Sized>(store: &S, viewer: ActorId) -> LedgerResult<Self> {
        let accepted = store.scan(Sequence::GENESIS, StatusMask::ACCEPTED)?;
        let view = Self::from_accepted(viewer, &accepted);
        debug!(
            %viewer,
            accepted = accepted.len(),
            visible = view.events.len(),
            "view projected"
        );
        Ok(view)
    }

    /// Project an ordered run of accepted envelopes.
    ///
    /// Ownership is judged at the point each event is replayed. Whether the
    /// viewer sees everything is judged once, at the end.
    pub fn from_accepted(viewer: ActorId, accepted: &[Envelope]) -> Self {
        let mut space = AuthoritativeSpace::new();
        let mut own = Vec::new();

        for envelope in accepted {
            if space.process(envelope.source, &envelope.payload).is_err() {
                continue;
            }
            let visible = match &envelope.payload {
                Payload::SeedActor { .. } => envelope.source == viewer,
                Payload::SeedPlayer { player_id, .. } | Payload::PlayerPerson { player_id, .. } => {
                    space.owner_of(player_id) == Some(viewer)
                }
                Payload::Reset => true,
                Payload::Permission { .. } | Payload::Unknown(_) => false,
            };
            if visible {
                own.push(envelope.sequence);
            }
        }

        let permission = space.permission(viewer);
        let events = if permission.is_some() {
            accepted.iter().map(VisibleEvent::from).collect()
        } else {
            accepted
                .iter()
                .filter(|envelope| own.binary_search(&envelope.sequence).is_ok())
                .map(VisibleEvent::from)
                .collect()
        };

        Self {
            viewer,
            permission,
            events,
        }
    }

    /// Visible events with `sequence > from`.
    pub fn since(&self, from: Sequence) -> Vec<VisibleEvent> {
        self.events
            .iter()
            .filter(|event| event.sequence > from)
            .cloned()
            .collect()
    }
}
