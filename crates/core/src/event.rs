//! Notifications delivered by the host orchestrator.

use vaultkv_types::{DataDelta, RelationId, UnitName};

/// Events processed by the relation state machines.
///
/// Exactly one event is delivered per external occurrence, serially. All
/// keys a remote unit changed in one commit arrive in a single
/// [`Event::RelationChanged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A remote unit joined a relation (creating the relation if new).
    PeerJoined {
        relation_id: RelationId,
        unit: UnitName,
    },

    /// A remote unit left a relation.
    PeerLeft {
        relation_id: RelationId,
        unit: UnitName,
    },

    /// The relation is gone, with every unit on it.
    RelationBroken { relation_id: RelationId },

    /// A remote unit committed new relation data.
    RelationChanged {
        relation_id: RelationId,
        unit: UnitName,
        delta: DataDelta,
    },

    /// The local unit is no longer the elected leader.
    LeadershipLost,
}

/// Discriminant of an [`Event`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PeerJoined,
    PeerLeft,
    RelationBroken,
    RelationChanged,
    LeadershipLost,
}

impl Event {
    /// Get the dispatch key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::PeerJoined { .. } => EventKind::PeerJoined,
            Event::PeerLeft { .. } => EventKind::PeerLeft,
            Event::RelationBroken { .. } => EventKind::RelationBroken,
            Event::RelationChanged { .. } => EventKind::RelationChanged,
            Event::LeadershipLost => EventKind::LeadershipLost,
        }
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            EventKind::PeerJoined => "PeerJoined",
            EventKind::PeerLeft => "PeerLeft",
            EventKind::RelationBroken => "RelationBroken",
            EventKind::RelationChanged => "RelationChanged",
            EventKind::LeadershipLost => "LeadershipLost",
        }
    }

    /// Relation this event concerns, if any.
    pub fn relation_id(&self) -> Option<RelationId> {
        match self {
            Event::PeerJoined { relation_id, .. }
            | Event::PeerLeft { relation_id, .. }
            | Event::RelationBroken { relation_id }
            | Event::RelationChanged { relation_id, .. } => Some(*relation_id),
            Event::LeadershipLost => None,
        }
    }
}
