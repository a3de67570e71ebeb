//! Actions returned by the state machines.

use crate::Signal;
use vaultkv_types::RelationId;

/// Work for the runner to perform after an event is handled.
///
/// The state machines never touch the transport. They record what they
/// publish in their own relation view and hand the write to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Relation data
    // ═══════════════════════════════════════════════════════════════════════
    /// Set (`Some`) or delete (`None`) a key in the local side's data for
    /// one relation.
    Publish {
        relation_id: RelationId,
        key: String,
        value: Option<String>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Indicators
    // ═══════════════════════════════════════════════════════════════════════
    /// An indicator went from cleared to set.
    SignalRaised(Signal),

    /// An indicator went from set to cleared.
    SignalCleared(Signal),
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Publish { .. } => "Publish",
            Action::SignalRaised(_) => "SignalRaised",
            Action::SignalCleared(_) => "SignalCleared",
        }
    }

    /// Check if this action writes relation data.
    pub fn is_publish(&self) -> bool {
        matches!(self, Action::Publish { .. })
    }

    /// Check if this action reports an indicator transition.
    pub fn is_signal(&self) -> bool {
        matches!(self, Action::SignalRaised(_) | Action::SignalCleared(_))
    }
}
