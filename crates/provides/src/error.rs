//! Error types for the provider.

use thiserror::Error;
use vaultkv_types::{BindingName, RelationId};

/// Errors returned by provider operations.
///
/// Request handling itself never fails; these only surface from calls the
/// host application makes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvideError {
    /// Only the elected leader may issue credentials.
    #[error("Local unit is not the leader, refusing to issue credentials")]
    NotLeader,

    /// The relation is not (or no longer) established.
    #[error("Unknown relation: {0}")]
    UnknownRelation(RelationId),

    /// The binding's network could not be resolved locally.
    #[error("Could not resolve network for binding {0}")]
    UnresolvedBinding(BindingName),
}
