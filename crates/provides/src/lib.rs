//! Provider side of the Vault KV relation.
//!
//! The [`ProviderState`] runs on the Vault unit. It turns remote units'
//! published data into [`Request`](vaultkv_types::Request)s and writes the
//! response back.
//!
//! # Flow
//!
//! ```text
//! RelationChanged (remote commit)
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ProviderState::observe_change                               │
//! │   request field marked changed? → raise new-request,        │
//! │   acknowledge access_address/secret_backend/hostname/       │
//! │   isolated together                                         │
//! └─────────────────────────────────────────────────────────────┘
//!     │ SignalRaised(NewRequest)
//!     ▼
//! host: collect_requests → issuer → issue_credentials,
//!       publish_url / publish_ca → acknowledge_requests
//!
//! LeadershipLost ──▶ retract_all_credentials (every relation, every unit)
//! ```
//!
//! # Components
//!
//! - [`ProviderState`] - Provider state machine
//! - [`ProviderConfig`] - Endpoint configuration
//! - [`ProvideError`] - Errors from host-initiated operations

mod binding;
mod config;
mod error;
mod state;

pub use binding::{reachable_address, relation_in_network};
pub use config::ProviderConfig;
pub use error::ProvideError;
pub use state::ProviderState;
