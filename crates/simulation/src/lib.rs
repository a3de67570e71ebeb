//! Deterministic in-process simulation of the Vault KV relation.
//!
//! Runs one provider unit and any number of requiring units against each
//! other without an orchestrator. The same sequence of calls always
//! produces the same sequence of events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SimulationRunner                       │
//! │                                                         │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │     Event queue (VecDeque<Delivery>), FIFO         │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  ProviderState          RequirerState per unit     │ │
//! │  └────────────────────────┬───────────────────────────┘ │
//! │                           │                             │
//! │                           ▼                             │
//! │  ┌────────────────────────────────────────────────────┐ │
//! │  │  Publish actions → one commit per relation         │ │
//! │  │  → RelationChanged for every remote unit           │ │
//! │  │  new-request → CredentialIssuer → serve            │ │
//! │  └────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod config;
mod issuer;
mod runner;

pub use config::SimulationConfig;
pub use issuer::{CredentialIssuer, SequentialIssuer};
pub use runner::{SimulationRunner, SimulationStats};
