//! Core types for the Vault KV relation protocol: events, actions,
//! indicators, the [`StateMachine`] trait and the injected
//! [`HostEnvironment`].
//!
//! # Architecture
//!
//! ```text
//!   host orchestrator
//!         │ Event (PeerJoined, RelationChanged, LeadershipLost, ...)
//!         ▼
//! ┌────────────────────────────┐      ┌──────────────────────┐
//! │ StateMachine::handle       │─────▶│ DispatchTable        │
//! │ (ProviderState /           │      │ EventKind → handler  │
//! │  RequirerState)            │◀─────│                      │
//! └────────────────────────────┘      └──────────────────────┘
//!         │ Vec<Action>
//!         ▼
//!   runner: Publish → remote side, Signal* → host application
//! ```

mod action;
mod dispatch;
mod environment;
mod event;
mod signal;
mod traits;

pub use action::Action;
pub use dispatch::{DispatchTable, Handler};
pub use environment::{AddressError, HostEnvironment, StaticEnvironment};
pub use event::{Event, EventKind};
pub use signal::{Phase, Signal, SignalSet};
pub use traits::StateMachine;
