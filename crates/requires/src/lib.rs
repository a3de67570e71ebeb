//! Requirer side of the Vault KV relation.
//!
//! The [`RequirerState`] runs on a client unit. It asks the provider for a
//! secret backend and decides when the response is complete enough to use.
//!
//! # Readiness
//!
//! ```text
//! role id ──┐
//! token   ──┼── all non-empty? ──▶ available
//! url     ──┘
//! ```
//!
//! Under [`ReadinessContract::V1RoleId`] the token is not part of the gate.
//! The check reruns on every remote commit, so a retracted credential
//! clears `available` as soon as it lands.

mod config;
mod error;
mod state;

pub use config::{ReadinessContract, RequirerConfig};
pub use error::RequireError;
pub use state::RequirerState;
