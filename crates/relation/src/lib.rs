//! Local view of relation data for one endpoint.
//!
//! An [`Endpoint`] holds, per relation, what the local side has published
//! and what each remote unit has sent, plus the change markers that drive
//! the provider's request detection. It performs no I/O: the host (or the
//! simulation runner) feeds it remote commits and ships out local writes.

mod endpoint;

pub use endpoint::{Endpoint, Relation};
