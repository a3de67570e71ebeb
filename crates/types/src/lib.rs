//! Core types for the Vault KV relation protocol.
//!
//! Everything exchanged over a relation is a string-keyed [`DataBag`].
//! [`Request`] and [`Response`] are typed views over those bags, and
//! [`keys`] holds the wire field names both sides agree on.

mod databag;
mod identifiers;
pub mod keys;
mod request;
mod response;

pub use databag::{DataBag, DataDelta};
pub use identifiers::{BindingName, EndpointName, RelationId, UnitName};
pub use request::{IncompleteRequest, Request};
pub use response::{Credentials, Response};
