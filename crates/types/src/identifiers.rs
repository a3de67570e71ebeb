//! Domain-specific identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit identifier (`<application>/<number>`).
///
/// Used both for the transport-level identity of a remote unit and for the
/// name a unit declares about itself in its request. The two differ across
/// model boundaries, where the transport identity is a proxy name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    /// Create a unit name from any string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Application part of the name (`mysql` for `mysql/0`).
    pub fn application(&self) -> &str {
        self.0.split_once('/').map_or(&self.0, |(app, _)| app)
    }

    /// Unit number, if the name carries one.
    pub fn number(&self) -> Option<u32> {
        self.0.split_once('/').and_then(|(_, n)| n.parse().ok())
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UnitName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Relation identifier, unique within one endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RelationId(pub u64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relation-{}", self.0)
    }
}

/// Name of a local endpoint (`secrets`, `vault-kv`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointName(String);

impl EndpointName {
    /// Create an endpoint name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expand a flag template relative to this endpoint.
    ///
    /// `{endpoint_name}` is replaced by the endpoint name, mirroring how
    /// indicator flags are named on the host (`secrets.available`).
    pub fn expand(&self, template: &str) -> String {
        template.replace("{endpoint_name}", &self.0)
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Name of a network space binding on the local unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingName(String);

impl BindingName {
    /// Create a binding name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&EndpointName> for BindingName {
    fn from(endpoint: &EndpointName) -> Self {
        Self::new(endpoint.as_str())
    }
}
