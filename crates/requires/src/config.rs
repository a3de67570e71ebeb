//! Configuration for the requirer endpoint.

use serde::{Deserialize, Serialize};
use vaultkv_types::EndpointName;

/// Which response fields must be present before the backend is usable.
///
/// Deployed providers have spoken two versions of the protocol. The
/// token-bearing one is canonical; the role-id-only one is kept for
/// providers that predate one-shot tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessContract {
    /// Role id and URL.
    V1RoleId,

    /// Role id, one-shot token and URL.
    #[default]
    V2RoleIdAndToken,
}

impl ReadinessContract {
    /// Whether the one-shot token is part of the readiness gate.
    pub fn requires_token(&self) -> bool {
        matches!(self, ReadinessContract::V2RoleIdAndToken)
    }
}

/// Configuration for the requirer side of the relation.
#[derive(Debug, Clone)]
pub struct RequirerConfig {
    /// Name of the local endpoint; also the binding used for address lookup.
    pub endpoint: EndpointName,

    /// Readiness gate.
    pub contract: ReadinessContract,
}

impl Default for RequirerConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointName::new("secrets"),
            contract: ReadinessContract::default(),
        }
    }
}

impl RequirerConfig {
    /// Set the endpoint name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = EndpointName::new(endpoint);
        self
    }

    /// Set the readiness contract.
    pub fn with_contract(mut self, contract: ReadinessContract) -> Self {
        self.contract = contract;
        self
    }
}
