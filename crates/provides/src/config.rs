//! Configuration for the provider endpoint.

use vaultkv_types::EndpointName;

/// Configuration for the provider side of the relation.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Name of the local endpoint the relation is established on.
    pub endpoint: EndpointName,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointName::new("secrets"),
        }
    }
}

impl ProviderConfig {
    /// Set the endpoint name.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = EndpointName::new(endpoint);
        self
    }
}
