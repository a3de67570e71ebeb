//! Configuration for a simulation run.

use vaultkv_provides::ProviderConfig;
use vaultkv_requires::RequirerConfig;
use vaultkv_types::BindingName;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// URL the simulated Vault publishes after serving requests.
    pub vault_url: String,

    /// Raw CA certificate to publish alongside the URL, if any.
    pub vault_ca: Option<Vec<u8>>,

    /// Restrict URL publication to remote units inside this binding's network.
    pub url_binding: Option<BindingName>,

    /// Provider endpoint configuration.
    pub provider: ProviderConfig,

    /// Endpoint configuration shared by every requirer unit.
    pub requirer: RequirerConfig,

    /// Upper bound on events processed by one `run_until_idle` call.
    pub max_events: usize,
}

impl SimulationConfig {
    /// Create a configuration publishing `vault_url`.
    pub fn new(vault_url: impl Into<String>) -> Self {
        Self {
            vault_url: vault_url.into(),
            vault_ca: None,
            url_binding: None,
            provider: ProviderConfig::default(),
            requirer: RequirerConfig::default(),
            max_events: 10_000,
        }
    }

    /// Publish a CA certificate.
    pub fn with_vault_ca(mut self, ca: impl Into<Vec<u8>>) -> Self {
        self.vault_ca = Some(ca.into());
        self
    }

    /// Filter URL publication by the network of `binding`.
    pub fn with_url_binding(mut self, binding: impl Into<BindingName>) -> Self {
        self.url_binding = Some(binding.into());
        self
    }

    /// Set the provider endpoint configuration.
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Set the requirer endpoint configuration.
    pub fn with_requirer(mut self, requirer: RequirerConfig) -> Self {
        self.requirer = requirer;
        self
    }

    /// Set the event bound.
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new("https://10.0.0.1:8200")
    }
}
