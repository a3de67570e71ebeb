//! TOML scenario files.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use vaultkv_core::StaticEnvironment;
use vaultkv_provides::ProviderConfig;
use vaultkv_requires::{ReadinessContract, RequirerConfig};
use vaultkv_simulation::{SimulationConfig, SimulationRunner};
use vaultkv_types::UnitName;

use crate::ScenarioReport;

/// Errors loading or building a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scenario is not valid TOML for this schema.
    #[error("Invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),

    /// An address field is not an IP literal.
    #[error("Invalid address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// An interface is not in `address/prefix` form.
    #[error("Invalid interface {value:?}: {source}")]
    InvalidInterface {
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}

/// The Vault unit of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    /// Unit name.
    #[serde(default = "default_provider_unit")]
    pub unit: String,

    /// URL published to requirers.
    pub url: String,

    /// CA certificate text, published base64-encoded.
    #[serde(default)]
    pub ca: Option<String>,

    /// Only publish the URL to units inside this binding's network.
    #[serde(default)]
    pub url_binding: Option<String>,

    /// Local interfaces, `address/prefix`.
    #[serde(default)]
    pub interfaces: Vec<String>,

    /// Binding name to local address.
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

/// One requiring unit of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequirerEntry {
    /// Unit name; the application is the part before `/`.
    pub unit: String,

    /// Requested secret backend.
    pub backend: String,

    /// Address the endpoint binding resolves to.
    pub address: String,

    /// Host name, defaults to the unit name with `/` replaced by `-`.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Request an isolated backend.
    #[serde(default = "default_isolated")]
    pub isolated: bool,

    /// Name the provider sees the unit under, for cross-model relations.
    /// The unit still declares `unit` in its request.
    #[serde(default)]
    pub transport_name: Option<String>,
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Endpoint name used on both sides.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Readiness gate for every requirer.
    #[serde(default)]
    pub contract: ReadinessContract,

    /// The Vault unit.
    pub provider: ProviderSection,

    /// Requiring units, related in order of first appearance of their
    /// application.
    #[serde(default, rename = "requirer")]
    pub requirers: Vec<RequirerEntry>,

    /// Drop provider leadership once the initial exchange settles.
    #[serde(default)]
    pub revoke_leadership_after: bool,
}

fn default_provider_unit() -> String {
    "vault/0".to_string()
}

fn default_endpoint() -> String {
    "secrets".to_string()
}

fn default_isolated() -> bool {
    true
}

fn parse_address(value: &str) -> Result<IpAddr, ScenarioError> {
    value.parse().map_err(|source| ScenarioError::InvalidAddress {
        value: value.to_string(),
        source,
    })
}

fn parse_interface(value: &str) -> Result<IpNet, ScenarioError> {
    value.parse().map_err(|source| ScenarioError::InvalidInterface {
        value: value.to_string(),
        source,
    })
}

impl ScenarioConfig {
    /// Parse a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build a runner with every unit registered and every application
    /// related. Nothing is processed yet.
    pub fn build_runner(&self) -> Result<SimulationRunner, ScenarioError> {
        let mut config = SimulationConfig::new(&self.provider.url)
            .with_provider(ProviderConfig::default().with_endpoint(&self.endpoint))
            .with_requirer(
                RequirerConfig::default()
                    .with_endpoint(&self.endpoint)
                    .with_contract(self.contract),
            );
        if let Some(ca) = &self.provider.ca {
            config = config.with_vault_ca(ca.as_bytes());
        }
        if let Some(binding) = &self.provider.url_binding {
            config = config.with_url_binding(binding.as_str());
        }

        let mut runner = SimulationRunner::new(config, self.provider_env()?);

        let mut applications: Vec<String> = vec![];
        for entry in &self.requirers {
            let env = self.requirer_env(entry)?;
            let (unit, transport) = match &entry.transport_name {
                Some(transport) => {
                    let transport = UnitName::new(transport);
                    (runner.add_cross_model_requirer(env, transport.clone()), transport)
                }
                None => {
                    let unit = runner.add_requirer(env);
                    (unit.clone(), unit)
                }
            };
            runner.submit_request(&unit, &entry.backend, entry.isolated);

            let application = transport.application().to_string();
            if !applications.contains(&application) {
                applications.push(application);
            }
        }
        for application in &applications {
            runner.relate(application);
        }
        Ok(runner)
    }

    /// Run the scenario to completion and report the outcome.
    pub fn run(&self) -> Result<ScenarioReport, ScenarioError> {
        let mut runner = self.build_runner()?;
        let events = runner.run_until_idle();
        info!(events, "Initial exchange settled");

        if self.revoke_leadership_after {
            runner.revoke_leadership();
            let events = runner.run_until_idle();
            info!(events, "Leadership revoked");
        }

        Ok(ScenarioReport::collect(&runner))
    }

    fn provider_env(&self) -> Result<StaticEnvironment, ScenarioError> {
        let mut env = StaticEnvironment::new(self.provider.unit.as_str()).with_leader(true);
        for interface in &self.provider.interfaces {
            env = env.with_interface(parse_interface(interface)?);
        }
        for (binding, address) in &self.provider.bindings {
            env = env.with_binding(binding.as_str(), parse_address(address)?);
        }
        Ok(env)
    }

    fn requirer_env(&self, entry: &RequirerEntry) -> Result<StaticEnvironment, ScenarioError> {
        let address = parse_address(&entry.address)?;
        let mut env = StaticEnvironment::new(UnitName::new(&entry.unit))
            .with_private_address(address)
            .with_binding(self.endpoint.as_str(), address);
        if let Some(hostname) = &entry.hostname {
            env = env.with_hostname(hostname);
        }
        Ok(env)
    }
}

/// A scenario exercising the URL binding filter, printed by `vaultkv-sim example`.
pub const EXAMPLE_SCENARIO: &str = r#"endpoint = "secrets"
contract = "v2-role-id-and-token"
revoke_leadership_after = false

[provider]
unit = "vault/0"
url = "https://10.0.0.1:8200"
ca = "-----BEGIN CERTIFICATE-----\nMIIB...\n-----END CERTIFICATE-----\n"
url_binding = "secrets"
interfaces = ["10.0.0.1/24", "192.168.0.1/24"]

[provider.bindings]
secrets = "10.0.0.1"

[[requirer]]
unit = "mysql/0"
backend = "charm-mysql"
address = "10.0.0.5"
isolated = true

[[requirer]]
unit = "mysql/1"
backend = "charm-mysql"
address = "10.0.0.6"

[[requirer]]
unit = "web/0"
backend = "charm-web"
address = "192.168.0.7"
hostname = "web-frontend"
isolated = false

[[requirer]]
unit = "kafka/0"
backend = "charm-kafka"
address = "10.0.0.9"
transport_name = "remote-7f3c/0"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_example_scenario_parses() {
        let scenario = ScenarioConfig::from_toml_str(EXAMPLE_SCENARIO).unwrap();
        assert_eq!(scenario.endpoint, "secrets");
        assert_eq!(scenario.contract, ReadinessContract::V2RoleIdAndToken);
        assert_eq!(scenario.requirers.len(), 4);
        assert!(scenario.requirers[1].isolated);
        assert!(!scenario.requirers[2].isolated);
        assert_eq!(scenario.provider.bindings.get("secrets").map(String::as_str), Some("10.0.0.1"));
    }

    #[traced_test]
    #[test]
    fn test_example_scenario_runs() {
        let report = ScenarioConfig::from_toml_str(EXAMPLE_SCENARIO)
            .unwrap()
            .run()
            .unwrap();

        let mysql = report.unit("mysql/0").unwrap();
        assert!(mysql.available);
        assert_eq!(mysql.role_id.as_deref(), Some("r1"));
        assert!(mysql.has_ca);

        // Outside the bound network: credentials but no URL
        let web = report.unit("web/0").unwrap();
        assert!(!web.available);
        assert!(web.role_id.is_some());
        assert_eq!(web.vault_url, None);

        // Reached across models, served under its declared name
        let kafka = report.unit("kafka/0").unwrap();
        assert!(kafka.available);
        assert_eq!(report.requests, 4);
    }

    #[traced_test]
    #[test]
    fn test_leadership_revocation_scenario() {
        let mut scenario = ScenarioConfig::from_toml_str(EXAMPLE_SCENARIO).unwrap();
        scenario.revoke_leadership_after = true;
        let report = scenario.run().unwrap();
        assert!(report.units.iter().all(|unit| !unit.available));
        assert!(report.units.iter().all(|unit| unit.role_id.is_none()));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let text = r#"
            [provider]
            url = "https://10.0.0.1:8200"

            [[requirer]]
            unit = "mysql/0"
            backend = "charm-mysql"
            address = "not-an-ip"
        "#;
        let scenario = ScenarioConfig::from_toml_str(text).unwrap();
        assert!(matches!(
            scenario.build_runner(),
            Err(ScenarioError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_invalid_interface_rejected() {
        let text = r#"
            [provider]
            url = "https://10.0.0.1:8200"
            interfaces = ["10.0.0.1"]
        "#;
        let scenario = ScenarioConfig::from_toml_str(text).unwrap();
        assert!(matches!(
            scenario.build_runner(),
            Err(ScenarioError::InvalidInterface { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = r#"
            [provider]
            url = "https://10.0.0.1:8200"
            colour = "blue"
        "#;
        assert!(matches!(
            ScenarioConfig::from_toml_str(text),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, EXAMPLE_SCENARIO).unwrap();
        assert_eq!(ScenarioConfig::load(&path).unwrap().requirers.len(), 4);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            ScenarioConfig::load(&missing),
            Err(ScenarioError::Io { .. })
        ));
    }
}
