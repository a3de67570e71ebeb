//! Vault KV relation simulator.
//!
//! Loads a TOML scenario describing one Vault unit and its requiring
//! units, runs the relation exchange to completion on top of
//! `vaultkv-simulation`, and reports what each unit ended up with.
//!
//! # Example
//!
//! ```ignore
//! use vaultkv_simulator::{ScenarioConfig, EXAMPLE_SCENARIO};
//!
//! let scenario = ScenarioConfig::from_toml_str(EXAMPLE_SCENARIO)?;
//! let report = scenario.run()?;
//! report.print();
//! ```

pub mod report;
pub mod scenario;

pub use report::{ScenarioReport, UnitReport};
pub use scenario::{ProviderSection, RequirerEntry, ScenarioConfig, ScenarioError, EXAMPLE_SCENARIO};
