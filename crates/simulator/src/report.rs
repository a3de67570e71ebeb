//! Outcome of a scenario run.

use serde::Serialize;
use vaultkv_simulation::SimulationRunner;

/// What one requiring unit ended up with.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    /// Unit name.
    pub unit: String,

    /// Protocol phase (`disconnected`, `connected`, `ready`).
    pub phase: String,

    /// Whether the backend is usable.
    pub available: bool,

    /// Role id issued to the unit.
    pub role_id: Option<String>,

    /// Whether a one-shot token was received. The token itself is not
    /// reported.
    pub has_token: bool,

    /// URL received.
    pub vault_url: Option<String>,

    /// Whether a CA was received and decodes.
    pub has_ca: bool,
}

/// Report for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Provider phase at the end of the run.
    pub provider_phase: String,

    /// Complete requests the provider holds at the end of the run.
    pub requests: usize,

    /// One entry per requiring unit, in registration order.
    pub units: Vec<UnitReport>,

    /// Events handled.
    pub events_processed: u64,

    /// Commits delivered between the sides.
    pub commits_delivered: u64,

    /// Credential pairs published.
    pub credentials_issued: u64,

    /// Credential pairs refused for lack of leadership.
    pub credentials_refused: u64,
}

impl ScenarioReport {
    /// Snapshot the state of `runner`.
    pub fn collect(runner: &SimulationRunner) -> Self {
        let units = runner
            .requirer_units()
            .filter_map(|unit| {
                let requirer = runner.requirer(unit)?;
                Some(UnitReport {
                    unit: unit.to_string(),
                    phase: requirer.phase().to_string(),
                    available: requirer.is_available(),
                    role_id: requirer.unit_role_id().map(str::to_string),
                    has_token: requirer.unit_token().is_some_and(|t| !t.is_empty()),
                    vault_url: requirer.vault_url().map(str::to_string),
                    has_ca: matches!(requirer.vault_ca(), Ok(Some(_))),
                })
            })
            .collect();

        let stats = runner.stats();
        Self {
            provider_phase: runner.provider().phase().to_string(),
            requests: runner.provider().collect_requests().len(),
            units,
            events_processed: stats.events_processed,
            commits_delivered: stats.commits_delivered,
            credentials_issued: stats.credentials_issued,
            credentials_refused: stats.credentials_refused,
        }
    }

    /// Look up one unit.
    pub fn unit(&self, unit: &str) -> Option<&UnitReport> {
        self.units.iter().find(|report| report.unit == unit)
    }

    /// Print a human-readable summary.
    pub fn print(&self) {
        println!("\n=== Scenario Report ===");
        println!("Provider phase:      {}", self.provider_phase);
        println!("Complete requests:   {}", self.requests);
        println!("Events processed:    {}", self.events_processed);
        println!("Commits delivered:   {}", self.commits_delivered);
        println!("Credentials issued:  {}", self.credentials_issued);
        println!("Credentials refused: {}", self.credentials_refused);
        println!();
        for unit in &self.units {
            println!(
                "{:<12} {:<13} available={:<5} role_id={:<8} token={:<5} ca={:<5} url={}",
                unit.unit,
                unit.phase,
                unit.available,
                unit.role_id.as_deref().unwrap_or("-"),
                unit.has_token,
                unit.has_ca,
                unit.vault_url.as_deref().unwrap_or("-"),
            );
        }
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
