//! Vault KV Relation Simulator CLI
//!
//! Runs a scenario file through both sides of the relation and prints the
//! outcome per unit.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vaultkv_simulator::{ScenarioConfig, EXAMPLE_SCENARIO};

#[derive(Parser)]
#[command(name = "vaultkv-sim")]
#[command(about = "Simulate the Vault KV relation between a Vault unit and its clients")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario to completion
    Run {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Drop provider leadership after the initial exchange
        #[arg(long)]
        revoke_leadership: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a sample scenario
    Example,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Example => {
            // No tracing here, output goes to stdout
            print!("{}", EXAMPLE_SCENARIO);
        }

        Commands::Run {
            scenario,
            revoke_leadership,
            json,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with_writer(std::io::stderr)
                .init();

            let mut config = ScenarioConfig::load(&scenario)?;
            config.revoke_leadership_after |= revoke_leadership;

            let report = config
                .run()
                .with_context(|| format!("running scenario {}", scenario.display()))?;

            if json {
                println!("{}", report.to_json()?);
            } else {
                report.print();
            }
        }
    }

    Ok(())
}
