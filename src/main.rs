use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use tci_simulation::config::ScenarioConfig;
use tci_simulation::output;
use tci_simulation::simulation::Simulator;

#[derive(Parser)]
#[command(name = "tci_simulation")]
#[command(about = "Target-controlled infusion simulation program")]
struct Cli {
    /// Scenario file path
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Also write a markdown report
    #[arg(short, long)]
    report: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = ScenarioConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load scenario from {:?}", cli.config))?;
    info!("Loaded scenario from {:?}", cli.config);

    let simulator = Simulator::new(config)?;
    let result = simulator.simulate().context("simulation failed")?;
    info!(
        "Simulation completed: {} samples, {} infusion segments",
        result.samples.len(),
        result.infusions.len()
    );

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("failed to create output directory {:?}", cli.output))?;

    output::save_results(&result, &cli.output).context("failed to save results")?;
    if cli.report {
        output::generate_report(&result, &cli.output).context("failed to write report")?;
    }
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
