//! epiguard - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use epiguard::{
    cli::{Args, Commands},
    config::Config,
    preprocessing::{self, OutputPaths, PrepareSettings},
    server, telemetry,
};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(args.verbosity());

    let mut config = Config::load(args.config.clone()).context("Failed to load configuration")?;

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(&config).await.context("Inference service failed")?;
        }
        Commands::Prepare {
            raw,
            out,
            patients,
            seed,
        } => {
            if let Some(seed) = seed {
                config.preprocessing.seed = seed;
            }
            run_prepare(&config, raw, out, patients)?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

fn run_prepare(
    config: &Config,
    raw: Option<PathBuf>,
    out: Option<PathBuf>,
    patients: Option<PathBuf>,
) -> Result<()> {
    let raw_path = raw.unwrap_or_else(|| config.raw_data_path());
    let processed_dir = out.unwrap_or_else(|| config.processed_dir());
    let patients = patients.unwrap_or_else(|| config.patient_data_path());

    let paths = OutputPaths::new(&processed_dir, patients);
    let settings = PrepareSettings::from_config(config);

    let report = preprocessing::run(&raw_path, &paths, &settings)
        .with_context(|| format!("Preprocessing failed for {}", raw_path.display()))?;

    println!("{}", report);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.to_redacted_toml()?);
    println!("# patient data: {}", config.patient_data_path().display());
    println!("# raw data:     {}", config.raw_data_path().display());
    println!("# processed:    {}", config.processed_dir().display());
    Ok(())
}
