use std::path::PathBuf;

use clap::Parser;
use mos_core::config::CharConfig;
use mos_core::simulator::SpiceSimulator;
use mos_core::sweep::{characterise_all, SweepEngine, SweepOptions};
use tracing_subscriber::EnvFilter;

const BANNER_WIDTH: usize = 150;

/// Characterise every device listed in a configuration file.
#[derive(Parser)]
#[command(name = "mos-cli")]
#[command(version)]
struct Cli {
    /// Characterisation configuration (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the results directory from the configuration
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,
}

fn banner(device: &str) -> String {
    let rule = "-".repeat(BANNER_WIDTH);
    format!(
        "{}\nEXTRACTING OPERATING POINTS FOR DEVICE: {}\n{}",
        rule, device, rule
    )
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match CharConfig::from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load {}: {}", cli.config.display(), err);
            std::process::exit(1);
        }
    };
    if let Some(dir) = cli.results_dir {
        config.sweep.results_dir = dir;
    }

    let simulator = SpiceSimulator::new(config.simulator.clone());
    tracing::info!(
        simulator = ?simulator.kind(),
        devices = config.devices.len(),
        "starting characterisation"
    );
    let mut engine = SweepEngine::new(simulator, SweepOptions::from_config(&config));

    match characterise_all(&mut engine, &config, |name| println!("{}", banner(name))) {
        Ok(paths) => {
            for path in paths {
                println!("written: {}", path.display());
            }
        }
        Err(err) => {
            eprintln!("characterisation failed: {}", err);
            std::process::exit(1);
        }
    }
}
