use std::path::PathBuf;

use clap::Parser;
use mos_api::http::{run, HttpServerConfig};
use mos_core::query::QueryEngine;
use tracing_subscriber::EnvFilter;

/// Serve lookups against one characterisation file.
#[derive(Parser)]
#[command(name = "mos-api")]
#[command(version)]
struct Cli {
    /// Characterisation file written by mos-cli
    #[arg(value_name = "STORE")]
    store: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let engine = match QueryEngine::open(&cli.store) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("failed to load {}: {}", cli.store.display(), err);
            std::process::exit(1);
        }
    };
    tracing::info!(
        store = %cli.store.display(),
        parameters = ?engine.get_parameter_names(),
        "store loaded"
    );

    if let Err(err) = run(HttpServerConfig { bind_addr: cli.bind }, engine).await {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
