use std::path::PathBuf;

use clap::Parser;
use test_client::conf_parser::get_conf;
use test_client::config_definition::ScenarioConfig;
use test_client::run_scenario;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (JSON). The built-in demo runs when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the queue delay from the scenario.
    #[arg(long, allow_negative_numbers = true)]
    delay_ms: Option<i64>,
    /// Overrides the peak-load window from the scenario.
    #[arg(long)]
    peak_window_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => get_conf(path)?,
        None => ScenarioConfig::demo(),
    };
    if let Some(delay_ms) = args.delay_ms {
        config.queue.delay_ms = delay_ms;
    }
    if let Some(peak_window_ms) = args.peak_window_ms {
        config.peak_window_ms = peak_window_ms;
    }

    let report = run_scenario(config).await?;
    println!("{}", report);

    info!("exiting");
    Ok(())
}
