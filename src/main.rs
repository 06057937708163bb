use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use boostr::client::{MockFixture, MockSessionClient, SharedSession};
use boostr::config::{GlobalConfig, load_config};
use boostr::scheduler::{BoostService, HeartbeatOutcome};
use boostr::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use cli::Cli;
use cli::commands::Commands;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("boostr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("boostr.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<()> {
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::CheckConfig => handle_check_config(config),
        Commands::Simulate {
            fixture,
            heartbeats,
            persist,
        } => handle_simulate(fixture, *heartbeats, *persist, config).await,
    }
}

fn handle_check_config(config: &GlobalConfig) -> Result<()> {
    info!("Checking configuration");
    let rendered = serde_yaml::to_string(config).context("Failed to render config")?;
    println!("{}", "Effective configuration:".green());
    println!("{}", rendered);
    println!("{} {}", "Data directory:".cyan(), config.data_dir().display());
    Ok(())
}

fn load_fixture(path: &Path) -> Result<MockFixture> {
    let content = fs::read_to_string(path).context(format!("Failed to read fixture {}", path.display()))?;
    let fixture: MockFixture =
        serde_yaml::from_str(&content).context(format!("Failed to parse fixture {}", path.display()))?;
    Ok(fixture)
}

async fn handle_simulate(fixture: &Path, heartbeats: u32, persist: bool, config: &GlobalConfig) -> Result<()> {
    let fixture = load_fixture(fixture)?;
    info!("Simulating {} heartbeats for account {}", heartbeats, fixture.account);

    let store: Arc<dyn KeyValueStore> = if persist {
        Arc::new(JsonFileStore::new(config.data_dir()).context("Failed to open data directory")?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let account_config = config.accounts.get(&fixture.account).cloned().unwrap_or_default();
    let session: SharedSession = Arc::new(MockSessionClient::from_fixture(fixture));

    let mut service = BoostService::new(store, config.blacklist.clone());
    let booster = service.add_account(session, account_config);

    for n in 1..=heartbeats {
        let outcome = booster.heartbeat().await;
        let label = format!("Heartbeat {}:", n);
        match outcome {
            HeartbeatOutcome::Completed(_) => println!("{} {}", label.green(), booster.status()),
            HeartbeatOutcome::Failed(e) => println!("{} {}", label.red(), e),
            other => println!("{} {:?}", label.yellow(), other),
        }
    }

    let resting = booster.resting_ids().await;
    if !resting.is_empty() {
        println!("{} {:?}", "Resting:".cyan(), resting);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
