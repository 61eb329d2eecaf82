//! Dev Toolkit CLI
//!
//! Command-line entry point for the Dev Toolkit Telegram bot

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devtoolkit_config::Config;
use devtoolkit_core::{provider_from_config, DevToolkitRuntime};
use devtoolkit_storage::Storage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DB_FILE: &str = "devtoolkit.db";

#[derive(Parser)]
#[command(name = "devtoolkit")]
#[command(about = "Telegram bot for code snippets, AI formatting and error explanations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overrides `core.log_level`; RUST_LOG overrides both)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot in the foreground
    Start,
    /// Validate configuration, open the database and ping the AI provider
    Check,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a configuration template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show current configuration with secrets redacted
    Show,
    /// Validate configuration
    Validate,
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load_or_env(config_path).context("failed to load configuration")
}

fn config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    config_path
        .or_else(Config::default_path)
        .context("could not determine a config directory; pass --config")
}

fn effective_log_level(cli_level: Option<&str>, config: &Config) -> String {
    cli_level.unwrap_or_else(|| config.log_level()).to_string()
}

fn open_storage(data_dir: &Path) -> Result<Storage> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let db_path = data_dir.join(DB_FILE);
    Storage::new(&db_path).with_context(|| format!("failed to open {}", db_path.display()))
}

fn create_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, Config::template())?;
    Ok(())
}

async fn run_check(config: Config) -> Result<()> {
    let data_dir = config.data_dir();
    let storage = open_storage(&data_dir)?;
    println!(
        "Database OK: {} ({} snippets)",
        data_dir.join(DB_FILE).display(),
        storage.count_snippets()?
    );

    let provider = provider_from_config(&config);
    match provider.health_check().await {
        Ok(true) => println!(
            "Provider OK: {} ({})",
            provider.display_name(),
            provider.model()
        ),
        Ok(false) => {
            warn!(provider = provider.name(), "Provider health check failed");
            anyhow::bail!("provider {} is not reachable", provider.display_name());
        }
        Err(e) => return Err(e.context("provider health check failed")),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = load_config(cli.config.as_deref())?;
            let data_dir = config.data_dir();
            let log_level = effective_log_level(cli.log_level.as_deref(), &config);
            let _logging_guard = logging::init_logging(&data_dir.join("logs"), &log_level)?;

            let storage = open_storage(&data_dir)?;
            let runtime = DevToolkitRuntime::new(config, storage)?;
            info!(data_dir = %data_dir.display(), "Starting Dev Toolkit bot in foreground...");
            runtime.run().await?;
            info!("Dev Toolkit bot stopped");
        }

        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            let log_level = effective_log_level(cli.log_level.as_deref(), &config);
            logging::init_console_logging(&log_level)?;
            println!("Configuration OK");
            run_check(config).await?;
        }

        Commands::Config { action } => match action {
            ConfigCommands::Init { force } => {
                let path = config_path(cli.config)?;
                create_config(&path, force)?;
                println!("Configuration created at: {}", path.display());
                println!("\nEdit the file to add your bot token and API key, or set");
                println!("BOT_TOKEN and GEMINI_API_KEY in the environment or a .env file.");
            }
            ConfigCommands::Show => {
                let config = load_config(cli.config.as_deref())?;
                println!("Current configuration:");
                println!("{}", toml::to_string_pretty(&config.redacted())?);
            }
            ConfigCommands::Validate => match load_config(cli.config.as_deref()) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    eprintln!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            },
        },
    }

    Ok(())
}
