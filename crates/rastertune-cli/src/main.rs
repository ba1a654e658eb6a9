//! rastertune CLI application
//!
//! Benchmarks a tiled raster operator under combinations of tile size,
//! cache size and thread count, and lets the user adopt the fastest
//! combination as the default performance configuration.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use console::style;
use tracing::error;

mod commands;
mod config;

use commands::SweepCommand;
use config::CliConfig;

/// rastertune - performance-parameter tuning for tiled raster processing
#[derive(Parser)]
#[command(name = "rastertune")]
#[command(about = "Benchmark and tune tile/cache/thread performance parameters")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark sweep over performance-parameter combinations
    #[command(alias = "bench")]
    Sweep(SweepCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system information
    Info,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset configuration to defaults
    Reset,
    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => CliConfig::default_config_path()
            .unwrap_or_else(|_| std::path::PathBuf::from("rastertune.toml")),
    };
    let config = CliConfig::load_or_default(&config_path);

    setup_logging(&config, cli.log_level.as_deref())?;

    let result = match cli.command {
        Some(Commands::Sweep(cmd)) => cmd.execute(&config, &config_path).await,
        Some(Commands::Config { action }) => handle_config_command(action, &config, &config_path),
        Some(Commands::Info) => show_system_info(&config),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);

        let mut source = e.source();
        while let Some(err) = source {
            error!("  Caused by: {}", err);
            source = err.source();
        }

        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(config: &CliConfig, log_level_override: Option<&str>) -> Result<()> {
    let level = log_level_override.unwrap_or(&config.logging.level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.logging.format.as_str() {
        "json" => {
            subscriber
                .json()
                .with_timer(tracing_subscriber::fmt::time::uptime())
                .init();
        }
        "compact" => {
            subscriber.compact().init();
        }
        _ => {
            subscriber.pretty().init();
        }
    }

    Ok(())
}

/// Handle configuration commands
fn handle_config_command(
    action: ConfigAction,
    config: &CliConfig,
    config_path: &std::path::Path,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config_str =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            println!("{}", config_str);
        }
        ConfigAction::Reset => {
            CliConfig::default().save(config_path)?;
            println!(
                "{} Configuration reset to defaults at {}",
                style("✓").green(),
                config_path.display()
            );
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

/// Show system information
fn show_system_info(config: &CliConfig) -> Result<()> {
    println!("{}", style("rastertune System Information").bold().cyan());
    println!();

    println!("{}", style("Version:").bold());
    println!("  rastertune: {}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("{}", style("System:").bold());
    println!("  OS: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);
    println!("  CPU cores: {}", num_cpus::get());
    println!();

    println!("{}", style("Performance defaults:").bold());
    println!("  {}", config.performance);

    Ok(())
}
