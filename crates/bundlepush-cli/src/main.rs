use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bundlepush_runtime::{RuntimeConfig, DEFAULT_MODULE_NAME};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;

#[derive(Parser, Debug)]
#[command(name = "bundlepush")]
#[command(about = "Inspect and drive over-the-air bundle updates", long_about = None)]
struct Cli {
    /// Runtime config file (TOML).
    #[arg(long, env = "BUNDLEPUSH_CONFIG")]
    config: Option<PathBuf>,
    /// Overrides `storage_root` from the config file.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Default log filter; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a host start: run restart reconciliation and resolve bundles.
    Launch {
        /// Resolve only this module instead of every configured one.
        #[arg(long)]
        module: Option<String>,
    },
    /// Confirm the running update started successfully.
    Ready {
        #[arg(long, default_value = DEFAULT_MODULE_NAME)]
        module: String,
    },
    Status {
        #[arg(long)]
        module: Option<String>,
    },
    /// Install a downloaded package directory as the pending update.
    Install {
        #[arg(long, default_value = DEFAULT_MODULE_NAME)]
        module: String,
        #[arg(long)]
        bundle_dir: PathBuf,
        /// Package hash; defaults to the SHA-256 of the module bundle file.
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        mandatory: bool,
    },
    Rollback {
        #[arg(long, default_value = DEFAULT_MODULE_NAME)]
        module: String,
    },
    Clear {
        #[arg(long, default_value = DEFAULT_MODULE_NAME)]
        module: String,
    },
    PackageFolder {
        #[arg(long, default_value = DEFAULT_MODULE_NAME)]
        module: String,
    },
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    dispatch::run_cli(cli)
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(config_path: Option<&Path>, root: Option<PathBuf>) -> Result<RuntimeConfig> {
    let mut config = match config_path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(root) = root {
        config.storage_root = root;
    }
    config.validate().context("invalid runtime config")?;
    Ok(config)
}

#[cfg(test)]
mod tests;
