use std::env;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crownar::{config, view::FilterView};
use log::info;

#[derive(Parser)]
#[command(name = "crownar")]
#[command(version, about = "Camera face filter - crown, sparkles and tilak overlay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the face filter
    Run {
        /// Camera device to capture from (defaults to the configured one)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { device } => {
            let mut cfg = config::load_config(None)?;
            if let Some(device) = device {
                cfg.camera = device;
            }
            run(&cfg)
        }
        Commands::Config => open_config(),
    }
}

fn run(cfg: &config::Config) -> Result<()> {
    info!("Opening camera: {}", cfg.camera);

    match FilterView::open(cfg)? {
        Some(mut view) => view.run(),
        // Setup failure was already reported; nothing to retry
        None => Ok(()),
    }
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
