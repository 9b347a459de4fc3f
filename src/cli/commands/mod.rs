//! CLI parser and dispatch.

mod create;
mod sources;
mod tools;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use oalc_creator::config::Config;

#[derive(Parser)]
#[command(name = "mkoalc")]
#[command(about = "Build the Open Australian Legal Corpus")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "OALC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape sources into the corpus
    Create {
        /// Sources to scrape (comma-separated; default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<String>,

        /// Corpus output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory for index state
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// List configured sources
    Sources,

    /// Check that the external OCR tools are installed
    Tools,
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(&path).await?,
        None => Config::load().await?,
    };
    Ok(config)
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            sources,
            output_dir,
            data_dir,
            no_progress,
        } => {
            let mut config = load_config(cli.config).await?;
            if let Some(dir) = data_dir {
                config.data_dir = Some(dir.to_string_lossy().into_owned());
            }
            if let Some(dir) = output_dir {
                config.output_dir = Some(dir.to_string_lossy().into_owned());
            }
            create::cmd_create(&config, &sources, !no_progress).await
        }
        Commands::Sources => {
            let config = load_config(cli.config).await?;
            sources::cmd_sources(&config)
        }
        Commands::Tools => tools::cmd_tools(),
    }
}
