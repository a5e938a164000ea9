//! Labs CLI - build, serve and deploy the Kollegorna Labs site.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod tasks;

#[derive(Parser)]
#[command(name = "labs")]
#[command(about = "Asset pipeline and helpers for the Labs static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to labs.toml config file
    #[arg(short, long, default_value = "labs.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more tasks and their dependencies
    Run {
        /// Tasks to run, e.g. `serve` or `build deploy`
        #[arg(required = true)]
        tasks: Vec<String>,

        /// Keep running after a command exits with a failure
        #[arg(short, long)]
        keep_going: bool,
    },

    /// List available tasks
    Tasks,

    /// Write a default labs.toml
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the Gravatar URL for an email address
    Gravatar {
        email: String,

        /// Image size in pixels
        #[arg(short, long, default_value_t = labs_site::DEFAULT_SIZE)]
        size: u32,
    },

    /// Print the comment embed snippet for a page
    Comments {
        /// Full URL of the page
        url: String,

        /// Disqus shortname (defaults to [comments] in the config)
        #[arg(short, long)]
        shortname: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Run { tasks, keep_going } => {
            return commands::run::run(&cli.config, &tasks, keep_going).await;
        }
        Commands::Tasks => {
            commands::tasks::run(&cli.config)?;
        }
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes)?;
        }
        Commands::Gravatar { email, size } => {
            commands::gravatar::run(&email, size)?;
        }
        Commands::Comments { url, shortname } => {
            commands::comments::run(&cli.config, &url, shortname)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
