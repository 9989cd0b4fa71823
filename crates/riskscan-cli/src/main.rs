//! riskscan: screen an entity from the command line.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use riskscan::{EngineConfig, ScreeningEngine, SearchRequest};

#[derive(Parser)]
#[command(
    name = "riskscan",
    about = "Screen a business entity against offshore leaks, debarred firms, and sanctions lists",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Overall deadline for one screening call, in seconds.
    #[arg(long, global = true)]
    deadline_secs: Option<u64>,

    /// Chromium binary used for the World Bank grid.
    /// Also reads RISKSCAN_CHROMIUM_PATH.
    #[arg(long, global = true)]
    chromium_path: Option<PathBuf>,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen against all three sources concurrently.
    All {
        /// Entity name to search for.
        entity: String,

        /// OFAC fuzzy match score, 0-100 (default 100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        score: Option<u8>,
    },

    /// Search the offshore leaks database.
    Offshore {
        /// Entity name to search for.
        entity: String,
    },

    /// Search the World Bank debarred firms list.
    Worldbank {
        /// Entity name to search for.
        entity: String,
    },

    /// Search the OFAC sanctions list.
    Ofac {
        /// Entity name to search for.
        entity: String,

        /// Fuzzy match score, 0-100 (default 100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        score: Option<u8>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   riskscan completions bash > ~/.local/share/bash-completion/completions/riskscan
    ///   riskscan completions zsh > ~/.zfunc/_riskscan
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn request(entity: String, score: Option<u8>) -> anyhow::Result<SearchRequest> {
    if entity.trim().is_empty() {
        anyhow::bail!("entity name must not be empty");
    }
    let request = SearchRequest::new(entity);
    Ok(match score {
        Some(score) => request.with_match_score(score),
        None => request,
    })
}

fn build_engine(config: &EngineConfig) -> anyhow::Result<ScreeningEngine> {
    let engine = ScreeningEngine::new(config)?;
    tracing::debug!("deadline {}s", engine.deadline().as_secs());
    Ok(engine)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Flags take precedence over RISKSCAN_* variables.
    let mut config = EngineConfig::from_env();
    if let Some(secs) = cli.deadline_secs {
        config.request_deadline_ms = secs * 1000;
    }
    if let Some(path) = cli.chromium_path {
        config.worldbank.chromium_path = Some(path);
    }

    match cli.command {
        Commands::All { entity, score } => {
            let engine = build_engine(&config)?;
            let report = engine.scrape_all(&request(entity, score)?).await;
            print_json(&report, cli.pretty)?;
        }
        Commands::Offshore { entity } => {
            let engine = build_engine(&config)?;
            let result = engine.scrape_offshore(&request(entity, None)?).await;
            print_json(&result, cli.pretty)?;
        }
        Commands::Worldbank { entity } => {
            let engine = build_engine(&config)?;
            let result = engine.scrape_worldbank(&request(entity, None)?).await;
            print_json(&result, cli.pretty)?;
        }
        Commands::Ofac { entity, score } => {
            let engine = build_engine(&config)?;
            let result = engine.scrape_ofac(&request(entity, score)?).await;
            print_json(&result, cli.pretty)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "riskscan", &mut std::io::stdout());
        }
    }

    Ok(())
}
