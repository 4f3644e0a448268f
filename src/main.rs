//! # sable CLI
//!
//! ## Usage
//!
//! ```bash
//! sable --config ./config/sable.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sable serve` | Start the HTTP API |
//! | `sable meta` | Show source and snapshot metadata |
//! | `sable pilots` | List every pilot |
//! | `sable pilot <number>` | Show one pilot by bib number |
//! | `sable search "<query>"` | Ranked search over all fields |
//! | `sable search "<query>" --text` | Free-text row search |
//!
//! ## Examples
//!
//! ```bash
//! # Read a saved page instead of the live site
//! sable --source ./test_live.html pilots
//!
//! # Who wears bib 7?
//! sable pilot 7
//!
//! # Serve on port 8080 with data under /var/lib/sable
//! PORT=8080 DATA_DIR=/var/lib/sable sable serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sable_live::config::{self, Config};
use sable_live::{commands, logging, server};

/// Live results companion for sand-racing events.
///
/// A missing config file is not an error: built-in defaults apply, then
/// the `RESULTS_URL`, `DATA_DIR`, `PORT`, `FEEDBACK_WEBHOOK_URL` and
/// `FEEDBACK_TOKEN` environment variables.
#[derive(Parser)]
#[command(name = "sable", version, about = "Live results companion for sand-racing events")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sable.toml")]
    config: PathBuf,

    /// Results source (path, file:// URI or http(s) URL), overriding config.
    #[arg(long, global = true)]
    source: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Show source and snapshot metadata.
    Meta,

    /// List every pilot in source order.
    Pilots,

    /// Show one pilot by bib number.
    Pilot {
        /// Bib number, matched exactly.
        number: String,
    },

    /// Search all fields, exact bib match first.
    Search {
        query: String,

        /// Print matching rows as deduplicated text lines (at most 20).
        #[arg(long)]
        text: bool,
    },
}

fn load(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::minimal()
    };
    if let Some(source) = &cli.source {
        cfg.source.url = source.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    let cfg = load(&cli)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Meta => commands::run_meta(&cfg).await?,
        Commands::Pilots => commands::run_pilots(&cfg).await?,
        Commands::Pilot { number } => commands::run_pilot(&cfg, &number).await?,
        Commands::Search { query, text } => commands::run_search(&cfg, &query, text).await?,
    }

    Ok(())
}
