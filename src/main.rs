//! # Citation viewer CLI (`cite`)
//!
//! Command-line front end for the `citeview` library: parse answers, resolve
//! and fetch citations, check SharePoint previews, and serve the JSON API.
//!
//! ## Usage
//!
//! ```bash
//! cite --config ./config/cite.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cite parse <file>` | Number and resolve the citations in an answer |
//! | `cite resolve <label>` | Show the location a label resolves to |
//! | `cite fetch <label>` | Download a citation through the backend |
//! | `cite preview <url>` | Run the preview metadata step for a SharePoint URL |
//! | `cite serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! cite parse answer.txt --lookup lookup.json --html
//! cite resolve "CASH.pdf#page=5" --lookup lookup.json
//! CITE_BEARER_TOKEN=... cite fetch "EWS_API#page=34" --output ews.pdf
//! cite preview https://contoso.sharepoint.com/sites/IT/LIST/CASH.pdf
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use citeview::{commands, config, server};

/// Resolve and preview citations in generated answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the default file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(name = "cite", version, about = "Resolve and preview citations in generated answers")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cite.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an answer file and list its citations.
    Parse {
        /// File containing the answer text.
        file: PathBuf,

        /// Treat the answer as still streaming (drop a trailing open marker).
        #[arg(long)]
        streaming: bool,

        /// JSON file mapping citation labels to stored URLs.
        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Known citation label; repeatable.
        #[arg(long = "citation")]
        citations: Vec<String>,

        /// Print rendered HTML instead of the citation list.
        #[arg(long)]
        html: bool,
    },

    /// Resolve a single citation label.
    Resolve {
        label: String,

        #[arg(long)]
        lookup: Option<PathBuf>,
    },

    /// Fetch a citation's document through the backend.
    Fetch {
        label: String,

        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Bearer token sent to the backend.
        #[arg(long, env = "CITE_BEARER_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Write the document bytes to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Query preview metadata for a SharePoint document.
    Preview {
        url: String,

        #[arg(long, env = "CITE_BEARER_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<config::Config> {
    if !path.exists() && path == Path::new("./config/cite.toml") {
        tracing::debug!("no config file at {}, using defaults", path.display());
        return Ok(config::Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Parse {
            file,
            streaming,
            lookup,
            citations,
            html,
        } => {
            let lookup = commands::load_lookup(lookup.as_deref())?;
            commands::run_parse(&cfg, &file, streaming, &citations, &lookup, html)?;
        }
        Commands::Resolve { label, lookup } => {
            let lookup = commands::load_lookup(lookup.as_deref())?;
            commands::run_resolve(&cfg, &label, &lookup)?;
        }
        Commands::Fetch {
            label,
            lookup,
            token,
            output,
        } => {
            let lookup = commands::load_lookup(lookup.as_deref())?;
            commands::run_fetch(&cfg, &label, &lookup, token.as_deref(), output.as_deref())
                .await?;
        }
        Commands::Preview { url, token } => {
            commands::run_preview(&cfg, &url, token.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
