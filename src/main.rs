//! # csvrag
//!
//! Command-line front end for csv-rag.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csvrag ask "<question>" --csv <file>` | Index the file and answer the question |
//! | `csvrag retrieve "<query>" --csv <file>` | Index the file and print the top rows |
//! | `csvrag serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Only embed two columns
//! csvrag ask "what is yellow?" --csv fruit.csv --columns name,color
//!
//! # Machine-readable retrieval
//! csvrag retrieve "yellow" --csv fruit.csv --top-k 3 --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use csv_rag::{ask, config, logging, server};

/// Ask questions about the rows of a CSV file.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "csvrag",
    about = "Ask questions about the rows of a CSV file",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csvrag.toml")]
    config: PathBuf,

    /// Debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the rows of a CSV file.
    ///
    /// The file is indexed in memory, the most similar rows are retrieved,
    /// and the completion model answers from them.
    Ask {
        /// The question.
        query: String,

        /// CSV file to index.
        #[arg(long)]
        csv: PathBuf,

        /// Comma-separated columns to index. Defaults to every column.
        #[arg(long)]
        columns: Option<String>,

        /// Number of rows to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Completion API key. Falls back to the env var in `generation.api_key_env`.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Print the rows most similar to a query.
    Retrieve {
        /// The search query.
        query: String,

        /// CSV file to index.
        #[arg(long)]
        csv: PathBuf,

        /// Comma-separated columns to index. Defaults to every column.
        #[arg(long)]
        columns: Option<String>,

        /// Number of rows to retrieve (overrides `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the JSON HTTP server on `server.bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            query,
            csv,
            columns,
            top_k,
            api_key,
        } => {
            ask::run_ask(&cfg, &csv, columns.as_deref(), &query, top_k, api_key).await?;
        }
        Commands::Retrieve {
            query,
            csv,
            columns,
            top_k,
            json,
        } => {
            ask::run_retrieve(&cfg, &csv, columns.as_deref(), &query, top_k, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
