//! # pagetree CLI (`ptree`)
//!
//! ## Usage
//!
//! ```bash
//! ptree --config ./config/pagetree.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ptree init` | Create the SQLite database and run schema migrations |
//! | `ptree ingest <node_id>` | Walk a Notion page tree and index its chunks |
//! | `ptree search "<query>"` | Search indexed chunks |
//! | `ptree seed` | Load the demo corpus |
//! | `ptree clear` | Delete every indexed chunk |
//! | `ptree stats` | Show index statistics |
//! | `ptree embed pending` | Backfill missing or stale embeddings |
//! | `ptree embed rebuild` | Delete and regenerate all embeddings |
//! | `ptree serve` | Start the HTTP server |
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). Command
//! output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pagetree::{config, embed_cmd, ingest, migrate, search, seed, server, stats};

/// pagetree CLI: hierarchy-aware chunking and retrieval for Notion page
/// trees.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pagetree.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ptree",
    about = "pagetree: hierarchy-aware chunking and retrieval for Notion page trees",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pagetree.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Walk a page tree and index its chunks.
    ///
    /// Every page reached from the entry page is re-chunked; its previous
    /// chunks are replaced. Requires the Notion secret in the environment.
    Ingest {
        /// Notion page id of the entry node.
        node_id: String,

        /// Walk and count without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// With --dry-run, print the chunks as JSON.
        #[arg(long)]
        print: bool,
    },

    /// Search indexed chunks.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Load the demo corpus (idempotent).
    Seed,

    /// Delete every indexed chunk.
    Clear,

    /// Show index statistics.
    Stats,

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed chunks that are missing or have stale embeddings.
    Pending {
        /// Maximum number of chunks to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate all embeddings.
    Rebuild {
        /// Override the batch size from config (number of texts per API call).
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            node_id,
            dry_run,
            print,
        } => {
            ingest::run_ingest(&cfg, &node_id, dry_run, print).await?;
        }
        Commands::Search { query, top_k } => {
            search::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Seed => {
            seed::run_seed(&cfg).await?;
        }
        Commands::Clear => {
            seed::run_clear(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                limit,
                batch_size,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, limit, batch_size, dry_run).await?;
            }
            EmbedAction::Rebuild { batch_size } => {
                embed_cmd::run_embed_rebuild(&cfg, batch_size).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
