//! # gifbot CLI
//!
//! The `gifbot` binary manages the GIF corpus and runs the two front ends.
//!
//! ## Usage
//!
//! ```bash
//! gifbot --config ./config/gifbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gifbot init` | Create the SQLite database and run schema migrations |
//! | `gifbot add <name> <text>` | Register an asset file and its caption |
//! | `gifbot list` | List the corpus with cache state |
//! | `gifbot forget <id>` | Drop a cached remote handle so it is uploaded again |
//! | `gifbot search "<query>"` | Fuzzy search from the terminal |
//! | `gifbot serve web` | Start the web search front end |
//! | `gifbot serve bot` | Start the Telegram bot |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gifbot::{bot, config, corpus_cmd, logging, migrate, search, server};

/// gifbot: fuzzy GIF search for chat, with upload-once handle caching.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gifbot.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "gifbot", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gifbot.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Register an asset.
    ///
    /// `name` is the file name relative to `[assets].dir`.
    Add {
        name: String,
        /// Caption text the asset is searched by.
        text: String,
    },

    /// List every record in corpus order.
    List,

    /// Forget the cached remote handle of a record.
    ///
    /// Use after replacing an asset file: the next delivery uploads the new
    /// content once and caches the new handle.
    Forget { id: u64 },

    /// Fuzzy search the corpus.
    Search {
        query: String,

        /// Maximum number of results (0 = unlimited). Defaults to `[search].max_matches`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start a front end.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Web search page backend on `[server].bind`.
    Web,
    /// Telegram bot (requires a `[telegram]` section).
    Bot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add { name, text } => {
            corpus_cmd::run_add(&cfg, &name, &text).await?;
        }
        Commands::List => {
            corpus_cmd::run_list(&cfg).await?;
        }
        Commands::Forget { id } => {
            corpus_cmd::run_forget(&cfg, id).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Web => {
                server::run_server(&cfg).await?;
            }
            ServeService::Bot => {
                bot::run_bot(&cfg).await?;
            }
        },
    }

    Ok(())
}
