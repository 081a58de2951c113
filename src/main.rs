//! # QA Harness CLI (`qa-harness`)
//!
//! Runs the HTTP API or drives the same pipeline from the command line.
//!
//! ## Usage
//!
//! ```bash
//! qa-harness --config ./config/qa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qa-harness serve` | Sweep stale sessions, then start the HTTP API |
//! | `qa-harness session new` | Print a fresh session id |
//! | `qa-harness session delete <id>` | Drop a session's uploads and collection |
//! | `qa-harness ingest --session <id> <files…>` | Upload and index documents |
//! | `qa-harness tests --session <id> "<query>"` | Generate a test-case table |
//! | `qa-harness script --session <id> "<test case>"` | Generate a Selenium script |
//! | `qa-harness sweep` | Remove sessions idle past the timeout |
//!
//! ## Examples
//!
//! ```bash
//! SESSION=$(qa-harness session new)
//! qa-harness ingest --session "$SESSION" docs/rules.md site/checkout.html
//! qa-harness tests --session "$SESSION" "discount code feature"
//! qa-harness script --session "$SESSION" "TC-01: apply SAVE10 at checkout"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qa_harness::{commands, config, server};

/// QA Harness: session-scoped retrieval-augmented test-case and Selenium
/// script generation.
#[derive(Parser)]
#[command(
    name = "qa-harness",
    about = "QA Harness: generate test cases and Selenium scripts from your own documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/qa.toml`. See `config/qa.example.toml`.
    #[arg(long, global = true, default_value = "./config/qa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Sweeps stale sessions once, then serves `/api` on `[server].bind`.
    Serve,

    /// Create or delete sessions.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Upload files into a session and index them.
    Ingest {
        /// Session id (see `session new`).
        #[arg(long)]
        session: String,

        /// Files to ingest (.pdf, .md, .html, .txt, .json).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate a markdown test-case table from the session's documents.
    Tests {
        #[arg(long)]
        session: String,

        /// What to test, e.g. "discount code feature".
        query: String,
    },

    /// Generate a Python Selenium script for one test case.
    Script {
        #[arg(long)]
        session: String,

        /// HTML page to target. Defaults to the first `.html` file uploaded
        /// to the session.
        #[arg(long)]
        html: Option<PathBuf>,

        /// The test case to automate.
        test_case: String,
    },

    /// Remove sessions idle longer than `[session].timeout_minutes`.
    Sweep,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Print a new session id.
    New,
    /// Delete a session's uploads and vector collection.
    Delete {
        /// Session id.
        id: String,
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

    // Commands that don't require config
    if let Commands::Session {
        action: SessionAction::New,
    } = &cli.command
    {
        return commands::run_session_new();
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Session { action } => match action {
            SessionAction::Delete { id } => {
                commands::run_session_delete(&cfg, &id).await?;
            }
            SessionAction::New => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Ingest { session, files } => {
            commands::run_ingest(&cfg, &session, &files).await?;
        }
        Commands::Tests { session, query } => {
            commands::run_tests(&cfg, &session, &query).await?;
        }
        Commands::Script {
            session,
            html,
            test_case,
        } => {
            commands::run_script(&cfg, &session, html.as_deref(), &test_case).await?;
        }
        Commands::Sweep => {
            commands::run_sweep(&cfg).await?;
        }
    }

    Ok(())
}
