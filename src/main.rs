//! # Grounding KB CLI (`kb`)
//!
//! The `kb` binary manages per-agent PDF knowledge bases: creating the
//! directory layout, adding source PDFs, building indexes, checking status,
//! searching, and starting the retrieval server.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb init` | Create the raw PDF directory for every agent and the processed directory |
//! | `kb status` | Show PDFs, passages and build time per agent |
//! | `kb build <agent\|all>` | Extract, chunk, embed and persist an agent's index |
//! | `kb add <agent> <pdf>...` | Copy PDFs into an agent's source directory |
//! | `kb cleanup <agent>` | Delete an agent's index (source PDFs are kept) |
//! | `kb search <agent> "<query>"` | Search one agent's knowledge base |
//! | `kb serve` | Start the HTTP retrieval server |
//!
//! ## Examples
//!
//! ```bash
//! # Create directories for all configured agents
//! kb init --config ./config/kb.toml
//!
//! # Add guidelines to the maternal health agent and build it
//! kb add maaya ./who_anc_guidelines.pdf
//! kb build maaya
//!
//! # Rebuild everything, even agents that already have an index
//! kb build all --force --progress json
//!
//! # Search by topic alias
//! kb search maternal "iron and folic acid supplements" --top-k 3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use grounding_kb::config;
use grounding_kb::embedding::create_provider;
use grounding_kb::ingest::{self, BuildOutcome};
use grounding_kb::progress::ProgressMode;
use grounding_kb::{search, server, stats};

/// Grounding KB CLI: per-agent PDF knowledge bases with page-level citations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Grounding KB: per-agent PDF knowledge bases with page-level citations",
    version,
    long_about = "Grounding KB extracts page-attributed text from each agent's PDFs, splits it \
    into overlapping passages, embeds them into a per-agent vector index, and serves \
    similarity search results as citations naming document and pages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kb.toml`. A missing file is an error; every
    /// section inside it is optional.
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    /// Build progress reporting on stderr: `auto`, `human`, `json`, or `off`.
    ///
    /// `auto` shows human progress when stderr is a terminal.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the directory layout.
    ///
    /// Creates `<raw_pdfs>/<agent>` for every configured agent plus the
    /// processed directory. Safe to run repeatedly.
    Init,

    /// Show knowledge base status for every agent.
    Status {
        /// Print machine-readable JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Build an agent's knowledge base from its PDFs.
    ///
    /// Accepts an agent name, a topic alias, or `all`. Agents that already
    /// have an index are skipped unless `--force` is given.
    Build {
        /// Agent name, alias, or `all`.
        agent: String,

        /// Rebuild even if an index already exists.
        #[arg(long)]
        force: bool,
    },

    /// Copy PDFs into an agent's source directory.
    Add {
        /// Agent name or alias.
        agent: String,

        /// PDF files to add.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Delete an agent's index. Source PDFs are not touched.
    Cleanup {
        /// Agent name or alias.
        agent: String,
    },

    /// Search one agent's knowledge base.
    Search {
        /// Agent name or alias.
        agent: String,

        /// Free-text question.
        query: String,

        /// Maximum number of citations (defaults to the agent's configured `top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum cosine similarity (defaults to the agent's configured value).
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Print citations as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP retrieval server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(progress_mode) = ProgressMode::parse(&cli.progress) else {
        anyhow::bail!(
            "Invalid --progress value '{}'. Expected auto, human, json, or off.",
            cli.progress
        );
    };

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let created = ingest::init_dirs(&cfg)?;
            for dir in &created {
                println!("  {}", dir.display());
            }
            println!("Knowledge base directories initialized.");
        }
        Commands::Status { json } => {
            let statuses = stats::all_status(&cfg)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                stats::print_status(&statuses);
            }
        }
        Commands::Build { agent, force } => {
            let provider = create_provider(&cfg.embedding)?;
            let reporter = progress_mode.reporter();

            let outcomes = if agent == "all" {
                ingest::build_all(&cfg, provider.as_ref(), force, reporter.as_ref())
            } else {
                let outcome =
                    ingest::build_agent(&cfg, provider.as_ref(), &agent, force, reporter.as_ref())?;
                vec![(agent, outcome)]
            };

            let mut failed = 0usize;
            for (name, outcome) in &outcomes {
                match outcome {
                    BuildOutcome::Built(s) => println!(
                        "{}: built {} passages from {} documents ({} skipped) in {} ms",
                        name,
                        s.passages,
                        s.documents,
                        s.skipped_files.len(),
                        s.elapsed_ms
                    ),
                    BuildOutcome::Skipped { reason } => println!("{}: skipped ({})", name, reason),
                    BuildOutcome::Failed { reason } => {
                        failed += 1;
                        println!("{}: failed ({})", name, reason)
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} builds failed", failed, outcomes.len());
            }
        }
        Commands::Add { agent, paths } => {
            let copied = ingest::add_pdfs(&cfg, &agent, &paths)?;
            println!("Added {} of {} file(s).", copied.len(), paths.len());
        }
        Commands::Cleanup { agent } => {
            if ingest::cleanup_agent(&cfg, &agent)? {
                println!("Removed index for '{}'.", agent);
            } else {
                println!("No index for '{}'.", agent);
            }
        }
        Commands::Search {
            agent,
            query,
            top_k,
            min_similarity,
            json,
        } => {
            search::run_search(&cfg, &agent, &query, top_k, min_similarity, json)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
