//! # Asha CLI (`asha`)
//!
//! Runs the Asha career assistant: the HTTP API for the chat front end,
//! one-shot questions from the terminal, and index maintenance.
//!
//! ## Usage
//!
//! ```bash
//! asha --config ./config/asha.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `asha serve` | Warm the index and start the HTTP API |
//! | `asha ask "<question>"` | Answer one question and print it |
//! | `asha index build` | Load the persisted index, or build it from the corpus |
//! | `asha index rebuild` | Rebuild the index from the corpus unconditionally |
//! | `asha index status` | Show what is persisted in the index directory |
//! | `asha seed` | Write any missing sample corpus files |
//!
//! ## Examples
//!
//! ```bash
//! # Populate the corpus directory and build the index
//! asha seed
//! asha index build
//!
//! # Ask a question focused on job listings
//! asha ask "Are there remote developer roles?" --context-type jobs
//!
//! # Start the API on the configured bind address
//! asha serve
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use asha::chat::AppContext;
use asha::config;
use asha::conversation::Conversation;
use asha::embedding;
use asha::index::{IndexStore, KnowledgeBase};
use asha::logging;
use asha::prompt::ContextType;
use asha::samples;
use asha::server;

/// Asha — a retrieval-augmented career assistant for Indian women.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without one, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "asha",
    about = "Asha — a retrieval-augmented career assistant",
    version,
    long_about = "Asha answers questions about careers, job listings, community events, \
    mentorship programs and government schemes. It retrieves relevant passages from a local \
    corpus and asks a hosted language model to answer with them as context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/asha.toml`. A missing file falls back to
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/asha.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// Loads or builds the index first; if that fails the server still
    /// starts and retries on the first request.
    Serve,

    /// Answer a single question and print the response.
    Ask {
        /// The question to ask.
        query: String,

        /// Topic focus: all, jobs, events, mentorship, schemes.
        #[arg(long, default_value = "all")]
        context_type: String,
    },

    /// Manage the persisted similarity index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Write built-in sample files for any corpus files that are missing.
    Seed,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Load the persisted index, building it from the corpus if needed.
    Build,
    /// Rebuild the index from the corpus, replacing any persisted copy.
    Rebuild,
    /// Show the persisted index's model and entry count.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (cfg, from_file) = config::load_or_default(&cli.config)?;
    logging::init(&cfg.logging);
    if !from_file {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found; using built-in defaults"
        );
    }

    match cli.command {
        Commands::Serve => {
            let ctx = AppContext::from_config(cfg).await?;
            server::run_server(Arc::new(ctx)).await?;
        }
        Commands::Ask {
            query,
            context_type,
        } => {
            if query.trim().is_empty() {
                anyhow::bail!("query must not be empty");
            }
            let ctx = AppContext::from_config(cfg).await?;
            let mut conversation = Conversation::new();
            let (answer, ids) = ctx
                .respond(&mut conversation, &query, ContextType::parse(&context_type))
                .await?;
            println!("{}", answer);
            tracing::debug!(
                conversation_id = %ids.conversation_id,
                message_id = %ids.message_id,
                "answered"
            );
        }
        Commands::Index { action } => match action {
            IndexAction::Build => {
                let kb = knowledge_base(&cfg)?;
                let index = kb.ensure_ready().await?;
                println!(
                    "Index ready: {} entries (model {}) in {}",
                    index.len(),
                    index.model(),
                    cfg.index.dir.display()
                );
            }
            IndexAction::Rebuild => {
                let kb = knowledge_base(&cfg)?;
                let index = kb.rebuild().await?;
                println!(
                    "Index rebuilt: {} entries (model {}) in {}",
                    index.len(),
                    index.model(),
                    cfg.index.dir.display()
                );
            }
            IndexAction::Status => {
                let store = IndexStore::new(&cfg.index.dir);
                match store
                    .load()
                    .await
                    .with_context(|| format!("reading index in {}", cfg.index.dir.display()))?
                {
                    Some(index) => println!(
                        "{}: {} entries, model {}",
                        cfg.index.dir.display(),
                        index.len(),
                        index.model()
                    ),
                    None => println!("{}: no persisted index", cfg.index.dir.display()),
                }
            }
        },
        Commands::Seed => {
            let created = samples::seed_missing(&cfg.corpus.root);
            if created.is_empty() {
                println!("All sample files already present.");
            } else {
                for path in created {
                    println!("Created {}", path.display());
                }
            }
        }
    }

    Ok(())
}

fn knowledge_base(cfg: &config::Config) -> anyhow::Result<KnowledgeBase> {
    let embedder = embedding::create_embedder(&cfg.embedding)?;
    Ok(KnowledgeBase::new(cfg, embedder))
}
