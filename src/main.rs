//! # Memo Router CLI (`memo`)
//!
//! The `memo` binary is the primary interface for Memo Router. It provides
//! commands for scaffolding configuration, running the webhook server,
//! classifying text offline, simulating bucket handlers, and inspecting the
//! note index and review queue.
//!
//! ## Usage
//!
//! ```bash
//! memo --config ./config/memo.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `memo init` | Write a starter configuration file |
//! | `memo serve` | Start the webhook HTTP server |
//! | `memo classify "<text>"` | Classify text and print the bucket |
//! | `memo simulate <bucket>` | Run a bucket handler against sample text |
//! | `memo notes <get\|search\|recent>` | Inspect the note index |
//! | `memo reviews <list\|stats\|assign\|dismiss>` | Manage the review queue |

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use memo_router::actions::{dispatch, HandlerContext};
use memo_router::classify;
use memo_router::config::{self, Config};
use memo_router::index::{short_hash, NoteIndex};
use memo_router::models::{Bucket, Note};
use memo_router::review::ReviewQueue;
use memo_router::server;

/// Memo Router CLI — a webhook pipeline that classifies voice memos and
/// routes them to reminders, CRM updates, and daily journals.
#[derive(Parser)]
#[command(
    name = "memo",
    about = "Memo Router — classify and route voice-memo transcriptions",
    version,
    long_about = "Memo Router receives voice-memo webhook payloads, classifies each memo into a \
    bucket (PERSONAL, TTL, COMCAST) via keyword matching, stores it in a flat-file index keyed \
    by a short content hash, and routes it to bucket-specific side effects: reminders, CRM notes \
    and tasks, and a daily markdown journal. Unmatched sales memos land in a manual review queue."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/memo.toml`. All data, server, CRM, and
    /// notification settings are read from this file.
    #[arg(long, global = true, default_value = "./config/memo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file.
    ///
    /// Creates the file at the `--config` path with commented defaults.
    /// Refuses to overwrite an existing file.
    Init,

    /// Start the webhook HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// webhook, note lookup, and review-queue endpoints.
    Serve,

    /// Classify text and print the resulting bucket.
    ///
    /// Runs the same three-tier keyword matcher the webhook path uses,
    /// without storing anything.
    Classify {
        /// The memo text to classify.
        text: String,
    },

    /// Run a bucket handler against sample text without a webhook.
    ///
    /// Builds a note from the given summary/transcription, dispatches it to
    /// the named bucket's handler, and prints the action result as JSON.
    /// Uses the configured backends; with the CRM disabled (the default)
    /// all CRM effects resolve as skipped.
    Simulate {
        /// Target bucket: `personal`, `ttl`, or `comcast`.
        bucket: String,

        /// Memo summary text.
        #[arg(long, default_value = "")]
        summary: String,

        /// Memo transcription text.
        #[arg(long, default_value = "")]
        transcription: String,
    },

    /// Inspect the note index.
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },

    /// Manage the review queue.
    Reviews {
        #[command(subcommand)]
        action: ReviewsAction,
    },
}

/// Note index subcommands.
#[derive(Subcommand)]
enum NotesAction {
    /// Look up a note by its short hash.
    Get {
        /// The note hash (e.g. `p-a1b2c3d`).
        hash: String,
    },

    /// Search note summaries by substring.
    Search {
        /// The search query string.
        query: String,

        /// Filter to a bucket: `personal`, `ttl`, or `comcast`.
        #[arg(long)]
        bucket: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List the most recent notes.
    Recent {
        /// Filter to a bucket: `personal`, `ttl`, or `comcast`.
        #[arg(long)]
        bucket: Option<String>,

        /// Maximum number of results to return.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Review queue subcommands.
#[derive(Subcommand)]
enum ReviewsAction {
    /// List pending review entries with their suggested matches.
    List,

    /// Print queue counts by status.
    Stats,

    /// Assign a review entry to a business.
    Assign {
        /// The review entry id (e.g. `review-<uuid>`).
        id: String,

        /// The visit id to link the note to.
        #[arg(long)]
        visit_id: String,

        /// The business name to record on the assignment.
        #[arg(long)]
        business: String,
    },

    /// Dismiss a review entry.
    Dismiss {
        /// The review entry id.
        id: String,
    },
}

const CONFIG_TEMPLATE: &str = r#"# Memo Router configuration.

[data]
# Directory holding the note index and review queue flat files.
dir = "./data"

[server]
bind = "127.0.0.1:7410"
# Shared secret checked against the x-webhook-secret header. When unset,
# all requests pass.
# webhook_secret = "change-me"
rate_limit_requests = 10
rate_limit_window_secs = 60

[crm]
# Set disabled = false and provide a token (or MEMO_CRM_TOKEN) to enable
# CRM note and task creation.
disabled = true
# token = ""
# location_id = ""

[visits]
# Candidate pool for business matching: a JSON file or an HTTP endpoint.
# path = "./data/visits.json"
# url = "https://example.com/visits"

[notify]
# Backend: log, command, or webhook.
backend = "log"
# target = "operator"

[journal]
dir = "./journal"
"#;

fn write_config_template(path: &PathBuf) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    println!("Wrote starter config to {}", path.display());
    Ok(())
}

fn parse_bucket_arg(raw: &str) -> Result<Bucket> {
    Bucket::parse(raw)
        .with_context(|| format!("Unknown bucket: '{}'. Must be personal, ttl, or comcast.", raw))
}

fn parse_bucket_filter(raw: Option<&str>) -> Result<Option<Bucket>> {
    raw.map(parse_bucket_arg).transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Init => {
            return write_config_template(&cli.config);
        }
        Commands::Classify { text } => {
            let bucket = classify::classify_text(text, "");
            println!("Bucket: {}", bucket);
            for (bucket, score) in classify::fallback_scores(text) {
                println!("  {:<8} {}", bucket, score);
            }
            return Ok(());
        }
        _ => {}
    }

    // Simulate falls back to a minimal config so it works before `init`.
    let cfg = match &cli.command {
        Commands::Simulate { .. } => {
            config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal())
        }
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
        Commands::Simulate {
            bucket,
            summary,
            transcription,
        } => {
            let bucket = parse_bucket_arg(&bucket)?;
            let timestamp = Utc::now();
            let note = Note {
                recording_id: "rec_simulated".to_string(),
                timestamp,
                summary,
                transcription,
                hash: short_hash("rec_simulated", &timestamp.to_rfc3339()),
                source: "cli".to_string(),
            };

            let ctx = HandlerContext::from_config(Arc::new(cfg))?;
            let result = dispatch(&ctx, bucket, &note).await;
            print_json(&result)?;
        }
        Commands::Notes { action } => {
            let index = NoteIndex::load(&cfg.data.index_file())?;
            match action {
                NotesAction::Get { hash } => match index.lookup(&hash) {
                    Some(meta) => print_json(meta)?,
                    None => anyhow::bail!("No note with hash {}", hash),
                },
                NotesAction::Search {
                    query,
                    bucket,
                    limit,
                } => {
                    let bucket = parse_bucket_filter(bucket.as_deref())?;
                    let mut results = index.search(&query, bucket);
                    if let Some(limit) = limit {
                        results.truncate(limit);
                    }
                    print_json(&results)?;
                }
                NotesAction::Recent { bucket, limit } => {
                    let bucket = parse_bucket_filter(bucket.as_deref())?;
                    print_json(&index.recent(limit, bucket))?;
                }
            }
        }
        Commands::Reviews { action } => {
            let mut queue = ReviewQueue::load(&cfg.data.queue_file())?;
            match action {
                ReviewsAction::List => {
                    print_json(&queue.pending())?;
                }
                ReviewsAction::Stats => {
                    print_json(&queue.stats())?;
                }
                ReviewsAction::Assign {
                    id,
                    visit_id,
                    business,
                } => match queue.assign(&id, &visit_id, &business)? {
                    Some(entry) => print_json(&entry)?,
                    None => anyhow::bail!("No review entry with id {}", id),
                },
                ReviewsAction::Dismiss { id } => match queue.dismiss(&id)? {
                    Some(entry) => print_json(&entry)?,
                    None => anyhow::bail!("No review entry with id {}", id),
                },
            }
        }
        Commands::Init | Commands::Classify { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
