mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use opsdesk_agent::Agent;
use opsdesk_ai::ChatClient;
use opsdesk_core::JsonlSink;
use opsdesk_store::{PolicyCorpus, SqliteStore};

const DEMO_POLICIES: &str = "\
# Business Policies

## VIP Customers
A customer qualifies as VIP when they have spent over $1000 in the last
12 months.

## Refunds
Refunds are accepted within 30 days of delivery. A 10% restocking fee
applies to opened items. Final-sale items are not refundable.

## Shipping
Standard shipping takes 3-5 business days. Orders over $50 ship free.
Expedited shipping is available for a flat $15 fee.
";

#[derive(Parser)]
#[command(name = "opsdesk", version, about = "Natural-language business Q&A")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one natural-language question.
    Ask {
        /// The question to answer.
        query: String,
        /// SQLite database file.
        #[arg(long, default_value = "opsdesk.db")]
        db: PathBuf,
        /// Policy markdown document.
        #[arg(long, default_value = "policies.md")]
        docs: PathBuf,
        /// Append trace events to this JSONL file.
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Print the full response envelope as JSON.
        #[arg(long)]
        json: bool,
        /// Print the trace after the answer.
        #[arg(long)]
        show_trace: bool,
        /// OpenAI-compatible inference endpoint.
        #[arg(long, env = "OPSDESK_BASE_URL", default_value = "http://localhost:11434")]
        base_url: String,
        /// Model name passed to the endpoint.
        #[arg(long, env = "OPSDESK_MODEL", default_value = "llama3.1")]
        model: String,
        /// Bearer token for the endpoint, if it needs one.
        #[arg(long, env = "OPSDESK_API_KEY")]
        api_key: Option<String>,
    },
    /// Create the demo database and policy document.
    Seed {
        /// Directory to write opsdesk.db and policies.md into.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Ask {
            query,
            db,
            docs,
            trace,
            json,
            show_trace,
            base_url,
            model,
            api_key,
        } => {
            ask(
                &query, &db, &docs, trace, json, show_trace, base_url, model, api_key,
            )
            .await
        }
        Command::Seed { dir } => seed(&dir),
    }
}

#[allow(clippy::too_many_arguments)]
async fn ask(
    query: &str,
    db: &PathBuf,
    docs: &PathBuf,
    trace: Option<PathBuf>,
    json: bool,
    show_trace: bool,
    base_url: String,
    model: String,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let store = SqliteStore::open_read_only(db)
        .with_context(|| format!("opening database {}", db.display()))?;
    let completion = Arc::new(ChatClient::new(base_url, model, api_key));

    let mut agent = Agent::new(Arc::new(store), completion);
    match PolicyCorpus::load(docs) {
        Ok(corpus) => agent = agent.with_corpus(Arc::new(corpus)),
        Err(err) => warn!(%err, "continuing without policy corpus"),
    }
    if let Some(path) = trace {
        let sink = JsonlSink::open(&path)
            .with_context(|| format!("opening trace log {}", path.display()))?;
        agent = agent.with_sink(Arc::new(sink));
    }

    let response = agent.process(query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    println!("{}", display::render(&response));
    if show_trace {
        println!("\ntrace:\n{}", display::render_trace(&response.trace));
    }
    Ok(())
}

fn seed(dir: &PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;

    let db = dir.join("opsdesk.db");
    let store =
        SqliteStore::open(&db).with_context(|| format!("creating {}", db.display()))?;
    store.seed_demo().context("seeding demo data")?;
    info!(path = %db.display(), "seeded demo database");

    let docs = dir.join("policies.md");
    std::fs::write(&docs, DEMO_POLICIES)
        .with_context(|| format!("writing {}", docs.display()))?;
    info!(path = %docs.display(), "wrote demo policies");

    println!("seeded {} and {}", db.display(), docs.display());
    Ok(())
}
