use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use conclave::agents::command::check_command_available;
use conclave::memory::{DecisionMemory, MaintenanceLoop};
use conclave::models::{ConclaveConfig, MarketContext, PerformanceEvaluation};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "conclave", about = "Multi-agent voting and consensus arbitration")]
struct Cli {
    /// Path to configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Arbitrate one MarketContext, or a JSON array of them, into decisions
    Decide {
        /// Read MarketContext JSON from a file instead of stdin
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Record how a past decision played out
    Evaluate {
        #[arg(long)]
        decision: Uuid,
        /// Realized return as a fraction (0.04 = +4%)
        #[arg(long, allow_hyphen_values = true)]
        outcome: f64,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List remembered items relevant to a MarketContext
    Recall {
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run one compaction pass over the decision memory
    Compact,
    /// Compact the decision memory periodically until interrupted
    Maintain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Decide { input } => {
            if let Some(program) = &config.knowledge.command {
                if !check_command_available(program).await {
                    tracing::warn!(program = %program, "Knowledge command unavailable; lookups will fail");
                }
            }

            let contexts = read_contexts(input.as_deref())?;
            let arbiter = conclave::build_arbiter(&config).context("Failed to build arbiter")?;
            let timeout = conclave::request_timeout(&config);

            for context in &contexts {
                let decision = conclave::decide(&arbiter, context, timeout).await;
                emit(&decision, cli.pretty)?;
            }
        }
        Command::Evaluate {
            decision,
            outcome,
            notes,
        } => {
            let arbiter = conclave::build_arbiter(&config).context("Failed to build arbiter")?;
            let mut evaluation = PerformanceEvaluation::new(decision, outcome);
            if let Some(notes) = &notes {
                evaluation = evaluation.with_notes(notes);
            }
            arbiter
                .record_evaluation(evaluation.clone())
                .with_context(|| format!("Failed to record evaluation for {decision}"))?;
            emit(&evaluation, cli.pretty)?;
        }
        Command::Recall { input, limit } => {
            let memory = open_memory(&config)?;
            let limit = limit.unwrap_or(config.memory.recall_limit);
            for context in read_contexts(input.as_deref())? {
                let items = memory
                    .recall(&context, limit)
                    .with_context(|| format!("Failed to recall for {}", context.subject))?;
                emit(&items, cli.pretty)?;
            }
        }
        Command::Compact => {
            let memory = open_memory(&config)?;
            let stats = memory.compact(Utc::now()).context("Compaction failed")?;
            emit(&stats, cli.pretty)?;
        }
        Command::Maintain => {
            let memory = Arc::new(open_memory(&config)?);
            let maintenance = MaintenanceLoop::new(memory);

            let cancel = maintenance.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, shutting down");
                    cancel.cancel();
                }
            });

            let passes = maintenance.run().await;
            tracing::info!(passes, "Maintenance stopped");
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ConclaveConfig> {
    let Some(path) = path else {
        return Ok(ConclaveConfig::default());
    };
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| format!("Failed to parse config: {path}"))
}

fn open_memory(config: &ConclaveConfig) -> Result<DecisionMemory> {
    if config.memory.sqlite_path.is_none() {
        tracing::warn!("memory.sqlite_path is not set; operating on an empty in-process memory");
    }
    DecisionMemory::open(config.memory.clone()).context("Failed to open decision memory")
}

/// A single MarketContext object or an array of them.
fn read_contexts(input: Option<&str>) -> Result<Vec<MarketContext>> {
    let json = if let Some(input_path) = input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let value: serde_json::Value =
        serde_json::from_str(&json).context("Failed to parse input JSON")?;
    if value.is_array() {
        serde_json::from_value(value).context("Failed to parse MarketContext array")
    } else {
        let context = serde_json::from_value(value).context("Failed to parse MarketContext")?;
        Ok(vec![context])
    }
}

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}
