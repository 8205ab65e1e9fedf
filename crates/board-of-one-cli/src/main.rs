//! Command-line demo runner for the deliberation core.
//!
//! Runs a session against [`board_of_one::broker::StubBroker`] and
//! [`board_of_one::embeddings::HashEmbedding`] so the whole decompose →
//! deliberate → vote → synthesize flow can be exercised without a live model
//! provider, and prints the event stream as it arrives.

use anyhow::{Context, Result};
use board_of_one::broker::StubBroker;
use board_of_one::checkpoint::{CheckpointStore, FileCheckpointStore};
use board_of_one::embeddings::HashEmbedding;
use board_of_one::events::{Event, EventBody, EventSink};
use board_of_one::model::{Perspective, Persona, PersonaCatalog};
use board_of_one::{Config, Options, SessionManager, SessionOutcome, SessionStatus};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "board-of-one")]
#[command(about = "Run a multi-expert deliberation session against a stub broker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deliberation session to completion and print the result.
    Run(RunArgs),
    /// Print a progress snapshot for a checkpointed session.
    Status(StatusArgs),
    /// Print a checkpointed session's transcript, round by round.
    Replay(ReplayArgs),
}

#[derive(clap::Args)]
struct StatusArgs {
    /// The session id to inspect.
    session_id: String,
    /// Directory the session's checkpoints were written to.
    #[arg(long)]
    checkpoint_dir: std::path::PathBuf,
}

#[derive(clap::Args)]
struct ReplayArgs {
    /// The session id to replay.
    session_id: String,
    /// Directory the session's checkpoints were written to.
    #[arg(long)]
    checkpoint_dir: std::path::PathBuf,
}

#[derive(clap::Args)]
struct RunArgs {
    /// The decision statement to deliberate on.
    statement: String,
    /// Optional freeform context.
    #[arg(long)]
    context: Option<String>,
    /// Skip the decomposer and force exactly this many sub-problems (1-5).
    #[arg(long)]
    sub_problems: Option<u32>,
    /// Hard cost ceiling for the session, in USD.
    #[arg(long)]
    max_cost: Option<f64>,
    /// Directory to write checkpoints under; defaults to an in-memory store.
    #[arg(long)]
    checkpoint_dir: Option<std::path::PathBuf>,
    /// Emit the final result as JSON rather than a formatted summary.
    #[arg(long)]
    json: bool,
}

/// Stock persona panel used by the demo; a real deployment loads these from
/// a catalog service instead.
fn demo_catalog() -> PersonaCatalog {
    PersonaCatalog::new(vec![
        Persona {
            code: "cfo".to_string(),
            name: "Chief Financial Officer".to_string(),
            system_prompt: "You weigh cost, runway, and financial risk above all else.".to_string(),
            default_temperature: 0.6,
            traits: [("risk_tolerance".to_string(), 0.3), ("formality".to_string(), 0.8)]
                .into_iter()
                .collect(),
            domain_tags: vec!["finance".to_string(), "budgeting".to_string()],
            perspective: Perspective::Strategic,
        },
        Persona {
            code: "cto".to_string(),
            name: "Chief Technology Officer".to_string(),
            system_prompt: "You weigh technical feasibility, scalability, and engineering risk.".to_string(),
            default_temperature: 0.7,
            traits: [("risk_tolerance".to_string(), 0.6), ("formality".to_string(), 0.4)]
                .into_iter()
                .collect(),
            domain_tags: vec!["engineering".to_string(), "architecture".to_string()],
            perspective: Perspective::Execution,
        },
        Persona {
            code: "coo".to_string(),
            name: "Chief Operating Officer".to_string(),
            system_prompt: "You weigh operational readiness, staffing, and execution risk.".to_string(),
            default_temperature: 0.6,
            traits: [("risk_tolerance".to_string(), 0.4), ("formality".to_string(), 0.6)]
                .into_iter()
                .collect(),
            domain_tags: vec!["operations".to_string()],
            perspective: Perspective::Tactical,
        },
        Persona {
            code: "customer_advocate".to_string(),
            name: "Customer Advocate".to_string(),
            system_prompt: "You weigh customer impact and adoption risk above internal convenience.".to_string(),
            default_temperature: 0.8,
            traits: [("risk_tolerance".to_string(), 0.5), ("formality".to_string(), 0.3)]
                .into_iter()
                .collect(),
            domain_tags: vec!["customer".to_string(), "product".to_string()],
            perspective: Perspective::Tactical,
        },
        Persona {
            code: "legal_counsel".to_string(),
            name: "Legal Counsel".to_string(),
            system_prompt: "You weigh regulatory, contractual, and liability risk.".to_string(),
            default_temperature: 0.4,
            traits: [("risk_tolerance".to_string(), 0.1), ("formality".to_string(), 0.9)]
                .into_iter()
                .collect(),
            domain_tags: vec!["legal".to_string(), "compliance".to_string()],
            perspective: Perspective::Strategic,
        },
    ])
}

/// Prints each event to stdout as it's emitted, colored by category.
struct ConsoleEventSink;

#[async_trait::async_trait]
impl EventSink for ConsoleEventSink {
    async fn emit(&self, event: Event) {
        print_event(&event);
    }
}

fn print_event(event: &Event) {
    let prefix = format!("[{:>3}]", event.sequence).dimmed();
    match &event.body {
        EventBody::DecompositionComplete { sub_problems } => {
            println!("{prefix} {} {} sub-problems", "decomposed into".blue(), sub_problems.len());
        }
        EventBody::PersonasSelected { persona_codes, .. } => {
            println!("{prefix} {} {}", "personas selected:".blue(), persona_codes.join(", "));
        }
        EventBody::RoundStarted { round_number, phase, selected_personas } => {
            println!(
                "{prefix} {} round {round_number} ({phase:?}) — {}",
                "round started:".cyan(),
                selected_personas.join(", ")
            );
        }
        EventBody::Contribution { persona_code, content, .. } => {
            let speaker = persona_code.as_deref().unwrap_or("system");
            println!("{prefix} {}: {}", speaker.green().bold(), content);
        }
        EventBody::ContributionFiltered { persona_code, max_similarity, .. } => {
            println!(
                "{prefix} {} {} (similarity {max_similarity:.2})",
                "filtered duplicate from".yellow(),
                persona_code.as_deref().unwrap_or("system")
            );
        }
        EventBody::FacilitatorDecision { action, reasoning } => {
            println!("{prefix} {} {action:?} — {reasoning}", "facilitator:".magenta());
        }
        EventBody::ModeratorIntervention { moderator_type, content } => {
            println!("{prefix} {} {moderator_type:?}: {content}", "moderator".yellow().bold());
        }
        EventBody::ResearchComplete { query, key_findings } => {
            println!("{prefix} {} \"{query}\" -> {}", "research:".blue(), key_findings.join("; "));
        }
        EventBody::VotingStarted { .. } => println!("{prefix} {}", "voting started".cyan()),
        EventBody::PersonaVote { persona_code, recommendation, confidence, .. } => {
            println!("{prefix} {} votes {recommendation} ({confidence:?})", persona_code.green());
        }
        EventBody::VotingComplete { consensus_level, .. } => {
            println!("{prefix} {} consensus {consensus_level:.2}", "voting complete:".cyan());
        }
        EventBody::SynthesisComplete { synthesis_text, .. } => {
            println!("{prefix} {}\n{synthesis_text}", "synthesis:".bold());
        }
        EventBody::SubproblemComplete { result_summary } => {
            println!("{prefix} {} {result_summary}", "sub-problem complete:".bold());
        }
        EventBody::MetaSynthesisComplete { unified_recommendation, .. } => {
            println!("{prefix} {}\n{unified_recommendation}", "meta-synthesis:".bold().underline());
        }
        EventBody::Error { message, .. } => println!("{prefix} {} {message}", "error:".red()),
        EventBody::Terminal { reason, .. } => println!("{prefix} {} {reason:?}", "terminal:".bold()),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber_init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Status(args) => status(args).await,
        Commands::Replay(args) => replay(args).await,
    }
}

fn tracing_subscriber_init() {
    // Demo binary: fall back to the default env-filter behavior if the
    // caller sets RUST_LOG, otherwise stay quiet so the event stream above
    // is the only output.
    let _ = tracing_subscriber::fmt::try_init();
}

async fn run(args: RunArgs) -> Result<()> {
    let broker = Arc::new(StubBroker::new());
    let embedder = Arc::new(HashEmbedding::new());
    let events = Arc::new(ConsoleEventSink);
    let checkpoints: Arc<dyn board_of_one::checkpoint::CheckpointStore> = match &args.checkpoint_dir {
        Some(dir) => Arc::new(FileCheckpointStore::new(dir).context("failed to open checkpoint directory")?),
        None => Arc::new(board_of_one::checkpoint::MemoryCheckpointStore::new()),
    };

    let manager = SessionManager::new(broker, embedder, checkpoints, events, Config::default(), demo_catalog());

    let options = Options {
        max_cost: args.max_cost,
        force_sub_problem_count: args.sub_problems,
        ..Default::default()
    };

    let (session_id, outcome) = manager
        .start(&args.statement, args.context, options)
        .await
        .context("session failed to start")?;

    match outcome {
        SessionOutcome::Completed(result) => {
            if args.json {
                print_json(&session_id, &result)?;
            } else {
                println!("\n{} {session_id}", "session complete:".green().bold());
                println!("{} ${:.4}", "total cost:".bold(), result.metrics.total_cost_usd);
                for sp in &result.sub_problem_results {
                    println!("- {}: {}", sp.sub_problem_id.bold(), sp.synthesis);
                }
                if let Some(meta) = &result.meta_synthesis {
                    println!("\n{}\n{}", "unified recommendation:".bold().underline(), meta.unified_recommendation);
                }
            }
        }
        SessionOutcome::Paused => println!("\n{} {session_id}", "session paused:".yellow()),
        SessionOutcome::Killed(result) => {
            println!(
                "\n{} {session_id} ({} of {} sub-problems complete)",
                "session killed:".red(),
                result.sub_problem_results.len(),
                result.sub_problem_results.len()
            );
        }
    }

    Ok(())
}

/// Load the latest checkpoint for a session id, or fail with a clear error
/// if none exists under this checkpoint directory.
async fn load_latest_checkpoint(
    session_id: &str,
    checkpoint_dir: &std::path::Path,
) -> Result<board_of_one::checkpoint::CheckpointRecord> {
    let store = FileCheckpointStore::new(checkpoint_dir).context("failed to open checkpoint directory")?;
    store
        .latest(session_id)
        .await
        .context("failed to read checkpoint")?
        .with_context(|| format!("no checkpoint found for session '{session_id}'"))
}

/// Print a progress snapshot for a checkpointed session (spec §6: `status`),
/// grounded on the library's `SessionManager::status` but read straight from
/// the checkpoint store since a one-shot CLI invocation has no live session
/// registry to query.
async fn status(args: StatusArgs) -> Result<()> {
    let record = load_latest_checkpoint(&args.session_id, &args.checkpoint_dir).await?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let snapshot = SessionStatus::from_state(&record.state, now);

    println!("{} {}", "session:".bold(), args.session_id);
    println!("{} {}", "checkpoint step:".bold(), record.step_id);
    println!("{} {:?}", "phase:".bold(), snapshot.phase);
    println!("{} {}", "sub-problem index:".bold(), snapshot.current_sub_problem_index);
    println!("{} {}", "round:".bold(), snapshot.round_number);
    println!("{} ${:.4}", "cost so far:".bold(), snapshot.cost_so_far);
    println!("{} {}s", "elapsed:".bold(), snapshot.elapsed_secs);
    Ok(())
}

/// Print a checkpointed session's transcript and synthesis, round by round
/// (spec §6: `replay`), analogous to `dashflow-cli`'s own `timeline replay`
/// command but reading a single checkpoint snapshot rather than a Kafka
/// event stream.
async fn replay(args: ReplayArgs) -> Result<()> {
    let record = load_latest_checkpoint(&args.session_id, &args.checkpoint_dir).await?;
    let state = record.state;

    println!(
        "{} {} (checkpoint step {})",
        "replaying session:".bold(),
        args.session_id,
        record.step_id
    );
    println!("{} {}", "statement:".bold(), state.problem.statement);

    for sp in &state.sub_problems {
        println!("\n{} {} — {}", "sub-problem".blue().bold(), sp.id, sp.goal);
    }

    let mut round = 0;
    for c in &state.transcript {
        if c.round != round {
            round = c.round;
            println!("\n{} round {round}", "--".dimmed());
        }
        let speaker = c.persona_code.as_deref().unwrap_or("system");
        println!("{}: {}", speaker.green().bold(), c.content);
    }

    for summary in &state.round_summaries {
        println!("\n{} round {}: {}", "summary:".magenta(), summary.round, summary.narrative);
    }

    for result in &state.sub_problem_results {
        println!(
            "\n{} {}: {}",
            "resolved".bold().underline(),
            result.sub_problem_id,
            result.synthesis
        );
    }

    Ok(())
}

fn print_json(session_id: &str, result: &board_of_one::SessionResult) -> Result<()> {
    let value = serde_json::json!({
        "session_id": session_id,
        "statement": result.problem.statement,
        "total_cost_usd": result.metrics.total_cost_usd,
        "sub_problems": result.sub_problem_results.iter().map(|sp| serde_json::json!({
            "id": sp.sub_problem_id,
            "synthesis": sp.synthesis,
            "rounds_used": sp.rounds_used,
            "complete": sp.complete,
        })).collect::<Vec<_>>(),
        "unified_recommendation": result.meta_synthesis.as_ref().map(|m| m.unified_recommendation.clone()),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_run_with_required_statement() {
        let cli = Cli::try_parse_from(["board-of-one", "run", "should we expand to the EU?"]).unwrap();
        match cli.command {
            Commands::Run(args) => assert_eq!(args.statement, "should we expand to the EU?"),
            other => panic!("expected Run, got a different subcommand: {}", matches_name(&other)),
        }
    }

    #[test]
    fn clap_requires_a_statement() {
        assert!(Cli::try_parse_from(["board-of-one", "run"]).is_err());
    }

    #[test]
    fn clap_parses_status_with_checkpoint_dir() {
        let cli = Cli::try_parse_from([
            "board-of-one",
            "status",
            "session-123",
            "--checkpoint-dir",
            "/tmp/checkpoints",
        ])
        .unwrap();
        match cli.command {
            Commands::Status(args) => {
                assert_eq!(args.session_id, "session-123");
                assert_eq!(args.checkpoint_dir, std::path::PathBuf::from("/tmp/checkpoints"));
            }
            other => panic!("expected Status, got a different subcommand: {}", matches_name(&other)),
        }
    }

    #[test]
    fn clap_parses_replay_with_checkpoint_dir() {
        let cli = Cli::try_parse_from([
            "board-of-one",
            "replay",
            "session-123",
            "--checkpoint-dir",
            "/tmp/checkpoints",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Replay(_)));
    }

    #[test]
    fn clap_requires_checkpoint_dir_for_status() {
        assert!(Cli::try_parse_from(["board-of-one", "status", "session-123"]).is_err());
    }

    fn matches_name(commands: &Commands) -> &'static str {
        match commands {
            Commands::Run(_) => "run",
            Commands::Status(_) => "status",
            Commands::Replay(_) => "replay",
        }
    }
}
