//! Guided Intake REPL
//!
//! An interactive chat host for the intake engine. Plays the two
//! collaborator roles the engine leaves to its embedder: it keeps the
//! session state between turns, and it renders each `TurnAction` as a
//! terminal message.
//!
//! # Usage
//!
//! ```bash
//! # Walk the project charter schema
//! intake_repl --schemas config/schemas --doc-type project_charter
//!
//! # List the document types a schema directory registers
//! intake_repl --schemas config/schemas --list
//! ```
//!
//! Besides the engine's own command vocabulary (`help` shows it), the
//! host accepts `finalize` to close the session and dump the captured
//! answers, and `state` to print the raw session snapshot as JSON.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

use guided_intake::machine::{TurnAction, TurnResponse};
use guided_intake::{ConversationState, DirectorySchemaSource, FieldDefinition, IntakeEngine};

#[derive(Parser)]
#[command(name = "intake_repl")]
#[command(version = "0.1.0")]
#[command(about = "Interactive chat host for the guided intake engine")]
struct Cli {
    /// Directory of document schema YAML files
    #[arg(long, default_value = "config/schemas")]
    schemas: PathBuf,

    /// Document type to collect
    #[arg(long, default_value = "project_charter")]
    doc_type: String,

    /// List registered document types and exit
    #[arg(long)]
    list: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let source = match DirectorySchemaSource::new(&cli.schemas) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.list {
        for doc_type in source.document_types() {
            let hash = source.hash_of(&doc_type).unwrap_or("?");
            println!("{}  {}", doc_type.cyan(), &hash[..12.min(hash.len())]);
        }
        return ExitCode::SUCCESS;
    }

    let engine = IntakeEngine::new(Arc::new(source));
    match run_chat_loop(&engine, &cli.doc_type) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Session-store role: one state slot, threaded through every turn.
fn run_chat_loop(engine: &IntakeEngine, doc_type: &str) -> io::Result<()> {
    // Opening turn; no user message yet.
    let turn = engine.process(None, "", doc_type);
    let done = render(&turn);
    let mut state = Some(turn.state);
    if done {
        return Ok(());
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    prompt(&mut stdout)?;
    for line in stdin.lock().lines() {
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            prompt(&mut stdout)?;
            continue;
        }

        let turn = match message.to_lowercase().as_str() {
            "finalize" => engine.finalize(state.take().unwrap_or_else(|| {
                ConversationState::uninitialized(doc_type)
            })),
            "state" => {
                let snapshot = state.as_ref().map(serde_json::to_string_pretty);
                match snapshot {
                    Some(Ok(json)) => println!("{}", json.dimmed()),
                    _ => println!("{}", "no session".dimmed()),
                }
                prompt(&mut stdout)?;
                continue;
            }
            _ => engine.process(state.take(), message, doc_type),
        };

        let done = render(&turn);
        state = Some(turn.state);
        if done {
            return Ok(());
        }
        prompt(&mut stdout)?;
    }
    Ok(())
}

fn prompt(stdout: &mut io::Stdout) -> io::Result<()> {
    write!(stdout, "{} ", ">".bold())?;
    stdout.flush()
}

/// Renderer role: one message per action kind. Returns true when the
/// session is over and the loop should exit.
fn render(turn: &TurnResponse) -> bool {
    match &turn.action {
        TurnAction::AskField { field, greeting } => {
            if let Some(greeting) = greeting {
                println!(
                    "{} (about {} minutes)",
                    greeting.title.bold(),
                    greeting.estimated_time_minutes
                );
            }
            ask(field);
        }
        TurnAction::ConfirmValue { field, value } => {
            println!(
                "{}: {}  {}",
                field.label.bold(),
                value.green(),
                "(yes to confirm, no to change)".dimmed()
            );
        }
        TurnAction::ValidationError { field, errors } => {
            for error in errors {
                println!("{} {}", "✗".red(), error);
            }
            ask(field);
        }
        TurnAction::ConfirmSkip { field } => {
            println!(
                "{} {} is required; skipping flags it for later review. Type {} again to confirm.",
                "!".yellow(),
                field.label.bold(),
                "skip".cyan()
            );
        }
        TurnAction::ShowPreview {
            completed,
            skipped,
            remaining,
        } => {
            println!("{}", "Progress".bold().underline());
            for entry in completed {
                println!("  {} {}: {}", "✓".green(), entry.label, entry.value);
            }
            for id in skipped {
                println!("  {} {}", "-".yellow(), id.dimmed());
            }
            for label in remaining {
                println!("  {} {}", "·".dimmed(), label);
            }
        }
        TurnAction::EndReview {
            completed_fields,
            total_fields,
            required_gaps,
            skipped_fields,
        } => {
            println!(
                "{} {}/{} fields captured, {} skipped.",
                "Review:".bold(),
                completed_fields,
                total_fields,
                skipped_fields.len()
            );
            for label in required_gaps {
                println!("  {} missing required: {}", "!".yellow(), label.bold());
            }
            println!(
                "{}",
                "Use 'edit <field>' to fill gaps, or 'finalize' to close.".dimmed()
            );
        }
        TurnAction::ShowHelp { commands } => {
            println!("{}", "Commands".bold().underline());
            for help in commands {
                println!("  {:<10} {}", help.command.cyan(), help.description);
            }
        }
        TurnAction::AskAgain { field } => {
            println!("{}", "Discarded.".dimmed());
            ask(field);
        }
        TurnAction::Error { message } => {
            println!("{} {}", "✗".red(), message);
        }
        TurnAction::Cancelled => {
            println!("{}", "Session cancelled.".yellow());
            return true;
        }
        TurnAction::Complete => {
            println!("{}", "Nothing left to capture.".green());
        }
        TurnAction::Finalized {
            answers,
            skipped_fields,
            has_required_gaps,
        } => {
            println!("{}", "Finalized".bold().underline());
            for (id, value) in answers {
                println!("  {}: {}", id.cyan(), value);
            }
            for id in skipped_fields {
                println!("  {}: {}", id.cyan(), "(skipped)".dimmed());
            }
            if *has_required_gaps {
                println!("{}", "! required fields remain unanswered".yellow());
            }
            return true;
        }
    }
    false
}

fn ask(field: &FieldDefinition) {
    match &field.hint {
        Some(hint) => println!("{} {}", field.label.bold(), format!("({})", hint).dimmed()),
        None => println!("{}", field.label.bold()),
    }
}
