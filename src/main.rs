//! # entente
//!
//! Command-line entry point: wires settings, telemetry, the usage ledger and
//! the coordinator together, then runs one subcommand.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use entente_agent::Agent;
use entente_core::{CallIdentity, Power};
use entente_llm::Coordinator;
use entente_settings::{EntenteSettings, load_settings, load_settings_from_path};
use entente_store::{Database, UsageRepo};
use entente_telemetry::{TelemetryConfig, init_telemetry, parse_level};

/// LLM coordination core for multi-agent Diplomacy.
#[derive(Parser, Debug)]
#[command(name = "entente", about = "LLM coordination core for multi-agent Diplomacy")]
struct Cli {
    /// Settings file (defaults to `~/.entente/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Model(ModelCommand),
    /// Print per-agent token usage for a game.
    Usage {
        #[arg(long)]
        game: String,
    },
}

/// Subcommands that go through the coordinator.
#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Make one structured call and print the result as JSON.
    Call {
        /// Model identifier, e.g. `ollama/llama3.1` (defaults to the configured model).
        #[arg(long)]
        model: Option<String>,
        /// Prompt text; read from stdin when omitted.
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        system: Option<String>,
        /// Field the parsed object must contain. Repeatable.
        #[arg(long = "expect")]
        expected_fields: Vec<String>,
        #[arg(long, default_value = "cli")]
        response_type: String,
        #[arg(long, default_value = "cli")]
        game: String,
        #[arg(long, default_value = "cli")]
        agent: String,
        #[arg(long, default_value = "-")]
        phase: String,
    },
    /// Ask a power's agent for orders, holding every unit if the model fails.
    Orders {
        #[arg(long)]
        power: Power,
        #[arg(long)]
        model: Option<String>,
        /// Comma-separated units, e.g. `A PAR,A MAR,F BRE`.
        #[arg(long, value_delimiter = ',')]
        units: Vec<String>,
        /// File with the board description handed to the model.
        #[arg(long)]
        context: Option<PathBuf>,
        #[arg(long, default_value = "cli")]
        game: String,
        #[arg(long, default_value = "S1901M")]
        phase: String,
    },
}

fn load(config: Option<&Path>) -> Result<EntenteSettings> {
    match config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => load_settings().context("Failed to load settings"),
    }
}

fn read_stdin() -> Result<String> {
    std::io::read_to_string(std::io::stdin()).context("Failed to read prompt from stdin")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(cli.config.as_deref())?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.logging.level),
        json: settings.logging.json,
        call_log_path: settings.logging.call_log_path.as_ref().map(PathBuf::from),
        ..TelemetryConfig::default()
    });

    match cli.command {
        Command::Usage { game } => print_usage(&settings, &game),
        Command::Model(command) => {
            let mut coordinator =
                Coordinator::from_settings(&settings).context("Failed to open usage database")?;
            if let Some(log) = telemetry.call_log() {
                coordinator = coordinator.with_call_log(log);
            }
            let outcome = run(&coordinator, &settings, command).await;
            coordinator.flush_usage().await;
            outcome
        }
    }
}

async fn run(coordinator: &Coordinator, settings: &EntenteSettings, command: ModelCommand) -> Result<()> {
    match command {
        ModelCommand::Call {
            model,
            prompt,
            system,
            expected_fields,
            response_type,
            game,
            agent,
            phase,
        } => {
            let model = model.unwrap_or_else(|| settings.models.default_model.clone());
            let prompt = match prompt {
                Some(p) => p,
                None => read_stdin()?,
            };
            let expected: Vec<&str> = expected_fields.iter().map(String::as_str).collect();
            let identity = CallIdentity::new(game, agent, phase);
            info!(model = %model, identity = %identity, "structured call");
            let result = coordinator
                .call_structured(&model, &prompt, system.as_deref(), &identity, &expected, &response_type)
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ModelCommand::Orders {
            power,
            model,
            units,
            context,
            game,
            phase,
        } => {
            let model = model.unwrap_or_else(|| settings.models.default_model.clone());
            let context = match context {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read context: {}", path.display()))?,
                None => String::new(),
            };
            let agent = Agent::new(power, model).with_extraction(&settings.extraction);
            let orders = agent.generate_orders(coordinator, &game, &phase, &units, &context).await;
            let report = json!({ "power": power, "phase": phase, "orders": orders });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn print_usage(settings: &EntenteSettings, game: &str) -> Result<()> {
    let path = Path::new(&settings.usage.db_path);
    let repo = UsageRepo::new(
        Database::open(path).with_context(|| format!("Failed to open usage database: {}", path.display()))?,
    );
    let rows = repo.usage_by_agent(game)?;
    let total = repo.game_total(game)?;

    println!("{:<12} {:>6} {:>12} {:>12}", "AGENT", "CALLS", "INPUT", "OUTPUT");
    for row in &rows {
        println!(
            "{:<12} {:>6} {:>12} {:>12}",
            row.agent_id, row.calls, row.input_tokens, row.output_tokens
        );
    }
    println!(
        "{:<12} {:>6} {:>12} {:>12}",
        "TOTAL", total.calls, total.input_tokens, total.output_tokens
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_usage_is_not_a_model_command() {
        let cli = Cli::parse_from(["entente", "usage", "--game", "g1"]);
        assert!(matches!(cli.command, Command::Usage { ref game } if game == "g1"));
    }

    #[test]
    fn cli_call_defaults() {
        let cli = Cli::parse_from(["entente", "call", "--prompt", "hi", "--expect", "orders", "--expect", "reasoning"]);
        let Command::Model(ModelCommand::Call {
            model,
            prompt,
            expected_fields,
            response_type,
            phase,
            ..
        }) = cli.command
        else {
            panic!("expected call");
        };
        assert_eq!(model, None);
        assert_eq!(prompt.as_deref(), Some("hi"));
        assert_eq!(expected_fields, ["orders", "reasoning"]);
        assert_eq!(response_type, "cli");
        assert_eq!(phase, "-");
    }

    #[test]
    fn cli_orders_splits_units() {
        let cli = Cli::parse_from(["entente", "orders", "--power", "france", "--units", "A PAR,A MAR,F BRE"]);
        let Command::Model(ModelCommand::Orders { power, units, phase, .. }) = cli.command else {
            panic!("expected orders");
        };
        assert_eq!(power, Power::France);
        assert_eq!(units, ["A PAR", "A MAR", "F BRE"]);
        assert_eq!(phase, "S1901M");
    }

    #[test]
    fn cli_config_is_global() {
        let cli = Cli::parse_from(["entente", "usage", "--game", "g1", "--config", "/tmp/s.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
    }
}
