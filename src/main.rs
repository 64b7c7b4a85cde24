//! Collab Agent CLI
//!
//! A command-line interface for the multi-agent assistant with REPL support.

use anyhow::Result;
use clap::{Parser, Subcommand};
use collab_agent::agent::AgentId;
use collab_agent::config::default_data_dir;
use collab_agent::workflow::{classify, validate_patterns, PatternName, PatternSummary};
use collab_agent::{
    telemetry, Assistant, AssistantReply, AuthConfig, Config, ConversationRecord,
    RequestFailed, RequestOptions, WorkflowEvent,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Build configuration from CLI args and auth.json
/// Priority: CLI flags > auth.json > environment variables
fn build_config(cli: &Cli, working_dir: PathBuf) -> Result<Config> {
    // If base_url is provided on CLI, use custom config
    if let Some(ref base_url) = cli.base_url {
        let api_key = cli.api_key.clone().unwrap_or_else(|| "lm-studio".to_string());
        return Ok(Config::custom_endpoint(base_url, &cli.model, working_dir).with_api_key(api_key));
    }

    // Explicit provider from auth.json
    if let Some(ref provider) = cli.provider {
        let config = Config::from_provider(provider, &cli.model, working_dir).map_err(|e| {
            let available = Config::list_providers().unwrap_or_default();
            anyhow::anyhow!("{} (configured providers: {})", e, available.join(", "))
        })?;
        return Ok(match cli.api_key.clone() {
            Some(key) => config.with_api_key(key),
            None => config,
        });
    }

    // Look for credentials matching the model prefix, e.g.
    // "anthropic/claude-sonnet-4" -> "anthropic", then common gateways
    let auth = AuthConfig::load().unwrap_or_default();
    if let Some(entry) = auth.for_model(&cli.model) {
        let api_key = cli.api_key.clone().unwrap_or_else(|| entry.api_key().to_string());

        return Ok(match entry.base_url() {
            Some(base_url) => Config::custom_endpoint(base_url, &cli.model, working_dir),
            // Provider without base_url - use as OpenRouter-style
            None => Config::openrouter(&cli.model, working_dir),
        }
        .with_api_key(api_key));
    }

    // Fall back to environment variable
    let config = Config::openrouter(&cli.model, working_dir);
    Ok(match cli.api_key.clone() {
        Some(key) => config.with_api_key(key),
        None => config,
    })
}

#[derive(Parser)]
#[command(name = "collab-agent")]
#[command(about = "Collab Agent - specialized coding agents that work together", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Project directory (prompt overrides are read from .collab-agent/prompts)
    #[arg(short = 'd', long, default_value = ".")]
    working_dir: PathBuf,

    /// LLM model to use
    #[arg(short, long, default_value = "anthropic/claude-sonnet-4")]
    model: String,

    /// Provider name from auth.json
    #[arg(long)]
    provider: Option<String>,

    /// Base URL for custom LLM endpoint (e.g., LM Studio) - overrides auth.json
    #[arg(long)]
    base_url: Option<String>,

    /// API key - overrides auth.json and env vars
    #[arg(long)]
    api_key: Option<String>,

    /// Data directory (default: ~/.collab-agent or $XDG_DATA_HOME/collab-agent)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive REPL session
    Repl,

    /// Run a single prompt
    Prompt {
        /// The task to send
        message: String,

        /// Use this agent only instead of classifying the task
        #[arg(short, long)]
        agent: Option<AgentId>,

        /// Enrich the task with SearXNG results
        #[arg(long)]
        web_search: bool,
    },

    /// Show how a task would be routed, without calling the model
    Classify {
        message: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List agents and collaboration patterns
    Agents,

    /// List recent conversations
    History {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show a saved conversation
    Show {
        /// Conversation ID (can be partial)
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    validate_patterns()?;

    // Commands that never touch the provider
    match &cli.command {
        Some(Commands::Classify { message, json }) => return run_classify(message, *json),
        Some(Commands::Agents) => {
            show_agents();
            return Ok(());
        }
        _ => {}
    }

    // Resolve working directory
    let working_dir = if cli.working_dir.is_absolute() {
        cli.working_dir.clone()
    } else {
        std::env::current_dir()?.join(&cli.working_dir)
    }
    .canonicalize()?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let config = build_config(&cli, working_dir)?
        .with_verbose(cli.verbose)
        .with_data_dir(data_dir.clone());

    let _log_guard = telemetry::init(&config.telemetry.log_dir, config.telemetry.verbose)?;
    tracing::info!(
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        working_dir = %config.working_dir.display(),
        "Starting collab-agent"
    );

    let assistant = Assistant::from_config(config)?;

    match cli.command {
        Some(Commands::Prompt {
            message,
            agent,
            web_search,
        }) => {
            let options = RequestOptions { agent, web_search };
            run_single_prompt(&assistant, &message, &options).await?;
        }
        Some(Commands::History { limit }) => show_history(&assistant, limit)?,
        Some(Commands::Show { id }) => show_conversation(&assistant, &id)?,
        Some(Commands::Repl) | None => run_repl(&assistant, &data_dir).await?,
        Some(Commands::Classify { .. }) | Some(Commands::Agents) => {}
    }

    Ok(())
}

fn run_classify(message: &str, json: bool) -> Result<()> {
    let classification = classify(message);

    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
        return Ok(());
    }

    println!("Complexity: {}", classification.complexity);
    match classification.pattern {
        Some(pattern) => println!("Pattern:    {}", pattern),
        None => println!("Pattern:    (single agent)"),
    }
    let agents: Vec<&str> = classification.agents.iter().map(|a| a.as_str()).collect();
    println!("Agents:     {}", agents.join(" -> "));
    if classification.used_fallback {
        println!("(no rule matched; using default agent)");
    }
    Ok(())
}

fn show_agents() {
    println!("Agents:");
    for agent in AgentId::ALL {
        println!("  {:14} {}", agent.as_str(), agent.description());
    }

    println!("\nCollaboration patterns:");
    for name in PatternName::ALL {
        let summary = PatternSummary::from(name.pattern());
        println!("  {:24} {}", summary.name.as_str(), summary.description);
        let agents: Vec<&str> = summary.agents.iter().map(|a| a.as_str()).collect();
        println!("  {:24} {}", "", agents.join(" -> "));
    }
}

/// Print workflow events as they arrive
fn spawn_progress_printer(
    mut rx: mpsc::UnboundedReceiver<WorkflowEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                WorkflowEvent::PlanCreated {
                    complexity,
                    pattern,
                    agents,
                    ..
                } => {
                    if let Some(pattern) = pattern {
                        println!("[{} task: {} with {} agents]", complexity, pattern, agents.len());
                    }
                }
                WorkflowEvent::StepStarted {
                    index,
                    total,
                    agent,
                    ..
                } => {
                    println!("  [{}/{}] {}...", index + 1, total, agent.display_name());
                }
                WorkflowEvent::StepFailed { agent, error, .. } => {
                    eprintln!("  {} failed: {}", agent.display_name(), error);
                }
                WorkflowEvent::StepCompleted { .. } | WorkflowEvent::WorkflowComplete { .. } => {}
            }
        }
    })
}

async fn ask(
    assistant: &Assistant,
    message: &str,
    options: &RequestOptions,
) -> Result<AssistantReply> {
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_progress_printer(rx);

    let result = assistant.handle(message, options, Some(&tx)).await;

    drop(tx);
    let _ = printer.await;
    result
}

fn print_reply(reply: &AssistantReply) {
    println!("{}", reply.output);
    println!("---");
    println!(
        "tokens: {} in / {} out{}",
        reply.usage.input,
        reply.usage.output,
        reply
            .conversation_id
            .map(|id| format!(" | saved as {}", &id.to_string()[..8]))
            .unwrap_or_default()
    );
}

async fn run_single_prompt(
    assistant: &Assistant,
    message: &str,
    options: &RequestOptions,
) -> Result<()> {
    println!("Working directory: {}", assistant.config().working_dir.display());
    println!("---");

    match ask(assistant, message, options).await {
        Ok(reply) => {
            print_reply(&reply);
            Ok(())
        }
        Err(e) => {
            print_partial(&e);
            Err(e)
        }
    }
}

/// Show what the agents produced before a workflow failed
fn print_partial(err: &anyhow::Error) {
    let Some(failed) = err.downcast_ref::<RequestFailed>() else {
        return;
    };
    if failed.completed.is_empty() {
        return;
    }

    println!("Partial results ({} completed steps):", failed.completed.len());
    for step in &failed.completed {
        if let Some(output) = &step.output_text {
            println!("## {}\n\n{}\n", step.agent.display_name(), output);
        }
    }
    println!("---");
}

fn print_help() {
    println!("Commands:");
    println!("  /agent <id>     - Send every message to one agent");
    println!("  /auto           - Go back to automatic routing");
    println!("  /search on|off  - Toggle web search enrichment");
    println!("  /history        - Show recent conversations");
    println!("  /agents         - List agents and patterns");
    println!("  /quit, /exit    - Exit the REPL");
    println!("  /help           - Show this help");
}

async fn run_repl(assistant: &Assistant, data_dir: &Path) -> Result<()> {
    println!("Collab Agent REPL");
    println!("Working directory: {}", assistant.config().working_dir.display());
    println!("Model: {}", assistant.config().llm.model);
    println!();
    print_help();
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = data_dir.join("history.txt");

    let _ = rl.load_history(&history_path);

    let mut options = RequestOptions::default();

    loop {
        let prompt = match options.agent {
            Some(agent) => format!("collab-agent [{}]> ", agent),
            None => "collab-agent> ".to_string(),
        };

        let readline = rl.readline(&prompt);

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                // Handle commands
                if line.starts_with('/') {
                    let mut parts = line.splitn(2, ' ');
                    let cmd = parts.next().unwrap_or_default();
                    let arg = parts.next().map(str::trim);

                    match (cmd, arg) {
                        ("/quit" | "/exit", _) => {
                            println!("Goodbye!");
                            break;
                        }
                        ("/help", _) => print_help(),
                        ("/agents", _) => show_agents(),
                        ("/auto", _) => {
                            options.agent = None;
                            println!("Automatic routing enabled.");
                        }
                        ("/agent", Some(name)) => match name.parse::<AgentId>() {
                            Ok(agent) => {
                                options.agent = Some(agent);
                                println!("Using {} for every message.", agent.display_name());
                            }
                            Err(e) => eprintln!("{}", e),
                        },
                        ("/agent", None) => eprintln!("Usage: /agent <id>"),
                        ("/search", Some("on")) => {
                            options.web_search = true;
                            println!("Web search enabled.");
                        }
                        ("/search", Some("off")) => {
                            options.web_search = false;
                            println!("Web search disabled.");
                        }
                        ("/search", _) => println!(
                            "Web search is {}. Usage: /search on|off",
                            if options.web_search { "on" } else { "off" }
                        ),
                        ("/history", _) => {
                            if let Err(e) = show_history(assistant, 10) {
                                eprintln!("Error: {}", e);
                            }
                        }
                        _ => println!("Unknown command: {}. Type /help for commands.", cmd),
                    }
                    continue;
                }

                match ask(assistant, line, &options).await {
                    Ok(reply) => print_reply(&reply),
                    Err(e) => {
                        print_partial(&e);
                        eprintln!("Error: {:#}", e);
                    }
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    Ok(())
}

fn show_history(assistant: &Assistant, limit: usize) -> Result<()> {
    let store = assistant
        .store()
        .ok_or_else(|| anyhow::anyhow!("Conversation history is not enabled"))?;

    let records = store.recent(limit)?;
    if records.is_empty() {
        println!("  No conversations found.");
        return Ok(());
    }

    println!("Recent conversations (last {}):", limit);
    println!("{:-<80}", "");
    for record in records {
        println!(
            "  {} | {} | {:32} | {}",
            &record.id.to_string()[..8],
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.agent_type,
            truncate(&record.user_input, 40)
        );
    }
    Ok(())
}

fn show_conversation(assistant: &Assistant, id: &str) -> Result<()> {
    let store = assistant
        .store()
        .ok_or_else(|| anyhow::anyhow!("Conversation history is not enabled"))?;

    let record = match Uuid::parse_str(id) {
        Ok(uuid) => store.get(uuid)?,
        // Partial ID: search recent history
        Err(_) => find_by_prefix(store.recent(1000)?, id)?,
    }
    .ok_or_else(|| anyhow::anyhow!("Conversation not found: {}", id))?;

    println!("ID:      {}", record.id);
    println!("Date:    {}", record.created_at.to_rfc3339());
    println!("Agent:   {}", record.agent_type);
    println!("{:-<80}", "");
    println!("{}", record.user_input);
    println!("{:-<80}", "");
    println!("{}", record.ai_output);
    Ok(())
}

fn find_by_prefix(
    records: Vec<ConversationRecord>,
    prefix: &str,
) -> Result<Option<ConversationRecord>> {
    let mut matches = records
        .into_iter()
        .filter(|r| r.id.to_string().starts_with(prefix));

    match (matches.next(), matches.next()) {
        (Some(_), Some(_)) => anyhow::bail!("Ambiguous conversation ID prefix: {}", prefix),
        (found, None) => Ok(found),
        (None, Some(_)) => Ok(None),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars && !text.contains('\n') {
        return line.to_string();
    }
    let cut: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> ConversationRecord {
        ConversationRecord {
            id: Uuid::parse_str(id).unwrap(),
            created_at: Utc::now(),
            user_input: "q".into(),
            agent_type: "docs".into(),
            ai_output: "a".into(),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_find_by_prefix() {
        let records = vec![
            record("aaaa1111-0000-0000-0000-000000000000"),
            record("aaaa2222-0000-0000-0000-000000000000"),
            record("bbbb1111-0000-0000-0000-000000000000"),
        ];

        let found = find_by_prefix(records.clone(), "bbbb").unwrap().unwrap();
        assert_eq!(found.id, records[2].id);
        assert!(find_by_prefix(records.clone(), "aaaa").is_err());
        assert!(find_by_prefix(records, "cccc").unwrap().is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a fairly long question", 10), "a fairl...");
        assert_eq!(truncate("line one\nline two", 40), "line one...");
    }

    #[test]
    fn test_cli_parses_prompt_with_agent() {
        let cli =
            Cli::try_parse_from(["collab-agent", "prompt", "--agent", "bug_fix", "fix it"]).unwrap();
        match cli.command {
            Some(Commands::Prompt { message, agent, web_search }) => {
                assert_eq!(message, "fix it");
                assert_eq!(agent, Some(AgentId::BugFix));
                assert!(!web_search);
            }
            _ => panic!("expected prompt command"),
        }
    }
}
