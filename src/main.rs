// src/main.rs
// scribe - Automated developer journal entries from git commits

mod cli;

use chrono::NaiveDate;
use clap::Parser;
use cli::{Cli, Commands, HookAction, resolve_repo};
use scribe::config::ScribeConfig;
use scribe::error::ScribeError;
use scribe::journal::summary::{DuePeriod, Period};
use std::path::Path;

#[tokio::main]
async fn main() {
    // Load .env from ~/.scribe/.env only (never from CWD — a malicious repo
    // could override API keys)
    if let Some(home) = dirs::home_dir()
        && let Err(e) = dotenvy::from_path(home.join(".scribe/.env"))
    {
        tracing::debug!("Failed to load global .env file: {}", e);
    }

    let cli = Cli::parse();
    // No subcommand means MCP server over stdio
    let command = cli.command.unwrap_or(Commands::Serve { path: None });

    match command {
        Commands::Hook { action } => {
            // Hooks must NEVER exit non-zero: a journal failure is not a
            // git failure. run_post_commit logs and swallows everything.
            let HookAction::PostCommit { path } = action;
            let repo = resolve_repo(path);
            let config = ScribeConfig::load(&repo);
            let _guard = scribe::telemetry::init(&config.telemetry, true);
            scribe::trigger::run_post_commit(&repo).await;
            std::process::exit(0);
        }
        Commands::Serve { path } => {
            let repo = resolve_repo(path);
            let config = ScribeConfig::load(&repo);
            let _guard = scribe::telemetry::init(&config.telemetry, true);
            if let Err(e) = scribe::mcp::run_mcp_server(repo).await {
                eprintln!("MCP server failed: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Entry { commit, path } => {
            let repo = resolve_repo(path);
            let config = ScribeConfig::load(&repo);
            let _guard = scribe::telemetry::init(&config.telemetry, false);
            if let Err(e) = run_entry(&repo, &config, commit).await {
                exit_with(&e);
            }
        }
        Commands::Summary { date, path } => {
            let repo = resolve_repo(path);
            let config = ScribeConfig::load(&repo);
            let _guard = scribe::telemetry::init(&config.telemetry, false);
            if let Err(e) = run_summary(&repo, &config, &date).await {
                exit_with(&e);
            }
        }
        Commands::Reflect { text, date, path } => {
            let repo = resolve_repo(path);
            let config = ScribeConfig::load(&repo);
            let _guard = scribe::telemetry::init(&config.telemetry, false);
            if let Err(e) = run_reflect(&repo, &config, &text, date.as_deref()) {
                exit_with(&e);
            }
        }
        Commands::Init { path } => {
            let repo = resolve_repo(path);
            if let Err(e) = cli::run_init(&repo) {
                exit_with(&e);
            }
        }
        Commands::InstallHook { path } => {
            let repo = resolve_repo(path);
            if let Err(e) = cli::run_install_hook(&repo) {
                exit_with(&e);
            }
        }
    }
}

fn exit_with(err: &ScribeError) -> ! {
    eprintln!("error [{}]: {}", err.category(), err);
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
    std::process::exit(err.exit_code());
}

fn parse_date(raw: &str) -> Result<NaiveDate, ScribeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ScribeError::BadRequest(format!("invalid date '{raw}'; expected YYYY-MM-DD")))
}

async fn run_entry(
    repo: &Path,
    config: &ScribeConfig,
    commit: Option<String>,
) -> Result<(), ScribeError> {
    let client = scribe::llm::build_client(config)?;
    let rev = commit.unwrap_or_else(|| "HEAD".to_string());
    match scribe::trigger::generate_entry_for(repo, &rev, config, client).await? {
        scribe::trigger::EntryOutcome::Written { path, .. } => {
            println!("Wrote {}", path.display());
        }
        scribe::trigger::EntryOutcome::Skipped => {
            println!("Skipped: journal-only commit");
        }
    }
    Ok(())
}

async fn run_summary(repo: &Path, config: &ScribeConfig, date: &str) -> Result<(), ScribeError> {
    let date = parse_date(date)?;
    let client = scribe::llm::build_client(config)?;
    let journal_root = config.journal.resolved_root(repo);
    let due = DuePeriod {
        period: Period::Daily,
        start: date,
    };
    match scribe::journal::summary::generate_summary(&journal_root, &client, &due).await? {
        Some(path) => println!("Wrote {}", path.display()),
        None => println!("Skipped: summary already exists"),
    }
    Ok(())
}

fn run_reflect(
    repo: &Path,
    config: &ScribeConfig,
    text: &str,
    date: Option<&str>,
) -> Result<(), ScribeError> {
    if text.trim().is_empty() {
        return Err(ScribeError::BadRequest("reflection text is empty".into()));
    }
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => chrono::Local::now().date_naive(),
    };
    let journal_root = config.journal.resolved_root(repo);
    let stamp = chrono::Local::now().format("%I:%M %p").to_string();
    let block = scribe::journal::entry::render_manual_block(&stamp, "Reflection", text);
    let path = scribe::journal::write_block(&journal_root, date, &block)?;
    println!("Wrote {}", path.display());
    Ok(())
}
