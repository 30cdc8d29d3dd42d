// src/mcp/mod.rs
// MCP tool surface: a thin request/response adapter around the orchestrator.

use crate::config::ScribeConfig;
use crate::error::{Result, ScribeError};
use crate::journal::entry::render_manual_block;
use crate::journal::summary::{DuePeriod, Period, generate_summary, summary_path};
use crate::journal::writer::{daily_path, write_block};
use crate::trigger::{EntryOutcome, generate_entry_for};
use chrono::NaiveDate;
use rmcp::{
    ErrorData, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::ToolCallContext, wrapper::Parameters},
    model::{
        CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo,
    },
    schemars,
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// MCP server state
#[derive(Clone)]
pub struct ScribeServer {
    pub repo: PathBuf,
    pub config: ScribeConfig,
    tool_router: ToolRouter<Self>,
}

impl ScribeServer {
    pub fn new(repo: PathBuf) -> Self {
        let config = ScribeConfig::load(&repo);
        Self {
            repo,
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn journal_root(&self) -> PathBuf {
        self.config.journal.resolved_root(&self.repo)
    }
}

/// Structured tool results: {status, file_path?, skipped?, error?}.
fn success_result(path: &Path) -> String {
    serde_json::json!({
        "status": "success",
        "file_path": path.display().to_string(),
    })
    .to_string()
}

fn skipped_result(reason: &str) -> String {
    serde_json::json!({
        "status": "skipped",
        "skipped": true,
        "reason": reason,
    })
    .to_string()
}

fn error_result(err: &ScribeError) -> String {
    // Provider failures can echo request details; sanitize before the
    // message leaves the process.
    let mut error = serde_json::json!({
        "category": err.category(),
        "message": crate::telemetry::sanitize::sanitize(&err.to_string()),
    });
    if let Some(hint) = err.hint() {
        error["hint"] = serde_json::Value::String(hint.to_string());
    }
    serde_json::json!({"status": "error", "error": error}).to_string()
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ScribeError::BadRequest(format!(
                    "invalid date '{s}'; expected YYYY-MM-DD"
                ))
            }),
    }
}

// Request types for tools with parameters

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateEntryRequest {
    #[schemars(description = "Commit hash; defaults to HEAD")]
    pub commit_hash: Option<String>,
    #[schemars(description = "Override the journal date (YYYY-MM-DD); defaults to the commit's author date")]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddReflectionRequest {
    #[schemars(description = "Reflection text to append")]
    pub text: String,
    #[schemars(description = "Journal date (YYYY-MM-DD); defaults to today")]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CaptureContextRequest {
    #[schemars(description = "Mapping with the text to capture: {\"text\": \"...\"}")]
    pub request: serde_json::Value,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateDailySummaryRequest {
    #[schemars(description = "Day to summarize (YYYY-MM-DD)")]
    pub date: String,
}

#[tool_router]
impl ScribeServer {
    #[tool(
        description = "Generate the journal entry for a commit (HEAD by default). Journal-only commits are skipped."
    )]
    async fn generate_entry(
        &self,
        Parameters(req): Parameters<GenerateEntryRequest>,
    ) -> std::result::Result<String, String> {
        Ok(self.run_generate_entry(req).await)
    }

    #[tool(description = "Append a timestamped reflection to the daily journal file.")]
    async fn add_reflection(
        &self,
        Parameters(req): Parameters<AddReflectionRequest>,
    ) -> std::result::Result<String, String> {
        Ok(self.append_manual(req.text, req.date.as_deref(), "Reflection"))
    }

    #[tool(
        description = "Capture AI-session context into the daily journal. Takes {\"request\": {\"text\": \"...\"}}."
    )]
    async fn capture_context(
        &self,
        Parameters(req): Parameters<CaptureContextRequest>,
    ) -> std::result::Result<String, String> {
        Ok(self.run_capture_context(&req.request))
    }

    #[tool(description = "Generate the daily summary for a date, if entries exist and no summary does.")]
    async fn generate_daily_summary(
        &self,
        Parameters(req): Parameters<GenerateDailySummaryRequest>,
    ) -> std::result::Result<String, String> {
        Ok(self.run_generate_daily_summary(&req.date).await)
    }
}

impl ScribeServer {
    #[instrument(name = "tool.generate_entry", skip_all)]
    async fn run_generate_entry(&self, req: GenerateEntryRequest) -> String {
        let rev = req
            .commit_hash
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("HEAD")
            .to_string();
        let date_override = match parse_date(req.date.as_deref()) {
            Ok(d) => d,
            Err(e) => return error_result(&e),
        };

        let client = match crate::llm::build_client(&self.config) {
            Ok(c) => c,
            Err(e) => return error_result(&e),
        };

        match generate_entry_for_date(&self.repo, &rev, &self.config, client, date_override).await
        {
            Ok(EntryOutcome::Written { path, .. }) => success_result(&path),
            Ok(EntryOutcome::Skipped) => skipped_result("journal-only commit"),
            Err(e) => error_result(&e),
        }
    }

    fn append_manual(&self, text: String, date: Option<&str>, label: &str) -> String {
        if text.trim().is_empty() {
            return error_result(&ScribeError::BadRequest("text must not be empty".into()));
        }
        let date = match parse_date(date) {
            Ok(Some(d)) => d,
            Ok(None) => chrono::Local::now().date_naive(),
            Err(e) => return error_result(&e),
        };
        let stamp = chrono::Local::now().format("%I:%M %p").to_string();
        let block = render_manual_block(&stamp, label, &text);
        match write_block(&self.journal_root(), date, &block) {
            Ok(path) => success_result(&path),
            Err(e) => error_result(&e),
        }
    }

    #[instrument(name = "tool.capture_context", skip_all)]
    fn run_capture_context(&self, request: &serde_json::Value) -> String {
        // Strict mapping contract: a bare string is the common misuse and
        // gets a corrective example back.
        let text = match request {
            serde_json::Value::Object(map) => match map.get("text") {
                Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.clone(),
                _ => {
                    return error_result(&ScribeError::BadRequest(
                        "request mapping must contain a non-empty \"text\" string".into(),
                    ));
                }
            },
            _ => {
                return error_result(&ScribeError::BadRequest(
                    "request must be a mapping, not a string".into(),
                ));
            }
        };
        self.append_manual(text, None, "AI Context Capture")
    }

    #[instrument(name = "tool.generate_daily_summary", skip_all)]
    async fn run_generate_daily_summary(&self, date: &str) -> String {
        let date = match parse_date(Some(date)) {
            Ok(Some(d)) => d,
            Ok(None) => return error_result(&ScribeError::BadRequest("date is required".into())),
            Err(e) => return error_result(&e),
        };
        let journal_root = self.journal_root();

        let existing = summary_path(&journal_root, Period::Daily, date);
        if existing.exists() {
            return skipped_result("summary already exists");
        }
        if !daily_path(&journal_root, date).exists() {
            return skipped_result("no entries for that day");
        }

        let client = match crate::llm::build_client(&self.config) {
            Ok(c) => c,
            Err(e) => return error_result(&e),
        };
        let due = DuePeriod {
            period: Period::Daily,
            start: date,
        };
        match generate_summary(&journal_root, &client, &due).await {
            Ok(Some(path)) => success_result(&path),
            Ok(None) => skipped_result("summary already exists"),
            Err(e) => error_result(&e),
        }
    }
}

/// Entry generation with an optional date override for the journal file.
async fn generate_entry_for_date(
    repo: &Path,
    rev: &str,
    config: &ScribeConfig,
    client: std::sync::Arc<dyn crate::llm::LlmClient>,
    date_override: Option<NaiveDate>,
) -> Result<EntryOutcome> {
    match date_override {
        None => generate_entry_for(repo, rev, config, client).await,
        Some(date) => {
            let journal_root = config.journal.resolved_root(repo);
            let precheck = {
                let repo = repo.to_path_buf();
                let rev = rev.to_string();
                let journal_root = journal_root.clone();
                tokio::task::spawn_blocking(move || {
                    crate::git::collect_git_context(&repo, &rev, &journal_root)
                })
                .await
                .map_err(ScribeError::from)??
            };
            if precheck.is_journal_only() {
                return Ok(EntryOutcome::Skipped);
            }
            let entry =
                crate::generate::orchestrate(repo, rev, &journal_root, client, config).await?;
            let path = crate::journal::writer::write_entry(&journal_root, &entry, date)?;
            Ok(EntryOutcome::Written { path, date })
        }
    }
}

impl ServerHandler for ScribeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "commit-scribe".into(),
                title: Some("commit-scribe - Automated developer journal".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Generates developer journal entries from git commits, chat history, and prior entries.".into(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, ErrorData>> + Send + '_
    {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        }))
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, ErrorData>> + Send + '_
    {
        async move {
            let tool_name = request.name.to_string();
            let start = std::time::Instant::now();

            let ctx = ToolCallContext::new(self, request, context);
            let result = self.tool_router.call(ctx).await;

            crate::telemetry::outcome_counter("mcp.tool_calls", result.is_ok());
            crate::telemetry::duration_ms(
                "mcp.tool_duration_ms",
                start.elapsed().as_millis() as f64,
            );
            tracing::debug!(
                tool = %tool_name,
                duration_ms = start.elapsed().as_millis() as u64,
                success = result.is_ok(),
                "Tool call finished"
            );
            result
        }
    }
}

/// Run the MCP server over stdio.
pub async fn run_mcp_server(repo: PathBuf) -> anyhow::Result<()> {
    let server = ScribeServer::new(repo);
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport).await?;
    service.waiting().await?;
    Ok(())
}
