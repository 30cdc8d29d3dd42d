// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use tracing::{debug, warn};

/// Env var that replaces all platform-default workspace roots when set.
pub const WORKSPACE_PATH_OVERRIDE: &str = "WORKSPACE_PATH_OVERRIDE";

/// Read the API key env var for a provider, filtering empty values.
pub fn api_key_for(provider: &str) -> Option<String> {
    let var = match provider.to_lowercase().as_str() {
        "openai" => "OPENAI_API_KEY",
        "deepseek" => "DEEPSEEK_API_KEY",
        other => {
            warn!(provider = other, "Unknown AI provider, no API key env var");
            return None;
        }
    };
    read_var(var)
}

/// Read the workspace path override, if set and non-empty.
pub fn workspace_override() -> Option<String> {
    let value = read_var(WORKSPACE_PATH_OVERRIDE);
    if value.is_some() {
        debug!("Workspace path override is set, ignoring platform defaults");
    }
    value
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
