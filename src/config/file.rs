// src/config/file.rs
// File-based configuration from <repo>/.scribe.yml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = ".scribe.yml";

/// Top-level config structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ScribeConfig {
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
}

/// Journal output configuration section
#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    /// Journal directory, relative to the repository root unless absolute
    #[serde(default = "JournalConfig::default_root")]
    pub root: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
        }
    }
}

impl JournalConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("journal")
    }

    /// Resolve the journal root against a repository path.
    pub fn resolved_root(&self, repo: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            repo.join(&self.root)
        }
    }
}

/// AI provider configuration section
#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Provider identifier (e.g. "openai")
    #[serde(default = "AiConfig::default_provider")]
    pub provider: String,
    /// API key; falls back to the provider's environment variable when absent
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "AiConfig::default_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            api_key: None,
            model: Self::default_model(),
        }
    }
}

impl AiConfig {
    fn default_provider() -> String {
        "openai".into()
    }
    fn default_model() -> String {
        "gpt-4o-mini".into()
    }
}

/// Telemetry configuration section
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "TelemetryConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub exporters: Vec<ExporterConfig>,
    /// Relaxes secret sanitization for local debugging
    #[serde(default)]
    pub debug: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exporters: Vec::new(),
            debug: false,
        }
    }
}

impl TelemetryConfig {
    fn default_enabled() -> bool {
        true
    }
}

/// A single telemetry exporter
#[derive(Debug, Deserialize, Clone)]
pub struct ExporterConfig {
    #[serde(rename = "type")]
    pub kind: ExporterKind,
    pub endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    Console,
    Otlp,
    Prometheus,
}

/// Chat collection configuration section
#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Soft cap on collected messages; oldest are trimmed first
    #[serde(default = "ChatConfig::default_max_messages")]
    pub max_messages: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_messages: Self::default_max_messages(),
        }
    }
}

impl ChatConfig {
    fn default_max_messages() -> usize {
        200
    }
}

/// Boundary filter configuration section
#[derive(Debug, Deserialize, Clone)]
pub struct BoundaryConfig {
    /// Confidence at or above which the boundary is trusted without an
    /// "ambiguous" telemetry mark
    #[serde(default = "BoundaryConfig::default_min_confidence")]
    pub min_confidence: u8,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            min_confidence: Self::default_min_confidence(),
        }
    }
}

impl BoundaryConfig {
    fn default_min_confidence() -> u8 {
        8
    }
}

impl ScribeConfig {
    /// Load config from `<repo>/.scribe.yml`, falling back to defaults.
    ///
    /// A missing file is normal; a malformed file is logged and ignored so a
    /// broken config can never block the post-commit hook.
    pub fn load(repo: &Path) -> Self {
        let path = repo.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    /// The API key: config value first, then the provider's env var.
    pub fn api_key(&self) -> Option<String> {
        self.ai
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| super::env::api_key_for(&self.ai.provider))
    }
}
