// src/workspace/platform.rs
// Cross-OS discovery of IDE workspace storage directories

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, instrument};

/// Detection budget in milliseconds; breaches are recorded, never raised.
const DETECT_BUDGET_MS: u128 = 50;
/// Full enumeration budget in milliseconds.
const ENUMERATE_BUDGET_MS: u128 = 500;

/// Process-wide cache of resolved roots. The IDE does not move its storage
/// mid-process, and hook invocations are short-lived anyway.
static ROOTS_CACHE: OnceLock<Vec<PathBuf>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformType {
    Windows,
    MacOs,
    Linux,
    Wsl,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Wsl => "wsl",
        }
    }
}

/// Detect the current platform, distinguishing WSL from native Linux by
/// probing /proc/version for the Microsoft kernel signature.
pub fn detect_platform() -> PlatformType {
    if cfg!(target_os = "windows") {
        return PlatformType::Windows;
    }
    if cfg!(target_os = "macos") {
        return PlatformType::MacOs;
    }
    if is_wsl() {
        return PlatformType::Wsl;
    }
    PlatformType::Linux
}

fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|v| {
            let v = v.to_lowercase();
            v.contains("microsoft") || v.contains("wsl")
        })
        .unwrap_or(false)
}

/// Candidate workspace storage directories for a platform, in priority order.
/// Entries may not exist; the caller filters.
fn default_candidates(platform: PlatformType) -> Vec<PathBuf> {
    match platform {
        PlatformType::Windows => {
            let mut out = Vec::new();
            if let Ok(appdata) = std::env::var("APPDATA") {
                out.push(PathBuf::from(appdata).join("Cursor/User/workspaceStorage"));
            }
            if let Some(home) = dirs::home_dir() {
                out.push(home.join("AppData/Roaming/Cursor/User/workspaceStorage"));
            }
            out
        }
        PlatformType::MacOs => dirs::home_dir()
            .map(|h| vec![h.join("Library/Application Support/Cursor/User/workspaceStorage")])
            .unwrap_or_default(),
        PlatformType::Linux => dirs::home_dir()
            .map(|h| vec![h.join(".config/Cursor/User/workspaceStorage")])
            .unwrap_or_default(),
        PlatformType::Wsl => {
            // The IDE runs on the Windows side; its storage is visible through
            // the /mnt/c mount. One candidate per Windows user profile.
            let mut out = Vec::new();
            if let Ok(entries) = std::fs::read_dir("/mnt/c/Users") {
                for entry in entries.flatten() {
                    out.push(
                        entry
                            .path()
                            .join("AppData/Roaming/Cursor/User/workspaceStorage"),
                    );
                }
            }
            // Native-Linux install inside the distro still counts.
            if let Some(home) = dirs::home_dir() {
                out.push(home.join(".config/Cursor/User/workspaceStorage"));
            }
            out
        }
    }
}

/// Expand a leading `~` and `$VAR` segments in an override path.
fn expand_path(raw: &str) -> PathBuf {
    let mut expanded = raw.to_string();
    if let Some(rest) = expanded.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        expanded = home.join(rest).to_string_lossy().into_owned();
    }
    while let Some(start) = expanded.find('$') {
        let tail = &expanded[start + 1..];
        let end = tail
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(tail.len());
        if end == 0 {
            break;
        }
        let var = &tail[..end];
        let value = std::env::var(var).unwrap_or_default();
        expanded = format!("{}{}{}", &expanded[..start], value, &tail[end..]);
    }
    PathBuf::from(expanded)
}

/// Resolve candidate IDE workspace storage roots, in priority order.
///
/// When `WORKSPACE_PATH_OVERRIDE` is set it replaces the platform defaults
/// entirely. Only existing directories are returned; an empty result is the
/// caller's problem to interpret, never an error here.
#[instrument(name = "workspace.resolve_roots", fields(platform_type, workspace_count, override_used, cache_hit))]
pub fn resolve_workspace_roots() -> Vec<PathBuf> {
    let span = tracing::Span::current();

    // The override is how tests and tools redirect discovery mid-process;
    // caching it would pin the first value seen.
    if crate::config::workspace_override().is_some() {
        span.record("cache_hit", false);
        return resolve_workspace_roots_uncached();
    }

    if let Some(cached) = ROOTS_CACHE.get() {
        span.record("cache_hit", true);
        span.record("workspace_count", cached.len());
        return cached.clone();
    }
    span.record("cache_hit", false);
    let roots = resolve_workspace_roots_uncached();
    ROOTS_CACHE.get_or_init(|| roots.clone()).clone()
}

/// Uncached variant, used by tests and by callers that changed the override
/// env var mid-process.
pub fn resolve_workspace_roots_uncached() -> Vec<PathBuf> {
    let detect_start = Instant::now();
    let platform = detect_platform();
    let detect_ms = detect_start.elapsed().as_millis();

    let span = tracing::Span::current();
    span.record("platform_type", platform.as_str());

    let enumerate_start = Instant::now();
    let (candidates, override_used) = match crate::config::workspace_override() {
        Some(raw) => {
            let paths = std::env::split_paths(&raw).collect::<Vec<_>>();
            let expanded = paths
                .iter()
                .map(|p| expand_path(&p.to_string_lossy()))
                .collect();
            (expanded, true)
        }
        None => (default_candidates(platform), false),
    };
    span.record("override_used", override_used);

    let roots = filter_existing(candidates);

    let enumerate_ms = enumerate_start.elapsed().as_millis();
    span.record("workspace_count", roots.len());
    if detect_ms > DETECT_BUDGET_MS {
        debug!(detect_ms, "Platform detection exceeded budget");
        crate::telemetry::counter("workspace.detect_budget_exceeded", 1);
    }
    if enumerate_ms > ENUMERATE_BUDGET_MS {
        debug!(enumerate_ms, "Workspace enumeration exceeded budget");
        crate::telemetry::counter("workspace.enumerate_budget_exceeded", 1);
    }
    crate::telemetry::gauge("workspace.root_count", roots.len() as f64);

    roots
}

/// Testable core of root resolution: the existence filter.
pub(crate) fn filter_existing(candidates: Vec<PathBuf>) -> Vec<PathBuf> {
    candidates.into_iter().filter(|p| p.is_dir()).collect()
}
