// src/git/mod.rs
// Centralized git operations
//
// - commit: commit metadata (hashes, author time, parents)
// - context: changed files, diff summary, self-write filtering

pub mod commit;
pub mod context;

pub use commit::{CommitInfo, commit_info, head_commit, is_initial_commit};
pub use context::{FileStats, GitContext, SizeClass, collect_git_context};

use std::path::Path;
use std::process::Command;

/// Validate that a git ref doesn't look like a CLI flag (defense-in-depth)
pub(crate) fn validate_ref(r: &str) -> Result<(), String> {
    if r.starts_with('-') {
        return Err(format!("Invalid git ref: '{}'", r));
    }
    if r.contains('\0') || r.contains('\n') || r.contains('\r') {
        return Err("Invalid git ref: contains forbidden characters".to_string());
    }
    Ok(())
}

/// Run a git command and return trimmed stdout, or an error.
pub(crate) fn git_cmd(repo: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .map_err(|e| format!("Failed to run git {}: {}", args.first().unwrap_or(&""), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command, returning Some(stdout) on success or None on failure.
pub(crate) fn git_cmd_opt(repo: &Path, args: &[&str]) -> Option<String> {
    git_cmd(repo, args).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ref_rejects_flags() {
        assert!(validate_ref("--output=/tmp/x").is_err());
        assert!(validate_ref("-n").is_err());
    }

    #[test]
    fn test_validate_ref_rejects_control_chars() {
        assert!(validate_ref("HEAD\n--exec").is_err());
        assert!(validate_ref("a\0b").is_err());
    }

    #[test]
    fn test_validate_ref_accepts_normal_refs() {
        assert!(validate_ref("HEAD").is_ok());
        assert!(validate_ref("abc123").is_ok());
        assert!(validate_ref("feature/thing").is_ok());
    }
}
