// src/cli/install.rs
// `init` and `install-hook`: one-time repository setup.

use scribe::error::{Result, ScribeError};
use std::path::Path;

const STARTER_CONFIG: &str = "\
# commit-scribe configuration
journal:
  root: journal

ai:
  provider: openai
  # api_key: sk-...        # falls back to OPENAI_API_KEY when omitted
  model: gpt-4o-mini

telemetry:
  enabled: true
  exporters:
    - type: console
    # - type: otlp
    #   endpoint: http://localhost:4317
    # - type: prometheus

chat:
  max_messages: 200

boundary:
  min_confidence: 8
";

const HOOK_STUB: &str = "\
#!/bin/sh
# Installed by commit-scribe. Generates a journal entry after each commit.
# All output goes to the hook log; the commit itself is never blocked.
scribe hook post-commit \"$PWD\" >> \"$PWD/.git/hooks/scribe.log\" 2>&1 || true
exit 0
";

/// Write a starter `.scribe.yml` unless one exists. Idempotent.
pub fn run_init(repo: &Path) -> Result<()> {
    let path = repo.join(scribe::config::file::CONFIG_FILE_NAME);
    if path.exists() {
        println!("{} already exists, leaving it alone", path.display());
        return Ok(());
    }
    std::fs::write(&path, STARTER_CONFIG).map_err(|e| ScribeError::from_io(e, &path))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Install the post-commit hook stub, backing up any foreign hook.
pub fn run_install_hook(repo: &Path) -> Result<()> {
    let hooks_dir = repo.join(".git/hooks");
    if !hooks_dir.is_dir() {
        return Err(ScribeError::BadRequest(format!(
            "{} is not a git repository",
            repo.display()
        )));
    }

    let hook_path = hooks_dir.join("post-commit");
    if hook_path.exists() {
        let existing =
            std::fs::read_to_string(&hook_path).map_err(|e| ScribeError::from_io(e, &hook_path))?;
        if existing == HOOK_STUB {
            println!("Hook already installed at {}", hook_path.display());
            return Ok(());
        }
        let backup = hooks_dir.join("post-commit.backup");
        std::fs::rename(&hook_path, &backup).map_err(|e| ScribeError::from_io(e, &hook_path))?;
        println!("Backed up existing hook to {}", backup.display());
    }

    std::fs::write(&hook_path, HOOK_STUB).map_err(|e| ScribeError::from_io(e, &hook_path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook_path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| ScribeError::from_io(e, &hook_path))?;
    }

    println!("Installed {}", hook_path.display());
    Ok(())
}
