//! Config initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

const CONFIG_FILE: &str = "livesync.toml";

/// Write a starter config file
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Directory to write livesync.toml into
    #[arg(default_value = ".")]
    pub dir: String,

    /// Start in static server mode, serving this directory
    #[arg(short, long, default_value = "./")]
    pub base_dir: String,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let dir = Path::new(&self.dir);
        let target = dir.join(CONFIG_FILE);

        if target.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                target.display()
            );
        }

        if self.dir != "." {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        fs::write(&target, self.generate_config())
            .with_context(|| format!("Failed to write {}", target.display()))?;
        eprintln!("  {} Created {}", "✓".green(), target.display().to_string().cyan());

        eprintln!("\n  Next steps:");
        if self.dir != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.dir.cyan());
        }
        eprintln!("    {} livesync start", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn generate_config(&self) -> String {
        format!(
r#"# LiveSync configuration
# Flags passed to `livesync start` override these values.

port = 3000
# host = "192.168.1.10"
open = "local"
cors = false

# Patterns reported to the file watcher
files = []

logLevel = "info"
logPrefix = "LiveSync"
logConnections = false
logFileChanges = true
logSnippet = true
json = false

# Static server mode. Remove this table and set `proxy = "localhost:8000"`
# above to proxy a backend instead.
[server]
baseDir = ["{base_dir}"]
"#,
            base_dir = self.base_dir.replace('\\', "/"),
        )
    }
}
