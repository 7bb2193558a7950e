//! Start command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tracing::info;

use crate::config::{self, Draft};
use crate::instance::Registry;
use crate::logger::ConsoleSink;
use crate::server::DevInstance;
use crate::startup::{startup, PackageMeta, StartArgs};

/// Name the CLI registers its instance under
const INSTANCE_NAME: &str = "livesync";

/// Start a dev instance
#[derive(Args, Debug, Default)]
pub struct StartCommand {
    /// Serve static files, optionally from the given directories
    #[arg(short, long, num_args = 0.., value_name = "DIR")]
    pub server: Option<Vec<String>>,

    /// Proxy an existing backend
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// File patterns to watch
    #[arg(short, long, value_name = "GLOB")]
    pub files: Vec<String>,

    /// Port to serve on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to advertise in the access urls
    #[arg(long)]
    pub host: Option<String>,

    /// Working directory to resolve paths against
    #[arg(long)]
    pub cwd: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error, silent)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Prefix printed before every line
    #[arg(long)]
    pub log_prefix: Option<String>,

    /// Log browser connections at info level
    #[arg(long)]
    pub log_connections: bool,

    /// Do not open a browser
    #[arg(long)]
    pub no_open: bool,

    /// Print a JSON snapshot instead of prose when running
    #[arg(long)]
    pub json: bool,

    /// Add permissive CORS headers
    #[arg(long)]
    pub cors: bool,
}

impl StartCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let base = load_config(config_path)?;
        let draft = self.draft(base);

        let registry = Registry::new();
        let instance = registry.create_with(INSTANCE_NAME, |name| {
            DevInstance::new(name, Arc::new(ConsoleSink::new()))
        })?;

        let (tx, rx) = oneshot::channel();
        let entry = startup(instance, INSTANCE_NAME, PackageMeta::current());
        entry.init(StartArgs::new(draft).with_callback(move |result| {
            let _ = tx.send(result);
        }));

        let instance = rx
            .await
            .context("Instance finished without reporting its startup")??;

        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        tokio::signal::ctrl_c().await?;
        instance.exit();
        registry.remove(INSTANCE_NAME);

        Ok(())
    }

    /// Apply command-line flags on top of the config file draft
    pub fn draft(&self, mut draft: Draft) -> Draft {
        let mut set = |key: &str, value: Value| {
            draft.insert(key.to_string(), value);
        };

        match &self.server {
            Some(dirs) if dirs.is_empty() => set("server", json!(true)),
            Some(dirs) => set("server", json!(dirs)),
            None => {}
        }
        if let Some(proxy) = &self.proxy {
            set("proxy", json!(proxy));
        }
        if !self.files.is_empty() {
            set("files", json!(self.files));
        }
        if let Some(port) = self.port {
            set("port", json!(port));
        }
        if let Some(host) = &self.host {
            set("host", json!(host));
        }
        if let Some(cwd) = &self.cwd {
            set("cwd", json!(cwd));
        }
        if let Some(level) = &self.log_level {
            set("logLevel", json!(level));
        }
        if let Some(prefix) = &self.log_prefix {
            set("logPrefix", json!(prefix));
        }
        if self.log_connections {
            set("logConnections", json!(true));
        }
        if self.no_open {
            set("open", json!(false));
        }
        if self.json {
            set("json", json!(true));
        }
        if self.cors {
            set("cors", json!(true));
        }

        draft
    }
}

/// The config file draft. A missing default file is not an error.
fn load_config(config_path: &str) -> Result<Draft> {
    let path = Path::new(config_path);
    if !path.exists() && path == config::default_config_path() {
        return Ok(Draft::new());
    }

    info!("Loading configuration from {}", config_path);
    config::load_draft(path)
}
