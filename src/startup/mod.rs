//! Startup normalization
//!
//! Turns user supplied arguments into merged, validated options and hands
//! them to the instance. Every failure is reported through the completion
//! callback; nothing here panics or returns early without calling it.

mod args;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::{merge, print_errors, Draft, ValidationError};
use crate::instance::{Instance, StartCallback};
use crate::utils::resolve_path;

pub use args::{from_legacy, InitArg};

/// Why an initialization attempt failed
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Instance: {name} is already running!")]
    AlreadyRunning { name: String },

    #[error("Invalid directory specified for cwd option: {path}")]
    InvalidCwd { path: String },

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<ValidationError>,
    },

    #[error("{mode} mode is not supported by this instance")]
    Unsupported { mode: String },

    #[error("No async runtime available to host the server")]
    NoRuntime,

    #[error("Failed to start server: {0}")]
    Io(#[from] std::io::Error),
}

impl StartupError {
    fn validation(errors: Vec<ValidationError>) -> Self {
        StartupError::Validation {
            message: print_errors(&errors),
            errors,
        }
    }
}

/// Package metadata stamped into every configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMeta {
    pub name: String,
    pub version: semver::Version,
}

impl PackageMeta {
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self, semver::Error> {
        Ok(Self {
            name: name.into(),
            version: semver::Version::parse(version)?,
        })
    }

    /// Metadata of this crate
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: semver::Version::parse(env!("CARGO_PKG_VERSION"))
                .unwrap_or_else(|_| semver::Version::new(0, 0, 0)),
        }
    }
}

/// Canonical arguments for one initialization attempt
pub struct StartArgs<I> {
    pub config: Draft,
    pub cb: StartCallback<I>,
}

impl<I: Instance> StartArgs<I> {
    /// Arguments with the default callback, which only logs failures
    pub fn new(config: Draft) -> Self {
        Self {
            config,
            cb: default_callback(),
        }
    }

    pub fn with_callback<F>(mut self, cb: F) -> Self
    where
        F: FnOnce(Result<Arc<I>, StartupError>) + Send + 'static,
    {
        self.cb = Box::new(cb);
        self
    }
}

pub(crate) fn default_callback<I: Instance>() -> StartCallback<I> {
    Box::new(|result: Result<Arc<I>, StartupError>| {
        if let Err(e) = result {
            error!("{}", e);
        }
    })
}

/// Entry point bound to one instance
pub struct Startup<I> {
    instance: Arc<I>,
    name: String,
    package: PackageMeta,
}

/// Bind the startup entry point to `instance`
pub fn startup<I: Instance>(instance: Arc<I>, name: &str, package: PackageMeta) -> Startup<I> {
    Startup::new(instance, name, package)
}

impl<I: Instance> Startup<I> {
    pub fn new(instance: Arc<I>, name: &str, package: PackageMeta) -> Self {
        Self {
            instance,
            name: name.to_string(),
            package,
        }
    }

    pub fn instance(&self) -> &Arc<I> {
        &self.instance
    }

    /// Normalize `args` and start the instance
    pub fn init(&self, args: StartArgs<I>) {
        let StartArgs { mut config, cb } = args;

        if self.instance.is_active() {
            return cb(Err(StartupError::AlreadyRunning {
                name: self.name.clone(),
            }));
        }

        config.insert(
            "version".to_string(),
            Value::String(self.package.version.to_string()),
        );

        let cwd = match resolve_cwd(config.get("cwd")) {
            Ok(cwd) => cwd,
            Err(e) => return cb(Err(e)),
        };
        debug!("using working directory {}", cwd.display());
        config.insert("cwd".to_string(), Value::String(cwd.display().to_string()));

        let (options, errors) = merge(config);
        if !errors.is_empty() {
            return cb(Err(StartupError::validation(errors)));
        }

        Arc::clone(&self.instance).init(options, cb);
    }

    /// Accepts the older scattered-argument calling convention
    pub fn init_legacy(&self, args: Vec<InitArg<I>>) {
        self.init(from_legacy(args));
    }
}

/// Strip whitespace and stray quotes that some shells leave around paths
pub fn sanitize_cwd(raw: &str) -> &str {
    raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim()
}

/// Resolve the `cwd` option to an existing absolute directory.
/// Unset means the process's current directory.
pub fn resolve_cwd(raw: Option<&Value>) -> Result<PathBuf, StartupError> {
    let requested = match raw {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if sanitize_cwd(s).is_empty() => None,
        Some(Value::String(s)) => Some(sanitize_cwd(s).to_string()),
        Some(other) => {
            return Err(StartupError::InvalidCwd {
                path: other.to_string(),
            })
        }
    };

    let current = std::env::current_dir()?;
    let Some(requested) = requested else {
        return Ok(current);
    };

    let resolved = resolve_path(&current, &requested);
    if !resolved.is_dir() {
        return Err(StartupError::InvalidCwd {
            path: resolved.display().to_string(),
        });
    }
    Ok(resolved)
}
