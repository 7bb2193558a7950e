//! Adapter for the legacy, positional init signature
//!
//! Older callers pass any of `(files)`, `(config)`, `(cb)`, `(files, cb)`,
//! `(config, cb)`, `(files, config)` or `(files, config, cb)`. The argument
//! types are distinct, so position only matters for precedence: a files
//! argument always wins over `files` inside the config.

use serde_json::Value;

use super::{default_callback, StartArgs};
use crate::config::Draft;
use crate::instance::{Instance, StartCallback};

/// One positional argument of the legacy signature
pub enum InitArg<I> {
    Files(Vec<String>),
    Config(Draft),
    Callback(StartCallback<I>),
}

impl<I> InitArg<I> {
    pub fn files<S: Into<String>>(files: impl IntoIterator<Item = S>) -> Self {
        InitArg::Files(files.into_iter().map(Into::into).collect())
    }

    pub fn callback<F>(cb: F) -> Self
    where
        F: FnOnce(Result<std::sync::Arc<I>, super::StartupError>) + Send + 'static,
    {
        InitArg::Callback(Box::new(cb))
    }
}

/// Fold legacy arguments into canonical start arguments
pub fn from_legacy<I: Instance>(args: Vec<InitArg<I>>) -> StartArgs<I> {
    let mut config: Option<Draft> = None;
    let mut files: Option<Vec<String>> = None;
    let mut cb: Option<StartCallback<I>> = None;

    for arg in args {
        match arg {
            InitArg::Files(list) => files = Some(list),
            InitArg::Config(draft) => config = config.or(Some(draft)),
            InitArg::Callback(f) => cb = cb.or(Some(f)),
        }
    }

    let mut config = config.unwrap_or_default();
    if let Some(files) = files {
        config.insert(
            "files".to_string(),
            Value::Array(files.into_iter().map(Value::String).collect()),
        );
    }

    StartArgs {
        config,
        cb: cb.unwrap_or_else(default_callback),
    }
}
