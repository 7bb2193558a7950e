//! Merging drafts against the defaults
//!
//! Every check runs even after an earlier one failed, so a single call
//! reports all problems with a draft at once.

use std::fmt;

use globset::Glob;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::schema::default_options;
use super::{Draft, Options};
use crate::logger::Level;

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    PortInvalid,
    LogLevelInvalid,
    OptionTypeInvalid,
    ServerOptionInvalid,
    ProxyTargetInvalid,
    ServerAndProxyIncompatible,
    HostAndListenIncompatible,
    FilesPatternInvalid,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How severe a validation failure is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Fatal,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLevel::Fatal => f.write_str("Fatal"),
        }
    }
}

/// A single problem found while merging
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub level: ErrorLevel,
    pub message: String,
    /// Extra hint lines printed under the message
    pub meta: Vec<String>,
}

impl ValidationError {
    fn fatal(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: ErrorLevel::Fatal,
            message: message.into(),
            meta: Vec::new(),
        }
    }

    fn with_meta(mut self, line: impl Into<String>) -> Self {
        self.meta.push(line.into());
        self
    }
}

/// Render a list of errors as one human readable block
pub fn print_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| {
            let mut lines = vec![
                format!("Error Type:    {}", error.kind),
                format!("Error Level:   {}", error.level),
                format!("Error Message: {}", error.message),
            ];
            lines.extend(error.meta.iter().map(|line| format!("               {}", line)));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Merge `draft` over the defaults, returning the options and every error found
pub fn merge(draft: Draft) -> (Options, Vec<ValidationError>) {
    let mut merged = default_options();
    deep_merge(&mut merged, Value::Object(draft));

    let Value::Object(mut map) = merged else {
        return (Options::default(), Vec::new());
    };

    let mut errors = Vec::new();

    normalize_port(&mut map, &mut errors);
    validate_log_level(&map, &mut errors);
    validate_types(&map, &mut errors);
    normalize_server(&mut map, &mut errors);
    normalize_proxy(&mut map, &mut errors);
    normalize_files(&mut map, &mut errors);
    check_incompatible(&map, &mut errors);

    let scheme = if map.get("https").and_then(Value::as_bool).unwrap_or(false) {
        "https"
    } else {
        "http"
    };
    map.insert("scheme".to_string(), json!(scheme));

    debug!("merged options with {} validation error(s)", errors.len());

    (Options::from_value(Value::Object(map)), errors)
}

/// Objects merge key by key; anything else in `patch` replaces `base`
fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

fn normalize_port(map: &mut Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let port = match map.get("port") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match port.filter(|p| *p <= u64::from(u16::MAX)) {
        Some(port) => {
            map.insert("port".to_string(), json!(port));
        }
        None => errors.push(
            ValidationError::fatal(
                ValidationErrorKind::PortInvalid,
                format!(
                    "Invalid port: {}",
                    map.get("port").map(Value::to_string).unwrap_or_default()
                ),
            )
            .with_meta("The port option must be a number between 0 and 65535 (0 picks a free port)"),
        ),
    }
}

fn validate_log_level(map: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let valid = map
        .get("logLevel")
        .and_then(Value::as_str)
        .is_some_and(|level| level.parse::<Level>().is_ok());

    if !valid {
        errors.push(
            ValidationError::fatal(
                ValidationErrorKind::LogLevelInvalid,
                format!(
                    "Invalid logLevel: {}",
                    map.get("logLevel").map(Value::to_string).unwrap_or_default()
                ),
            )
            .with_meta("Expected one of: trace, debug, info, warn, error, silent"),
        );
    }
}

const BOOLEAN_OPTIONS: &[&str] = &[
    "logConnections",
    "logFileChanges",
    "logSnippet",
    "json",
    "cors",
    "localOnly",
    "https",
];

fn validate_types(map: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
    for key in BOOLEAN_OPTIONS {
        if let Some(value) = map.get(*key) {
            if !value.is_boolean() {
                errors.push(ValidationError::fatal(
                    ValidationErrorKind::OptionTypeInvalid,
                    format!("Option `{}` must be true or false, got {}", key, value),
                ));
            }
        }
    }

    if !matches!(map.get("logPrefix"), Some(Value::String(_))) {
        errors.push(ValidationError::fatal(
            ValidationErrorKind::OptionTypeInvalid,
            "Option `logPrefix` must be a string",
        ));
    }

    if !matches!(map.get("startPath"), None | Some(Value::Null) | Some(Value::String(_))) {
        errors.push(ValidationError::fatal(
            ValidationErrorKind::OptionTypeInvalid,
            "Option `startPath` must be a string",
        ));
    }
}

/// Accepts `true`, a directory, a list of directories or `{ baseDir, .. }`
fn normalize_server(map: &mut Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let Some(server) = map.get("server").cloned() else {
        return;
    };

    let normalized = match server {
        Value::Null | Value::Bool(false) => return,
        Value::Bool(true) => Some(json!({ "baseDir": ["./"] })),
        Value::String(dir) => Some(json!({ "baseDir": [dir] })),
        Value::Array(dirs) => string_list(&dirs).map(|dirs| json!({ "baseDir": dirs })),
        Value::Object(mut server) => {
            let base_dir = match server.remove("baseDir") {
                None | Some(Value::Null) => Some(vec!["./".to_string()]),
                Some(Value::String(dir)) => Some(vec![dir]),
                Some(Value::Array(dirs)) => string_list(&dirs),
                Some(_) => None,
            };
            base_dir.map(|dirs| {
                server.insert("baseDir".to_string(), json!(dirs));
                Value::Object(server)
            })
        }
        Value::Number(_) => None,
    };

    match normalized {
        Some(server) => {
            map.insert("server".to_string(), server);
        }
        None => errors.push(
            ValidationError::fatal(
                ValidationErrorKind::ServerOptionInvalid,
                "Invalid server option",
            )
            .with_meta("Use true, a directory, a list of directories or { baseDir = ... }"),
        ),
    }
}

/// Accepts a target URL or `{ target, .. }`; adds `http://` when no scheme is given
fn normalize_proxy(map: &mut Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let Some(proxy) = map.get("proxy").cloned() else {
        return;
    };

    let (target, mut rest) = match proxy {
        Value::Null | Value::Bool(false) => return,
        Value::String(target) => (Some(target), Map::new()),
        Value::Object(mut proxy) => {
            let target = proxy
                .remove("target")
                .and_then(|t| t.as_str().map(str::to_string));
            (target, proxy)
        }
        _ => (None, Map::new()),
    };

    match target.as_deref().and_then(normalize_target) {
        Some(target) => {
            rest.insert("target".to_string(), json!(target));
            map.insert("proxy".to_string(), Value::Object(rest));
        }
        None => errors.push(
            ValidationError::fatal(
                ValidationErrorKind::ProxyTargetInvalid,
                format!("Invalid proxy target: {}", target.unwrap_or_default()),
            )
            .with_meta("Example: proxy = \"localhost:8000\""),
        ),
    }
}

fn normalize_target(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    let candidate = if target.contains("://") {
        target.to_string()
    } else {
        format!("http://{}", target)
    };
    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;

    // Keep the user's spelling; `Url` would append a trailing slash.
    Some(candidate.trim_end_matches('/').to_string())
}

fn normalize_files(map: &mut Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let patterns = match map.get("files") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Some(Vec::new()),
        Some(Value::String(pattern)) => Some(vec![pattern.clone()]),
        Some(Value::Array(patterns)) => string_list(patterns),
        Some(_) => None,
    };

    let Some(patterns) = patterns else {
        errors.push(ValidationError::fatal(
            ValidationErrorKind::FilesPatternInvalid,
            "Option `files` must be a pattern or a list of patterns",
        ));
        return;
    };

    for pattern in &patterns {
        if let Err(e) = Glob::new(pattern) {
            errors.push(ValidationError::fatal(
                ValidationErrorKind::FilesPatternInvalid,
                format!("Invalid file pattern `{}`: {}", pattern, e.kind()),
            ));
        }
    }

    map.insert("files".to_string(), json!(patterns));
}

fn check_incompatible(map: &Map<String, Value>, errors: &mut Vec<ValidationError>) {
    let set = |key: &str| !matches!(map.get(key), None | Some(Value::Null) | Some(Value::Bool(false)));

    if set("server") && set("proxy") {
        errors.push(
            ValidationError::fatal(
                ValidationErrorKind::ServerAndProxyIncompatible,
                "Cannot specify both `server` and `proxy` options",
            )
            .with_meta("Serve static files or proxy an existing backend, not both"),
        );
    }

    if set("host") && set("listen") {
        errors.push(
            ValidationError::fatal(
                ValidationErrorKind::HostAndListenIncompatible,
                "Cannot specify both `host` and `listen` options",
            )
            .with_meta("`listen` binds the server, `host` only changes the advertised address"),
        );
    }
}

fn string_list(values: &[Value]) -> Option<Vec<String>> {
    values
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}
