//! Configuration handling for LiveSync
//!
//! The merged configuration is an immutable, path-addressable tree of JSON
//! values. Drafts are plain JSON maps assembled from a config file and CLI
//! flags before they are merged against the defaults in [`schema`].

mod merge;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub use merge::{merge, print_errors, ErrorLevel, ValidationError, ValidationErrorKind};
pub use schema::default_options;

/// A configuration draft, before merging against defaults
pub type Draft = Map<String, Value>;

/// Immutable configuration tree
///
/// Cloning is cheap; [`Options::with`] returns a new tree and leaves the
/// original untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Options(Arc<Value>);

impl Default for Options {
    fn default() -> Self {
        Self(Arc::new(Value::Object(Map::new())))
    }
}

impl Options {
    /// Wrap a JSON value. Anything other than an object becomes an empty tree.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self(Arc::new(value)),
            _ => Self::default(),
        }
    }

    /// Look up a dotted path such as `server.baseDir`
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.pointer(&to_pointer(path.split('.')))
    }

    /// Look up a path given as separate segments
    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        self.0.pointer(&to_pointer(path.iter().copied()))
    }

    /// Boolean at `path`; missing or non-boolean values read as `false`
    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(Value::as_u64)
    }

    /// The named access URLs, in insertion order. Non-string entries are skipped.
    pub fn urls(&self) -> Vec<(String, String)> {
        self.get("urls")
            .and_then(Value::as_object)
            .map(|urls| {
                urls.iter()
                    .filter_map(|(name, url)| url.as_str().map(|u| (name.clone(), u.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Which kind of service these options describe
    pub fn mode(&self) -> Mode {
        if is_set(self.get("server")) {
            Mode::Server
        } else if is_set(self.get("proxy")) {
            Mode::Proxy
        } else {
            Mode::Snippet
        }
    }

    /// Return a copy of the tree with `value` stored at the dotted `path`.
    /// Intermediate objects are created as needed.
    pub fn with(&self, path: &str, value: Value) -> Options {
        let mut root = (*self.0).clone();
        let mut segments = path.split('.').peekable();
        let mut cursor = &mut root;

        while let Some(segment) = segments.next() {
            if !cursor.is_object() {
                *cursor = Value::Object(Map::new());
            }
            let Value::Object(map) = cursor else {
                unreachable!("cursor was just made an object");
            };
            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                break;
            }
            cursor = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        Options(Arc::new(root))
    }

    /// Borrow the whole tree
    pub fn to_json(&self) -> &Value {
        &self.0
    }
}

/// The service type an instance runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Serving static files from one or more base directories
    Server,
    /// Forwarding to an existing backend
    Proxy,
    /// Neither: the user pastes the snippet into their own pages
    Snippet,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Server => "server",
            Mode::Proxy => "proxy",
            Mode::Snippet => "snippet",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}

fn to_pointer<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments.fold(String::new(), |mut pointer, segment| {
        pointer.push('/');
        pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        pointer
    })
}

/// Load a configuration draft from a TOML or JSON file
pub fn load_draft<P: AsRef<Path>>(path: P) -> Result<Draft> {
    let path = path.as_ref();
    let canonical_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let content = fs::read_to_string(&canonical_path)
        .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

    let value: Value = if has_extension(&canonical_path, "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?
    } else {
        let table: toml::Table = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?;
        serde_json::to_value(table)?
    };

    match value {
        Value::Object(draft) => Ok(draft),
        _ => anyhow::bail!(
            "Config file {} must contain a table of options",
            canonical_path.display()
        ),
    }
}

/// Default location of the config file, relative to the current directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from("livesync.toml")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Options {
        Options::from_value(json!({
            "logLevel": "debug",
            "server": { "baseDir": ["app", "public"] },
            "urls": { "local": "http://localhost:3000", "external": "http://10.0.0.2:3000", "bad": 1 }
        }))
    }

    #[test]
    fn test_path_lookup() {
        let options = sample();
        assert_eq!(options.get_str("logLevel"), Some("debug"));
        assert_eq!(options.get_in(&["server", "baseDir"]), Some(&json!(["app", "public"])));
        assert_eq!(options.get("server.baseDir.1"), Some(&json!("public")));
        assert!(options.get("proxy.target").is_none());
        assert!(!options.get_bool("logConnections"));
    }

    #[test]
    fn test_urls_keep_order_and_skip_non_strings() {
        let urls = sample().urls();
        assert_eq!(
            urls,
            vec![
                ("local".to_string(), "http://localhost:3000".to_string()),
                ("external".to_string(), "http://10.0.0.2:3000".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let options = sample();
        let updated = options.with("proxy.target", json!("http://localhost:8000"));

        assert_eq!(updated.get_str("proxy.target"), Some("http://localhost:8000"));
        assert!(options.get("proxy").is_none());
        assert_eq!(updated.get_str("logLevel"), Some("debug"));
    }

    #[test]
    fn test_mode() {
        assert_eq!(sample().mode(), Mode::Server);
        let proxy = Options::from_value(json!({ "server": false, "proxy": { "target": "http://x" } }));
        assert_eq!(proxy.mode(), Mode::Proxy);
        assert_eq!(Options::default().mode(), Mode::Snippet);
    }
}
