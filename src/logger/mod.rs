//! Leveled, prefixed console output
//!
//! A [`Logger`] pairs a [`LoggerConfig`] with a [`Sink`]. There is no global
//! logger: whoever needs one receives a config explicitly, and child loggers
//! are produced with [`derive_child_config`].

mod callbacks;
mod sink;
mod urls;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Options;

pub use callbacks::{attach, callback_for, plugin, Callback, Subscription};
pub use sink::{ConsoleSink, MemorySink, Record, Sink};
pub use urls::{access_url_table, transform};

/// Severity of an output line, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// Nothing passes a logger configured at this level
    Silent,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Silent => "silent",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown log level `{0}`")]
pub struct LevelParseError(String);

impl FromStr for Level {
    type Err = LevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "silent" => Ok(Level::Silent),
            _ => Err(LevelParseError(s.to_string())),
        }
    }
}

/// What a computed prefix gets to see about the line being written
#[derive(Debug, Clone, Copy)]
pub struct LineConfig {
    pub level: Level,
    pub colors: bool,
}

pub type PrefixFn = Arc<dyn Fn(&LineConfig) -> String + Send + Sync>;

/// Text written in front of every prefixed line
#[derive(Clone)]
pub enum Prefix {
    Static(String),
    Computed(PrefixFn),
}

impl Prefix {
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&LineConfig) -> String + Send + Sync + 'static,
    {
        Prefix::Computed(Arc::new(f))
    }

    fn render(&self, line: &LineConfig) -> String {
        match self {
            Prefix::Static(prefix) => prefix.clone(),
            Prefix::Computed(f) => f(line),
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Static(prefix) => f.debug_tuple("Static").field(prefix).finish(),
            Prefix::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Minimum level, prefix and color switch for a logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: Level,
    pub prefix: Prefix,
    pub colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            prefix: Prefix::Static(String::new()),
            colors: false,
        }
    }
}

impl LoggerConfig {
    /// Build a config from the `logLevel` and `logPrefix` options.
    /// Unknown levels fall back to info.
    pub fn from_options(options: &Options, colors: bool) -> Self {
        let level = options
            .get_str("logLevel")
            .and_then(|l| l.parse().ok())
            .unwrap_or(Level::Info);

        let prefix = match options.get_str("logPrefix") {
            Some(name) if !name.is_empty() => Prefix::Static(template(name, colors)),
            _ => Prefix::Static(String::new()),
        };

        Self { level, prefix, colors }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }
}

/// `[name] `, with the name in blue when colors are on
pub fn template(name: &str, colors: bool) -> String {
    format!("[{}] ", Palette::new(colors).blue(name))
}

/// A copy of `base` whose prefix gains a trailing `[name] ` segment
pub fn derive_child_config(base: &LoggerConfig, name: &str) -> LoggerConfig {
    let prefix = match &base.prefix {
        Prefix::Static(prefix) => Prefix::Static(format!("{}{}", prefix, template(name, base.colors))),
        Prefix::Computed(parent) => {
            let parent = Arc::clone(parent);
            let name = name.to_string();
            Prefix::computed(move |line| format!("{}{}", parent(line), template(&name, line.colors)))
        }
    };

    LoggerConfig {
        level: base.level,
        prefix,
        colors: base.colors,
    }
}

/// Styling helper that degrades to plain text when colors are off
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

macro_rules! palette_styles {
    ($($name:ident => $style:ident),* $(,)?) => {
        $(
            pub fn $name(&self, text: &str) -> String {
                if self.enabled {
                    text.$style().to_string()
                } else {
                    text.to_string()
                }
            }
        )*
    };
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    palette_styles! {
        blue => blue,
        cyan => cyan,
        magenta => magenta,
        grey => bright_black,
        bold => bold,
    }
}

/// Writes formatted lines to a sink, filtered by level
#[derive(Clone)]
pub struct Logger {
    config: LoggerConfig,
    sink: Arc<dyn Sink>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(config: LoggerConfig, sink: Arc<dyn Sink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn palette(&self) -> Palette {
        Palette::new(self.config.colors)
    }

    /// A logger writing to the same sink with `[name] ` appended to the prefix
    pub fn child(&self, name: &str) -> Logger {
        Logger::new(derive_child_config(&self.config, name), Arc::clone(&self.sink))
    }

    pub fn enabled(&self, level: Level) -> bool {
        level != Level::Silent && level >= self.config.level
    }

    /// Write one prefixed line at `level`
    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        if !self.enabled(level) {
            return;
        }
        let line = LineConfig {
            level,
            colors: self.config.colors,
        };
        let prefix = self.config.prefix.render(&line);
        self.sink.write(level, &format!("{}{}", prefix, message.as_ref()));
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(Level::Trace, message)
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message)
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message)
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message)
    }

    /// Write without the prefix, still subject to the level filter
    pub fn unprefixed(&self, level: Level, message: impl AsRef<str>) {
        if self.enabled(level) {
            self.sink.write(level, message.as_ref());
        }
    }

    /// Write as-is, bypassing level and prefix
    pub fn raw(&self, message: impl AsRef<str>) {
        self.sink.write(Level::Info, message.as_ref());
    }
}
