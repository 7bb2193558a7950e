//! Event handlers that turn lifecycle events into output lines
//!
//! Every handler receives the logger, a snapshot of the instance options and
//! the raw payload. A field that is missing or has the wrong shape drops the
//! line it would have produced; handlers never panic.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use serde_json::{json, Value};

use super::urls::log_urls;
use super::{Level, Logger, LoggerConfig, Sink};
use crate::config::Options;
use crate::events::{Emitter, EventKind, ListenerId};
use crate::instance::InstanceState;
use crate::snippet::script_tags;
use crate::utils::{abbreviate_path, parse_user_agent, resolve_path};

/// Signature shared by every handler
pub type Callback = fn(&Logger, &Options, &Value);

/// The handler for `kind`
pub fn callback_for(kind: EventKind) -> Callback {
    match kind {
        EventKind::FileWatching => file_watching,
        EventKind::FileReload => file_reload,
        EventKind::ServiceExit => service_exit,
        EventKind::BrowserReload => browser_reload,
        EventKind::BrowserError => browser_error,
        EventKind::StreamChanged => stream_changed,
        EventKind::ClientConnected => client_connected,
        EventKind::ServiceRunning => service_running,
    }
}

/// The listeners a logger registered, so it can be taken off the emitter
#[derive(Debug, Default)]
pub struct Subscription {
    listeners: Vec<(EventKind, ListenerId)>,
}

impl Subscription {
    pub fn detach(self, emitter: &Emitter) {
        for (kind, id) in self.listeners {
            emitter.off(kind, id);
        }
    }
}

/// Build a logger from the instance's current `logLevel`/`logPrefix` and
/// attach it
pub fn plugin(
    emitter: &Emitter,
    instance: Arc<dyn InstanceState>,
    sink: Arc<dyn Sink>,
) -> (Logger, Subscription) {
    let config = LoggerConfig::from_options(&instance.options(), sink.colors());
    let logger = Logger::new(config, sink);
    let subscription = attach(emitter, instance, logger.clone());
    (logger, subscription)
}

/// Subscribe `logger` to every event. Options are read at dispatch time.
pub fn attach(emitter: &Emitter, instance: Arc<dyn InstanceState>, logger: Logger) -> Subscription {
    let listeners = EventKind::ALL
        .into_iter()
        .map(|kind| {
            let handler = callback_for(kind);
            let instance = Arc::clone(&instance);
            let logger = logger.clone();
            let id = emitter.on(kind, move |payload| handler(&logger, &instance.options(), payload));
            (kind, id)
        })
        .collect();
    Subscription { listeners }
}

fn file_watching(logger: &Logger, _options: &Options, data: &Value) {
    let watching = match data {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    };
    if watching {
        logger.info("Watching files...");
    }
}

fn file_reload(logger: &Logger, options: &Options, data: &Value) {
    if !can_log_file_change(options, Some(data)) {
        return;
    }
    let Some(path) = data.get("path").and_then(Value::as_str) else {
        return;
    };
    let p = logger.palette();

    if path.starts_with('*') {
        logger.info(format!("{} {}", p.cyan("Reloading files that match:"), p.magenta(path)));
        return;
    }

    match data.get("event").and_then(Value::as_str) {
        Some(event) => logger.info(format!(
            "{} {}",
            p.cyan(&format!("File event [{}] :", event)),
            p.magenta(path)
        )),
        None => logger.info(format!("{} {}", p.cyan("File event :"), p.magenta(path))),
    }
}

fn service_exit(logger: &Logger, _options: &Options, _data: &Value) {
    logger.debug("Exiting...");
}

fn browser_reload(logger: &Logger, options: &Options, data: &Value) {
    if !can_log_file_change(options, Some(data)) {
        return;
    }
    let p = logger.palette();
    let buffered = data.get("files").and_then(Value::as_array).map_or(0, Vec::len);

    if buffered > 1 {
        logger.info(p.cyan(&format!("Reloading Browsers... (buffered {} events)", buffered)));
    } else {
        logger.info(p.cyan("Reloading Browsers..."));
    }
}

fn browser_error(logger: &Logger, _options: &Options, _data: &Value) {
    let p = logger.palette();
    logger.error(format!(
        "Couldn't open browser (if you are using LiveSync in a headless environment, \
         you might want to set the {} option to {})",
        p.cyan("open"),
        p.cyan("false")
    ));
}

fn stream_changed(logger: &Logger, options: &Options, data: &Value) {
    if !can_log_file_change(options, Some(data)) {
        return;
    }
    let changed: Vec<&str> = data
        .get("changed")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if changed.is_empty() {
        return;
    }

    let p = logger.palette();
    let noun = if changed.len() > 1 { "files" } else { "file" };
    logger.info(format!(
        "{} {}",
        p.cyan(&format!("{} {} changed", changed.len(), noun)),
        p.magenta(&format!("({})", changed.join(", ")))
    ));
}

fn client_connected(logger: &Logger, options: &Options, data: &Value) {
    let ua = data
        .get("ua")
        .and_then(Value::as_str)
        .and_then(parse_user_agent);
    let (name, version) = ua
        .map(|ua| (ua.name, ua.version))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    let level = if options.get_bool("logConnections") {
        Level::Info
    } else {
        Level::Debug
    };

    let p = logger.palette();
    logger.log(
        level,
        format!(
            "{} {}{} {}",
            p.cyan("Browser Connected:"),
            p.magenta(&name),
            p.cyan(", version:"),
            p.magenta(&version)
        ),
    );
}

fn service_running(logger: &Logger, options: &Options, data: &Value) {
    if options.get_bool("json") {
        logger.raw(json!({ "service:running": { "options": options.to_json() } }).to_string());
        return;
    }

    let p = logger.palette();
    match data.get("type").and_then(Value::as_str) {
        Some("server") => {
            log_urls(logger, &options.urls());
            for dir in base_dirs(options) {
                serve_files(logger, options, dir);
            }
        }
        Some("proxy") => {
            if let Some(target) = options.get_str("proxy.target") {
                logger.info(format!("Proxying: {}", p.cyan(target)));
            }
            log_urls(logger, &options.urls());
        }
        Some("snippet") => {
            if options.get_bool("logSnippet") {
                logger.info(p.bold(&format!(
                    "Copy the following snippet into your website, just before the closing {} tag",
                    p.cyan("</body>")
                )));
                logger.unprefixed(Level::Info, script_tags(options));
            }
            let ui_urls: Vec<(String, String)> = options
                .urls()
                .into_iter()
                .filter(|(name, _)| name.starts_with("ui"))
                .collect();
            log_urls(logger, &ui_urls);
        }
        _ => {}
    }
}

/// `server.baseDir` as a string or a list of strings
fn base_dirs(options: &Options) -> Vec<&str> {
    match options.get_in(&["server", "baseDir"]) {
        Some(Value::String(dir)) => vec![dir.as_str()],
        Some(Value::Array(dirs)) => dirs.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn serve_files(logger: &Logger, options: &Options, dir: &str) {
    let base = options
        .get_str("cwd")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok());
    let resolved = match base {
        Some(base) => resolve_path(&base, dir),
        None => Path::new(dir).to_path_buf(),
    };
    let shown = abbreviate_path(&resolved.display().to_string(), MAIN_SEPARATOR);
    logger.info(format!("Serving files from: {}", logger.palette().magenta(&shown)));
}

/// A payload may opt out with `log: false`; otherwise `logFileChanges` decides
fn can_log_file_change(options: &Options, data: Option<&Value>) -> bool {
    if data.and_then(|d| d.get("log")).and_then(Value::as_bool) == Some(false) {
        return false;
    }
    options.get_bool("logFileChanges")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemorySink;
    use pretty_assertions::assert_eq;

    fn run(kind: EventKind, options: Value, data: Value) -> Vec<(Level, String)> {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::new(LoggerConfig::default().with_level(Level::Debug), sink.clone());
        callback_for(kind)(&logger, &Options::from_value(options), &data);
        sink.records().into_iter().map(|r| (r.level, r.line)).collect()
    }

    #[test]
    fn test_file_watching_needs_payload() {
        assert!(run(EventKind::FileWatching, json!({}), json!({})).is_empty());
        assert_eq!(
            run(EventKind::FileWatching, json!({}), json!({ "core": { "globs": ["*.css"] } })),
            vec![(Level::Info, "Watching files...".to_string())]
        );
    }

    #[test]
    fn test_file_reload_messages() {
        let options = json!({ "logFileChanges": true });
        assert_eq!(
            run(EventKind::FileReload, options.clone(), json!({ "path": "css/app.css", "event": "change" })),
            vec![(Level::Info, "File event [change] : css/app.css".to_string())]
        );
        assert_eq!(
            run(EventKind::FileReload, options.clone(), json!({ "path": "*.css" })),
            vec![(Level::Info, "Reloading files that match: *.css".to_string())]
        );
        assert_eq!(
            run(EventKind::FileReload, options.clone(), json!({ "path": "a.js" })),
            vec![(Level::Info, "File event : a.js".to_string())]
        );
        assert!(run(EventKind::FileReload, options, json!({ "event": "change" })).is_empty());
    }

    #[test]
    fn test_file_reload_respects_switches() {
        assert!(run(EventKind::FileReload, json!({ "logFileChanges": false }), json!({ "path": "a.css" })).is_empty());
        assert!(run(
            EventKind::FileReload,
            json!({ "logFileChanges": true }),
            json!({ "path": "a.css", "log": false })
        )
        .is_empty());
    }

    #[test]
    fn test_browser_reload() {
        let options = json!({ "logFileChanges": true });
        assert_eq!(
            run(EventKind::BrowserReload, options.clone(), json!({ "files": ["a.css", "b.css", "c.css"] })),
            vec![(Level::Info, "Reloading Browsers... (buffered 3 events)".to_string())]
        );
        assert_eq!(
            run(EventKind::BrowserReload, options.clone(), json!({ "files": ["a.css"] })),
            vec![(Level::Info, "Reloading Browsers...".to_string())]
        );
        assert!(run(EventKind::BrowserReload, options, json!({ "log": false })).is_empty());
    }

    #[test]
    fn test_stream_changed() {
        let options = json!({ "logFileChanges": true });
        assert_eq!(
            run(EventKind::StreamChanged, options.clone(), json!({ "changed": ["a.css", "b.css"] })),
            vec![(Level::Info, "2 files changed (a.css, b.css)".to_string())]
        );
        assert_eq!(
            run(EventKind::StreamChanged, options.clone(), json!({ "changed": ["a.css"] })),
            vec![(Level::Info, "1 file changed (a.css)".to_string())]
        );
        assert!(run(EventKind::StreamChanged, options, json!({})).is_empty());
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(
            run(EventKind::ServiceExit, json!({}), json!({})),
            vec![(Level::Debug, "Exiting...".to_string())]
        );
        let lines = run(EventKind::BrowserError, json!({}), json!({}));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Level::Error);
        assert!(lines[0].1.contains("set the open option to false"));
    }

    #[test]
    fn test_client_connected_level() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
        let quiet = run(EventKind::ClientConnected, json!({}), json!({ "ua": ua }));
        let loud = run(EventKind::ClientConnected, json!({ "logConnections": true }), json!({ "ua": ua }));

        let message = "Browser Connected: Firefox, version: 121.0".to_string();
        assert_eq!(quiet, vec![(Level::Debug, message.clone())]);
        assert_eq!(loud, vec![(Level::Info, message)]);
    }

    #[test]
    fn test_client_connected_without_ua() {
        assert_eq!(
            run(EventKind::ClientConnected, json!({ "logConnections": true }), json!({})),
            vec![(Level::Info, "Browser Connected: unknown, version: unknown".to_string())]
        );
    }

    #[test]
    fn test_service_running_json() {
        let options = json!({ "json": true, "port": 3000 });
        let lines = run(EventKind::ServiceRunning, options.clone(), json!({ "type": "server" }));
        assert_eq!(lines.len(), 1);
        let parsed: Value = serde_json::from_str(&lines[0].1).unwrap();
        assert_eq!(parsed, json!({ "service:running": { "options": options } }));
    }

    #[test]
    fn test_service_running_proxy() {
        let options = json!({
            "proxy": { "target": "http://localhost:8000" },
            "urls": { "local": "http://localhost:3000" }
        });
        let lines: Vec<String> = run(EventKind::ServiceRunning, options, json!({ "type": "proxy" }))
            .into_iter()
            .map(|(_, line)| line)
            .collect();
        assert_eq!(
            lines,
            vec![
                "Proxying: http://localhost:8000".to_string(),
                "Access URLs:".to_string(),
                format!(" {}", "-".repeat(5 + 21 + 2)),
                " Local: http://localhost:3000".to_string(),
            ]
        );
    }

    #[test]
    fn test_service_running_server() {
        let options = json!({
            "cwd": "/home/me/projects/site",
            "server": { "baseDir": ["./", "/srv"] },
            "urls": { "local": "http://localhost:3000", "external": "http://10.0.0.5:3000" }
        });
        let lines: Vec<String> = run(EventKind::ServiceRunning, options, json!({ "type": "server" }))
            .into_iter()
            .map(|(_, line)| line)
            .collect();

        assert_eq!(lines[0], "Access URLs:");
        assert_eq!(lines.len(), 1 + 4 + 2);
        if cfg!(unix) {
            assert_eq!(lines[5], "Serving files from: /.../site");
            assert_eq!(lines[6], "Serving files from: /srv");
        }
    }

    #[test]
    fn test_service_running_snippet() {
        let options = json!({
            "logSnippet": true,
            "port": 3000,
            "version": "0.1.0",
            "urls": { "local": "http://localhost:3000", "ui": "http://localhost:3001" }
        });
        let lines: Vec<String> = run(EventKind::ServiceRunning, options, json!({ "type": "snippet" }))
            .into_iter()
            .map(|(_, line)| line)
            .collect();

        assert!(lines[0].starts_with("Copy the following snippet into your website"));
        assert!(lines[1].starts_with("<script id=\"__ls_script__\">"));
        assert_eq!(lines[2], "Access URLs:");
        assert!(lines.iter().any(|l| l == " UI Local: http://localhost:3001"));
        assert!(!lines.iter().any(|l| l.contains("Local: http://localhost:3000")));
    }

    #[test]
    fn test_service_running_snippet_quiet() {
        let options = json!({ "logSnippet": false, "urls": { "local": "http://localhost:3000" } });
        assert!(run(EventKind::ServiceRunning, options, json!({ "type": "snippet" })).is_empty());
    }

    #[test]
    fn test_malformed_payloads_are_ignored() {
        for kind in EventKind::ALL {
            let _ = run(kind, json!({ "logFileChanges": true, "logSnippet": true }), json!(null));
            let _ = run(kind, json!({}), json!([1, 2, 3]));
            let _ = run(kind, json!({ "urls": 5, "server": { "baseDir": 7 } }), json!({ "type": "server", "path": 1 }));
        }
    }

    struct Fixed(Options);

    impl InstanceState for Fixed {
        fn options(&self) -> Options {
            self.0.clone()
        }
    }

    #[test]
    fn test_detached_logger_stays_quiet() {
        let emitter = Emitter::new();
        let sink = Arc::new(MemorySink::new());
        let state = Arc::new(Fixed(Options::from_value(json!({ "logLevel": "debug" }))));

        let (_, subscription) = plugin(&emitter, state, sink.clone());
        assert_eq!(emitter.listener_count(EventKind::ServiceExit), 1);

        subscription.detach(&emitter);
        emitter.emit(EventKind::ServiceExit, &json!({}));

        assert!(sink.records().is_empty());
        for kind in EventKind::ALL {
            assert_eq!(emitter.listener_count(kind), 0);
        }
    }
}
