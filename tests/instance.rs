//! Driving a dev instance end to end with output captured in memory

use std::sync::Arc;

use livesync_lib::config::Draft;
use livesync_lib::logger::{Level, MemorySink};
use livesync_lib::startup::PackageMeta;
use livesync_lib::{startup, DevInstance, EventKind, Instance, InstanceState, StartArgs, StartupError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn draft(value: Value) -> Draft {
    value.as_object().cloned().unwrap_or_default()
}

fn start(
    instance: &Arc<DevInstance>,
    config: Value,
) -> Result<Arc<DevInstance>, StartupError> {
    let result = Arc::new(Mutex::new(None));
    let slot = result.clone();
    let meta = PackageMeta::new("livesync", "0.1.0").unwrap();

    startup(instance.clone(), "test", meta).init(
        StartArgs::new(draft(config)).with_callback(move |r| *slot.lock() = Some(r)),
    );

    let outcome = result.lock().take();
    outcome.expect("callback runs synchronously")
}

#[test]
fn snippet_mode_prints_the_snippet() {
    let sink = Arc::new(MemorySink::new());
    let instance = DevInstance::new("test", sink.clone());

    start(&instance, json!({ "port": 3000, "logPrefix": "LS" })).unwrap();

    let text = sink.text();
    assert!(text[0].starts_with("[LS] Copy the following snippet"), "{:?}", text);
    assert!(text[1].contains("//HOST:3000/livesync/livesync-client.js?v=0.1.0"));
    assert!(instance.is_active());
}

#[test]
fn events_from_collaborators_are_rendered() {
    let sink = Arc::new(MemorySink::new());
    let instance = DevInstance::new("test", sink.clone());
    start(&instance, json!({ "logSnippet": false, "logPrefix": "" })).unwrap();
    sink.clear();

    let emitter = instance.emitter();
    emitter.emit(EventKind::FileWatching, &json!({ "core": ["*.css"] }));
    emitter.emit(EventKind::FileReload, &json!({ "path": "app.css", "event": "change" }));
    emitter.emit(EventKind::FileReload, &json!({ "path": "app.css", "event": "change", "log": false }));
    emitter.emit(EventKind::BrowserReload, &json!({ "files": ["a", "b"] }));
    emitter.emit(EventKind::ClientConnected, &json!({ "ua": "Firefox/121.0" }));

    assert_eq!(
        sink.text(),
        vec![
            "Watching files...",
            "File event [change] : app.css",
            "Reloading Browsers... (buffered 2 events)",
        ]
    );

    instance.exit();
    assert!(!instance.is_active());
}

#[test]
fn json_mode_prints_one_snapshot() {
    let sink = Arc::new(MemorySink::new());
    let instance = DevInstance::new("test", sink.clone());
    start(&instance, json!({ "json": true, "logLevel": "silent" })).unwrap();

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, Level::Info);
    let parsed: Value = serde_json::from_str(&records[0].line).unwrap();
    assert_eq!(parsed["service:running"]["options"]["json"], json!(true));
    assert_eq!(parsed["service:running"]["options"]["version"], json!("0.1.0"));
}

#[test]
fn proxy_mode_is_refused() {
    let instance = DevInstance::new("test", Arc::new(MemorySink::new()));
    let err = start(&instance, json!({ "proxy": "localhost:8000" })).unwrap_err();
    assert!(matches!(err, StartupError::Unsupported { .. }));
    assert!(!instance.is_active());
}

#[test]
fn server_mode_needs_a_runtime() {
    let instance = DevInstance::new("test", Arc::new(MemorySink::new()));
    let err = start(&instance, json!({ "server": true, "open": false })).unwrap_err();
    assert!(matches!(err, StartupError::NoRuntime));
}

#[tokio::test]
async fn server_mode_serves_files() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "<h1>hello</h1>").unwrap();
    std::fs::create_dir(root.path().join("css")).unwrap();
    std::fs::write(root.path().join("css/app.css"), "body{}").unwrap();

    let sink = Arc::new(MemorySink::new());
    let instance = DevInstance::new("test", sink.clone());
    let running = start(
        &instance,
        json!({
            "server": root.path().display().to_string(),
            "port": 0,
            "open": false,
            "localOnly": true
        }),
    );
    let running = running.unwrap();

    let options = running.options();
    let port = options.get_u64("port").unwrap();
    assert_ne!(port, 0);
    assert_eq!(
        options.get_str("urls.local"),
        Some(format!("http://localhost:{}", port).as_str())
    );

    let text = sink.text();
    assert_eq!(text[0], "[LiveSync] Access URLs:");
    assert!(text.iter().any(|l| l.starts_with("[LiveSync] Serving files from: ")));

    let index = get(port, "/").await;
    assert!(index.starts_with("HTTP/1.1 200"), "{}", index);
    assert!(index.contains("<h1>hello</h1>"));

    let css = get(port, "/css/app.css").await;
    assert!(css.contains("text/css"));

    let missing = get(port, "/nope.js").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    running.exit();
}

#[cfg(unix)]
#[tokio::test]
async fn server_mode_stays_inside_base_dir() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "home").unwrap();
    let outside = tempfile::tempdir().unwrap();
    let secret = outside.path().join("secret.txt");
    std::fs::write(&secret, "top secret").unwrap();

    let instance = DevInstance::new("test", Arc::new(MemorySink::new()));
    let running = start(
        &instance,
        json!({
            "server": root.path().display().to_string(),
            "port": 0,
            "open": false,
            "localOnly": true
        }),
    )
    .unwrap();
    let port = running.options().get_u64("port").unwrap();

    let absolute = secret.display().to_string();
    for path in [
        format!("/{}", absolute),
        format!("/%2F{}", absolute.trim_start_matches('/')),
        format!("/../{}/secret.txt", outside.path().file_name().unwrap().to_string_lossy()),
    ] {
        let response = get(port, &path).await;
        assert!(response.starts_with("HTTP/1.1 404"), "{} -> {}", path, response);
        assert!(!response.contains("top secret"));
    }

    running.exit();
}

#[test]
fn restart_picks_up_new_log_options() {
    let sink = Arc::new(MemorySink::new());
    let instance = DevInstance::new("test", sink.clone());

    start(&instance, json!({ "logLevel": "silent", "logPrefix": "OLD" })).unwrap();
    assert!(sink.text().is_empty());
    instance.exit();

    start(
        &instance,
        json!({ "logLevel": "info", "logPrefix": "NEW", "logSnippet": true }),
    )
    .unwrap();
    let text = sink.text();
    assert!(text[0].starts_with("[NEW] Copy the following snippet"), "{:?}", text);

    sink.clear();
    instance.emitter().emit(EventKind::BrowserReload, &json!({}));
    assert_eq!(sink.text(), vec!["[NEW] Reloading Browsers..."]);
}

#[test]
fn rejects_port_out_of_range() {
    let instance = DevInstance::new("test", Arc::new(MemorySink::new()));
    let err = start(&instance, json!({ "port": 70000 })).unwrap_err();
    assert!(err.to_string().contains("Invalid port: 70000"));
}

async fn get(port: u64, path: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port as u16))
        .await
        .unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}
