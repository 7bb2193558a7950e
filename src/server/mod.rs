//! Development instance
//!
//! Serves static files from the configured base directories and emits the
//! lifecycle events the logger renders. Proxying, file watching and the
//! browser socket layer are left to other collaborators.

use std::net::{IpAddr, SocketAddr, TcpListener, UdpSocket};
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info};

use crate::config::{Mode, Options};
use crate::events::{Emitter, EventKind};
use crate::instance::{Instance, InstanceState, StartCallback};
use crate::logger::{self, Logger, Sink, Subscription};
use crate::startup::StartupError;
use crate::utils::{clean_path, normalize_path, resolve_path};

/// Shared server state
struct ServerState {
    /// Directories searched in order for each request
    base_dirs: Vec<PathBuf>,

    /// Index file for directory requests
    index: String,
}

/// A live-reload development instance
pub struct DevInstance {
    name: String,
    active: AtomicBool,
    options: RwLock<Options>,
    emitter: Emitter,
    sink: Arc<dyn Sink>,
    logger: RwLock<Option<(Logger, Subscription)>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl std::fmt::Debug for DevInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevInstance")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl DevInstance {
    /// Create an idle instance whose output goes to `sink`
    pub fn new(name: &str, sink: Arc<dyn Sink>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            active: AtomicBool::new(false),
            options: RwLock::new(Options::default()),
            emitter: Emitter::new(),
            sink,
            logger: RwLock::new(None),
            shutdown: Mutex::new(None),
        })
    }

    /// The emitter external collaborators publish events on
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// The attached logger, once the instance has been initialized
    pub fn logger(&self) -> Option<Logger> {
        self.logger.read().as_ref().map(|(logger, _)| logger.clone())
    }

    /// Stop serving and announce the exit. Does nothing when not running.
    pub fn exit(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }
        self.emitter.emit(EventKind::ServiceExit, &json!({}));
    }

    fn start(self: &Arc<Self>, options: Options) -> Result<(), StartupError> {
        let mode = options.mode();
        if mode == Mode::Proxy {
            return Err(StartupError::Unsupported {
                mode: mode.to_string(),
            });
        }

        let options = match mode {
            Mode::Server => self.bind_server(options)?,
            _ => {
                let port = options.get_u64("port").unwrap_or(0);
                let urls = access_urls(&options, port);
                options.with("urls", urls)
            }
        };
        *self.options.write() = options.clone();

        self.attach_logger();

        self.emitter.emit(
            EventKind::ServiceRunning,
            &json!({ "type": mode.as_str(), "port": options.get("port") }),
        );

        if mode == Mode::Server {
            self.open_browser(&options);
        }

        Ok(())
    }

    /// Bind the listener and spawn the static file server
    fn bind_server(self: &Arc<Self>, options: Options) -> Result<Options, StartupError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StartupError::NoRuntime)?;

        let host = options
            .get_str("listen")
            .unwrap_or(if options.get_bool("localOnly") { "127.0.0.1" } else { "0.0.0.0" })
            .to_string();
        let port = options.get_u64("port").unwrap_or(0) as u16;

        let listener = TcpListener::bind((host.as_str(), port))?;
        listener.set_nonblocking(true)?;
        let addr: SocketAddr = listener.local_addr()?;

        let cwd = options
            .get_str("cwd")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let state = Arc::new(ServerState {
            base_dirs: base_dirs(&options)
                .iter()
                .map(|dir| resolve_path(&cwd, dir))
                .collect(),
            index: options.get_str("server.index").unwrap_or("index.html").to_string(),
        });

        let mut app = Router::new()
            .route("/", get(serve_index))
            .route("/*path", get(serve_file))
            .with_state(state);
        if options.get_bool("cors") {
            app = app.layer(CorsLayer::permissive());
        }

        let (tx, rx) = oneshot::channel::<()>();
        *self.shutdown.lock() = Some(tx);

        runtime.spawn(async move {
            let listener = match tokio::net::TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to register listener: {}", e);
                    return;
                }
            };
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        });

        info!("Server listening on {}", addr);

        let options = options.with("port", json!(addr.port()));
        let urls = access_urls(&options, u64::from(addr.port()));
        Ok(options.with("urls", urls))
    }

    /// Attach a logger built from the current options, replacing the one a
    /// previous run attached
    fn attach_logger(self: &Arc<Self>) {
        let mut slot = self.logger.write();
        if let Some((_, subscription)) = slot.take() {
            subscription.detach(&self.emitter);
        }
        let state: Arc<dyn InstanceState> = Arc::new(WeakState(Arc::downgrade(self)));
        *slot = Some(logger::plugin(&self.emitter, state, Arc::clone(&self.sink)));
    }

    fn open_browser(&self, options: &Options) {
        let target = match options.get("open") {
            Some(Value::String(key)) => key.as_str(),
            Some(Value::Bool(true)) => "local",
            _ => return,
        };
        let Some(url) = options.get_str(&format!("urls.{}", target)) else {
            debug!("No url named {} to open", target);
            return;
        };
        let url = match options.get_str("startPath") {
            Some(path) => format!("{}/{}", url, path.trim_start_matches('/')),
            None => url.to_string(),
        };

        match webbrowser_open(&url) {
            Ok(child) => watch_opener(child, self.emitter.clone(), url),
            Err(e) => {
                debug!("Failed to open browser: {}", e);
                self.emitter.emit(EventKind::BrowserError, &json!({ "url": url }));
            }
        }
    }
}

/// Lets listeners read options without keeping the instance alive
struct WeakState(Weak<DevInstance>);

impl InstanceState for WeakState {
    fn options(&self) -> Options {
        self.0.upgrade().map(|instance| instance.options()).unwrap_or_default()
    }
}

impl InstanceState for DevInstance {
    fn options(&self) -> Options {
        self.options.read().clone()
    }
}

impl Instance for DevInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn init(self: Arc<Self>, options: Options, cb: StartCallback<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return cb(Err(StartupError::AlreadyRunning {
                name: self.name.clone(),
            }));
        }

        match self.start(options) {
            Ok(()) => cb(Ok(self)),
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                cb(Err(e))
            }
        }
    }
}

fn base_dirs(options: &Options) -> Vec<String> {
    match options.get("server.baseDir") {
        Some(Value::String(dir)) => vec![dir.clone()],
        Some(Value::Array(dirs)) => dirs.iter().filter_map(|d| d.as_str().map(str::to_string)).collect(),
        _ => vec!["./".to_string()],
    }
}

/// Named urls the instance can be reached at
pub fn access_urls(options: &Options, port: u64) -> Value {
    let scheme = options.get_str("scheme").unwrap_or("http");
    let mut urls = Map::new();

    urls.insert(
        "local".to_string(),
        json!(format!("{}://localhost:{}", scheme, port)),
    );

    if !options.get_bool("localOnly") {
        let host = options
            .get_str("host")
            .map(str::to_string)
            .or_else(|| external_ip().map(|ip| ip.to_string()));
        if let Some(host) = host {
            urls.insert(
                "external".to_string(),
                json!(format!("{}://{}:{}", scheme, host, port)),
            );
        }
    }

    Value::Object(urls)
}

/// The address this machine uses for outbound traffic, if any.
/// Connecting a UDP socket sends no packets.
fn external_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// Serve the index file of the first base directory that has one
async fn serve_index(State(state): State<Arc<ServerState>>) -> Response {
    lookup(&state, "").await
}

/// Serve static files
async fn serve_file(
    State(state): State<Arc<ServerState>>,
    axum::extract::Path(path): axum::extract::Path<String>,
) -> Response {
    lookup(&state, &path).await
}

async fn lookup(state: &ServerState, path: &str) -> Response {
    let cleaned = clean_path(path);
    // A leading separator would make `join` discard the base directory.
    let relative = cleaned.trim_start_matches('/');

    for base in &state.base_dirs {
        let Some(mut file_path) = confine(base, relative) else {
            continue;
        };
        if is_kind(&file_path, |meta| meta.is_dir()).await {
            file_path = file_path.join(&state.index);
        }
        if !is_kind(&file_path, |meta| meta.is_file()).await {
            continue;
        }

        return match tokio::fs::read(&file_path).await {
            Ok(content) => {
                let mut response = content.into_response();
                response.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(get_content_type(&file_path)),
                );
                response
            }
            Err(e) => {
                error!("Failed to read file {}: {}", file_path.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    (StatusCode::NOT_FOUND, format!("File not found: /{}", relative)).into_response()
}

/// `relative` joined onto `base`, or `None` when the result leaves `base`
fn confine(base: &Path, relative: &str) -> Option<PathBuf> {
    let joined = normalize_path(&base.join(relative));
    joined.starts_with(base).then_some(joined)
}

async fn is_kind(path: &Path, check: fn(&std::fs::Metadata) -> bool) -> bool {
    tokio::fs::metadata(path).await.map(|meta| check(&meta)).unwrap_or(false)
}

/// Get content type for a file
fn get_content_type(path: &Path) -> &'static str {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

/// Launch the platform's url opener
fn webbrowser_open(url: &str) -> std::io::Result<Child> {
    #[cfg(target_os = "macos")]
    let child = Command::new("open").arg(url).spawn()?;

    #[cfg(target_os = "windows")]
    let child = Command::new("cmd").args(["/C", "start", "", url]).spawn()?;

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let child = Command::new("xdg-open").arg(url).spawn()?;

    Ok(child)
}

/// Wait for the opener off-thread and emit `browser:error` if it fails
fn watch_opener(mut child: Child, emitter: Emitter, url: String) {
    std::thread::spawn(move || match child.wait() {
        Ok(status) if status.success() => {}
        Ok(status) => {
            debug!("Browser opener exited with {}", status);
            emitter.emit(EventKind::BrowserError, &json!({ "url": url }));
        }
        Err(e) => {
            debug!("Failed to wait for browser opener: {}", e);
            emitter.emit(EventKind::BrowserError, &json!({ "url": url }));
        }
    });
}
