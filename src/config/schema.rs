//! Default option values

use serde_json::{json, Value};

/// Default log prefix shown in front of every line
pub const DEFAULT_LOG_PREFIX: &str = "LiveSync";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// The defaults tree every draft is merged over
pub fn default_options() -> Value {
    json!({
        "port": DEFAULT_PORT,
        "host": null,
        "listen": null,
        "server": false,
        "proxy": false,
        "files": [],
        "watchEvents": ["change"],
        "logLevel": "info",
        "logPrefix": DEFAULT_LOG_PREFIX,
        "logConnections": false,
        "logFileChanges": true,
        "logSnippet": true,
        "open": "local",
        "cors": false,
        "localOnly": false,
        "https": false,
        "json": false,
        "startPath": null,
        "reloadDelay": 0,
        "reloadDebounce": 500,
        "snippetOptions": {
            "async": true
        },
        "script": {
            "domain": null
        }
    })
}
