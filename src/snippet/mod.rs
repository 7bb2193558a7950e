//! The embeddable script tag that connects a page to the reload channel

use crate::config::{Mode, Options};

/// URL namespace the client script lives under
pub const SCRIPT_NAMESPACE: &str = "/livesync";

const SCRIPT_FILE: &str = "livesync-client.js";

/// Path of the client script, versioned so browsers do not cache stale copies
pub fn client_script_path(options: &Options) -> String {
    let version = options.get_str("version").unwrap_or("0.0.0");
    format!("{}/{}?v={}", SCRIPT_NAMESPACE, SCRIPT_FILE, version)
}

/// Where the page should load the client script from
pub fn script_src(options: &Options) -> String {
    let path = client_script_path(options);
    let port = options.get_u64("port").unwrap_or(0);

    if options.get_bool("localOnly") {
        let scheme = options.get_str("scheme").unwrap_or("http");
        return format!("{}://localhost:{}{}", scheme, port, path);
    }

    if let Some(domain) = options.get_str("script.domain").filter(|d| !d.is_empty()) {
        return format!("{}{}", domain.trim_end_matches('/'), path);
    }

    if options.mode() == Mode::Proxy {
        return path;
    }

    format!("//HOST:{}{}", port, path)
}

/// The block users paste before `</body>`
pub fn script_tags(options: &Options) -> String {
    let async_attr = match options.get("snippetOptions.async").and_then(|v| v.as_bool()) {
        Some(false) => "",
        _ => "async ",
    };

    [
        r#"<script id="__ls_script__">//<![CDATA["#.to_string(),
        format!(
            r#"    document.write("<script {}src='{}'><\/script>".replace("HOST", location.hostname));"#,
            async_attr,
            script_src(options)
        ),
        "//]]></script>".to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_snippet() {
        let options = Options::from_value(json!({
            "port": 3000,
            "version": "0.1.0",
            "snippetOptions": { "async": true }
        }));

        assert_eq!(
            script_tags(&options),
            "<script id=\"__ls_script__\">//<![CDATA[\n    \
             document.write(\"<script async src='//HOST:3000/livesync/livesync-client.js?v=0.1.0'><\\/script>\".replace(\"HOST\", location.hostname));\n\
             //]]></script>"
        );
    }

    #[test]
    fn test_script_src_variants() {
        let local = Options::from_value(json!({ "port": 4000, "localOnly": true, "scheme": "https", "version": "1.2.3" }));
        assert_eq!(script_src(&local), "https://localhost:4000/livesync/livesync-client.js?v=1.2.3");

        let domain = Options::from_value(json!({ "port": 4000, "script": { "domain": "http://cdn.test/" }, "version": "1.2.3" }));
        assert_eq!(script_src(&domain), "http://cdn.test/livesync/livesync-client.js?v=1.2.3");

        let proxy = Options::from_value(json!({ "proxy": { "target": "http://localhost:8000" }, "version": "1.2.3" }));
        assert_eq!(script_src(&proxy), "/livesync/livesync-client.js?v=1.2.3");
    }

    #[test]
    fn test_sync_snippet() {
        let options = Options::from_value(json!({ "port": 3000, "snippetOptions": { "async": false } }));
        assert!(script_tags(&options).contains("<script src='//HOST:3000"));
    }
}
