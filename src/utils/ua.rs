//! Browser name and version from a User-Agent header

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub name: String,
    pub version: String,
}

/// Checked in order: several browsers also advertise Chrome or Safari tokens.
static BROWSERS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Edge", r"Edg(?:e|A|iOS)?/([\d.]+)"),
        ("Opera", r"(?:OPR|Opera)/([\d.]+)"),
        ("Samsung Browser", r"SamsungBrowser/([\d.]+)"),
        ("Firefox", r"(?:Firefox|FxiOS)/([\d.]+)"),
        ("Chrome", r"(?:Chrome|CriOS)/([\d.]+)"),
        ("Safari", r"Version/([\d.]+).*Safari/"),
        ("IE", r"(?:MSIE |Trident/.*rv:)([\d.]+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

/// Identify the browser behind `ua`, if it is one we know
pub fn parse_user_agent(ua: &str) -> Option<UserAgent> {
    BROWSERS.iter().find_map(|(name, re)| {
        re.captures(ua).and_then(|caps| caps.get(1)).map(|version| UserAgent {
            name: name.to_string(),
            version: version.as_str().to_string(),
        })
    })
}
