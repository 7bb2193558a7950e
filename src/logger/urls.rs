//! The "Access URLs" table

use super::{Level, Logger, Palette};

/// Presentable label for a url key
pub fn transform(key: &str) -> String {
    match key {
        "ui" => "UI Local".to_string(),
        "ui-external" => "UI External".to_string(),
        _ => {
            let mut chars = key.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Lines of the table body: a leading rule, one row per url, and a rule
/// after every second row. Labels are right aligned.
pub fn access_url_table(urls: &[(String, String)], palette: Palette) -> Vec<String> {
    let labels: Vec<String> = urls.iter().map(|(name, _)| transform(name)).collect();

    let max_label = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let max_url = urls.iter().map(|(_, url)| url.chars().count()).max().unwrap_or(0);

    let rule = format!(" {}", palette.grey(&"-".repeat(max_label + max_url + 2)));

    let mut lines = vec![rule.clone()];
    for (ix, (label, (_, url))) in labels.iter().zip(urls).enumerate() {
        lines.push(format!(
            " {:>width$}: {}",
            label,
            palette.magenta(url),
            width = max_label
        ));
        if ix % 2 == 1 {
            lines.push(rule.clone());
        }
    }
    lines
}

/// Print the heading and table. Nothing is printed for an empty set.
pub(crate) fn log_urls(logger: &Logger, urls: &[(String, String)]) {
    if urls.is_empty() {
        return;
    }
    let palette = logger.palette();
    logger.info(palette.bold("Access URLs:"));
    for line in access_url_table(urls, palette) {
        logger.unprefixed(Level::Info, line);
    }
}
