use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Decoded, tag-free text of an HTML fragment. Non-breaking spaces become
/// plain spaces and the result is trimmed.
pub fn fragment_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.trim().to_string();
    }
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

/// Split a cell on `<br>` line-break markers.
pub fn split_breaks(html: &str) -> Vec<&str> {
    BREAK_RE.split(html).collect()
}

/// "Last, First" -> "First Last". Names without a comma pass through.
pub fn flip_name(name: &str) -> String {
    let mut parts: Vec<&str> = name.split(", ").map(str::trim).collect();
    parts.reverse();
    parts.join(" ").trim().to_string()
}
