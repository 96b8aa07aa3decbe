use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::local_path::PathMapper;
use crate::url_utils::{normalize, same_host};

static CSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)url\(([^)]+)\)").expect("valid url() pattern"));

/// Rewrite same-host `url(...)` references in `css` to local paths.
///
/// Returns the rewritten text and the referenced same-host assets in
/// first-seen order. Empty and `data:` references, cross-host references, and
/// anything that does not look like a `url()` token pass through untouched.
pub fn rewrite_css(base_url: &str, css: &str, mapper: &PathMapper) -> (String, Vec<String>) {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();

    let rewritten = CSS_URL.replace_all(css, |caps: &Captures| {
        let raw = caps[1].trim().trim_matches('"').trim_matches('\'').trim();

        if raw.is_empty() || raw.to_ascii_lowercase().starts_with("data:") {
            return caps[0].to_string();
        }

        let absolute = normalize(base_url, raw);
        if !same_host(base_url, &absolute) {
            return caps[0].to_string();
        }

        let local = mapper.local_path(&absolute);
        if seen.insert(absolute.clone()) {
            assets.push(absolute);
        }
        format!("url({})", local)
    });

    (rewritten.into_owned(), assets)
}
