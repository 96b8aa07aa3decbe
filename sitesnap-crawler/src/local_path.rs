use sha2::{Digest, Sha256};
use url::Url;

/// Extensions kept as-is when naming stored files. Anything else is stored as
/// `.html`.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".css", ".js", ".map", ".woff",
    ".woff2", ".ttf", ".otf", ".mp4", ".webm", ".mp3", ".wav", ".ogg",
];

const SLUG_LEN: usize = 60;
const HASH_LEN: usize = 10;

/// Lowercased extension of the last path segment, including the dot, or an
/// empty string.
pub fn url_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    let stem_start = segment.len() - segment.trim_start_matches('.').len();

    match segment[stem_start..].rfind('.') {
        Some(idx) => segment[stem_start + idx..].to_ascii_lowercase(),
        None => String::new(),
    }
}

pub fn is_asset_extension(ext: &str) -> bool {
    ASSET_EXTENSIONS.contains(&ext)
}

/// Stored file name for `url`: `<slug>__<hash><ext>`.
///
/// `forced_ext` overrides extension detection (used for error markers).
pub fn file_name(url: &str, forced_ext: Option<&str>) -> String {
    let ext = match forced_ext {
        Some(ext) => ext.to_string(),
        None => {
            let ext = url_extension(url);
            if is_asset_extension(&ext) {
                ext
            } else {
                ".html".to_string()
            }
        }
    };

    format!("{}__{}{}", slug(url), short_hash(url), ext)
}

fn slug(url: &str) -> String {
    url.replace("http://", "")
        .replace("https://", "")
        .chars()
        .map(|c| match c {
            '/' | '?' | ':' => '_',
            other => other,
        })
        .take(SLUG_LEN)
        .collect()
}

fn short_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(HASH_LEN);
    encoded
}

/// Maps absolute URLs to the link text written into rewritten pages.
///
/// Every reference to the same URL resolves to the same path, so the mirror
/// needs no lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    prefix: String,
}

impl PathMapper {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Links resolve under the archive mount, `/archive/<host>/<ts>/local/`.
    pub fn archive(host: &str, ts: &str) -> Self {
        Self::new(format!("/archive/{}/{}/local/", host, ts))
    }

    /// Links are bare file names, which resolve against the `local/` directory
    /// itself when the mirror is opened from disk.
    pub fn relative() -> Self {
        Self::new("")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, url: &str) -> String {
        file_name(url, None)
    }

    pub fn local_path(&self, url: &str) -> String {
        format!("{}{}", self.prefix, file_name(url, None))
    }
}
