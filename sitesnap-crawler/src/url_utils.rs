use url::Url;

/// Resolve `reference` against `base` and drop any fragment.
///
/// Never fails: when the base does not parse the reference is tried on its
/// own, and as a last resort the raw reference is returned with its fragment
/// cut off. Callers filter the result through [`same_host`].
pub fn normalize(base: &str, reference: &str) -> String {
    let reference = reference.trim();

    let resolved = match Url::parse(base) {
        Ok(base_url) => base_url.join(reference).ok(),
        Err(_) => Url::parse(reference).ok(),
    };

    match resolved {
        Some(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        None => match reference.split_once('#') {
            Some((head, _)) => head.to_string(),
            None => reference.to_string(),
        },
    }
}

/// True when both URLs are http(s) and share the same network location.
pub fn same_host(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (Url::parse(a), Url::parse(b)) else {
        return false;
    };

    if !is_web_scheme(&a) || !is_web_scheme(&b) {
        return false;
    }

    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => {
            // `port()` is None for the scheme's default port, so http and
            // https on their default ports count as one network location.
            ha.eq_ignore_ascii_case(hb) && a.port() == b.port()
        }
        _ => false,
    }
}

/// Storage identifier for the host of `url`: `host`, or `host_port` when the
/// URL carries an explicit port.
pub fn host_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.to_string(),
    })
}

fn is_web_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(
            normalize("https://example.com/docs/intro.html", "guide.html"),
            "https://example.com/docs/guide.html"
        );
        assert_eq!(
            normalize("https://example.com/docs/intro.html", "/about"),
            "https://example.com/about"
        );
        assert_eq!(
            normalize("https://example.com/docs/", "../img/a.png"),
            "https://example.com/img/a.png"
        );
    }

    #[test]
    fn test_normalize_is_fragment_insensitive() {
        let base = "https://example.com/";
        let plain = normalize(base, "/page");
        assert_eq!(normalize(base, "/page#top"), plain);
        assert_eq!(normalize(base, "/page#section-2"), plain);
        assert_eq!(normalize(base, "https://example.com/page#x"), plain);
    }

    #[test]
    fn test_normalize_absolute_reference_wins() {
        assert_eq!(
            normalize("https://example.com/a", "http://other.org/b?q=1"),
            "http://other.org/b?q=1"
        );
    }

    #[test]
    fn test_normalize_malformed_base_is_best_effort() {
        assert_eq!(
            normalize("not a url", "https://example.com/x#frag"),
            "https://example.com/x"
        );
        assert_eq!(normalize("not a url", "relative/path#frag"), "relative/path");
    }

    #[test]
    fn test_same_host() {
        assert!(same_host("https://example.com/a", "https://example.com/b?c=d"));
        assert!(same_host("http://example.com/", "https://example.com/"));
        assert!(!same_host("https://example.com/", "https://cdn.example.com/"));
        assert!(!same_host("https://example.com/", "https://example.com:8443/"));
        assert!(same_host("https://example.com:443/", "https://example.com/"));
        assert!(!same_host("https://example.com/", "mailto:someone@example.com"));
        assert!(!same_host("ftp://example.com/", "ftp://example.com/file"));
        assert!(!same_host("garbage", "https://example.com/"));
    }

    #[test]
    fn test_host_id() {
        assert_eq!(host_id("https://example.com/a"), Some("example.com".to_string()));
        assert_eq!(
            host_id("http://127.0.0.1:8080/"),
            Some("127.0.0.1_8080".to_string())
        );
        assert_eq!(host_id("mailto:x@y.z"), None);
    }
}
