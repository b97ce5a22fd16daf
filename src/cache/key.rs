//! Request key normalization.

use url::Url;

/// Cache key for a request URL: the URL with its query string and fragment
/// removed, so `bundle.abc.js?v=2` and `bundle.abc.js` share an entry.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_query(None);
    normalized.set_fragment(None);
    normalized.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        normalize_url(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_strips_query() {
        assert_eq!(
            key("http://localhost/static/js/bundle.abc123.js?v=2"),
            "http://localhost/static/js/bundle.abc123.js"
        );
    }

    #[test]
    fn test_strips_fragment_and_empty_query() {
        assert_eq!(
            key("http://localhost/static/css/bundle.ff.css?#top"),
            "http://localhost/static/css/bundle.ff.css"
        );
    }

    #[test]
    fn test_plain_url_unchanged() {
        assert_eq!(key("https://example.com/app.css"), "https://example.com/app.css");
    }
}
