use snip_core::ShortenerError;
use url::{ParseError, Url};

/// Normalizes and validates a URL submitted for shortening.
///
/// Surrounding whitespace and trailing slashes are trimmed; the result must
/// be an absolute `http` or `https` URL with a host. The returned string is
/// the trimmed input, not a re-serialized form, so resolving the slug later
/// gives back exactly what was stored.
pub fn normalize_url(raw: &str) -> Result<String, ShortenerError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ShortenerError::EmptyUrl);
    }

    let parsed = Url::parse(trimmed).map_err(|err| match err {
        ParseError::EmptyHost => ShortenerError::MissingHost(trimmed.to_owned()),
        ParseError::RelativeUrlWithoutBase => ShortenerError::WrongScheme(trimmed.to_owned()),
        other => ShortenerError::InvalidUrlFormat(format!("{trimmed}: {other}")),
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ShortenerError::WrongScheme(trimmed.to_owned()));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ShortenerError::MissingHost(trimmed.to_owned()));
    }

    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert_eq!(normalize_url("http://a.example").unwrap(), "http://a.example");
        assert_eq!(
            normalize_url("https://a.example/x?q=1").unwrap(),
            "https://a.example/x?q=1"
        );
    }

    #[test]
    fn trims_trailing_slashes() {
        assert_eq!(normalize_url("https://a.example/x///").unwrap(), "https://a.example/x");
        assert_eq!(normalize_url("  https://a.example/ ").unwrap(), "https://a.example");
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize_url(""), Err(ShortenerError::EmptyUrl));
        assert_eq!(normalize_url("///"), Err(ShortenerError::EmptyUrl));
    }

    #[test]
    fn wrong_scheme() {
        assert!(matches!(
            normalize_url("ftp://a.example"),
            Err(ShortenerError::WrongScheme(_))
        ));
        assert!(matches!(
            normalize_url("a.example/path"),
            Err(ShortenerError::WrongScheme(_))
        ));
    }

    #[test]
    fn missing_host() {
        assert!(matches!(
            normalize_url("http://"),
            Err(ShortenerError::MissingHost(_))
        ));
    }

    #[test]
    fn invalid_format() {
        assert!(matches!(
            normalize_url("http://exa mple.com"),
            Err(ShortenerError::InvalidUrlFormat(_))
        ));
        assert!(matches!(
            normalize_url("https://[::1"),
            Err(ShortenerError::InvalidUrlFormat(_))
        ));
    }
}
