use http::HeaderMap;
use http::header;

/// The content-coding token this middleware negotiates.
pub const SCHEME: &str = "gzip";

/// Returns whether the request advertises gzip support.
///
/// Detection is substring presence of the token anywhere in the
/// `Accept-Encoding` value. Quality values are not parsed; `gzip;q=0` counts
/// as acceptance.
pub(crate) fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SCHEME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with_accept_encoding(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_absent_header() {
        assert!(!accepts_gzip(&HeaderMap::new()));
    }

    #[test]
    fn test_exact_token() {
        assert!(accepts_gzip(&headers_with_accept_encoding("gzip")));
    }

    #[test]
    fn test_token_in_list() {
        assert!(accepts_gzip(&headers_with_accept_encoding(
            "deflate, gzip;q=1.0, *;q=0.5"
        )));
        assert!(accepts_gzip(&headers_with_accept_encoding("br, x-gzip")));
    }

    #[test]
    fn test_other_encodings_only() {
        assert!(!accepts_gzip(&headers_with_accept_encoding("br, deflate")));
        assert!(!accepts_gzip(&headers_with_accept_encoding("identity")));
    }

    #[test]
    fn test_quality_values_not_parsed() {
        // Substring detection deliberately ignores q-values.
        assert!(accepts_gzip(&headers_with_accept_encoding("gzip;q=0")));
    }
}
