//! Tests for provider error classification.

use super::*;
use crate::error::ErrorKind;
use reqwest::header::HeaderValue;

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    map
}

mod classification_tests {
    use super::*;

    #[test]
    fn test_401_is_unauthorized_with_envelope_message() {
        let body = br#"{"error":{"status":401,"message":"Invalid access token"}}"#;

        let error = ErrorMapping::default().normalize(401, &HeaderMap::new(), body);

        assert_eq!(error.kind, ErrorKind::Unauthorized);
        assert_eq!(error.status_code, Some(401));
        assert_eq!(error.message, "Invalid access token");
    }

    #[test]
    fn test_spotify_nested_envelope() {
        let body = br#"{"error":{"error":{"status":400,"message":"Only valid bearer authentication supported"}}}"#;

        let error = ErrorMapping::default().normalize(400, &HeaderMap::new(), body);

        assert_eq!(error.kind, ErrorKind::ProviderRejected);
        assert_eq!(error.message, "Only valid bearer authentication supported");
    }

    #[test]
    fn test_429_carries_retry_after_seconds() {
        let error = ErrorMapping::default().normalize(
            429,
            &headers(&[("retry-after", "30")]),
            b"Too Many Requests",
        );

        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(error.retry_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_404_is_not_found_without_body() {
        let error = ErrorMapping::default().normalize(404, &HeaderMap::new(), b"");

        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message, "Not Found");
    }

    #[test]
    fn test_envelope_code_is_captured() {
        let body = br#"{"status":"error","message":"Property values were not valid","category":"VALIDATION_ERROR"}"#;

        let error = ErrorMapping::default().normalize(400, &HeaderMap::new(), body);

        assert_eq!(error.kind, ErrorKind::ProviderRejected);
        assert_eq!(error.provider_code.as_deref(), Some("VALIDATION_ERROR"));
    }

    #[test]
    fn test_non_json_body_is_unknown() {
        let error =
            ErrorMapping::default().normalize(502, &HeaderMap::new(), b"<html>Bad Gateway</html>");

        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.status_code, Some(502));
        assert_eq!(error.message, "<html>Bad Gateway</html>");
        assert!(error.is_transient());
    }

    #[test]
    fn test_json_without_known_message_is_unknown() {
        let error = ErrorMapping::default().normalize(400, &HeaderMap::new(), br#"{"ok":false}"#);

        assert_eq!(error.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_fallback_message_is_truncated() {
        let body = "x".repeat(1000);

        let error = ErrorMapping::default().normalize(500, &HeaderMap::new(), body.as_bytes());

        assert_eq!(error.message.len(), 200);
    }

    #[test]
    fn test_custom_mapping_only_uses_declared_paths() {
        let mapping = ErrorMapping::new(vec![FieldPath::new("detail")], vec![]);
        let body = br#"{"message":"ignored","detail":"declared"}"#;

        let error = mapping.normalize(422, &HeaderMap::new(), body);

        assert_eq!(error.message, "declared");
        assert_eq!(error.provider_code, None);
    }
}

mod retry_after_tests {
    use super::*;

    #[test]
    fn test_http_date_in_the_past_is_zero() {
        let delay = retry_after(&headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]));

        assert_eq!(delay, Some(Duration::ZERO));
    }

    #[test]
    fn test_http_date_in_the_future() {
        let when = (Utc::now() + chrono::Duration::seconds(120)).to_rfc2822();

        let delay = retry_after(&headers(&[("retry-after", &when)])).unwrap();

        assert!(delay <= Duration::from_secs(120));
        assert!(delay >= Duration::from_secs(100));
    }

    #[test]
    fn test_falls_back_to_reset_header() {
        let reset = (Utc::now().timestamp() + 60).to_string();

        let delay = retry_after(&headers(&[("x-rate-limit-reset", &reset)])).unwrap();

        assert!(delay <= Duration::from_secs(60));
        assert!(delay >= Duration::from_secs(50));
    }

    #[test]
    fn test_missing_headers() {
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }
}
