//! Tests for rate limit tracking.

use super::*;
use reqwest::header::HeaderValue;

fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_str(value).unwrap());
    }
    map
}

fn in_an_hour() -> String {
    (Utc::now().timestamp() + 3600).to_string()
}

mod parse_tests {
    use super::*;

    #[test]
    fn test_parse_github_style_headers() {
        let map = headers(&[
            ("x-ratelimit-limit", "5000".to_string()),
            ("x-ratelimit-remaining", "4999".to_string()),
            ("x-ratelimit-reset", in_an_hour()),
            ("x-ratelimit-resource", "search".to_string()),
        ]);

        let rate_limit = parse_rate_limit_from_headers(&map).unwrap();

        assert_eq!(rate_limit.limit(), 5000);
        assert_eq!(rate_limit.remaining(), 4999);
        assert_eq!(rate_limit.resource(), "search");
        assert!(!rate_limit.has_reset());
    }

    #[test]
    fn test_parse_twitter_style_headers() {
        let map = headers(&[
            ("x-rate-limit-limit", "15".to_string()),
            ("x-rate-limit-remaining", "0".to_string()),
            ("x-rate-limit-reset", in_an_hour()),
        ]);

        let rate_limit = parse_rate_limit_from_headers(&map).unwrap();

        assert!(rate_limit.is_exhausted());
        assert_eq!(rate_limit.resource(), DEFAULT_RESOURCE);
    }

    #[test]
    fn test_relative_reset_seconds() {
        let map = headers(&[("x-ratelimit-reset", "10".to_string())]);

        let delay = parse_reset_delay(&map).unwrap();

        assert!(delay <= Duration::from_secs(10));
        assert!(delay >= Duration::from_secs(8));
    }

    #[test]
    fn test_incomplete_headers_yield_none() {
        let map = headers(&[("x-ratelimit-limit", "100".to_string())]);

        assert!(parse_rate_limit_from_headers(&map).is_none());
    }

    #[test]
    fn test_non_numeric_headers_yield_none() {
        let map = headers(&[
            ("x-ratelimit-limit", "lots".to_string()),
            ("x-ratelimit-remaining", "1".to_string()),
            ("x-ratelimit-reset", in_an_hour()),
        ]);

        assert!(parse_rate_limit_from_headers(&map).is_none());
    }
}

mod limiter_tests {
    use super::*;

    #[test]
    fn test_unknown_resource_can_proceed() {
        let limiter = RateLimiter::default();

        assert!(limiter.can_proceed(DEFAULT_RESOURCE));
        assert!(limiter.get_limit(DEFAULT_RESOURCE).is_none());
    }

    #[test]
    fn test_records_and_blocks_near_exhaustion() {
        let limiter = RateLimiter::new(0.1);
        limiter.update_from_headers(&headers(&[
            ("x-ratelimit-limit", "100".to_string()),
            ("x-ratelimit-remaining", "5".to_string()),
            ("x-ratelimit-reset", in_an_hour()),
        ]));

        assert_eq!(limiter.get_limit(DEFAULT_RESOURCE).unwrap().remaining(), 5);
        assert!(!limiter.can_proceed(DEFAULT_RESOURCE));
    }

    #[test]
    fn test_reset_window_can_proceed() {
        let limiter = RateLimiter::new(0.1);
        let past = (Utc::now().timestamp() - 60).to_string();
        limiter.update_from_headers(&headers(&[
            ("x-ratelimit-limit", "100".to_string()),
            ("x-ratelimit-remaining", "0".to_string()),
            ("x-ratelimit-reset", past),
        ]));

        assert!(limiter.can_proceed(DEFAULT_RESOURCE));
    }

    #[test]
    fn test_margin_is_clamped() {
        let limiter = RateLimiter::new(5.0);
        limiter.update_from_headers(&headers(&[
            ("x-ratelimit-limit", "100".to_string()),
            ("x-ratelimit-remaining", "99".to_string()),
            ("x-ratelimit-reset", in_an_hour()),
        ]));

        // A margin of 1.0 reserves the entire window.
        assert!(!limiter.can_proceed(DEFAULT_RESOURCE));
    }
}
