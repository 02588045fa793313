//! Status classification for platform responses
//!
//! Maps an HTTP status (plus body and rate-limit headers) onto the
//! `PlatformError` taxonomy. Only 429 carries a cooldown hint; auth failures
//! can also surface as a 400 with a recognisable message.

use std::time::Duration;

use crate::error::PlatformError;

/// Body fragments that mark an account-level failure regardless of status.
///
/// These indicate the session itself is unusable (bad cookies, locked or
/// suspended account), not a problem with the request.
const AUTH_PATTERNS: &[&str] = &[
    "could not authenticate",
    "bad authentication data",
    "account is temporarily locked",
    "account has been suspended",
    "your account is suspended",
];

/// Classify a non-success response.
///
/// 429 is `RateLimited` with the supplied hint; 401/403 and bodies matching
/// `AUTH_PATTERNS` are `Auth`; 404 is `NotFound`; 408/425/5xx are
/// `Transient`; everything else is `Fatal`.
pub fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> PlatformError {
    let lower = body.to_lowercase();
    let detail = summarize(status, body);

    if status != 429 && AUTH_PATTERNS.iter().any(|p| lower.contains(p)) {
        return PlatformError::Auth(detail);
    }

    match status {
        429 => PlatformError::RateLimited { retry_after },
        401 | 403 => PlatformError::Auth(detail),
        404 => PlatformError::NotFound(detail),
        408 | 425 | 500..=599 => PlatformError::Transient(detail),
        _ => PlatformError::Fatal(detail),
    }
}

/// Derive a cooldown hint from rate-limit headers.
///
/// `retry-after` (delta seconds) wins over `x-rate-limit-reset` (absolute
/// unix seconds). A reset time already in the past yields a zero hint.
pub fn parse_retry_after(
    retry_after: Option<&str>,
    rate_limit_reset: Option<&str>,
    now_unix_secs: u64,
) -> Option<Duration> {
    if let Some(secs) = retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }
    rate_limit_reset
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|reset| Duration::from_secs(reset.saturating_sub(now_unix_secs)))
}

/// Short diagnostic for error messages: status plus the first line of body.
fn summarize(status: u16, body: &str) -> String {
    let first_line = body.lines().next().unwrap_or("").trim();
    let snippet: String = first_line.chars().take(200).collect();
    if snippet.is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_429_is_rate_limited_with_hint() {
        let hint = Some(Duration::from_secs(120));
        assert_eq!(
            classify_status(429, "Rate limit exceeded", hint),
            PlatformError::RateLimited { retry_after: hint }
        );
    }

    #[test]
    fn classify_429_ignores_auth_patterns() {
        let err = classify_status(429, "could not authenticate", None);
        assert_eq!(err, PlatformError::RateLimited { retry_after: None });
    }

    #[test]
    fn classify_401_403_auth() {
        assert!(matches!(classify_status(401, "", None), PlatformError::Auth(_)));
        assert!(matches!(classify_status(403, "", None), PlatformError::Auth(_)));
    }

    #[test]
    fn classify_400_with_auth_message_is_auth() {
        let body = r#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#;
        assert!(matches!(classify_status(400, body, None), PlatformError::Auth(_)));
    }

    #[test]
    fn classify_404_not_found() {
        assert!(matches!(
            classify_status(404, "no such user", None),
            PlatformError::NotFound(msg) if msg == "status 404: no such user"
        ));
    }

    #[test]
    fn classify_transient_statuses() {
        for status in [408, 425, 500, 502, 503, 504] {
            assert!(
                matches!(classify_status(status, "", None), PlatformError::Transient(_)),
                "status {status} should be transient"
            );
        }
    }

    #[test]
    fn classify_other_4xx_is_fatal() {
        assert!(matches!(classify_status(400, "bad query", None), PlatformError::Fatal(_)));
        assert!(matches!(classify_status(422, "", None), PlatformError::Fatal(_)));
    }

    #[test]
    fn summarize_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let PlatformError::Fatal(msg) = classify_status(400, &body, None) else {
            panic!("expected fatal");
        };
        assert_eq!(msg.len(), "status 400: ".len() + 200);
    }

    #[test]
    fn retry_after_header_wins() {
        let hint = parse_retry_after(Some("30"), Some("2000"), 1000);
        assert_eq!(hint, Some(Duration::from_secs(30)));
    }

    #[test]
    fn reset_header_is_relative_to_now() {
        let hint = parse_retry_after(None, Some("1900"), 1000);
        assert_eq!(hint, Some(Duration::from_secs(900)));
    }

    #[test]
    fn reset_in_past_is_zero() {
        let hint = parse_retry_after(None, Some("500"), 1000);
        assert_eq!(hint, Some(Duration::ZERO));
    }

    #[test]
    fn unparsable_headers_give_no_hint() {
        assert_eq!(parse_retry_after(Some("soon"), Some("later"), 1000), None);
        assert_eq!(parse_retry_after(None, None, 1000), None);
    }
}
