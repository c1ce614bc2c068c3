//! Shared HTTP client and response plumbing for the Gemini API.

use std::sync::OnceLock;

use crate::error::StrydeError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Parse an SSE "data:" line.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))
}

/// Map an HTTP status code to an error.
pub fn status_to_error(status: u16, body: &str) -> StrydeError {
    match status {
        401 | 403 => StrydeError::Authentication(extract_error_message(body)),
        429 => StrydeError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => StrydeError::api(status, extract_error_message(body)),
    }
}

/// Pull the human-readable message out of a Gemini error body, if present.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_data_line_parses_with_and_without_space() {
        assert_eq!(parse_sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data("data:{\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(parse_sse_data(": comment"), None);
    }

    #[test]
    fn status_mapping_classifies_auth_and_rate_limit() {
        assert!(matches!(
            status_to_error(403, "{}"),
            StrydeError::Authentication(_)
        ));
        assert!(matches!(
            status_to_error(429, "{}"),
            StrydeError::RateLimited { .. }
        ));
        assert!(matches!(
            status_to_error(500, "boom"),
            StrydeError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn error_message_extracted_from_gemini_body() {
        let body = r#"{"error":{"code":400,"message":"Invalid model"}}"#;
        match status_to_error(400, body) {
            StrydeError::Api { message, .. } => assert_eq!(message, "Invalid model"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
