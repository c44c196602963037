//! Small helpers shared by the HTTP adapters.

/// Join an API root and an endpoint path with exactly one slash.
///
/// ```
/// use voice_relay::http_util::join_url;
///
/// assert_eq!(
///     join_url("https://api.groq.com/openai/v1/", "/chat/completions"),
///     "https://api.groq.com/openai/v1/chat/completions"
/// );
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pull a readable message out of an OpenAI-style error body.
///
/// Falls back to the (truncated) raw body when it is not
/// `{"error": {"message": …}}` or `{"error": "…"}`.
pub fn api_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            return msg.to_string();
        }
        if let Some(msg) = json["error"].as_str() {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join_url("http://h/v1", "audio/speech"), "http://h/v1/audio/speech");
        assert_eq!(join_url("http://h/v1/", "/audio/speech"), "http://h/v1/audio/speech");
    }

    #[test]
    fn extracts_openai_error_message() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(body), "Invalid API Key");
    }

    #[test]
    fn extracts_flat_error_string() {
        assert_eq!(api_error_message(r#"{"error":"rate limited"}"#), "rate limited");
    }

    #[test]
    fn falls_back_to_truncated_body() {
        let body = "x".repeat(500);
        let msg = api_error_message(&body);
        assert!(msg.ends_with('…'));
        assert_eq!(msg.chars().count(), 201);
        assert_eq!(api_error_message("  Bad Gateway \n"), "Bad Gateway");
    }
}
