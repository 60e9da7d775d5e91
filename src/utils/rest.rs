//! Helpers shared by the proxy and index HTTP clients.

use reqwest::header::CONTENT_TYPE;
use reqwest::Response;

/// How much of an unexpected body ends up in an error message.
const BODY_HEAD_LIMIT: usize = 512;

/// True if the response declares `application/json`, ignoring parameters such
/// as `charset`.
pub fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

pub fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// First bytes of a body for diagnostics, with `...` when it was cut.
pub fn body_head(body: &[u8]) -> String {
    if body.len() <= BODY_HEAD_LIMIT {
        return String::from_utf8_lossy(body).into_owned();
    }
    format!("{}...", String::from_utf8_lossy(&body[..BODY_HEAD_LIMIT]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_head_truncates() {
        assert_eq!(body_head(b"<html>bad gateway</html>"), "<html>bad gateway</html>");

        let long = vec![b'a'; BODY_HEAD_LIMIT + 1];
        let head = body_head(&long);
        assert!(head.ends_with("..."));
        assert_eq!(head.len(), BODY_HEAD_LIMIT + 3);

        let exact = vec![b'a'; BODY_HEAD_LIMIT];
        assert!(!body_head(&exact).ends_with("..."));
    }
}
