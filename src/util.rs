//! Shared helpers used by handlers and queries.

use axum::http::HeaderMap;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token without the "Bearer " prefix, or None if the header is
/// missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Round a major-unit money amount to two decimals.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Hide most of the local part of an email: `john@example.com` -> `jo***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{}***@{}", visible, domain)
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));

        headers.insert("Authorization", HeaderValue::from_static("Bearer   "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn money_rounds_to_cents() {
        assert_eq!(round_money(4.999), 5.0);
        assert_eq!(round_money(19.9 * 10.0 / 100.0), 1.99);
        assert_eq!(round_money(0.0), 0.0);
    }

    #[test]
    fn email_masking() {
        assert_eq!(mask_email("john@example.com"), "jo***@example.com");
        assert_eq!(mask_email("a@b.io"), "a***@b.io");
        assert_eq!(mask_email("not-an-email"), "***");
    }
}
