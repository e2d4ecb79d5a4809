use scribe_core::config::GatewayConfig;

/// Check a request's credentials against the configured token.
///
/// Bearer header first, then `?token=`. No configured token means anonymous
/// access.
pub fn validate_token(
    config: &GatewayConfig,
    bearer: Option<&str>,
    query_token: Option<&str>,
) -> bool {
    let Some(expected) = config.token.as_deref() else {
        return true;
    };
    match bearer {
        Some(value) => value == expected,
        None => query_token == Some(expected),
    }
}

/// Extract the `token` parameter from a query string.
pub fn extract_token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token(token: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            token: token.map(String::from),
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn test_no_token_is_anonymous() {
        let config = with_token(None);
        assert!(validate_token(&config, None, None));
        assert!(validate_token(&config, Some("anything"), None));
    }

    #[test]
    fn test_bearer_must_match() {
        let config = with_token(Some("secret"));
        assert!(validate_token(&config, Some("secret"), None));
        assert!(!validate_token(&config, Some("wrong"), None));
        assert!(!validate_token(&config, None, None));
    }

    #[test]
    fn test_wrong_bearer_is_not_rescued_by_query() {
        let config = with_token(Some("secret"));
        assert!(validate_token(&config, None, Some("secret")));
        assert!(!validate_token(&config, Some("wrong"), Some("secret")));
    }

    #[test]
    fn test_extract_token_from_query() {
        assert_eq!(extract_token_from_query("trace=true&token=abc"), Some("abc"));
        assert_eq!(extract_token_from_query("trace=true"), None);
        assert_eq!(extract_token_from_query(""), None);
    }
}
