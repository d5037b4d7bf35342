//! Category-aware response body validation
//!
//! A 200 response is downgraded to an error only when a validation rule
//! exists for the category and the body demonstrably fails it. Non-JSON
//! bodies pass; providers legitimately answer health checks with plain text.

use serde_json::Value;
use vigil_core::Category;

const STOCK_FIELDS: &[&str] = &["price", "c", "close", "regularMarketPrice", "Global Quote"];
const RATE_FIELDS: &[&str] = &["rate", "rates", "price", "data"];
const NEWS_FIELDS: &[&str] = &["articles", "results", "data"];

/// Validate a 200 body against the provider's category
pub(crate) fn validate_body(category: Category, body: &str) -> Result<(), String> {
    if body.trim().is_empty() {
        return Err("empty response body".to_string());
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        // Non-JSON 200 is still healthy
        return Ok(());
    };

    match category {
        Category::General => Ok(()),
        Category::Stock => expect_any_field(&value, STOCK_FIELDS),
        Category::Crypto | Category::Forex => expect_any_field(&value, RATE_FIELDS),
        Category::News => expect_any_field(&value, NEWS_FIELDS),
    }
}

fn expect_any_field(value: &Value, fields: &[&str]) -> Result<(), String> {
    match value {
        // A list response is a data payload in its own right
        Value::Array(_) => Ok(()),
        Value::Object(map) => {
            if fields.iter().any(|f| map.contains_key(*f)) {
                Ok(())
            } else {
                Err(format!(
                    "response body missing any of the expected fields {fields:?}"
                ))
            }
        }
        _ => Err("response body is not an object or array".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_body_with_price_passes() {
        assert!(validate_body(Category::Stock, r#"{"c": 189.5, "h": 190.1}"#).is_ok());
        assert!(validate_body(Category::Stock, r#"{"Global Quote": {}}"#).is_ok());
    }

    #[test]
    fn test_stock_body_without_price_fails() {
        let err = validate_body(Category::Stock, r#"{"note": "rate limit"}"#).unwrap_err();
        assert!(err.contains("expected fields"));
    }

    #[test]
    fn test_crypto_and_forex_share_rate_fields() {
        assert!(validate_body(Category::Crypto, r#"{"price": "64000.12"}"#).is_ok());
        assert!(validate_body(Category::Forex, r#"{"rates": {"EUR": 0.92}}"#).is_ok());
        assert!(validate_body(Category::Crypto, r#"{"message": "hi"}"#).is_err());
    }

    #[test]
    fn test_news_body() {
        assert!(validate_body(Category::News, r#"{"articles": []}"#).is_ok());
        assert!(validate_body(Category::News, r#"{"status": "ok"}"#).is_err());
    }

    #[test]
    fn test_general_accepts_any_non_empty_body() {
        assert!(validate_body(Category::General, "OK").is_ok());
        assert!(validate_body(Category::General, r#"{"whatever": 1}"#).is_ok());
    }

    #[test]
    fn test_empty_body_fails_every_category() {
        for category in Category::ALL {
            assert!(validate_body(category, "   ").is_err());
        }
    }

    #[test]
    fn test_non_json_body_passes_typed_categories() {
        assert!(validate_body(Category::Stock, "pong").is_ok());
    }

    #[test]
    fn test_array_body_passes() {
        assert!(validate_body(Category::News, r#"[{"title": "x"}]"#).is_ok());
    }
}
