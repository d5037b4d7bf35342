//! Credential resolution from the process environment
//!
//! Availability checks only ever read the environment, never mutate it.

use vigil_core::ProviderConfig;

/// Find the first listed credential present (and non-empty) in the process
/// environment
///
/// Returns the env key and its value; the ordering of `required_env_keys`
/// is the priority order.
pub fn resolve_credential(provider: &ProviderConfig) -> Option<(String, String)> {
    provider.required_env_keys.iter().find_map(|key| {
        std::env::var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| (key.clone(), value))
    })
}

/// Whether the provider can be probed with the current environment
///
/// Providers with no `required_env_keys` are always available.
pub fn is_available(provider: &ProviderConfig) -> bool {
    provider.required_env_keys.is_empty() || resolve_credential(provider).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AuthType, Category};

    fn provider(keys: Vec<&str>) -> ProviderConfig {
        ProviderConfig {
            id: "test".to_string(),
            name: "Test".to_string(),
            base_url: "https://example.com".to_string(),
            health_endpoint: "/health".to_string(),
            auth_type: AuthType::ApiKey,
            api_key_header: "X-API-Key".to_string(),
            rate_limit_per_minute: None,
            priority_score: 50,
            category: Category::General,
            free_tier_limits: Default::default(),
            required_env_keys: keys.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_no_required_keys_is_available() {
        assert!(is_available(&provider(vec![])));
    }

    #[test]
    fn test_first_present_credential_wins() {
        std::env::set_var("VIGIL_TEST_CRED_B", "secret-b");
        std::env::set_var("VIGIL_TEST_CRED_C", "secret-c");
        std::env::remove_var("VIGIL_TEST_CRED_A");

        let p = provider(vec![
            "VIGIL_TEST_CRED_A",
            "VIGIL_TEST_CRED_B",
            "VIGIL_TEST_CRED_C",
        ]);
        let (key, value) = resolve_credential(&p).unwrap();
        assert_eq!(key, "VIGIL_TEST_CRED_B");
        assert_eq!(value, "secret-b");

        std::env::remove_var("VIGIL_TEST_CRED_B");
        std::env::remove_var("VIGIL_TEST_CRED_C");
    }

    #[test]
    fn test_missing_credential_means_unavailable() {
        std::env::remove_var("VIGIL_TEST_CRED_MISSING");
        let p = provider(vec!["VIGIL_TEST_CRED_MISSING"]);
        assert!(!is_available(&p));
        assert!(resolve_credential(&p).is_none());
    }

    #[test]
    fn test_empty_value_does_not_count() {
        std::env::set_var("VIGIL_TEST_CRED_EMPTY", "");
        let p = provider(vec!["VIGIL_TEST_CRED_EMPTY"]);
        assert!(!is_available(&p));
        std::env::remove_var("VIGIL_TEST_CRED_EMPTY");
    }
}
