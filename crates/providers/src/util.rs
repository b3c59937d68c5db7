//! Shared helpers for provider adapters.

use sa_domain::config::AuthConfig;
use sa_domain::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(0)
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key from the environment variable named by `auth.env`.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    std::env::var(&auth.env).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{}' not set or not valid UTF-8",
            auth.env
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_reads_env_var() {
        let var_name = "SA_TEST_PROVIDER_KEY_1234";
        std::env::set_var(var_name, "secret-value");
        let auth = AuthConfig {
            env: var_name.into(),
            header: "x-api-key".into(),
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_env_is_auth_error() {
        let auth = AuthConfig {
            env: "SA_TEST_NONEXISTENT_KEY_9999".into(),
            header: "x-api-key".into(),
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
