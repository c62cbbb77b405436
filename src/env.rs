//! Environment lookups
//!
//! Assembly reads its inputs through [`EnvSource`] instead of calling
//! `std::env::var` directly, so tests can hand in a plain map.

use std::collections::HashMap;

/// A source of environment variables
pub trait EnvSource {
    /// Raw lookup. Implementations return `None` for unset variables.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Lookup that treats empty values as unset
    fn var(&self, key: &str) -> Option<String> {
        self.lookup(key).filter(|v| !v.is_empty())
    }

    /// Lookup with a fallback for unset or empty values
    fn var_or(&self, key: &str, default: &str) -> String {
        self.var(key).unwrap_or_else(|| default.to_string())
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<E: EnvSource + ?Sized> EnvSource for &E {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_values_are_unset() {
        let env = env(&[("OPENROUTER_API_KEY", "")]);
        assert_eq!(env.lookup("OPENROUTER_API_KEY"), Some(String::new()));
        assert_eq!(env.var("OPENROUTER_API_KEY"), None);
    }

    #[test]
    fn test_var_or_default() {
        let env = env(&[("SITE_NAME", "Acme")]);
        assert_eq!(env.var_or("SITE_NAME", "fallback"), "Acme");
        assert_eq!(env.var_or("SITE_URL", "http://localhost:5173"), "http://localhost:5173");
    }
}
