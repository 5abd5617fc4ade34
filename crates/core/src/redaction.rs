//! Secret redaction for logs and error messages
//!
//! Registry credentials (`CTXP_TOKEN`, and the password half of basic auth)
//! are registered here before they touch any HTTP client or error path, so
//! a leaked log line or bubbled-up error can never reveal their value.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Minimum length for a value to be considered for redaction
const MIN_REDACTION_LENGTH: usize = 8;

/// Replacement text for redacted secrets
const REDACTION_PLACEHOLDER: &str = "****";

/// Thread-safe registry for storing secrets that should be redacted
#[derive(Debug, Clone)]
pub struct SecretRegistry {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl SecretRegistry {
    /// Create a new empty secret registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Register a secret value. Values shorter than the minimum threshold
    /// are ignored to avoid redacting common short tokens (e.g. "true").
    pub fn add_secret(&self, secret: &str) {
        if secret.len() < MIN_REDACTION_LENGTH {
            return;
        }
        if let Ok(mut inner) = self.inner.write() {
            inner.insert(secret.to_string());
        }
    }

    /// Replace every occurrence of a registered secret in `text` with a
    /// placeholder.
    pub fn redact_text(&self, text: &str) -> String {
        let Ok(inner) = self.inner.read() else {
            return text.to_string();
        };
        let mut result = text.to_string();
        for secret in inner.iter() {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), REDACTION_PLACEHOLDER);
            }
        }
        result
    }

    /// Number of registered secrets (for tests).
    pub fn secret_count(&self) -> usize {
        self.inner.read().map(|i| i.len()).unwrap_or(0)
    }

    /// Clear all registered secrets.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.clear();
        }
    }
}

impl Default for SecretRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: once_cell::sync::Lazy<SecretRegistry> =
    once_cell::sync::Lazy::new(SecretRegistry::new);

/// The process-wide secret registry used by the CLI and registry client.
pub fn global_registry() -> &'static SecretRegistry {
    &GLOBAL_REGISTRY
}

/// Register a secret with the global registry.
pub fn add_global_secret(secret: &str) {
    global_registry().add_secret(secret);
}

/// Redact any registered secret out of `text` using the global registry.
pub fn redact(text: &str) -> String {
    global_registry().redact_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_redacts_a_secret() {
        let registry = SecretRegistry::new();
        registry.add_secret("ghp_abcdef1234567890");
        let text = "auth failed using token ghp_abcdef1234567890 against ghcr.io";
        assert_eq!(
            registry.redact_text(text),
            "auth failed using token **** against ghcr.io"
        );
    }

    #[test]
    fn ignores_short_values() {
        let registry = SecretRegistry::new();
        registry.add_secret("short");
        assert_eq!(registry.secret_count(), 0);
    }

    #[test]
    fn redacts_multiple_occurrences() {
        let registry = SecretRegistry::new();
        registry.add_secret("secret-token-1");
        let text = "secret-token-1 then secret-token-1 again";
        assert_eq!(registry.redact_text(text), "**** then **** again");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let registry = SecretRegistry::new();
        registry.add_secret("secret-token-1");
        let text = "no credentials mentioned here";
        assert_eq!(registry.redact_text(text), text);
    }

    #[test]
    fn global_registry_round_trip() {
        add_global_secret("global-test-secret-value");
        assert_eq!(redact("contains global-test-secret-value here"), "contains **** here");
        global_registry().clear();
    }
}
