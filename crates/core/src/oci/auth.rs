//! Registry credentials and the Basic-to-Bearer token exchange.

use crate::redaction;
use base64::Engine;

/// Credentials presented to a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCredentials {
    /// No authentication configured.
    None,
    /// `CTXP_USER` + `CTXP_TOKEN`, sent as HTTP Basic auth against the
    /// token endpoint.
    Basic { username: String, password: String },
    /// A bearer token already exchanged for a specific scope.
    Bearer { token: String },
}

impl RegistryCredentials {
    /// Build the credentials ctxpack's CLI uses: `CTXP_USER` (default
    /// `rozetyp`) as username, `CTXP_TOKEN` as password. Registers the
    /// token with the global redaction registry so it never appears in a
    /// log line or bubbled-up error.
    pub fn from_env() -> Self {
        let Ok(token) = std::env::var("CTXP_TOKEN") else {
            return Self::None;
        };
        redaction::add_global_secret(&token);
        let username = std::env::var("CTXP_USER").unwrap_or_else(|_| "rozetyp".to_string());
        Self::Basic {
            username,
            password: token,
        }
    }

    /// Render as an `Authorization` header value.
    pub fn to_auth_header(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => {
                let raw = format!("{username}:{password}");
                let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
                Some(format!("Basic {encoded}"))
            }
            Self::Bearer { token } => Some(format!("Bearer {token}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_header_is_base64_of_user_colon_pass() {
        let creds = RegistryCredentials::Basic {
            username: "rozetyp".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(
            creds.to_auth_header().unwrap(),
            format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode("rozetyp:hunter2")
            )
        );
    }

    #[test]
    fn bearer_auth_header_wraps_token() {
        let creds = RegistryCredentials::Bearer {
            token: "abc123".to_string(),
        };
        assert_eq!(creds.to_auth_header().unwrap(), "Bearer abc123");
    }

    #[test]
    fn none_has_no_auth_header() {
        assert_eq!(RegistryCredentials::None.to_auth_header(), None);
    }
}
