//! Error types for the ctxpack core library.

use thiserror::Error;

/// Domain errors surfaced by identity computation, caching, and registry I/O.
#[derive(Error, Debug)]
pub enum CtxPackError {
    /// A requested cache entry has no manifest on disk.
    #[error("manifest not found for {uri}")]
    ManifestNotFound { uri: String },

    /// A downloaded or extracted payload did not hash to the digest it was
    /// fetched under.
    #[error("digest mismatch for {digest}: expected {expected}, got {actual}")]
    DigestMismatch {
        digest: String,
        expected: String,
        actual: String,
    },

    /// A tar member attempted to escape its extraction directory.
    #[error("refusing to extract unsafe archive member: {member}")]
    Security { member: String },

    /// Registry authentication failed.
    #[error("registry authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// A network or protocol-level failure talking to a registry.
    #[error("registry error: {message}")]
    Registry { message: String },

    /// A seeded or installed entry's manifest did not match the digest it
    /// was being installed under.
    #[error("identity mismatch: manifest uri {found} does not match {expected}")]
    IdentityMismatch { expected: String, found: String },

    /// Any other I/O failure encountered while reading or writing cache
    /// state.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Contract or manifest JSON failed to parse or serialize.
    #[error("malformed JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// A catch-all for validation failures that don't fit the kinds above.
    #[error("ctxpack error: {message}")]
    Other { message: String },
}

impl CtxPackError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results with CtxPackError.
pub type Result<T> = std::result::Result<T, CtxPackError>;
