//! Core library for ctxpack
//!
//! This crate implements contract identity, local content-addressed
//! caching, tar/gzip packing, and an OCI Distribution v2 client, composed
//! by [`coordinator::Coordinator`] into the operations the CLI exposes.

pub mod cache;
pub mod coordinator;
pub mod digest;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod oci;
pub mod redaction;
pub mod retry;
pub mod tarpack;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
