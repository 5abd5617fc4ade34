//! Local content-addressed cache store.

mod store;

pub use store::{CacheManifest, LocalCacheStore, Provenance};
