//! OCI Distribution v2 client: authentication, transport, wire types, and
//! the pull/push Registry Client built on top of them.
//!
//! Grounded in the teacher's `oci` module split (`auth` / `client` /
//! `types` / a fetch-orchestration module), narrowed from a full feature
//! and template registry client down to the plain manifest/blob pull and
//! push ctxpack needs.

pub mod auth;
pub mod client;
pub mod registry;
pub mod types;

pub use auth::RegistryCredentials;
pub use client::{HttpClient, MockHttpClient, ReqwestClient};
pub use registry::{exchange_token, RegistryClient};
pub use types::{accept_header, HttpResponse, ImageIndex, Layer, Manifest};
