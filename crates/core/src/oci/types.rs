//! Wire types for the OCI Distribution v2 subset ctxpack speaks.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OCI image manifest (minimal fields ctxpack depends on).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(default)]
    pub config: Option<Layer>,
    pub layers: Vec<Layer>,
}

/// A manifest layer or config blob descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Layer {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// An OCI image index, used to resolve a multi-arch/multi-variant manifest
/// list down to a single manifest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageIndex {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub manifests: Vec<IndexManifestRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexManifestRef {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

/// HTTP response returned by an [`crate::oci::client::HttpClient`] call.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub(crate) const INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
pub(crate) const DOCKER_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub(crate) const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub(crate) const DOCKER_MANIFEST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v2+json";
pub(crate) const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// `Accept` header value listing every manifest media type ctxpack can
/// interpret, in the order the registry should prefer them.
pub fn accept_header() -> String {
    [
        INDEX_MEDIA_TYPE,
        MANIFEST_MEDIA_TYPE,
        DOCKER_LIST_MEDIA_TYPE,
        DOCKER_MANIFEST_MEDIA_TYPE,
    ]
    .join(", ")
}
