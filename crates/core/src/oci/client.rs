//! HTTP transport abstraction for the Registry Client.
//!
//! Mirrors the teacher's `HttpClient` trait + real/mock implementation
//! split (`oci::client::ReqwestClient` / `MockHttpClient`), trimmed to the
//! handful of verbs a registry pull/push actually needs, so pull and push
//! flows can be exercised in tests without a real network.

use crate::errors::{CtxPackError, Result};
use crate::oci::types::HttpResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Minimal HTTP verbs the Registry Client and token exchange need.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<HttpResponse>;

    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<HttpResponse>;

    async fn put(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<HttpResponse>;
}

/// Real HTTP client backed by `reqwest` over rustls.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CtxPackError::registry(e.to_string()))?;
        Ok(Self { client })
    }

    async fn to_http_response(resp: reqwest::Response) -> Result<HttpResponse> {
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CtxPackError::registry(e.to_string()))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new().expect("failed to build default reqwest client")
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<HttpResponse> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| CtxPackError::registry(format!("GET {url} failed: {e}")))?;
        Self::to_http_response(resp).await
    }

    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<HttpResponse> {
        let mut req = self.client.post(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| CtxPackError::registry(format!("POST {url} failed: {e}")))?;
        Self::to_http_response(resp).await
    }

    async fn put(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Bytes,
    ) -> Result<HttpResponse> {
        let mut req = self.client.put(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| CtxPackError::registry(format!("PUT {url} failed: {e}")))?;
        Self::to_http_response(resp).await
    }
}

/// A scripted [`HttpClient`] for tests: responses are registered per exact
/// URL and method, and calls to unregistered URLs fail loudly rather than
/// hitting the network.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<(String, String), HttpResponse>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, method: &str, url: &str, status: u16, body: impl Into<Bytes>) {
        self.add_response_with_headers(method, url, status, body, HashMap::new());
    }

    pub fn add_response_with_headers(
        &self,
        method: &str,
        url: &str,
        status: u16,
        body: impl Into<Bytes>,
        headers: HashMap<String, String>,
    ) {
        self.responses.lock().unwrap().insert(
            (method.to_uppercase(), url.to_string()),
            HttpResponse {
                status,
                headers,
                body: body.into(),
            },
        );
    }

    fn respond(&self, method: &str, url: &str) -> Result<HttpResponse> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_uppercase(), url.to_string()))
            .cloned()
            .ok_or_else(|| CtxPackError::registry(format!("no mock response for {method} {url}")))
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, _headers: &HashMap<String, String>) -> Result<HttpResponse> {
        self.respond("GET", url)
    }

    async fn post(
        &self,
        url: &str,
        _headers: &HashMap<String, String>,
        _body: Bytes,
    ) -> Result<HttpResponse> {
        self.respond("POST", url)
    }

    async fn put(
        &self,
        url: &str,
        _headers: &HashMap<String, String>,
        _body: Bytes,
    ) -> Result<HttpResponse> {
        self.respond("PUT", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_registered_response() {
        let mock = MockHttpClient::new();
        mock.add_response("GET", "https://example.test/x", 200, "hello");
        let resp = mock
            .get("https://example.test/x", &HashMap::new())
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn mock_client_errors_on_unregistered_url() {
        let mock = MockHttpClient::new();
        let result = mock.get("https://example.test/missing", &HashMap::new()).await;
        assert!(result.is_err());
    }
}
