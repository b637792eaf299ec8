//! Request/response values and the transport seam
//!
//! Requests and responses are plain data. `Transport` is the only piece that
//! touches the network; it reports every status as a response and leaves the
//! interpretation of non-2xx codes to the middleware.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use super::error::{ApiError, ApiResult};

/// Query parameter that opts a GET out of the response cache
pub const NO_CACHE_PARAM: &str = "noCache";

/// HTTP method for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Query parameters, kept sorted so their serialization is stable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Marks the request as cache-bypassing
    pub fn no_cache(self) -> Self {
        self.with(NO_CACHE_PARAM, "true")
    }

    /// True when the `noCache` marker is present with a truthy value
    pub fn is_no_cache(&self) -> bool {
        match self.0.get(NO_CACHE_PARAM) {
            Some(value) => !matches!(value.as_str(), "" | "false" | "0"),
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// URL-encoded query string with keys in sorted order
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An outgoing API call described as plain data
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/threats/threat-intelligence/`
    pub path: String,
    pub params: Params,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Set once this request has been resubmitted after a token refresh
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Params::new(),
            headers: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing value with the same name
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// A response as seen by callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Raw body text exactly as received (or as cached)
    pub body: String,
    /// True when served from the response cache without a network call
    pub from_cache: bool,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            from_cache: false,
        }
    }

    /// A 200 response rebuilt from a cached payload
    pub fn cached(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            from_cache: true,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body; an empty body decodes as JSON `null`
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Executes a request against the network
///
/// Implementations must return `Ok` for every HTTP status and reserve `Err`
/// for failures where no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, url: &str, request: &ApiRequest) -> ApiResult<ApiResponse>;
}

/// `Transport` backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured `reqwest::Client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: &str, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let mut builder = self.client.request(request.method.into(), url);

        if !request.params.is_empty() {
            let pairs: Vec<(&str, &str)> = request.params.iter().collect();
            builder = builder.query(&pairs);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ApiError::Network {
            message: format!("failed to read response body: {}", e),
        })?;

        debug!(method = request.method.as_str(), url, status, "response received");
        Ok(ApiResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_string_is_sorted_and_encoded() {
        let params = Params::new()
            .with("severity", "critical")
            .with("search", "log4j rce")
            .with("threat_type", "c2");
        assert_eq!(
            params.to_query_string(),
            "search=log4j+rce&severity=critical&threat_type=c2"
        );
    }

    #[test]
    fn test_insertion_order_does_not_change_query() {
        let a = Params::new().with("b", "2").with("a", "1");
        let b = Params::new().with("a", "1").with("b", "2");
        assert_eq!(a.to_query_string(), b.to_query_string());
    }

    #[test]
    fn test_no_cache_marker() {
        assert!(!Params::new().is_no_cache());
        assert!(Params::new().no_cache().is_no_cache());
        assert!(!Params::new().with(NO_CACHE_PARAM, "false").is_no_cache());
        assert!(Params::new().with(NO_CACHE_PARAM, "1").is_no_cache());
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut request = ApiRequest::get("/alerts/");
        request.set_header("authorization", "Bearer old");
        request.set_header("Authorization", "Bearer new");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer new"));
    }

    #[test]
    fn test_post_carries_body() {
        let request = ApiRequest::post("/cve/cves/", json!({"cve_id": "CVE-2024-0001"}));
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.body.unwrap()["cve_id"], "CVE-2024-0001");
        assert!(!request.retried);
    }

    #[test]
    fn test_response_json_decodes() {
        let response = ApiResponse::new(200, r#"{"access":"new-token"}"#);
        let value: Value = response.json().unwrap();
        assert_eq!(value["access"], "new-token");
    }

    #[test]
    fn test_response_json_empty_body_is_null() {
        let response = ApiResponse::new(204, "");
        let value: Option<Value> = response.json().unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_cached_response_is_marked() {
        let response = ApiResponse::cached("[]");
        assert!(response.from_cache);
        assert!(response.is_success());
    }
}
