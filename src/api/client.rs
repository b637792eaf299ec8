//! The API client: one choke point for every backend call
//!
//! `ApiClient` exposes the usual verbs and runs each request through the
//! middleware in `middleware.rs`. GET bodies are cached for a few minutes, and
//! a 401 is answered with a single refresh-token exchange followed by one
//! resubmission of the original request.
//!
//! The retry flag lives on the request. Concurrent requests that all hit a
//! 401 each perform their own refresh exchange.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::auth::{exchange_refresh_token, REFRESH_ENDPOINT};
use super::error::{ApiError, ApiResult};
use super::http::{ApiRequest, ApiResponse, Method, Params, ReqwestTransport, Transport};
use super::middleware::{attach_bearer, cache_lookup, cache_store, check_status, should_refresh};
use super::navigator::{Navigator, PendingRedirect, LOGIN_PATH};
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::storage::Session;

/// Client for the CyberShield REST API
#[derive(Clone)]
pub struct ApiClient {
    /// Base URL without a trailing slash, e.g. `http://localhost:8001/api/v1`
    base_url: String,
    transport: Arc<dyn Transport>,
    session: Session,
    cache: Arc<ResponseCache>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}

impl ApiClient {
    /// Creates a client using `reqwest`, a fresh five minute cache and a
    /// `PendingRedirect` navigator
    pub fn new(base_url: &str, session: Session) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport: Arc::new(ReqwestTransport::new()),
            session,
            cache: Arc::new(ResponseCache::new()),
            navigator: Arc::new(PendingRedirect::new()),
        }
    }

    /// Creates a client from resolved configuration
    pub fn from_config(config: &Config, session: Session) -> Self {
        Self::new(&config.api_url, session)
            .with_cache(Arc::new(ResponseCache::with_ttl(config.cache_ttl)))
    }

    /// Replaces the transport (tests use a scripted one)
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replaces the response cache
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the navigator notified on unrecoverable auth failures
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Absolute URL for an API path
    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET with query parameters; pass `Params::new().no_cache()` to bypass
    /// the cache
    pub async fn get(&self, path: &str, params: Params) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::get(path).with_params(params)).await
    }

    /// GET and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, params: Params) -> ApiResult<T> {
        self.get(path, params).await?.json()
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<ApiResponse> {
        self.send_with_body(Method::Post, path, body).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<ApiResponse> {
        self.send_with_body(Method::Put, path, body).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<ApiResponse> {
        self.send_with_body(Method::Patch, path, body).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::new(Method::Delete, path)).await
    }

    async fn send_with_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::new(method, path).with_body(body)).await
    }

    /// Runs a request through the full pipeline
    ///
    /// # Behavior
    /// - Attaches the stored access token, if any
    /// - Serves cacheable GETs from a live cache entry without a network call
    /// - Caches successful cacheable GETs
    /// - On a first 401 with a refresh token stored, refreshes once and
    ///   resubmits; a 401 on the resubmission is returned as is
    /// - On refresh failure, clears both tokens, redirects to `/login` and
    ///   returns `ApiError::RefreshFailed`
    pub async fn send(&self, mut request: ApiRequest) -> ApiResult<ApiResponse> {
        loop {
            // A resubmission already carries the refreshed token
            if !request.retried {
                attach_bearer(&mut request, &self.session);
            }

            if let Some(cached) = cache_lookup(&request, &self.cache) {
                return Ok(cached);
            }

            match self.dispatch(&request).await {
                Ok(response) => {
                    cache_store(&request, &response, &self.cache);
                    return Ok(response);
                }
                Err(err) if should_refresh(&err, &request) => {
                    let access = self.refresh_session(err).await?;
                    request.set_header("Authorization", format!("Bearer {}", access));
                    request.retried = true;
                    debug!(path = %request.path, "resubmitting request with refreshed token");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sends a request over the transport and checks its status
    async fn dispatch(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let url = self.url(&request.path);
        debug!(method = request.method.as_str(), url = %url, "sending request");
        let response = self.transport.execute(&url, request).await?;
        check_status(response)
    }

    /// Exchanges the stored refresh token for a new access token
    ///
    /// # Returns
    /// * `Ok(access)` once the exchange succeeds; a failure to persist the
    ///   token is logged and does not fail the request
    /// * `Err(original)` if no refresh token is stored (nothing is cleared)
    /// * `Err(ApiError::RefreshFailed)` if the exchange failed; the tokens are
    ///   cleared and the navigator is sent to the login page
    async fn refresh_session(&self, original: ApiError) -> ApiResult<String> {
        let Some(refresh) = self.session.refresh_token() else {
            debug!("401 without a refresh token, not attempting refresh");
            return Err(original);
        };

        let url = self.url(REFRESH_ENDPOINT);
        match exchange_refresh_token(self.transport.as_ref(), &url, &refresh).await {
            Ok(access) => {
                match self.session.set_access_token(&access) {
                    Ok(()) => info!("access token refreshed"),
                    Err(e) => warn!(
                        error = %e,
                        "access token refreshed but could not be stored, retrying with it anyway"
                    ),
                }
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, signing out");
                if let Err(e) = self.session.clear_tokens() {
                    warn!(error = %e, "failed to clear session tokens");
                }
                self.navigator.navigate(LOGIN_PATH);
                Err(ApiError::RefreshFailed {
                    source: Box::new(err),
                })
            }
        }
    }
}
