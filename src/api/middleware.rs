//! Request, response and error transforms composed around the transport
//!
//! Each step is a free function so it can be tested on its own:
//!
//! 1. `attach_bearer`: add the stored access token, if any
//! 2. `cache_lookup`: short-circuit cacheable GETs with a live entry
//! 3. `check_status`: turn non-2xx responses into `ApiError::Http`
//! 4. `cache_store`: remember successful cacheable GETs
//! 5. `should_refresh`: decide whether a failure earns a token refresh

use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::http::{ApiRequest, ApiResponse, Method};
use crate::cache::ResponseCache;
use crate::storage::Session;

/// Attaches `Authorization: Bearer <token>` when a non-empty token is stored
///
/// # Returns
/// * `true` if a header was attached
/// * `false` if no token is stored; the request proceeds unauthenticated
pub fn attach_bearer(request: &mut ApiRequest, session: &Session) -> bool {
    match session.access_token() {
        Some(token) => {
            request.set_header("Authorization", format!("Bearer {}", token));
            true
        }
        None => false,
    }
}

/// True for GETs that did not opt out with the `noCache` marker
pub fn is_cacheable(request: &ApiRequest) -> bool {
    request.method == Method::Get && !request.params.is_no_cache()
}

/// Cache key for a request: its path plus the sorted, encoded query string
pub fn cache_key(request: &ApiRequest) -> String {
    ResponseCache::key(&request.path, &request.params.to_query_string())
}

/// Returns a cache-sourced response for a cacheable request with a live entry
pub fn cache_lookup(request: &ApiRequest, cache: &ResponseCache) -> Option<ApiResponse> {
    if !is_cacheable(request) {
        return None;
    }
    let key = cache_key(request);
    let payload = cache.get(&key)?;
    debug!(key = %key, "serving response from cache");
    Some(ApiResponse::cached(payload))
}

/// Stores the body of a successful cacheable request, overwriting older entries
pub fn cache_store(request: &ApiRequest, response: &ApiResponse, cache: &ResponseCache) {
    if is_cacheable(request) && response.is_success() {
        cache.insert(&cache_key(request), &response.body);
    }
}

/// Maps non-2xx responses to `ApiError::Http`, keeping the backend body
pub fn check_status(response: ApiResponse) -> ApiResult<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body,
    })
}

/// True for a 401 on a request that has not been retried yet
pub fn should_refresh(error: &ApiError, request: &ApiRequest) -> bool {
    error.is_unauthorized() && !request.retried
}
