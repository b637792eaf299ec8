//! One-shot backend actions outside the page catalog
//!
//! Credential search and the GitHub repository watch list.

use serde_json::Value;
use tracing::info;

use super::extract_items;
use crate::api::{ApiClient, ApiRequest, ApiResult, Method, Params};

pub const CREDENTIALS_ENDPOINT: &str = "/threats/leaked-credentials/";
pub const CREDENTIAL_SEARCH_ENDPOINT: &str = "/threats/leaked-credentials/search/";
pub const GITHUB_REPOS_ENDPOINT: &str = "/monitoring/github-repos/";

pub const CHECK_QUEUED: &str = "Check queued successfully. Refresh in a moment to see updates.";
pub const CHECK_FAILED: &str = "Failed to queue a new check. Please try again.";

/// Picks the search field from the shape of the query
///
/// An `@` means an email, a `.` a domain, anything else a username. Returns
/// `None` for a blank query.
pub fn credential_search_params(query: &str) -> Option<Params> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let field = if query.contains('@') {
        "email"
    } else if query.contains('.') {
        "domain"
    } else {
        "username"
    };
    Some(Params::new().with(field, query))
}

/// Searches leaked credentials
///
/// A blank query lists credentials instead, as the unfiltered page does.
pub async fn search_credentials(client: &ApiClient, query: &str) -> ApiResult<Vec<Value>> {
    let body: Value = match credential_search_params(query) {
        Some(params) => client.get_json(CREDENTIAL_SEARCH_ENDPOINT, params).await?,
        None => client.get_json(CREDENTIALS_ENDPOINT, Params::new()).await?,
    };
    Ok(extract_items(&body))
}

/// Lists watched GitHub repositories, always bypassing the cache
pub async fn github_repos(client: &ApiClient) -> ApiResult<Vec<Value>> {
    let body: Value = client
        .get_json(GITHUB_REPOS_ENDPOINT, Params::new().no_cache())
        .await?;
    Ok(extract_items(&body))
}

pub fn trigger_check_path(repo_id: &str) -> String {
    format!("{}{}/trigger_check/", GITHUB_REPOS_ENDPOINT, repo_id.trim())
}

/// Queues an immediate check of a watched repository
pub async fn trigger_repo_check(client: &ApiClient, repo_id: &str) -> ApiResult<()> {
    let path = trigger_check_path(repo_id);
    client.send(ApiRequest::new(Method::Post, path)).await?;
    info!(repo = repo_id, "repository check queued");
    Ok(())
}
