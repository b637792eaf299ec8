//! Session endpoints: login, logout, current user and the refresh exchange
//!
//! The refresh exchange talks to the transport directly. It must not go
//! through `ApiClient::send`, otherwise a 401 from the refresh endpoint would
//! itself trigger another refresh.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::ApiClient;
use super::error::ApiResult;
use super::http::{ApiRequest, Params, Transport};
use super::middleware::check_status;
use crate::data::User;

/// Endpoint exchanging a refresh token for a new access token
pub const REFRESH_ENDPOINT: &str = "/auth/refresh/";
pub const LOGIN_ENDPOINT: &str = "/auth/login/";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout/";
pub const ME_ENDPOINT: &str = "/auth/me/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Token pair returned by login
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body of a successful `POST /auth/login/`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub tokens: TokenPair,
    /// Set by the backend's development bypass login
    #[serde(default)]
    pub dev_mode: bool,
}

/// Exchanges `refresh` for a new access token
///
/// # Returns
/// * `Ok(access)` on a 2xx response carrying `{"access": ...}`
/// * `Err(ApiError)` on transport failure, non-2xx status or a malformed body
pub(crate) async fn exchange_refresh_token(
    transport: &dyn Transport,
    url: &str,
    refresh: &str,
) -> ApiResult<String> {
    let body = serde_json::to_value(RefreshRequest { refresh })?;
    let request = ApiRequest::post(REFRESH_ENDPOINT, body);
    let response = check_status(transport.execute(url, &request).await?)?;
    let RefreshResponse { access } = response.json()?;
    Ok(access)
}

impl ApiClient {
    /// Signs in with email and password
    ///
    /// Persists both tokens and the user profile and leaves demo mode.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let response = self
            .post(
                LOGIN_ENDPOINT,
                &json!({ "email": email, "password": password }),
            )
            .await?;
        let login: LoginResponse = response.json()?;

        let session = self.session();
        session.set_tokens(&login.tokens.access, &login.tokens.refresh)?;
        session.set_user(&login.user)?;
        session.set_demo(false)?;
        self.cache().clear();

        info!(email = %login.user.email, dev_mode = login.dev_mode, "signed in");
        Ok(login)
    }

    /// Enters demo mode without contacting the backend
    ///
    /// Stores a fixture user and `is_demo = "true"`; no tokens are stored, so
    /// requests go out unauthenticated and a 401 never triggers a refresh.
    pub fn demo_login(&self) -> ApiResult<User> {
        let user = User::demo();
        let session = self.session();
        session.clear_tokens()?;
        session.set_user(&user)?;
        session.set_demo(true)?;
        info!("demo mode enabled");
        Ok(user)
    }

    /// Signs out
    ///
    /// Asks the backend to blacklist the refresh token when one is stored, then
    /// clears every session key whatever the backend said.
    pub async fn logout(&self) -> ApiResult<()> {
        if let Some(refresh) = self.session().refresh_token() {
            match self.post(LOGOUT_ENDPOINT, &json!({ "refresh": refresh })).await {
                Ok(_) => debug!("refresh token revoked"),
                Err(e) => warn!(error = %e, "logout request failed, clearing session anyway"),
            }
        }
        self.session().clear_all()?;
        self.cache().clear();
        info!("signed out");
        Ok(())
    }

    /// Fetches the signed-in user, always bypassing the cache
    pub async fn current_user(&self) -> ApiResult<User> {
        self.get_json(ME_ENDPOINT, Params::new().no_cache()).await
    }
}
