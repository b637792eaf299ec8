//! HTTP access to the CyberShield backend
//!
//! Everything the application asks of the backend goes through
//! [`ApiClient`]. The client composes small middleware steps around a
//! [`Transport`]: bearer attachment, a short-lived GET cache, status checking
//! and a one-shot token refresh on 401.

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod middleware;
pub mod navigator;

#[cfg(test)]
pub(crate) mod mock;

pub use auth::{LoginResponse, TokenPair};
pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use http::{ApiRequest, ApiResponse, Method, Params, ReqwestTransport, Transport, NO_CACHE_PARAM};
pub use navigator::{Navigator, PendingRedirect, LOGIN_PATH};
