//! Scripted transport for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::error::{ApiError, ApiResult};
use super::http::{ApiRequest, ApiResponse, Method, Params, Transport};

/// Base URL used by clients wired to a `MockTransport`
pub(crate) const BASE_URL: &str = "http://api.test/api/v1";

#[derive(Debug, Clone)]
enum Reply {
    Respond(u16, String),
    Fail(String),
}

#[derive(Debug)]
struct Route {
    method: Method,
    path: String,
    replies: VecDeque<Reply>,
}

/// One request seen by the transport
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub params: Params,
    pub body: Option<Value>,
}

/// Replays canned replies per (method, path); the last reply of a route repeats
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Queues a response for `method path`
    pub fn on(&self, method: Method, path: &str, status: u16, body: &str) -> &Self {
        self.push(method, path, Reply::Respond(status, body.to_string()));
        self
    }

    /// Queues a transport failure for `method path`
    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Reply::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made to `method path`
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, url: &str, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url).to_string();
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            path: path.clone(),
            authorization: request.header("Authorization").map(str::to_string),
            params: request.params.clone(),
            body: request.body.clone(),
        });

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == path)
                .and_then(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    }
                })
        };

        match reply {
            Some(Reply::Respond(status, body)) => Ok(ApiResponse::new(status, body)),
            Some(Reply::Fail(message)) => Err(ApiError::Network { message }),
            None => Ok(ApiResponse::new(404, r#"{"detail":"Not found."}"#)),
        }
    }
}
