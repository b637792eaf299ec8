//! Where the client goes when the session cannot be recovered

use std::sync::Mutex;

use tracing::info;

/// Entry point users are sent to after an unrecoverable auth failure
pub const LOGIN_PATH: &str = "/login";

/// Receives client-side navigation requests from the API client
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Records the most recent navigation request so the UI can act on it
#[derive(Debug, Default)]
pub struct PendingRedirect {
    target: Mutex<Option<String>>,
}

impl PendingRedirect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the pending target, leaving nothing behind
    pub fn take(&self) -> Option<String> {
        self.target.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Peeks at the pending target
    pub fn pending(&self) -> Option<String> {
        self.target
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Navigator for PendingRedirect {
    fn navigate(&self, path: &str) {
        info!(path, "redirect requested");
        *self.target.lock().unwrap_or_else(|e| e.into_inner()) = Some(path.to_string());
    }
}
