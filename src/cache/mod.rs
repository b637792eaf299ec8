//! Cache module for short-lived API responses
//!
//! This module provides the in-memory response cache used by the API client.
//! GET bodies are kept for five minutes by default and are invalidated lazily:
//! an expired entry is only removed when something tries to read it.

mod clock;
mod response;

pub use clock::{Clock, ManualClock, SystemClock};
pub use response::{ResponseCache, DEFAULT_TTL_MINUTES};
