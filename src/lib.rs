//! CyberShield terminal client library
//!
//! This module exposes the API client, session storage, page catalog and TUI
//! for use by the binary and by integration tests.

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
pub mod storage;
pub mod ui;
