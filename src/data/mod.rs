//! Data models and JSON helpers for CyberShield dashboard pages
//!
//! The backend serves loosely-shaped JSON: list endpoints return either a
//! paginated envelope or a bare array, and every page shows different fields.
//! Rows are therefore kept as `serde_json::Value` and read through the helpers
//! below rather than a struct per resource.

pub mod actions;
pub mod demo;
pub mod pages;
pub mod share;

pub use actions::{github_repos, search_credentials, trigger_repo_check};
pub use pages::{load_page, Filter, PageData, PageDefinition, PageKind, PageSummary};
pub use share::{share, C2Form, CredentialForm, CveForm, ShareError, ShareForm, ThreatForm};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder shown for missing or null fields
pub const EMPTY_FIELD: &str = "-";

/// Bucket used when a row has no value for the grouped field
pub const UNKNOWN_GROUP: &str = "unknown";

/// Signed-in user profile, persisted under the `user` session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// One of `free`, `pro`, `business`, `enterprise`
    pub subscription_tier: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

impl User {
    /// Labelled profile fields for display
    ///
    /// `created_at` is shortened to its date when it parses as RFC 3339.
    pub fn profile_fields(&self) -> Vec<(&'static str, String)> {
        let member_since = match &self.created_at {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|_| raw.clone()),
            None => EMPTY_FIELD.to_string(),
        };
        vec![
            ("Email", self.email.clone()),
            ("Tier", self.subscription_tier.clone()),
            ("User ID", self.id.clone()),
            ("Member since", member_since),
            (
                "MFA",
                if self.mfa_enabled { "enabled" } else { "disabled" }.to_string(),
            ),
        ]
    }

    /// Profile stored by demo login
    pub fn demo() -> Self {
        Self {
            id: "demo".to_string(),
            email: "demo@cybershield.local".to_string(),
            subscription_tier: "pro".to_string(),
            created_at: None,
            mfa_enabled: false,
        }
    }
}

/// A labelled number shown above the chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    pub label: String,
    pub value: String,
}

impl StatCard {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Pulls the row list out of a list endpoint body
///
/// Accepts `{"results": [...]}` and bare arrays; anything else yields no rows.
pub fn extract_items(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Renders one field of a row for a table cell
pub fn field_text(row: &Value, field: &str) -> String {
    match row.get(field) {
        None | Some(Value::Null) => EMPTY_FIELD.to_string(),
        Some(Value::String(s)) if s.is_empty() => EMPTY_FIELD.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "yes".to_string(),
        Some(Value::Bool(false)) => "no".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

/// Counts rows per value of `field`
///
/// Sorted by count descending, ties broken by name. Missing values land in
/// the `unknown` bucket; string values are lowercased so `High` and `high`
/// count together.
pub fn group_counts(rows: &[Value], field: &str) -> Vec<(String, usize)> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for row in rows {
        let key = match row.get(field) {
            None | Some(Value::Null) => UNKNOWN_GROUP.to_string(),
            Some(Value::String(s)) if s.trim().is_empty() => UNKNOWN_GROUP.to_string(),
            Some(Value::String(s)) => s.trim().to_lowercase(),
            Some(_) => field_text(row, field),
        };
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut groups: Vec<(String, usize)> = counts.into_iter().collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    groups
}

/// Turns the numeric top-level fields of a stats body into cards
///
/// Nested objects and arrays (per-severity breakdowns and the like) are
/// skipped. An optional `prefix` is prepended to every label.
pub fn stat_cards(stats: &Value, prefix: Option<&str>) -> Vec<StatCard> {
    let Value::Object(map) = stats else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, value)| match value {
            Value::Number(n) => {
                let label = match prefix {
                    Some(prefix) => format!("{} {}", prefix, humanize(key)),
                    None => humanize(key),
                };
                Some(StatCard::new(label, n.to_string()))
            }
            _ => None,
        })
        .collect()
}

/// `total_vulnerabilities` -> `Total Vulnerabilities`
pub fn humanize(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
