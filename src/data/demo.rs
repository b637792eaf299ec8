//! Fixture data shown while the session is in demo mode

use chrono::Utc;
use serde_json::{json, Value};

use super::pages::{PageData, PageKind};

/// Scanner targets shown in demo mode
pub fn scanner_targets() -> Vec<Value> {
    let now = Utc::now().to_rfc3339();
    vec![
        json!({"id": "1", "target_url": "https://example.com", "target_type": "website", "status": "active", "last_scan": now}),
        json!({"id": "2", "target_url": "192.168.1.1", "target_type": "ip", "status": "active", "last_scan": now}),
    ]
}

pub fn scanner_scans() -> Vec<Value> {
    let now = Utc::now().to_rfc3339();
    vec![
        json!({"id": "1", "target": "example.com", "scan_type": "vulnerability", "status": "completed", "vulnerabilities_found": 5, "started_at": now}),
        json!({"id": "2", "target": "192.168.1.1", "scan_type": "port", "status": "running", "vulnerabilities_found": 0, "started_at": now}),
    ]
}

pub fn scanner_vulnerabilities() -> Vec<Value> {
    let now = Utc::now().to_rfc3339();
    vec![
        json!({"id": "1", "title": "SQL Injection", "severity": "high", "target": "example.com", "discovered_at": now}),
        json!({"id": "2", "title": "XSS Vulnerability", "severity": "medium", "target": "example.com", "discovered_at": now}),
    ]
}

pub fn scanner_stats() -> Value {
    json!({
        "total_targets": 45,
        "total_scans": 234,
        "total_vulnerabilities": 89,
        "by_severity": [
            {"severity": "Critical", "count": 12},
            {"severity": "High", "count": 28},
            {"severity": "Medium", "count": 35},
            {"severity": "Low", "count": 14}
        ]
    })
}

/// The Scanner page assembled from fixtures
pub fn scanner_page() -> PageData {
    let targets = scanner_targets();
    let scans = scanner_scans();
    let running = scans
        .iter()
        .filter(|scan| scan.get("status").and_then(Value::as_str) == Some("running"))
        .count();

    PageData::build(
        PageKind::Scanner,
        scanner_vulnerabilities(),
        &[("", scanner_stats())],
        &[
            ("Targets", targets.len()),
            ("Scans", scans.len()),
            ("Active Scans", running),
        ],
    )
}
