//! Community share forms
//!
//! Each form turns user input into the JSON body its endpoint expects:
//! blank text becomes `null`, comma lists become arrays, notes are wrapped in
//! `metadata`, and optional numbers and dates are only sent when given.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use clap::Args;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};

pub const THREAT_TYPES: &[&str] = &[
    "ransomware",
    "data_breach",
    "phishing",
    "c2",
    "malware",
    "apt",
    "vulnerability",
    "other",
];
pub const SEVERITIES: &[&str] = &["critical", "high", "medium", "low"];
pub const CVE_SEVERITIES: &[&str] = &["critical", "high", "medium", "low", "info"];
pub const CVE_STATUSES: &[&str] = &["new", "analyzing", "exploited", "patched", "disputed"];
pub const EXPLOIT_MATURITIES: &[&str] = &[
    "unproven",
    "proof_of_concept",
    "functional",
    "high",
    "not_defined",
];
pub const PROTOCOLS: &[&str] = &["http", "https", "tcp", "udp", "dns", "socks"];

/// Error types for building and submitting a share form
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Indicators must be valid JSON (e.g. {{\"ips\": [\"1.1.1.1\"]}}).")]
    InvalidIndicators,

    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("invalid {field} '{value}', expected one of: {allowed}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        allowed: String,
    },

    #[error("invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid date for {field}: '{value}'")]
    InvalidDate { field: &'static str, value: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ShareError {
    /// Text shown to the user when sharing `noun` failed
    ///
    /// Local validation errors are shown as-is. Backend rejections carrying
    /// field errors are joined into `field: message` lines; anything else gets
    /// a generic retry message.
    pub fn user_message(&self, noun: &str) -> String {
        match self {
            ShareError::Api(api) => api
                .field_errors()
                .unwrap_or_else(|| format!("Failed to share {}. Please try again.", noun)),
            other => other.to_string(),
        }
    }
}

/// A form that can be posted to the backend
pub trait ShareForm {
    /// Endpoint the payload is posted to
    const ENDPOINT: &'static str;
    /// What is being shared, as used in user messages
    const NOUN: &'static str;

    fn to_payload(&self) -> Result<Value, ShareError>;
}

/// Validates `form` and posts it
///
/// # Returns
/// * `Ok(Value)` - the created record as returned by the backend
/// * `Err(ShareError)` - local validation or backend failure
pub async fn share<F: ShareForm>(client: &ApiClient, form: &F) -> Result<Value, ShareError> {
    let payload = form.to_payload()?;
    let response = client.post(F::ENDPOINT, &payload).await?;
    info!(endpoint = F::ENDPOINT, "shared {}", F::NOUN);
    Ok(response.json()?)
}

/// `"C2 server"` -> `"C2 server shared successfully!"`
pub fn success_message(noun: &str) -> String {
    let mut chars = noun.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    format!("{} shared successfully!", capitalized)
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Trimmed text or `null`
fn text(value: &Option<String>) -> Value {
    trimmed(value).map_or(Value::Null, |s| Value::String(s.to_string()))
}

fn required(value: &str, field: &'static str) -> Result<Value, ShareError> {
    match value.trim() {
        "" => Err(ShareError::Missing { field }),
        s => Ok(Value::String(s.to_string())),
    }
}

/// Splits on `separator`, trimming and dropping empty items
fn list(value: &Option<String>, separator: char) -> Vec<String> {
    trimmed(value)
        .map(|s| {
            s.split(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn metadata(notes: &Option<String>) -> Value {
    match trimmed(notes) {
        Some(notes) => json!({ "notes": notes }),
        None => json!({}),
    }
}

fn choice(value: &str, field: &'static str, allowed: &[&str]) -> Result<Value, ShareError> {
    let value = value.trim().to_lowercase();
    if allowed.iter().any(|option| *option == value) {
        Ok(Value::String(value))
    } else {
        Err(ShareError::InvalidChoice {
            field,
            value,
            allowed: allowed.join(", "),
        })
    }
}

/// Parses a date or date-time and renders it as RFC 3339 UTC with millis
///
/// Accepts full RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) and plain
/// `YYYY-MM-DD` (midnight UTC).
fn iso_date(value: &str, field: &'static str) -> Result<String, ShareError> {
    let value = value.trim();
    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        });

    parsed
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| ShareError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

/// Shares a threat intelligence record
#[derive(Args, Debug, Clone)]
pub struct ThreatForm {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    /// One of ransomware, data_breach, phishing, c2, malware, apt, vulnerability, other
    #[arg(long, default_value = "ransomware")]
    pub threat_type: String,
    #[arg(long, default_value = "medium")]
    pub severity: String,
    /// JSON object, e.g. '{"ips": ["1.1.1.1"]}'
    #[arg(long)]
    pub indicators: Option<String>,
    /// Comma-separated country codes
    #[arg(long)]
    pub affected_countries: Option<String>,
    /// Comma-separated industries
    #[arg(long)]
    pub affected_industries: Option<String>,
    #[arg(long)]
    pub first_seen: Option<String>,
    #[arg(long)]
    pub last_seen: Option<String>,
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub source_url: Option<String>,
    #[arg(long)]
    pub is_verified: bool,
}

impl Default for ThreatForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            threat_type: "ransomware".to_string(),
            severity: "medium".to_string(),
            indicators: None,
            affected_countries: None,
            affected_industries: None,
            first_seen: None,
            last_seen: None,
            source: None,
            source_url: None,
            is_verified: false,
        }
    }
}

impl ShareForm for ThreatForm {
    const ENDPOINT: &'static str = "/threats/threat-intelligence/";
    const NOUN: &'static str = "threat";

    fn to_payload(&self) -> Result<Value, ShareError> {
        let mut payload = Map::new();
        payload.insert(
            "threat_type".into(),
            choice(&self.threat_type, "threat_type", THREAT_TYPES)?,
        );
        payload.insert("title".into(), required(&self.title, "title")?);
        payload.insert(
            "description".into(),
            Value::String(self.description.trim().to_string()),
        );
        payload.insert("severity".into(), choice(&self.severity, "severity", SEVERITIES)?);
        payload.insert("source".into(), text(&self.source));
        payload.insert("source_url".into(), text(&self.source_url));
        payload.insert("is_verified".into(), Value::Bool(self.is_verified));

        if let Some(raw) = trimmed(&self.indicators) {
            let indicators: Value =
                serde_json::from_str(raw).map_err(|_| ShareError::InvalidIndicators)?;
            payload.insert("indicators".into(), indicators);
        }
        if trimmed(&self.affected_countries).is_some() {
            payload.insert(
                "affected_countries".into(),
                json!(list(&self.affected_countries, ',')),
            );
        }
        if trimmed(&self.affected_industries).is_some() {
            payload.insert(
                "affected_industries".into(),
                json!(list(&self.affected_industries, ',')),
            );
        }
        if let Some(first_seen) = trimmed(&self.first_seen) {
            payload.insert("first_seen".into(), json!(iso_date(first_seen, "first_seen")?));
        }
        if let Some(last_seen) = trimmed(&self.last_seen) {
            payload.insert("last_seen".into(), json!(iso_date(last_seen, "last_seen")?));
        }

        Ok(Value::Object(payload))
    }
}

/// Shares a command-and-control server sighting
#[derive(Args, Debug, Clone)]
pub struct C2Form {
    #[arg(long)]
    pub domain: Option<String>,
    #[arg(long)]
    pub ip_address: Option<String>,
    #[arg(long)]
    pub hostname: Option<String>,
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long, default_value = "http")]
    pub protocol: String,
    #[arg(long)]
    pub c2_family: Option<String>,
    #[arg(long)]
    pub malware_family: Option<String>,
    #[arg(long)]
    pub country: Option<String>,
    #[arg(long)]
    pub asn: Option<String>,
    #[arg(long, default_value = "medium")]
    pub threat_level: String,
    /// Report the server as no longer active
    #[arg(long)]
    pub inactive: bool,
    #[arg(long)]
    pub notes: Option<String>,
}

impl Default for C2Form {
    fn default() -> Self {
        Self {
            domain: None,
            ip_address: None,
            hostname: None,
            port: None,
            protocol: "http".to_string(),
            c2_family: None,
            malware_family: None,
            country: None,
            asn: None,
            threat_level: "medium".to_string(),
            inactive: false,
            notes: None,
        }
    }
}

impl ShareForm for C2Form {
    const ENDPOINT: &'static str = "/threats/c2-servers/";
    const NOUN: &'static str = "C2 server";

    fn to_payload(&self) -> Result<Value, ShareError> {
        let mut payload = Map::new();
        payload.insert("domain".into(), text(&self.domain));
        payload.insert("ip_address".into(), text(&self.ip_address));
        payload.insert("hostname".into(), text(&self.hostname));
        payload.insert("protocol".into(), choice(&self.protocol, "protocol", PROTOCOLS)?);
        payload.insert("c2_family".into(), text(&self.c2_family));
        payload.insert("malware_family".into(), text(&self.malware_family));
        payload.insert("country".into(), text(&self.country));
        payload.insert("asn".into(), text(&self.asn));
        payload.insert(
            "threat_level".into(),
            choice(&self.threat_level, "threat_level", SEVERITIES)?,
        );
        payload.insert("is_active".into(), Value::Bool(!self.inactive));
        payload.insert("metadata".into(), metadata(&self.notes));

        if let Some(port) = trimmed(&self.port) {
            let port: u16 = port.parse().map_err(|_| ShareError::InvalidNumber {
                field: "port",
                value: port.to_string(),
            })?;
            payload.insert("port".into(), json!(port));
        }

        Ok(Value::Object(payload))
    }
}

/// Shares a leaked credential
#[derive(Args, Debug, Clone, Default)]
pub struct CredentialForm {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub domain: Option<String>,
    #[arg(long)]
    pub breach_source: Option<String>,
    #[arg(long)]
    pub leak_date: Option<String>,
    /// Comma-separated, e.g. "password,phone"
    #[arg(long)]
    pub data_types: Option<String>,
    /// Report the credential as no longer exposed
    #[arg(long)]
    pub not_exposed: bool,
    #[arg(long)]
    pub is_verified: bool,
    #[arg(long)]
    pub source_url: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

impl ShareForm for CredentialForm {
    const ENDPOINT: &'static str = "/threats/leaked-credentials/";
    const NOUN: &'static str = "credential";

    fn to_payload(&self) -> Result<Value, ShareError> {
        let mut payload = Map::new();
        payload.insert("email".into(), required(&self.email, "email")?);
        payload.insert("username".into(), text(&self.username));
        payload.insert("domain".into(), text(&self.domain));
        payload.insert("breach_source".into(), text(&self.breach_source));
        payload.insert("is_exposed".into(), Value::Bool(!self.not_exposed));
        payload.insert("is_verified".into(), Value::Bool(self.is_verified));
        payload.insert("source_url".into(), text(&self.source_url));
        payload.insert("metadata".into(), metadata(&self.notes));

        // A date field on the backend; sent as typed.
        if let Some(leak_date) = trimmed(&self.leak_date) {
            payload.insert("leak_date".into(), json!(leak_date));
        }
        if trimmed(&self.data_types).is_some() {
            payload.insert("data_types".into(), json!(list(&self.data_types, ',')));
        }

        Ok(Value::Object(payload))
    }
}

/// Shares a CVE record
#[derive(Args, Debug, Clone)]
pub struct CveForm {
    #[arg(long)]
    pub cve_id: String,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value = "medium")]
    pub severity: String,
    #[arg(long, default_value = "new")]
    pub status: String,
    #[arg(long)]
    pub cvss_v3_score: Option<String>,
    #[arg(long)]
    pub vendor: Option<String>,
    #[arg(long)]
    pub cwe_id: Option<String>,
    /// Comma-separated
    #[arg(long)]
    pub affected_products: Option<String>,
    /// Comma-separated
    #[arg(long)]
    pub affected_versions: Option<String>,
    #[arg(long)]
    pub has_exploit: bool,
    #[arg(long)]
    pub exploit_available: bool,
    #[arg(long)]
    pub poc_available: bool,
    #[arg(long)]
    pub poc_url: Option<String>,
    #[arg(long)]
    pub github_repo: Option<String>,
    #[arg(long, default_value = "not_defined")]
    pub exploit_maturity: String,
    #[arg(long)]
    pub published_date: Option<String>,
    /// One URL per line
    #[arg(long)]
    pub references: Option<String>,
    /// Comma-separated
    #[arg(long)]
    pub tags: Option<String>,
}

impl Default for CveForm {
    fn default() -> Self {
        Self {
            cve_id: String::new(),
            title: String::new(),
            description: String::new(),
            severity: "medium".to_string(),
            status: "new".to_string(),
            cvss_v3_score: None,
            vendor: None,
            cwe_id: None,
            affected_products: None,
            affected_versions: None,
            has_exploit: false,
            exploit_available: false,
            poc_available: false,
            poc_url: None,
            github_repo: None,
            exploit_maturity: "not_defined".to_string(),
            published_date: None,
            references: None,
            tags: None,
        }
    }
}

impl ShareForm for CveForm {
    const ENDPOINT: &'static str = "/cve/cves/";
    const NOUN: &'static str = "CVE";

    fn to_payload(&self) -> Result<Value, ShareError> {
        let mut payload = Map::new();
        payload.insert("cve_id".into(), required(&self.cve_id, "cve_id")?);
        payload.insert("title".into(), required(&self.title, "title")?);
        payload.insert(
            "description".into(),
            Value::String(self.description.trim().to_string()),
        );
        payload.insert(
            "severity".into(),
            choice(&self.severity, "severity", CVE_SEVERITIES)?,
        );
        payload.insert("status".into(), choice(&self.status, "status", CVE_STATUSES)?);
        payload.insert(
            "exploit_maturity".into(),
            choice(&self.exploit_maturity, "exploit_maturity", EXPLOIT_MATURITIES)?,
        );
        payload.insert("vendor".into(), text(&self.vendor));
        payload.insert("cwe_id".into(), text(&self.cwe_id));
        payload.insert("poc_url".into(), text(&self.poc_url));
        payload.insert("github_repo".into(), text(&self.github_repo));
        payload.insert("has_exploit".into(), Value::Bool(self.has_exploit));
        payload.insert(
            "exploit_available".into(),
            Value::Bool(self.exploit_available),
        );
        payload.insert("poc_available".into(), Value::Bool(self.poc_available));
        payload.insert(
            "affected_products".into(),
            json!(list(&self.affected_products, ',')),
        );
        payload.insert(
            "affected_versions".into(),
            json!(list(&self.affected_versions, ',')),
        );
        payload.insert("references".into(), json!(list(&self.references, '\n')));
        payload.insert("tags".into(), json!(list(&self.tags, ',')));

        if let Some(score) = trimmed(&self.cvss_v3_score) {
            let parsed: f64 = score
                .parse()
                .ok()
                .filter(|s: &f64| s.is_finite())
                .ok_or_else(|| ShareError::InvalidNumber {
                    field: "cvss_v3_score",
                    value: score.to_string(),
                })?;
            payload.insert("cvss_v3_score".into(), json!(parsed));
        }
        if let Some(published) = trimmed(&self.published_date) {
            payload.insert(
                "published_date".into(),
                json!(iso_date(published, "published_date")?),
            );
        }

        Ok(Value::Object(payload))
    }
}
