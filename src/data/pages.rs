//! Dashboard page catalog and loading
//!
//! Each page lists the backend endpoints it reads, which query parameters it
//! forwards as filters, the field its chart groups by and its table columns.
//! Loading fans out to every endpoint at once with `join_all`.

use chrono::{DateTime, Local};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::share::{CVE_SEVERITIES, CVE_STATUSES, SEVERITIES, THREAT_TYPES};
use super::{demo, extract_items, group_counts, stat_cards, StatCard};
use crate::api::{ApiClient, ApiResult, Params};

/// The dashboard pages, in tab order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Overview,
    Threats,
    Cves,
    Ransomware,
    Breaches,
    C2,
    Credentials,
    Phishing,
    Onion,
    Scanner,
    Alerts,
}

/// What an endpoint contributes to a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// Table rows; its failure fails the page
    Rows,
    /// Numeric summary fields shown as cards
    Stats,
    /// Secondary list shown as a count card
    Extra,
}

/// One backend resource read by a page
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub path: &'static str,
    pub role: EndpointRole,
    /// Card label for `Stats` prefixes and `Extra` counts
    pub label: &'static str,
    /// Query parameters sent on every request
    pub params: &'static [(&'static str, &'static str)],
    /// Always sent with `noCache`, forced or not
    pub always_fresh: bool,
}

impl Endpoint {
    const fn fresh(self) -> Self {
        Endpoint {
            always_fresh: true,
            ..self
        }
    }

    const fn with_params(self, params: &'static [(&'static str, &'static str)]) -> Self {
        Endpoint { params, ..self }
    }
}

/// A filter a page forwards to its rows endpoint
///
/// `choices` lists the values the dashboard cycles through; an empty list
/// marks a free-text filter that can only be set from the command line.
#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub key: &'static str,
    pub choices: &'static [&'static str],
}

impl Filter {
    pub fn is_free_text(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn allows(&self, value: &str) -> bool {
        self.is_free_text() || self.choices.iter().any(|choice| *choice == value)
    }

    /// Value after `current` in the cycle `all -> choices... -> all`
    pub fn next_value(&self, current: Option<&str>) -> Option<&'static str> {
        match current.and_then(|value| self.choices.iter().position(|c| *c == value)) {
            None => self.choices.first().copied(),
            Some(i) => self.choices.get(i + 1).copied(),
        }
    }
}

/// A table column: header text and the row field it shows
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub field: &'static str,
}

/// Static description of a dashboard page
#[derive(Debug)]
pub struct PageDefinition {
    pub kind: PageKind,
    pub title: &'static str,
    pub endpoints: &'static [Endpoint],
    /// Query parameters forwarded to the rows endpoint
    pub filters: &'static [Filter],
    pub group_by: &'static str,
    pub columns: &'static [Column],
}

const fn rows(path: &'static str) -> Endpoint {
    Endpoint {
        path,
        role: EndpointRole::Rows,
        label: "",
        params: &[],
        always_fresh: false,
    }
}

const fn stats(path: &'static str, label: &'static str) -> Endpoint {
    Endpoint {
        path,
        role: EndpointRole::Stats,
        label,
        params: &[],
        always_fresh: false,
    }
}

const fn extra(path: &'static str, label: &'static str) -> Endpoint {
    Endpoint {
        path,
        role: EndpointRole::Extra,
        label,
        params: &[],
        always_fresh: false,
    }
}

const fn col(header: &'static str, field: &'static str) -> Column {
    Column { header, field }
}

const fn choice(key: &'static str, choices: &'static [&'static str]) -> Filter {
    Filter { key, choices }
}

const fn free_text(key: &'static str) -> Filter {
    Filter { key, choices: &[] }
}

const YES_NO: &[&str] = &["true", "false"];
const ALERT_STATUSES: &[&str] = &["active", "resolved"];

static PAGES: [PageDefinition; 11] = [
    PageDefinition {
        kind: PageKind::Overview,
        title: "Overview",
        endpoints: &[
            rows("/threats/threat-intelligence/"),
            stats("/threats/c2-servers/stats/", "C2"),
            stats("/threats/leaked-credentials/stats/", "Credentials"),
        ],
        filters: &[],
        group_by: "severity",
        columns: &[
            col("Title", "title"),
            col("Type", "threat_type"),
            col("Severity", "severity"),
            col("First Seen", "first_seen"),
        ],
    },
    PageDefinition {
        kind: PageKind::Threats,
        title: "Threat Intelligence",
        endpoints: &[
            rows("/threats/threat-intelligence/"),
            extra("/threats/threat-intelligence/map_data/", "Map Points"),
        ],
        filters: &[
            choice("threat_type", THREAT_TYPES),
            choice("severity", SEVERITIES),
        ],
        group_by: "severity",
        columns: &[
            col("Title", "title"),
            col("Type", "threat_type"),
            col("Severity", "severity"),
            col("Countries", "affected_countries"),
            col("First Seen", "first_seen"),
        ],
    },
    PageDefinition {
        kind: PageKind::Cves,
        title: "CVEs",
        endpoints: &[
            rows("/cve/cves/"),
            stats("/cve/cves/stats/", ""),
            extra("/monitoring/github-repos/", "Watched Repos").fresh(),
            extra("/monitoring/github-cve-refs/", "GitHub CVE Refs")
                .with_params(&[("page_size", "8")])
                .fresh(),
        ],
        filters: &[
            choice("severity", CVE_SEVERITIES),
            choice("has_exploit", YES_NO),
            choice("poc_available", YES_NO),
            choice("status", CVE_STATUSES),
            free_text("search"),
        ],
        group_by: "severity",
        columns: &[
            col("CVE", "cve_id"),
            col("Title", "title"),
            col("Severity", "severity"),
            col("Vendor", "vendor"),
            col("PoC", "poc_available"),
            col("Published", "published_date"),
        ],
    },
    PageDefinition {
        kind: PageKind::Ransomware,
        title: "Ransomware",
        endpoints: &[
            rows("/ransomware/incidents/"),
            extra("/ransomware/groups/", "Groups"),
        ],
        filters: &[],
        group_by: "status",
        columns: &[
            col("Victim", "victim"),
            col("Group", "group"),
            col("Country", "country"),
            col("Status", "status"),
            col("Date", "date"),
        ],
    },
    PageDefinition {
        kind: PageKind::Breaches,
        title: "Breaches",
        endpoints: &[rows("/breaches/"), stats("/breaches/stats/", "")],
        filters: &[],
        group_by: "severity",
        columns: &[
            col("Organization", "organization"),
            col("Industry", "industry"),
            col("Records", "records_exposed"),
            col("Status", "status"),
            col("Breach Date", "breach_date"),
        ],
    },
    PageDefinition {
        kind: PageKind::C2,
        title: "C2 Servers",
        endpoints: &[
            rows("/threats/c2-servers/"),
            stats("/threats/c2-servers/stats/", ""),
        ],
        filters: &[choice("threat_level", SEVERITIES)],
        group_by: "threat_level",
        columns: &[
            col("IP", "ip_address"),
            col("Domain", "domain"),
            col("Family", "malware_family"),
            col("Country", "country"),
            col("Level", "threat_level"),
            col("Active", "is_active"),
        ],
    },
    PageDefinition {
        kind: PageKind::Credentials,
        title: "Leaked Credentials",
        endpoints: &[
            rows("/threats/leaked-credentials/"),
            stats("/threats/leaked-credentials/stats/", ""),
        ],
        filters: &[free_text("domain")],
        group_by: "breach_source",
        columns: &[
            col("Email", "email"),
            col("Domain", "domain"),
            col("Source", "breach_source"),
            col("Exposed", "is_exposed"),
            col("Leak Date", "leak_date"),
        ],
    },
    PageDefinition {
        kind: PageKind::Phishing,
        title: "Phishing",
        endpoints: &[
            rows("/phishing/campaigns/"),
            extra("/phishing/domains/", "Domains"),
        ],
        filters: &[],
        group_by: "status",
        columns: &[
            col("Campaign", "name"),
            col("Sector", "target_sector"),
            col("Domains", "domains_count"),
            col("Status", "status"),
            col("First Seen", "first_seen"),
        ],
    },
    PageDefinition {
        kind: PageKind::Onion,
        title: "Onion Sites",
        endpoints: &[
            rows("/threats/onion-sites/"),
            extra("/threats/onion-posts/", "Posts"),
        ],
        filters: &[],
        group_by: "category",
        columns: &[
            col("Address", "onion_address"),
            col("Type", "site_type"),
            col("Category", "category"),
            col("Status", "status"),
            col("First Seen", "first_seen"),
        ],
    },
    PageDefinition {
        kind: PageKind::Scanner,
        title: "Security Scanner",
        endpoints: &[
            rows("/scanner/vulnerabilities/"),
            extra("/scanner/targets/", "Targets"),
            extra("/scanner/scans/", "Scans"),
        ],
        filters: &[],
        group_by: "severity",
        columns: &[
            col("Title", "title"),
            col("Severity", "severity"),
            col("Target", "target"),
            col("Discovered", "discovered_at"),
        ],
    },
    PageDefinition {
        kind: PageKind::Alerts,
        title: "Alerts",
        endpoints: &[rows("/alerts/"), extra("/alerts/rules/", "Rules")],
        filters: &[
            choice("severity", SEVERITIES),
            choice("status", ALERT_STATUSES),
        ],
        group_by: "severity",
        columns: &[
            col("Title", "title"),
            col("Type", "alert_type"),
            col("Severity", "severity"),
            col("Status", "status"),
            col("Created", "created_at"),
        ],
    },
];

impl PageKind {
    /// All pages in tab order
    pub const ALL: [PageKind; 11] = [
        PageKind::Overview,
        PageKind::Threats,
        PageKind::Cves,
        PageKind::Ransomware,
        PageKind::Breaches,
        PageKind::C2,
        PageKind::Credentials,
        PageKind::Phishing,
        PageKind::Onion,
        PageKind::Scanner,
        PageKind::Alerts,
    ];

    /// Parses a page name from the command line
    ///
    /// Accepts the slug shown by `slug()` plus a few common aliases,
    /// case-insensitively.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "overview" | "home" | "dashboard" => Some(PageKind::Overview),
            "threats" | "threat" | "threat-intelligence" => Some(PageKind::Threats),
            "cves" | "cve" => Some(PageKind::Cves),
            "ransomware" => Some(PageKind::Ransomware),
            "breaches" | "breach" => Some(PageKind::Breaches),
            "c2" | "c2-servers" => Some(PageKind::C2),
            "credentials" | "creds" | "leaked-credentials" => Some(PageKind::Credentials),
            "phishing" => Some(PageKind::Phishing),
            "onion" | "onion-sites" => Some(PageKind::Onion),
            "scanner" | "scan" => Some(PageKind::Scanner),
            "alerts" | "alert" => Some(PageKind::Alerts),
            _ => None,
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            PageKind::Overview => "overview",
            PageKind::Threats => "threats",
            PageKind::Cves => "cves",
            PageKind::Ransomware => "ransomware",
            PageKind::Breaches => "breaches",
            PageKind::C2 => "c2",
            PageKind::Credentials => "credentials",
            PageKind::Phishing => "phishing",
            PageKind::Onion => "onion",
            PageKind::Scanner => "scanner",
            PageKind::Alerts => "alerts",
        }
    }

    /// Position in tab order
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(0)
    }

    pub fn definition(&self) -> &'static PageDefinition {
        &PAGES[self.index()]
    }

    pub fn title(&self) -> &'static str {
        self.definition().title
    }

    /// Next page in tab order, wrapping to the first
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Previous page in tab order, wrapping to the last
    pub fn previous(&self) -> Self {
        let count = Self::ALL.len();
        Self::ALL[(self.index() + count - 1) % count]
    }
}

impl PageDefinition {
    /// The endpoint whose list fills the table
    pub fn rows_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|ep| ep.role == EndpointRole::Rows)
    }

    pub fn filter(&self, key: &str) -> Option<&Filter> {
        self.filters.iter().find(|filter| filter.key == key)
    }

    pub fn accepts_filter(&self, key: &str) -> bool {
        self.filter(key).is_some()
    }

    /// Filters the dashboard can cycle with a key press
    pub fn choice_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|filter| !filter.is_free_text())
    }
}

/// Derived figures shown above the table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub total: usize,
    /// `(group, count)` by the page's group field, largest first
    pub groups: Vec<(String, usize)>,
    pub cards: Vec<StatCard>,
}

/// Everything needed to render one page
#[derive(Debug, Clone)]
pub struct PageData {
    pub kind: PageKind,
    pub rows: Vec<Value>,
    pub summary: PageSummary,
    /// The rows came from the response cache
    pub from_cache: bool,
    /// Secondary endpoints that failed and were shown empty
    pub warnings: Vec<String>,
    pub fetched_at: DateTime<Local>,
}

impl PageData {
    /// Assembles a page from already-decoded bodies
    ///
    /// # Arguments
    /// * `kind` - Page being built
    /// * `rows` - Rows for the table
    /// * `stats` - `(label, body)` pairs from stats endpoints
    /// * `extras` - `(label, count)` pairs from secondary lists
    pub fn build(
        kind: PageKind,
        rows: Vec<Value>,
        stats: &[(&str, Value)],
        extras: &[(&str, usize)],
    ) -> Self {
        let definition = kind.definition();
        let prefix_stats = stats.len() > 1;

        let mut cards: Vec<StatCard> = extras
            .iter()
            .map(|(label, count)| StatCard::new(*label, count.to_string()))
            .collect();
        for (label, body) in stats {
            let prefix = (prefix_stats && !label.is_empty()).then_some(*label);
            cards.extend(stat_cards(body, prefix));
        }

        let summary = PageSummary {
            total: rows.len(),
            groups: group_counts(&rows, definition.group_by),
            cards,
        };

        Self {
            kind,
            rows,
            summary,
            from_cache: false,
            warnings: Vec::new(),
            fetched_at: Local::now(),
        }
    }
}

/// Loads one dashboard page
///
/// All endpoints are requested concurrently. A failing rows endpoint fails the
/// page; a failing stats or secondary endpoint is logged, recorded in
/// `warnings` and treated as empty.
///
/// # Arguments
/// * `client` - API client carrying the session and cache
/// * `kind` - Page to load
/// * `filters` - Filter values; keys the page does not accept are ignored
/// * `force` - Bypass the response cache (`noCache`); endpoints marked
///   `always_fresh` bypass it regardless
pub async fn load_page(
    client: &ApiClient,
    kind: PageKind,
    filters: &Params,
    force: bool,
) -> ApiResult<PageData> {
    if kind == PageKind::Scanner && client.session().is_demo() {
        debug!("demo mode, serving scanner fixtures");
        return Ok(demo::scanner_page());
    }

    let definition = kind.definition();
    let requests = definition.endpoints.iter().map(|endpoint| {
        let mut params: Params = endpoint.params.iter().copied().collect();
        if endpoint.role == EndpointRole::Rows {
            for filter in definition.filters {
                if let Some(value) = filters.get(filter.key).filter(|v| !v.trim().is_empty()) {
                    params.insert(filter.key, value.trim());
                }
            }
        }
        if force || endpoint.always_fresh {
            params = params.no_cache();
        }
        client.get(endpoint.path, params)
    });
    let results = join_all(requests).await;

    let mut rows = Vec::new();
    let mut from_cache = false;
    let mut stats = Vec::new();
    let mut extras = Vec::new();
    let mut warnings = Vec::new();

    for (endpoint, result) in definition.endpoints.iter().zip(results) {
        match endpoint.role {
            EndpointRole::Rows => {
                let response = result?;
                from_cache = response.from_cache;
                rows = extract_items(&response.json::<Value>()?);
            }
            EndpointRole::Stats => match result.and_then(|r| r.json::<Value>()) {
                Ok(body) => stats.push((endpoint.label, body)),
                Err(e) => {
                    warn!(path = endpoint.path, error = %e, "stats endpoint failed");
                    warnings.push(format!("{}: {}", endpoint.path, e));
                }
            },
            EndpointRole::Extra => {
                let count = match result.and_then(|r| r.json::<Value>()) {
                    Ok(body) => extract_items(&body).len(),
                    Err(e) => {
                        warn!(path = endpoint.path, error = %e, "secondary endpoint failed");
                        warnings.push(format!("{}: {}", endpoint.path, e));
                        0
                    }
                };
                extras.push((endpoint.label, count));
            }
        }
    }

    let mut page = PageData::build(kind, rows, &stats, &extras);
    page.from_cache = from_cache;
    page.warnings = warnings;
    debug!(
        page = kind.slug(),
        rows = page.summary.total,
        from_cache,
        "page loaded"
    );
    Ok(page)
}
