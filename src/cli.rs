//! Command-line interface parsing for the CyberShield client
//!
//! This module handles parsing of CLI arguments using clap. Global flags pick
//! the backend and session file; subcommands either open the dashboard or run
//! a one-shot action and exit.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::api::Params;
use crate::config::{Config, API_URL_ENV, SESSION_FILE_ENV};
use crate::data::{C2Form, CredentialForm, CveForm, PageKind, ThreatForm};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified page name is not recognized
    #[error("Invalid page: '{0}'. Valid pages: overview, threats, cves, ransomware, breaches, c2, credentials, phishing, onion, scanner, alerts")]
    InvalidPage(String),

    /// A `key=value` argument was malformed
    #[error("Invalid parameter: '{0}'. Expected key=value")]
    InvalidParam(String),

    /// The page does not accept this filter
    #[error("Page '{page}' has no filter '{filter}'")]
    InvalidFilter { page: &'static str, filter: String },

    /// The filter only takes a fixed set of values
    #[error("Invalid value '{value}' for filter '{filter}'. Valid values: {choices}")]
    InvalidFilterValue {
        filter: &'static str,
        value: String,
        choices: String,
    },
}

/// CyberShield - threat intelligence dashboard in the terminal
#[derive(Parser, Debug)]
#[command(name = "cybershield")]
#[command(about = "Threat intelligence dashboard and community sharing client")]
#[command(version)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = API_URL_ENV, value_name = "URL")]
    pub api_url: Option<String>,

    /// Where tokens and the signed-in user are stored
    #[arg(long, global = true, env = SESSION_FILE_ENV, value_name = "PATH")]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the interactive dashboard (default)
    Dashboard(DashboardArgs),
    /// Sign in and store the session
    Login(LoginArgs),
    /// Revoke the refresh token and clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// GET an API path and print the JSON body
    ///
    /// Examples:
    ///   cybershield get /threats/threat-intelligence/ --param severity=critical
    ///   cybershield get /cve/cves/stats/ --no-cache
    Get(GetArgs),
    /// Share a record with the community
    #[command(subcommand)]
    Share(ShareCommand),
    /// Search leaked credentials
    #[command(subcommand)]
    Credentials(CredentialsCommand),
    /// Watched GitHub repositories
    #[command(subcommand)]
    Repos(ReposCommand),
}

#[derive(Args, Debug, Default)]
pub struct DashboardArgs {
    /// Page to open first
    ///
    /// Valid pages: overview, threats, cves, ransomware, breaches, c2,
    /// credentials, phishing, onion, scanner, alerts
    #[arg(long, value_name = "PAGE")]
    pub page: Option<String>,

    /// Filter for the initial page, e.g. severity=critical (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long, required_unless_present = "demo")]
    pub email: Option<String>,

    #[arg(long, required_unless_present = "demo")]
    pub password: Option<String>,

    /// Explore with demo data, no account needed
    #[arg(long, conflicts_with_all = ["email", "password"])]
    pub demo: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Path relative to the API base URL, e.g. /alerts/
    pub path: String,

    /// Query parameter (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Skip the response cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug)]
pub enum ShareCommand {
    /// Share a threat intelligence record
    Threat(ThreatForm),
    /// Share a C2 server
    C2(C2Form),
    /// Share a leaked credential
    Credential(CredentialForm),
    /// Share a CVE
    Cve(CveForm),
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Search by email, domain or username
    ///
    /// The field is chosen from the query: `@` searches emails, `.` searches
    /// domains, anything else searches usernames.
    Search {
        query: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReposCommand {
    /// List watched repositories
    List,
    /// Queue an immediate check of a repository
    Check {
        /// Repository id as shown by `repos list`
        id: String,
    },
}

impl Cli {
    /// Resolves the runtime configuration from the global flags
    pub fn config(&self) -> Config {
        Config::resolve(self.api_url.as_deref(), self.session_file.clone())
    }
}

/// Configuration derived from CLI arguments for dashboard startup
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    /// Page shown after the first load
    pub initial_page: Option<PageKind>,
    /// Filters applied to the initial page
    pub filters: Params,
}

/// Parses a page name argument into a PageKind.
///
/// # Returns
/// * `Ok(PageKind)` if the string names a page
/// * `Err(CliError::InvalidPage)` if it doesn't
pub fn parse_page_arg(s: &str) -> Result<PageKind, CliError> {
    PageKind::from_str(s).ok_or_else(|| CliError::InvalidPage(s.to_string()))
}

/// Splits a `key=value` argument
///
/// The value may itself contain `=`; the key may not be empty.
pub fn parse_param(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

/// Collects repeated `key=value` arguments into request parameters
pub fn parse_params(args: &[String]) -> Result<Params, CliError> {
    args.iter()
        .map(|arg| parse_param(arg))
        .collect::<Result<Params, CliError>>()
}

impl StartupConfig {
    /// Creates a StartupConfig from dashboard arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the page and filters to open
    /// * `Err(CliError)` for an unknown page or a filter the page lacks
    pub fn from_args(args: &DashboardArgs) -> Result<Self, CliError> {
        let initial_page = args.page.as_deref().map(parse_page_arg).transpose()?;
        let filters = parse_params(&args.filters)?;

        if !filters.is_empty() {
            let page = initial_page.unwrap_or(PageKind::Overview);
            let definition = page.definition();
            for (key, value) in filters.iter() {
                let filter = definition.filter(key).ok_or_else(|| CliError::InvalidFilter {
                    page: page.slug(),
                    filter: key.to_string(),
                })?;
                if !value.is_empty() && !filter.allows(value) {
                    return Err(CliError::InvalidFilterValue {
                        filter: filter.key,
                        value: value.to_string(),
                        choices: filter.choices.join(", "),
                    });
                }
            }
        }

        Ok(StartupConfig {
            initial_page,
            filters,
        })
    }
}
