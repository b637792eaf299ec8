//! CyberShield - threat intelligence dashboard in the terminal
//!
//! Opens the interactive dashboard by default; subcommands sign in and out,
//! query the API directly and share records with the community.

use std::error::Error;
use std::io;
use std::panic;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cybershield::api::{ApiClient, Params};
use cybershield::app::{App, AppState};
use cybershield::cli::{
    parse_params, Cli, Command, CredentialsCommand, DashboardArgs, ReposCommand, ShareCommand,
    StartupConfig,
};
use cybershield::config::{Config, LOG_ENV};
use cybershield::data::actions::{CHECK_FAILED, CHECK_QUEUED};
use cybershield::data::share::success_message;
use cybershield::data::{
    field_text, github_repos, search_credentials, share, trigger_repo_check, ShareForm, User,
};
use cybershield::refresh::{try_recv, RefreshConfig, RefreshHandle, RefreshMessage};
use cybershield::storage::{FileStore, Session};
use cybershield::ui;

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

/// Logs go to stderr and are off unless `CYBERSHIELD_LOG` is set, since the
/// dashboard owns the terminal
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Opens the session store named by the configuration
fn open_session(config: &Config) -> CliResult<Session> {
    match &config.storage_path {
        Some(path) => {
            debug!(path = %path.display(), "opening session file");
            Ok(Session::new(Arc::new(FileStore::open(path)?)))
        }
        None => Ok(Session::in_memory()),
    }
}

/// Runs the interactive dashboard until the user quits
async fn run_dashboard(client: ApiClient, args: &DashboardArgs) -> CliResult<()> {
    // Validate arguments before touching the terminal
    let startup = StartupConfig::from_args(args)?;

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::with_startup_config(client, startup);
    let mut refresh = RefreshHandle::spawn(RefreshConfig::default());

    let result = event_loop(&mut terminal, &mut app, &mut refresh).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    refresh.shutdown().await;

    result?;
    if app.login_required {
        return Err("session expired, run `cybershield login` to sign in again".into());
    }
    Ok(())
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh: &mut RefreshHandle,
) -> CliResult<()> {
    loop {
        if let Some(force) = app.take_load_request() {
            app.state = AppState::Loading;
            terminal.draw(|f| ui::render(f, app))?;
            app.load_current_page(force).await;
        }

        // Render UI
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if let Some(RefreshMessage::Tick) = try_recv(refresh) {
            app.request_refresh();
        }

        // Check if we should quit
        if app.should_quit {
            return Ok(());
        }
    }
}

/// Posts a share form and reports the outcome
async fn submit<F: ShareForm>(client: &ApiClient, form: &F) -> CliResult<()> {
    let created = share(client, form)
        .await
        .map_err(|e| e.user_message(F::NOUN))?;
    println!("{}", success_message(F::NOUN));
    if let Some(id) = created.get("id") {
        println!("id: {}", id);
    }
    Ok(())
}

/// Prints one line per row with the named fields separated by two spaces
fn print_rows(rows: &[Value], fields: &[&str]) {
    if rows.is_empty() {
        println!("No results");
        return;
    }
    for row in rows {
        let line: Vec<String> = fields.iter().map(|field| field_text(row, field)).collect();
        println!("{}", line.join("  "));
    }
}

fn print_profile(user: &User, demo: bool) {
    for (label, value) in user.profile_fields() {
        println!("{:<14}{}", format!("{}:", label), value);
    }
    if demo {
        println!("{:<14}demo", "Mode:");
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = cli.config();
    let session = open_session(&config)?;
    let client = ApiClient::from_config(&config, session);
    debug!(api_url = %config.api_url, "client ready");

    match cli.command {
        None => run_dashboard(client, &DashboardArgs::default()).await,
        Some(Command::Dashboard(args)) => run_dashboard(client, &args).await,
        Some(Command::Login(args)) => {
            if args.demo {
                let user = client.demo_login()?;
                println!("Demo mode enabled as {}", user.email);
                return Ok(());
            }
            let email = args.email.unwrap_or_default();
            let password = args.password.unwrap_or_default();
            let login = client
                .login(&email, &password)
                .await
                .map_err(|e| e.field_errors().unwrap_or_else(|| e.to_string()))?;
            println!(
                "Signed in as {} ({})",
                login.user.email, login.user.subscription_tier
            );
            Ok(())
        }
        Some(Command::Logout) => {
            client.logout().await?;
            println!("Signed out");
            Ok(())
        }
        Some(Command::Whoami) => {
            let session = client.session();
            if session.is_demo() {
                let user = session.user().unwrap_or_else(User::demo);
                print_profile(&user, true);
                return Ok(());
            }
            if session.access_token().is_none() {
                return Err("not signed in, run `cybershield login`".into());
            }
            let user = client.current_user().await?;
            print_profile(&user, false);
            Ok(())
        }
        Some(Command::Get(args)) => {
            let mut params: Params = parse_params(&args.params)?;
            if args.no_cache {
                params = params.no_cache();
            }
            let response = client.get(&args.path, params).await?;
            debug!(from_cache = response.from_cache, "GET {}", args.path);
            let body: Value = response.json()?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Some(Command::Share(command)) => match command {
            ShareCommand::Threat(form) => submit(&client, &form).await,
            ShareCommand::C2(form) => submit(&client, &form).await,
            ShareCommand::Credential(form) => submit(&client, &form).await,
            ShareCommand::Cve(form) => submit(&client, &form).await,
        },
        Some(Command::Credentials(CredentialsCommand::Search { query })) => {
            let rows = search_credentials(&client, &query).await?;
            print_rows(&rows, &["email", "username", "domain", "breach_source", "leak_date"]);
            Ok(())
        }
        Some(Command::Repos(ReposCommand::List)) => {
            let rows = github_repos(&client).await?;
            print_rows(&rows, &["id", "full_name", "total_cves_found", "last_check_at"]);
            Ok(())
        }
        Some(Command::Repos(ReposCommand::Check { id })) => {
            match trigger_repo_check(&client, &id).await {
                Ok(()) => {
                    println!("{}", CHECK_QUEUED);
                    Ok(())
                }
                Err(e) => {
                    debug!(error = %e, repo = %id, "repository check rejected");
                    Err(CHECK_FAILED.into())
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
