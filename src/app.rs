//! Application state management for the CyberShield dashboard
//!
//! This module contains the main application state, handling keyboard input,
//! page loading, and state transitions between pages.

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Params, PendingRedirect, LOGIN_PATH};
use crate::cli::StartupConfig;
use crate::data::{load_page, Filter, PageData, PageKind, User};

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// A page load is in flight
    Loading,
    /// Showing a loaded page
    Page(PageKind),
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Page selected in the tab bar (also the page being loaded while `Loading`)
    pub current_page: PageKind,
    /// Index of the selected table row
    pub selected_index: usize,
    /// Loaded pages keyed by kind
    pub pages: HashMap<PageKind, PageData>,
    /// Filters per page
    pub filters: HashMap<PageKind, Params>,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Set when the session could not be recovered and the user must sign in
    pub login_required: bool,
    /// Timestamp of last successful load
    pub last_refresh: Option<DateTime<Local>>,
    /// A load was requested; `true` bypasses the response cache
    pub load_request: Option<bool>,
    /// Error from the most recent load, shown in the status line
    pub error: Option<String>,
    /// Index into the current page's cyclable filters
    pub filter_focus: usize,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Flag to show the signed-in profile
    pub show_profile: bool,
    /// Signed-in user, if any
    pub user: Option<User>,
    pub is_demo: bool,
    client: ApiClient,
    redirect: Arc<PendingRedirect>,
}

impl App {
    /// Creates a new App around `client`
    ///
    /// The client's navigator is replaced so that a failed token refresh is
    /// observed here after the load that triggered it.
    pub fn new(client: ApiClient) -> Self {
        let redirect = Arc::new(PendingRedirect::new());
        let client = client.with_navigator(redirect.clone());
        let user = client.session().user();
        let is_demo = client.session().is_demo();

        Self {
            state: AppState::Loading,
            current_page: PageKind::Overview,
            selected_index: 0,
            pages: HashMap::new(),
            filters: HashMap::new(),
            should_quit: false,
            login_required: false,
            last_refresh: None,
            load_request: Some(false),
            error: None,
            filter_focus: 0,
            show_help: false,
            show_profile: false,
            user,
            is_demo,
            client,
            redirect,
        }
    }

    /// Creates a new App instance with the given startup configuration.
    ///
    /// This is used to apply CLI arguments like --page to set the initial page.
    pub fn with_startup_config(client: ApiClient, config: StartupConfig) -> Self {
        let mut app = Self::new(client);
        if let Some(page) = config.initial_page {
            app.current_page = page;
        }
        if !config.filters.is_empty() {
            app.filters.insert(app.current_page, config.filters);
        }
        app
    }

    /// Data for the page currently selected, if it has been loaded
    pub fn current_data(&self) -> Option<&PageData> {
        self.pages.get(&self.current_page)
    }

    /// Number of rows in the current page's table
    pub fn row_count(&self) -> usize {
        self.current_data().map_or(0, |page| page.rows.len())
    }

    /// Takes the pending load request, if any
    pub fn take_load_request(&mut self) -> Option<bool> {
        self.load_request.take()
    }

    /// Asks for the current page to be reloaded, bypassing the cache
    pub fn request_refresh(&mut self) {
        self.load_request = Some(true);
    }

    /// Loads the current page and transitions out of `Loading`
    ///
    /// On failure the previous data for the page (if any) stays visible and the
    /// error is shown in the status line. If the client gave up on the session,
    /// the dashboard quits with `login_required` set.
    ///
    /// # Arguments
    /// * `force` - Bypass the response cache
    pub async fn load_current_page(&mut self, force: bool) {
        let kind = self.current_page;
        self.state = AppState::Loading;

        let filters = self.filters.get(&kind).cloned().unwrap_or_default();
        match load_page(&self.client, kind, &filters, force).await {
            Ok(page) => {
                self.last_refresh = Some(page.fetched_at);
                self.error = None;
                self.pages.insert(kind, page);
            }
            Err(e) => {
                warn!(page = kind.slug(), error = %e, "page load failed");
                self.error = Some(e.to_string());
            }
        }

        if self.selected_index >= self.row_count() {
            self.selected_index = 0;
        }

        if self.redirect.take().as_deref() == Some(LOGIN_PATH) {
            info!("session expired, leaving dashboard");
            self.login_required = true;
            self.should_quit = true;
        }

        self.state = AppState::Page(kind);
    }

    /// The filter `f` cycles on the current page, if it has any
    pub fn focused_filter(&self) -> Option<&'static Filter> {
        let definition = self.current_page.definition();
        let count = definition.choice_filters().count();
        if count == 0 {
            return None;
        }
        definition.choice_filters().nth(self.filter_focus % count)
    }

    /// Current value of `key` on the current page; `None` means all
    pub fn filter_value(&self, key: &str) -> Option<&str> {
        self.filters
            .get(&self.current_page)
            .and_then(|filters| filters.get(key))
            .filter(|value| !value.trim().is_empty())
    }

    /// Advances the focused filter to its next value and reloads
    fn cycle_filter(&mut self) {
        let Some(filter) = self.focused_filter() else {
            return;
        };
        let next = filter.next_value(self.filter_value(filter.key));
        let filters = self.filters.entry(self.current_page).or_default();
        // An empty value is dropped by `load_page`, which reads as "all"
        filters.insert(filter.key, next.unwrap_or_default());
        debug!(page = self.current_page.slug(), filter = filter.key, value = ?next, "filter changed");

        self.selected_index = 0;
        self.load_request = Some(false);
    }

    /// Moves `f` to the next cyclable filter
    fn focus_next_filter(&mut self) {
        let count = self.current_page.definition().choice_filters().count();
        if count > 0 {
            self.filter_focus = (self.filter_focus + 1) % count;
        }
    }

    /// Switches to `page`, loading it on the next tick
    fn switch_page(&mut self, page: PageKind) {
        if page == self.current_page {
            return;
        }
        self.current_page = page;
        self.selected_index = 0;
        self.filter_focus = 0;
        self.error = None;
        self.state = AppState::Loading;
        self.load_request = Some(false);
    }

    /// Handles keyboard input and updates state accordingly
    ///
    /// # Key Bindings
    /// - `q` or `Esc`: Quit the application
    /// - `Tab`/`Shift-Tab`: Next/previous page
    /// - `1`-`9`: Jump to page
    /// - `Up`/`k`, `Down`/`j`: Move table selection
    /// - `r`: Reload the page, bypassing the cache
    /// - `f`: Cycle the focused filter, `F`: focus the next filter
    /// - `p`: Toggle the profile
    /// - `?`: Toggle help
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                }
                _ => {}
            }
            return;
        }

        if self.show_profile {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('q')
            ) {
                self.show_profile = false;
            }
            return;
        }

        match self.state {
            AppState::Loading => {
                // Only quit is allowed during loading
                if matches!(key_event.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.should_quit = true;
                }
            }
            AppState::Page(_) => match key_event.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                }
                KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true;
                }
                KeyCode::Tab => {
                    self.switch_page(self.current_page.next());
                }
                KeyCode::BackTab => {
                    self.switch_page(self.current_page.previous());
                }
                KeyCode::Char(c @ '1'..='9') => {
                    let index = (c as usize) - ('1' as usize);
                    if let Some(page) = PageKind::ALL.get(index) {
                        self.switch_page(*page);
                    }
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection_up();
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection_down();
                }
                KeyCode::Char('r') => {
                    self.request_refresh();
                }
                KeyCode::Char('f') => {
                    self.cycle_filter();
                }
                KeyCode::Char('F') => {
                    self.focus_next_filter();
                }
                KeyCode::Char('p') => {
                    self.show_profile = true;
                }
                KeyCode::Char('?') => {
                    self.show_help = true;
                }
                _ => {}
            },
        }
    }

    /// Moves the selection up in the table, wrapping to bottom if at top
    fn move_selection_up(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }
        if self.selected_index == 0 {
            self.selected_index = count - 1;
        } else {
            self.selected_index -= 1;
        }
    }

    /// Moves the selection down in the table, wrapping to top if at bottom
    fn move_selection_down(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }
        self.selected_index = (self.selected_index + 1) % count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockTransport, BASE_URL};
    use crate::api::Method;
    use crate::storage::Session;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    /// Helper to create a KeyEvent for testing
    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with(transport: Arc<MockTransport>) -> App {
        let client = ApiClient::new(BASE_URL, Session::in_memory()).with_transport(transport);
        App::new(client)
    }

    fn overview_transport() -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::new());
        transport.on(
            Method::Get,
            "/threats/threat-intelligence/",
            200,
            r#"{"results":[{"title":"a","severity":"high"},{"title":"b","severity":"low"},{"title":"c","severity":"high"}]}"#,
        );
        transport.on(Method::Get, "/threats/c2-servers/stats/", 200, r#"{"total":1}"#);
        transport.on(Method::Get, "/threats/leaked-credentials/stats/", 200, r#"{"total":2}"#);
        transport
    }

    async fn loaded_app() -> App {
        let mut app = app_with(overview_transport());
        let force = app.take_load_request().unwrap();
        app.load_current_page(force).await;
        app
    }

    #[test]
    fn test_initial_state_is_loading_with_pending_load() {
        let app = app_with(Arc::new(MockTransport::new()));
        assert_eq!(app.state, AppState::Loading);
        assert_eq!(app.current_page, PageKind::Overview);
        assert_eq!(app.load_request, Some(false));
    }

    #[test]
    fn test_with_startup_config_sets_page_and_filters() {
        let client = ApiClient::new(BASE_URL, Session::in_memory());
        let config = StartupConfig {
            initial_page: Some(PageKind::Alerts),
            filters: Params::new().with("severity", "high"),
        };
        let app = App::with_startup_config(client, config);
        assert_eq!(app.current_page, PageKind::Alerts);
        assert_eq!(
            app.filters.get(&PageKind::Alerts).and_then(|f| f.get("severity")),
            Some("high")
        );
    }

    #[tokio::test]
    async fn test_state_transition_loading_to_page() {
        let app = loaded_app().await;
        assert_eq!(app.state, AppState::Page(PageKind::Overview));
        assert_eq!(app.row_count(), 3);
        assert!(app.last_refresh.is_some());
        assert!(app.error.is_none());
    }

    #[tokio::test]
    async fn test_load_failure_sets_error_and_keeps_page_state() {
        let transport = Arc::new(MockTransport::new());
        transport.fail(Method::Get, "/threats/threat-intelligence/", "connection refused");
        let mut app = app_with(transport);

        app.load_current_page(false).await;

        assert_eq!(app.state, AppState::Page(PageKind::Overview));
        assert!(app.error.as_deref().unwrap().contains("connection refused"));
        assert!(app.current_data().is_none());
    }

    #[tokio::test]
    async fn test_navigation_wraps() {
        let mut app = loaded_app().await;

        app.handle_key(key_event(KeyCode::Char('j')));
        assert_eq!(app.selected_index, 1);
        app.handle_key(key_event(KeyCode::Down));
        assert_eq!(app.selected_index, 2);
        app.handle_key(key_event(KeyCode::Down));
        assert_eq!(app.selected_index, 0, "Should wrap to top");
        app.handle_key(key_event(KeyCode::Char('k')));
        assert_eq!(app.selected_index, 2, "Should wrap to bottom");
    }

    #[tokio::test]
    async fn test_tab_switches_page_and_requests_load() {
        let mut app = loaded_app().await;
        app.selected_index = 2;

        app.handle_key(key_event(KeyCode::Tab));

        assert_eq!(app.current_page, PageKind::Threats);
        assert_eq!(app.state, AppState::Loading);
        assert_eq!(app.selected_index, 0);
        assert_eq!(app.take_load_request(), Some(false));
    }

    #[tokio::test]
    async fn test_back_tab_wraps_to_last_page() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::BackTab));
        assert_eq!(app.current_page, PageKind::Alerts);
    }

    #[tokio::test]
    async fn test_number_keys_jump_to_page() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Char('6')));
        assert_eq!(app.current_page, PageKind::C2);
    }

    #[tokio::test]
    async fn test_same_page_key_does_not_reload() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Char('1')));
        assert_eq!(app.state, AppState::Page(PageKind::Overview));
        assert!(app.take_load_request().is_none());
    }

    #[tokio::test]
    async fn test_r_requests_forced_refresh() {
        let transport = overview_transport();
        let mut app = app_with(transport.clone());
        app.load_current_page(false).await;

        app.handle_key(key_event(KeyCode::Char('r')));
        let force = app.take_load_request().unwrap();
        assert!(force);
        app.load_current_page(force).await;

        assert_eq!(transport.count(Method::Get, "/threats/threat-intelligence/"), 2);
        let last = transport
            .calls()
            .into_iter()
            .filter(|c| c.path == "/threats/threat-intelligence/")
            .last()
            .unwrap();
        assert_eq!(last.params.get("noCache"), Some("true"));
    }

    fn alerts_transport() -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::new());
        transport.on(
            Method::Get,
            "/alerts/",
            200,
            r#"[{"title":"a","severity":"high","status":"active"}]"#,
        );
        transport.on(Method::Get, "/alerts/rules/", 200, "[]");
        transport
    }

    fn last_alerts_call(transport: &MockTransport) -> crate::api::mock::RecordedCall {
        transport
            .calls()
            .into_iter()
            .filter(|c| c.path == "/alerts/")
            .last()
            .unwrap()
    }

    #[tokio::test]
    async fn test_filter_keys_cycle_status_and_reload() {
        let transport = alerts_transport();
        let mut app = app_with(transport.clone());
        app.current_page = PageKind::Alerts;
        app.load_current_page(false).await;
        assert_eq!(app.focused_filter().unwrap().key, "severity");

        app.handle_key(key_event(KeyCode::Char('F')));
        assert_eq!(app.focused_filter().unwrap().key, "status");

        app.handle_key(key_event(KeyCode::Char('f')));
        assert_eq!(app.filter_value("status"), Some("active"));
        let force = app.take_load_request().unwrap();
        assert!(!force);
        app.load_current_page(force).await;
        assert_eq!(last_alerts_call(&transport).params.get("status"), Some("active"));

        app.handle_key(key_event(KeyCode::Char('f')));
        let force = app.take_load_request().unwrap();
        app.load_current_page(force).await;
        assert_eq!(last_alerts_call(&transport).params.get("status"), Some("resolved"));

        app.handle_key(key_event(KeyCode::Char('f')));
        assert_eq!(app.filter_value("status"), None);
        let force = app.take_load_request().unwrap();
        app.load_current_page(force).await;
        assert_eq!(last_alerts_call(&transport).params.get("status"), None);
    }

    #[tokio::test]
    async fn test_filter_key_is_noop_without_choice_filters() {
        let mut app = loaded_app().await;
        assert!(app.focused_filter().is_none());

        app.handle_key(key_event(KeyCode::Char('f')));

        assert!(app.take_load_request().is_none());
        assert!(app.filters.get(&PageKind::Overview).is_none());
    }

    #[tokio::test]
    async fn test_switching_page_resets_filter_focus() {
        let mut app = app_with(alerts_transport());
        app.current_page = PageKind::Alerts;
        app.load_current_page(false).await;
        app.handle_key(key_event(KeyCode::Char('F')));
        assert_eq!(app.filter_focus, 1);

        app.handle_key(key_event(KeyCode::Char('1')));

        assert_eq!(app.filter_focus, 0);
    }

    #[tokio::test]
    async fn test_profile_overlay_intercepts_keys() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Char('p')));
        assert!(app.show_profile);

        app.handle_key(key_event(KeyCode::Tab));
        assert_eq!(app.current_page, PageKind::Overview);

        app.handle_key(key_event(KeyCode::Char('p')));
        assert!(!app.show_profile);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_help_overlay_intercepts_keys() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Char('?')));
        assert!(app.show_help);

        app.handle_key(key_event(KeyCode::Tab));
        assert_eq!(app.current_page, PageKind::Overview);

        app.handle_key(key_event(KeyCode::Esc));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_keys_ignored_during_loading() {
        let mut app = app_with(Arc::new(MockTransport::new()));
        app.handle_key(key_event(KeyCode::Tab));
        assert_eq!(app.current_page, PageKind::Overview);

        app.handle_key(key_event(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_q_and_esc_quit() {
        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = loaded_app().await;
        app.handle_key(key_event(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_failed_refresh_requires_login() {
        let transport = Arc::new(MockTransport::new());
        transport.on(Method::Get, "/threats/threat-intelligence/", 401, "{}");
        transport.on(Method::Post, "/auth/refresh/", 401, "{}");
        let session = Session::in_memory();
        session.set_tokens("stale", "revoked").unwrap();
        let client = ApiClient::new(BASE_URL, session.clone()).with_transport(transport);
        let mut app = App::new(client);

        app.load_current_page(false).await;

        assert!(app.login_required);
        assert!(app.should_quit);
        assert!(app.error.is_some());
        assert!(session.access_token().is_none());
    }
}
