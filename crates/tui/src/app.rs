use std::{
    fs, io,
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ps2cat_core::{
    auth::{Authenticator, CredentialStore, Credentials, Session},
    browser::{Browser, BrowserView},
    capacity::DriveCapacity,
    error::{AuthError, StoreError},
    form::{FormField, NewGameForm},
    models::{GameSource, ProcessedGame},
    remote::{FirestoreStore, GameStore, RemoteSync, SyncEvent},
    selection::format_gb,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{debug, error, info, warn};

const TICK_RATE: Duration = Duration::from_millis(50);
const SYNC_CHANNEL_SIZE: usize = 16;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Default)]
struct LoginPrompt {
    email: String,
    password: String,
    focus: LoginField,
    pending: bool,
    error: Option<String>,
}

impl LoginPrompt {
    fn with_message(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Email => LoginField::Password,
            LoginField::Password => LoginField::Email,
        };
    }
}

#[derive(Debug, Default)]
struct AddGamePrompt {
    form: NewGameForm,
    focus: usize,
    pending: bool,
    error: Option<String>,
}

impl AddGamePrompt {
    fn field(&self) -> FormField {
        FormField::ALL[self.focus]
    }

    fn move_focus(&mut self, delta: isize) {
        let len = FormField::ALL.len() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
    }
}

enum Overlay {
    Capacity { cursor: usize },
    Summary,
    Login(LoginPrompt),
    AddGame(AddGamePrompt),
}

enum AppEvent {
    Input(Event),
    Tick,
    SignedIn {
        result: Result<Session, AuthError>,
        credentials: Credentials,
        silent: bool,
    },
    GameAdded {
        name: String,
        result: Result<String, StoreError>,
    },
}

/// Terminal front end over the catalog browser.
pub struct CatalogApp {
    browser: Browser,
    sync: RemoteSync<FirestoreStore>,
    authenticator: Authenticator,
    credentials: CredentialStore,
    export_dir: PathBuf,
    state: UiState,
    overlay: Option<Overlay>,
    session: Option<Session>,
    sync_in_flight: bool,
    resync_pending: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    sync_tx: mpsc::Sender<SyncEvent>,
    sync_rx: Option<mpsc::Receiver<SyncEvent>>,
    theme: Theme,
}

impl CatalogApp {
    pub fn new(
        browser: Browser,
        sync: RemoteSync<FirestoreStore>,
        authenticator: Authenticator,
        credentials: CredentialStore,
        export_dir: PathBuf,
    ) -> Self {
        let (sync_tx, sync_rx) = mpsc::channel(SYNC_CHANNEL_SIZE);
        Self {
            browser,
            sync,
            authenticator,
            credentials,
            export_dir,
            state: UiState::default(),
            overlay: None,
            session: None,
            sync_in_flight: false,
            resync_pending: false,
            event_tx: None,
            sync_tx,
            sync_rx: Some(sync_rx),
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.state.set_status(format!(
            "Loaded {} games • {} selected",
            self.browser.games().len(),
            self.browser.selection().len()
        ));

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        let Some(mut sync_rx) = self.sync_rx.take() else {
            restore_terminal(&mut terminal)?;
            anyhow::bail!("sync receiver already consumed");
        };

        self.start_sync();
        self.silent_sign_in();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                Some(event) = sync_rx.recv() => self.handle_sync_event(event),
            }

            if self.state.should_quit {
                break;
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Err(err) = self.handle_input(event) {
                    self.state.set_status(format!("Error: {err}"));
                }
            }
            Some(AppEvent::Tick) => {}
            Some(AppEvent::SignedIn {
                result,
                credentials,
                silent,
            }) => self.handle_signed_in(result, credentials, silent),
            Some(AppEvent::GameAdded { name, result }) => self.handle_game_added(name, result),
            None => return false,
        }
        if self.browser.tick(Instant::now()) {
            self.state.reset_cursor();
        }
        true
    }

    // ----- remote -----

    fn start_sync(&mut self) {
        if self.sync_in_flight {
            self.state
                .set_status("A sync is already running".to_string());
            return;
        }
        self.sync_in_flight = true;
        let sync = self.sync.clone();
        let sender = self.sync_tx.clone();
        spawn(async move {
            if let Err(err) = sync.run(sender).await {
                error!("Remote sync task error: {err}");
            }
        });
    }

    fn start_refresh(&mut self) {
        if self.sync_in_flight {
            self.state
                .set_status("A sync is already running".to_string());
            return;
        }
        self.sync_in_flight = true;
        self.browser.begin_refresh();
        self.state.set_status("Refreshing...".to_string());
        let sync = self.sync.clone();
        let sender = self.sync_tx.clone();
        spawn(async move {
            if let Err(err) = sync.refresh(sender).await {
                error!("Remote refresh task error: {err}");
            }
        });
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        let finished = !matches!(event, SyncEvent::Started { .. });
        match &event {
            SyncEvent::Started { retry, max_retries } if *retry > 0 => {
                self.state
                    .set_status(format!("Reconnecting (attempt {retry}/{max_retries})"));
            }
            SyncEvent::Started { .. } => {}
            SyncEvent::Loaded(games) | SyncEvent::Refreshed(games) => {
                info!(count = games.len(), "Remote games applied");
                self.state
                    .set_status(format!("Loaded {} games from the server", games.len()));
            }
            SyncEvent::Failed { message, attempts } => {
                error!(attempts, "Remote sync gave up");
                self.state.set_status(message.clone());
            }
            SyncEvent::RefreshFailed(err) => {
                self.state.set_status(format!("Refresh failed: {err}"));
            }
        }
        self.browser.apply_sync_event(event);
        self.state.clamp_cursor(self.browser.visible_len());

        if finished {
            self.sync_in_flight = false;
            if self.resync_pending {
                self.resync_pending = false;
                self.start_sync();
            }
        }
    }

    // ----- auth -----

    fn silent_sign_in(&mut self) {
        match self.credentials.load() {
            Ok(Some(credentials)) => {
                debug!(email = %credentials.email, "Signing in with saved credentials");
                self.spawn_sign_in(credentials, true);
            }
            Ok(None) => {}
            Err(err) => warn!(?err, "Failed to read saved credentials"),
        }
    }

    fn spawn_sign_in(&self, credentials: Credentials, silent: bool) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        let authenticator = self.authenticator.clone();
        spawn(async move {
            let result = authenticator
                .sign_in(&credentials.email, &credentials.password)
                .await;
            let event = AppEvent::SignedIn {
                result,
                credentials,
                silent,
            };
            if tx.send(event).await.is_err() {
                debug!("UI closed before sign-in finished");
            }
        });
    }

    fn handle_signed_in(
        &mut self,
        result: Result<Session, AuthError>,
        credentials: Credentials,
        silent: bool,
    ) {
        match result {
            Ok(session) => {
                if let Err(err) = self.credentials.save(&credentials) {
                    warn!(?err, "Failed to save credentials");
                }
                self.state
                    .set_status(format!("Signed in as {}", session.email));
                self.session = Some(session);
                if matches!(self.overlay, Some(Overlay::Login(_))) {
                    self.overlay = None;
                }
            }
            Err(err) if silent => {
                warn!(%err, "Saved sign-in failed");
                if !matches!(err, AuthError::Network(_)) {
                    if let Err(clear_err) = self.credentials.clear() {
                        warn!(?clear_err, "Failed to clear saved credentials");
                    }
                }
                self.state.set_status(format!("Saved sign-in failed: {err}"));
            }
            Err(err) => {
                if let Some(Overlay::Login(prompt)) = self.overlay.as_mut() {
                    prompt.pending = false;
                    prompt.error = Some(err.to_string());
                } else {
                    self.state.set_status(format!("Sign-in failed: {err}"));
                }
            }
        }
    }

    fn active_session(&mut self) -> Option<Session> {
        let now = Utc::now();
        if self
            .session
            .as_ref()
            .is_some_and(|session| !session.is_valid_at(now))
        {
            info!("Session expired");
            self.session = None;
        }
        self.session.clone()
    }

    fn toggle_login(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(err) = self.credentials.clear() {
                warn!(?err, "Failed to clear saved credentials");
            }
            info!(email = %session.email, "Signed out");
            self.state.set_status("Signed out".to_string());
        } else {
            self.overlay = Some(Overlay::Login(LoginPrompt::default()));
        }
    }

    fn open_add_game(&mut self) {
        if self.active_session().is_some() {
            self.overlay = Some(Overlay::AddGame(AddGamePrompt::default()));
        } else {
            self.overlay = Some(Overlay::Login(LoginPrompt::with_message(
                "Sign in as administrator to add games",
            )));
        }
    }

    fn handle_game_added(&mut self, name: String, result: Result<String, StoreError>) {
        match result {
            Ok(id) => {
                info!(%id, %name, "Game added");
                if matches!(self.overlay, Some(Overlay::AddGame(_))) {
                    self.overlay = None;
                }
                self.state.set_status(format!("Added {name}"));
                if self.sync_in_flight {
                    self.resync_pending = true;
                } else {
                    self.start_sync();
                }
            }
            Err(err) => {
                error!(%err, %name, "Failed to add game");
                let expired = matches!(
                    err,
                    StoreError::Unauthenticated
                        | StoreError::Status {
                            status: 401 | 403,
                            ..
                        }
                );
                if expired {
                    self.session = None;
                    self.overlay = Some(Overlay::Login(LoginPrompt::with_message(
                        "Session expired, sign in again",
                    )));
                } else if let Some(Overlay::AddGame(prompt)) = self.overlay.as_mut() {
                    prompt.pending = false;
                    prompt.error = Some(format!("Could not add the game: {err}"));
                } else {
                    self.state.set_status(format!("Could not add {name}: {err}"));
                }
            }
        }
    }

    // ----- input -----

    fn handle_input(&mut self, event: Event) -> Result<()> {
        let Event::Key(key) = event else {
            return Ok(());
        };
        if let Some(overlay) = self.overlay.take() {
            self.overlay = self.handle_overlay_key(overlay, key);
            return Ok(());
        }
        match self.state.mode {
            Mode::Filter => self.handle_filter_key(key),
            Mode::Browse => self.handle_browse_key(key),
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.state.mode = Mode::Browse;
                if self.browser.clear_query() {
                    self.state.reset_cursor();
                }
                self.state.set_status("Search cleared".to_string());
            }
            KeyCode::Enter => {
                self.state.mode = Mode::Browse;
                if self.browser.commit_query() {
                    self.state.reset_cursor();
                }
                self.state.set_status(format!(
                    "{} games match \"{}\"",
                    self.browser.filtered_len(),
                    self.browser.query()
                ));
            }
            KeyCode::Backspace => {
                let mut text = self.browser.query_input().to_string();
                text.pop();
                self.browser.set_query_input(text, Instant::now());
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    let mut text = self.browser.query_input().to_string();
                    text.push(c);
                    self.browser.set_query_input(text, Instant::now());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Result<()> {
        let len = self.browser.visible_len();
        match key.code {
            KeyCode::Char('q') if key.modifiers.is_empty() => self.state.should_quit = true,
            KeyCode::Char('c') if key.modifiers == KeyModifiers::CONTROL => {
                self.state.should_quit = true
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.move_cursor(1, len),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_cursor(-1, len),
            KeyCode::Char('g') if key.modifiers.is_empty() => self.state.move_to(0, len),
            KeyCode::Char('G') => self.state.move_to(len.saturating_sub(1), len),
            KeyCode::Home => self.state.move_to(0, len),
            KeyCode::End => self.state.move_to(len.saturating_sub(1), len),
            KeyCode::PageDown => self.state.page_down(len),
            KeyCode::PageUp => self.state.page_up(len),
            KeyCode::Char('/') => {
                self.state.mode = Mode::Filter;
                self.state.set_status("Type to search".to_string());
            }
            KeyCode::Esc if !self.browser.query().is_empty() => {
                if self.browser.clear_query() {
                    self.state.reset_cursor();
                }
                self.state.set_status("Search cleared".to_string());
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_current(),
            KeyCode::Char('x') if key.modifiers.is_empty() => {
                self.browser.clear_selection()?;
                self.state.set_status("Selection cleared".to_string());
            }
            KeyCode::Char('c') if key.modifiers.is_empty() => {
                let cursor = self
                    .browser
                    .capacity()
                    .and_then(|current| DriveCapacity::ALL.iter().position(|c| *c == current))
                    .unwrap_or(0);
                self.overlay = Some(Overlay::Capacity { cursor });
            }
            KeyCode::Char('s') if key.modifiers.is_empty() => {
                self.overlay = Some(Overlay::Summary);
            }
            KeyCode::Char('e') if key.modifiers.is_empty() => self.export_summary()?,
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.start_refresh()
            }
            KeyCode::Char('r') if key.modifiers.is_empty() => {
                if matches!(self.browser.view(), BrowserView::Error(_)) {
                    self.start_sync();
                } else {
                    self.start_refresh();
                }
            }
            KeyCode::Char('l') if key.modifiers.is_empty() => self.toggle_login(),
            KeyCode::Char('a') if key.modifiers.is_empty() => self.open_add_game(),
            _ => {}
        }
        self.grow_window_at_end();
        Ok(())
    }

    fn grow_window_at_end(&mut self) {
        let len = self.browser.visible_len();
        if len > 0 && self.state.cursor + 1 >= len && self.browser.end_reached() {
            debug!(page = self.browser.page(), "Loaded next page");
        }
    }

    fn toggle_current(&mut self) {
        let Some(name) = self.current_game().map(|game| game.display_name.clone()) else {
            return;
        };
        let status = match self.browser.toggle(&name) {
            Ok(true) => format!("Selected {name}"),
            Ok(false) => format!("Removed {name}"),
            Err(err) => format!("Selection not saved: {err}"),
        };
        if self.browser.capacity_exceeded() {
            self.state
                .set_status(format!("{status} • selection exceeds the drive"));
        } else {
            self.state.set_status(status);
        }
    }

    fn export_summary(&mut self) -> Result<()> {
        if self.browser.selection().is_empty() {
            self.state.set_status("Nothing selected to export".to_string());
            return Ok(());
        }
        fs::create_dir_all(&self.export_dir)
            .with_context(|| format!("failed to create {}", self.export_dir.display()))?;
        let file_name = format!("ps2_games_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.export_dir.join(file_name);
        fs::write(&path, self.browser.summary_text())
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), count = self.browser.selection().len(), "Summary exported");
        self.state
            .set_status(format!("Summary written to {}", path.display()));
        Ok(())
    }

    fn handle_overlay_key(&mut self, overlay: Overlay, key: KeyEvent) -> Option<Overlay> {
        match overlay {
            Overlay::Summary => match key.code {
                KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('q') => None,
                KeyCode::Char('e') => {
                    if let Err(err) = self.export_summary() {
                        self.state.set_status(format!("Export failed: {err}"));
                    }
                    Some(Overlay::Summary)
                }
                KeyCode::Char('x') => {
                    if let Err(err) = self.browser.clear_selection() {
                        self.state.set_status(format!("Selection not saved: {err}"));
                    }
                    Some(Overlay::Summary)
                }
                _ => Some(Overlay::Summary),
            },
            Overlay::Capacity { cursor } => self.handle_capacity_key(cursor, key),
            Overlay::Login(prompt) => self.handle_login_key(prompt, key),
            Overlay::AddGame(prompt) => self.handle_add_game_key(prompt, key),
        }
    }

    fn handle_capacity_key(&mut self, cursor: usize, key: KeyEvent) -> Option<Overlay> {
        let last = DriveCapacity::ALL.len() - 1;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => None,
            KeyCode::Char('j') | KeyCode::Down => Some(Overlay::Capacity {
                cursor: (cursor + 1).min(last),
            }),
            KeyCode::Char('k') | KeyCode::Up => Some(Overlay::Capacity {
                cursor: cursor.saturating_sub(1),
            }),
            KeyCode::Enter | KeyCode::Char(' ') => {
                let choice = DriveCapacity::ALL[cursor];
                match self.browser.choose_capacity(choice) {
                    Some(chosen) => self.state.set_status(format!(
                        "Drive: {} GB ({} GB usable)",
                        chosen.nominal_gb(),
                        chosen.real_gb()
                    )),
                    None => self.state.set_status("Drive cleared".to_string()),
                }
                None
            }
            KeyCode::Delete | KeyCode::Backspace | KeyCode::Char('n') => {
                self.browser.set_capacity(None);
                self.state.set_status("Drive cleared".to_string());
                None
            }
            _ => Some(Overlay::Capacity { cursor }),
        }
    }

    fn handle_login_key(&mut self, mut prompt: LoginPrompt, key: KeyEvent) -> Option<Overlay> {
        if prompt.pending {
            return match key.code {
                KeyCode::Esc => None,
                _ => Some(Overlay::Login(prompt)),
            };
        }
        match key.code {
            KeyCode::Esc => return None,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                prompt.toggle_focus()
            }
            KeyCode::Backspace => {
                prompt.field_mut().pop();
            }
            KeyCode::Enter => {
                match self
                    .authenticator
                    .check_identity(&prompt.email, &prompt.password)
                {
                    Ok(()) => {
                        prompt.pending = true;
                        prompt.error = None;
                        self.spawn_sign_in(
                            Credentials {
                                email: prompt.email.trim().to_string(),
                                password: prompt.password.clone(),
                            },
                            false,
                        );
                    }
                    Err(err) => prompt.error = Some(err.to_string()),
                }
            }
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    prompt.field_mut().push(c);
                }
            }
            _ => {}
        }
        Some(Overlay::Login(prompt))
    }

    fn handle_add_game_key(
        &mut self,
        mut prompt: AddGamePrompt,
        key: KeyEvent,
    ) -> Option<Overlay> {
        if prompt.pending {
            return Some(Overlay::AddGame(prompt));
        }
        match key.code {
            KeyCode::Esc => {
                // Re-fetch on close.
                if !self.sync_in_flight {
                    self.start_sync();
                }
                return None;
            }
            KeyCode::Tab | KeyCode::Down => prompt.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => prompt.move_focus(-1),
            KeyCode::Backspace => {
                let field = prompt.field();
                prompt.form.pop(field);
            }
            KeyCode::Enter => return self.submit_new_game(prompt),
            KeyCode::Char(c) => {
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT {
                    let field = prompt.field();
                    prompt.form.push(field, c);
                }
            }
            _ => {}
        }
        Some(Overlay::AddGame(prompt))
    }

    fn submit_new_game(&mut self, mut prompt: AddGamePrompt) -> Option<Overlay> {
        let record = match prompt.form.validate() {
            Ok(record) => record,
            Err(err) => {
                prompt.error = Some(err.to_string());
                return Some(Overlay::AddGame(prompt));
            }
        };
        let Some(session) = self.active_session() else {
            return Some(Overlay::Login(LoginPrompt::with_message(
                "Session expired, sign in again",
            )));
        };
        let Some(tx) = self.event_tx.clone() else {
            return Some(Overlay::AddGame(prompt));
        };

        prompt.pending = true;
        prompt.error = None;
        let store = Arc::clone(self.sync.store());
        spawn(async move {
            let result = store.add_game(&record, &session.id_token).await;
            let event = AppEvent::GameAdded {
                name: record.name,
                result,
            };
            if tx.send(event).await.is_err() {
                debug!("UI closed before insert finished");
            }
        });
        Some(Overlay::AddGame(prompt))
    }

    fn current_game(&self) -> Option<&ProcessedGame> {
        self.browser.visible_game(self.state.cursor)
    }

    // ----- drawing -----

    fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(4),
            ])
            .split(size);

        self.render_search(frame, chunks[0]);

        let body_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);
        self.render_game_list(frame, body_chunks[0]);
        self.render_game_info(frame, body_chunks[1]);
        self.render_selection_bar(frame, chunks[2]);
        self.render_status(frame, chunks[3]);

        match &self.overlay {
            Some(Overlay::Summary) => self.render_summary(frame),
            Some(Overlay::Capacity { cursor }) => self.render_capacity_picker(frame, *cursor),
            Some(Overlay::Login(prompt)) => self.render_login(frame, prompt),
            Some(Overlay::AddGame(prompt)) => self.render_add_game(frame, prompt),
            None => {}
        }
    }

    fn render_search(&self, frame: &mut Frame, area: Rect) {
        let editing = self.state.mode == Mode::Filter;
        let style = if editing {
            Style::default().fg(self.theme.accent)
        } else {
            Style::default().fg(self.theme.muted)
        };
        let text = if self.browser.query_input().is_empty() && !editing {
            Span::styled("Press / to search", Style::default().fg(self.theme.muted))
        } else {
            Span::raw(self.browser.query_input().to_string())
        };
        let paragraph = Paragraph::new(Line::from(vec![Span::styled("🔍 ", style), text]))
            .block(Block::default().borders(Borders::ALL).title("Search"));
        frame.render_widget(paragraph, area);

        if editing {
            let width = self.browser.query_input().chars().count() as u16;
            let cursor_x = (area.x + 4 + width).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1);
        }
    }

    fn render_game_list(&mut self, frame: &mut Frame, area: Rect) {
        let title = format!(
            "Games ({}/{}){}",
            self.browser.visible_len(),
            self.browser.filtered_len(),
            if self.browser.has_more() { " more below" } else { "" }
        );
        let block = Block::default().borders(Borders::ALL).title(title);

        let notice = match self.browser.view() {
            BrowserView::Loading => Some(vec![Line::from("Loading games from the server...")]),
            BrowserView::Retrying { retry, max_retries } => Some(vec![
                Line::from("Connection problem, retrying..."),
                Line::from(Span::styled(
                    format!("Attempt {retry}/{max_retries}"),
                    Style::default().fg(self.theme.warning),
                )),
            ]),
            BrowserView::Error(message) => Some(vec![
                Line::from(Span::styled(
                    message,
                    Style::default()
                        .fg(self.theme.danger)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from("Press r to try again"),
            ]),
            BrowserView::NoMatches(query) => {
                Some(vec![Line::from(format!("No games match \"{query}\""))])
            }
            BrowserView::List => None,
        };
        if let Some(lines) = notice {
            let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        self.state.list_height = area.height.saturating_sub(2) as usize;
        let len = self.browser.visible_len();
        self.state.clamp_cursor(len);
        self.state.ensure_cursor_visible(len);

        let games = self.browser.visible();
        let end = (self.state.offset + self.state.list_height).min(games.len());
        let start = self.state.offset.min(end);

        let mut list_state = ListState::default();
        if !games.is_empty() {
            list_state.select(Some(self.state.cursor.saturating_sub(start)));
        }
        let items: Vec<ListItem> = games[start..end]
            .iter()
            .enumerate()
            .map(|(idx, game)| {
                let is_cursor = self.state.cursor == start + idx;
                let is_selected = self.browser.is_selected(&game.display_name);
                let marker = if is_cursor {
                    Span::styled(
                        "▶ ",
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw("  ")
                };
                let check = if is_selected {
                    Span::styled("[✓] ", Style::default().fg(self.theme.success))
                } else {
                    Span::styled("[ ] ", Style::default().fg(self.theme.muted))
                };
                let flag = match game.flag() {
                    "" => Span::raw("   "),
                    flag => Span::raw(format!("{flag} ")),
                };
                let name_style = if is_selected {
                    Style::default()
                        .fg(self.theme.success)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.primary_fg)
                };
                let size = Span::styled(
                    format!(" · {} GB", format_gb(game.size_gb())),
                    Style::default().fg(self.theme.muted),
                );
                ListItem::new(Line::from(vec![
                    marker,
                    check,
                    flag,
                    Span::styled(game.display_name.clone(), name_style),
                    size,
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_game_info(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Game Details");
        let Some(game) = self
            .current_game()
            .filter(|_| self.browser.view() == BrowserView::List)
        else {
            let paragraph = Paragraph::new("No game highlighted").block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let mut lines = vec![Line::from(vec![Span::styled(
            format!("{} {}", game.flag(), game.display_name)
                .trim()
                .to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )])];
        if let Some(region) = game.region {
            lines.push(Line::from(format!("Region: {}", region.code())));
        }
        lines.push(Line::from(format!("Size: {} GB", format_gb(game.size_gb()))));
        if let Some(code) = game.record.primary_code() {
            lines.push(Line::from(format!("Code: {code}")));
        }
        lines.push(Line::from(format!("File: {}", game.record.name)));
        let source = match (&game.source, &game.remote_id) {
            (GameSource::Remote, Some(id)) => format!("Source: server ({id})"),
            (GameSource::Remote, None) => "Source: server".to_string(),
            (GameSource::Bundled, _) => "Source: bundled catalog".to_string(),
        };
        lines.push(Line::from(Span::styled(
            source,
            Style::default().fg(self.theme.muted),
        )));
        if let Some(url) = &game.record.cover_url {
            lines.push(Line::from(format!("Cover: {url}")));
        }
        if let Some(description) = &game.record.description {
            lines.push(Line::from(""));
            lines.push(Line::from(description.clone()));
        }
        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_selection_bar(&self, frame: &mut Frame, area: Rect) {
        let estimate = self.browser.estimate();
        let count = self.browser.selection().len();
        let mut spans = vec![
            Span::styled(
                format!("{count} selected"),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" • {} GB", format_gb(estimate.total_gb))),
        ];
        match estimate.capacity {
            Some(capacity) => spans.push(Span::raw(format!(
                " • {} GB drive, {:.0}% used",
                capacity.nominal_gb(),
                estimate.usage_percent
            ))),
            None => spans.push(Span::styled(
                " • no drive chosen (c)",
                Style::default().fg(self.theme.muted),
            )),
        }
        spans.push(Span::raw(format!(" • R$ {}", self.browser.price_quote())));
        if estimate.exceeded {
            spans.push(Span::styled(
                "  ⚠ exceeds drive capacity",
                Style::default()
                    .fg(self.theme.danger)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Selection"));
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let primary = if self.state.mode == Mode::Filter {
            format!("Search: {}", self.browser.query_input())
        } else {
            self.state.status.clone()
        };
        let account = match &self.session {
            Some(session) => format!("Admin: {}", session.email),
            None => "Not signed in".to_string(),
        };
        let secondary = format!(
            "{account} • space select • / search • c drive • s summary • e export • r refresh • l login • a add • q quit"
        );
        let paragraph = Paragraph::new(vec![
            Line::from(primary),
            Line::from(Span::styled(
                secondary,
                Style::default().fg(self.theme.muted),
            )),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_summary(&self, frame: &mut Frame) {
        let area = centered_rect(64, 22, frame.size());
        frame.render_widget(Clear, area);
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Selection Summary");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let estimate = self.browser.estimate();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(inner);

        let mut header = vec![Line::from(format!(
            "{} games • {} GB • R$ {}",
            self.browser.selection().len(),
            format_gb(estimate.total_gb),
            self.browser.price_quote()
        ))];
        match (estimate.capacity, estimate.remaining_gb()) {
            (Some(capacity), Some(remaining)) => header.push(Line::from(format!(
                "{} GB drive ({} GB usable) • {} GB free",
                capacity.nominal_gb(),
                capacity.real_gb(),
                format_gb(remaining)
            ))),
            _ => header.push(Line::from(Span::styled(
                "No drive chosen",
                Style::default().fg(self.theme.muted),
            ))),
        }
        if estimate.exceeded {
            header.push(Line::from(Span::styled(
                "⚠ The selection does not fit on this drive",
                Style::default().fg(self.theme.danger),
            )));
        }
        frame.render_widget(Paragraph::new(header), chunks[0]);

        let gauge_color = if estimate.exceeded {
            self.theme.danger
        } else {
            self.theme.success
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(gauge_color))
            .ratio((estimate.usage_percent / 100.0).clamp(0.0, 1.0))
            .label(format!("{:.0}%", estimate.usage_percent));
        frame.render_widget(gauge, chunks[1]);

        let lines: Vec<Line> = self
            .browser
            .summary_text()
            .lines()
            .skip(4)
            .map(|line| Line::from(line.to_string()))
            .collect();
        let body = if lines.is_empty() {
            Paragraph::new("No games selected")
        } else {
            Paragraph::new(lines)
        };
        frame.render_widget(body.wrap(Wrap { trim: false }), chunks[2]);

        let helper = Line::from(vec![
            Span::styled("e", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" export  "),
            Span::styled("x", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" clear  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" close"),
        ]);
        frame.render_widget(Paragraph::new(helper), chunks[3]);
    }

    fn render_capacity_picker(&self, frame: &mut Frame, cursor: usize) {
        let height = DriveCapacity::ALL.len() as u16 + 4;
        let area = centered_rect(40, height, frame.size());
        frame.render_widget(Clear, area);

        let current = self.browser.capacity();
        let total = self.browser.total_size();
        let items: Vec<ListItem> = DriveCapacity::ALL
            .iter()
            .map(|choice| {
                let chosen = current == Some(*choice);
                let fits = total <= choice.real_gb();
                let marker = if chosen { "● " } else { "○ " };
                let style = if fits {
                    Style::default().fg(self.theme.primary_fg)
                } else {
                    Style::default().fg(self.theme.muted)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(self.theme.accent)),
                    Span::styled(format!("{:>3} GB", choice.nominal_gb()), style),
                    Span::styled(
                        format!("  ({} GB usable)", choice.real_gb()),
                        Style::default().fg(self.theme.muted),
                    ),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        list_state.select(Some(cursor));
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Drive Capacity (Enter choose, n clear)"),
            )
            .highlight_style(Style::default().bg(self.theme.selection_bg));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_login(&self, frame: &mut Frame, prompt: &LoginPrompt) {
        let area = centered_rect(56, 9, frame.size());
        frame.render_widget(Clear, area);

        let label = |field: LoginField, text: &str| {
            if prompt.focus == field {
                Span::styled(
                    format!("▶ {text:<9}"),
                    Style::default().fg(self.theme.accent),
                )
            } else {
                Span::raw(format!("  {text:<9}"))
            }
        };
        let masked = "•".repeat(prompt.password.chars().count());
        let mut lines = vec![
            Line::from(vec![label(LoginField::Email, "Email"), Span::raw(prompt.email.clone())]),
            Line::from(vec![label(LoginField::Password, "Password"), Span::raw(masked.clone())]),
            Line::from(""),
        ];
        if prompt.pending {
            lines.push(Line::from(Span::styled(
                "Signing in...",
                Style::default().fg(self.theme.warning),
            )));
        } else if let Some(error) = &prompt.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(self.theme.danger),
            )));
        } else {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" sign in  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" switch  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Administrator Sign-in"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if !prompt.pending {
            let (row, width) = match prompt.focus {
                LoginField::Email => (0, prompt.email.chars().count()),
                LoginField::Password => (1, masked.chars().count()),
            };
            let cursor_x =
                (area.x + 12 + width as u16).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1 + row);
        }
    }

    fn render_add_game(&self, frame: &mut Frame, prompt: &AddGamePrompt) {
        let area = centered_rect(64, FormField::ALL.len() as u16 + 6, frame.size());
        frame.render_widget(Clear, area);

        let mut lines: Vec<Line> = FormField::ALL
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let label = if idx == prompt.focus {
                    Span::styled(
                        format!("▶ {:<12}", field.label()),
                        Style::default().fg(self.theme.accent),
                    )
                } else {
                    Span::raw(format!("  {:<12}", field.label()))
                };
                Line::from(vec![label, Span::raw(prompt.form.value(*field).to_string())])
            })
            .collect();
        lines.push(Line::from(""));
        if prompt.pending {
            lines.push(Line::from(Span::styled(
                "Saving...",
                Style::default().fg(self.theme.warning),
            )));
        } else if let Some(error) = &prompt.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(self.theme.danger),
            )));
        } else {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" save  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" next field  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Add Game"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if !prompt.pending {
            let width = prompt.form.value(prompt.field()).chars().count() as u16;
            let cursor_x = (area.x + 15 + width).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + 1 + prompt.focus as u16);
        }
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

/// Cursor and scroll position over the visible window.
struct UiState {
    cursor: usize,
    offset: usize,
    list_height: usize,
    status: String,
    mode: Mode,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            cursor: 0,
            offset: 0,
            list_height: 1,
            status: "Ready".to_string(),
            mode: Mode::Browse,
            should_quit: false,
        }
    }
}

impl UiState {
    fn move_cursor(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let idx = (self.cursor as isize + delta).clamp(0, len as isize - 1);
        self.cursor = idx as usize;
        self.ensure_cursor_visible(len);
    }

    fn move_to(&mut self, index: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.cursor = index.min(len - 1);
        self.ensure_cursor_visible(len);
    }

    fn page_down(&mut self, len: usize) {
        if len == 0 || self.list_height == 0 {
            return;
        }
        let delta = self.list_height.min(len);
        self.move_cursor(delta as isize, len);
    }

    fn page_up(&mut self, len: usize) {
        if len == 0 || self.list_height == 0 {
            return;
        }
        let delta = self.list_height.min(len);
        self.move_cursor(-(delta as isize), len);
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn clamp_cursor(&mut self, len: usize) {
        if len == 0 {
            self.cursor = 0;
            self.offset = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    fn ensure_cursor_visible(&mut self, len: usize) {
        if len == 0 || self.list_height == 0 {
            self.offset = 0;
            return;
        }
        let height = self.list_height;
        let max_offset = len.saturating_sub(height);

        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }

        if self.offset > max_offset {
            self.offset = max_offset;
        }
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps2cat_core::{catalog::GameLibrary, config::FirebaseConfig, remote::RetryPolicy};

    fn offline_app() -> CatalogApp {
        let config = FirebaseConfig {
            firestore_url: "http://127.0.0.1:9".to_string(),
            ..FirebaseConfig::default()
        };
        let browser = Browser::new(GameLibrary::new(Vec::new()), 40, Duration::from_millis(200));
        let sync = RemoteSync::new(
            Arc::new(FirestoreStore::new(config.clone())),
            RetryPolicy::from_millis(&[]),
        );
        CatalogApp::new(
            browser,
            sync,
            Authenticator::new(config, "admin@example.com"),
            CredentialStore::new("credentials.json"),
            PathBuf::from("."),
        )
    }

    #[tokio::test]
    async fn closing_add_form_refetches() {
        let mut app = offline_app();
        let overlay = app.handle_add_game_key(
            AddGamePrompt::default(),
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
        );
        assert!(overlay.is_none());
        assert!(app.sync_in_flight);
    }

    #[test]
    fn cursor_scrolls_within_window() {
        let mut state = UiState {
            list_height: 5,
            ..UiState::default()
        };
        state.move_cursor(7, 20);
        assert_eq!(state.cursor, 7);
        assert_eq!(state.offset, 3);
        state.move_to(0, 20);
        assert_eq!(state.offset, 0);
        state.page_down(20);
        assert_eq!(state.cursor, 5);
        state.move_cursor(100, 20);
        assert_eq!(state.cursor, 19);
        assert_eq!(state.offset, 15);
    }

    #[test]
    fn shrinking_list_clamps_cursor() {
        let mut state = UiState {
            list_height: 5,
            cursor: 12,
            offset: 8,
            ..UiState::default()
        };
        state.clamp_cursor(4);
        state.ensure_cursor_visible(4);
        assert_eq!(state.cursor, 3);
        assert_eq!(state.offset, 0);
        state.clamp_cursor(0);
        assert_eq!((state.cursor, state.offset), (0, 0));
    }

    #[test]
    fn form_focus_wraps() {
        let mut prompt = AddGamePrompt::default();
        prompt.move_focus(-1);
        assert_eq!(prompt.field(), FormField::CoverUrl);
        prompt.move_focus(1);
        assert_eq!(prompt.field(), FormField::Name);
    }

    #[test]
    fn login_edits_focused_field() {
        let mut prompt = LoginPrompt::default();
        prompt.field_mut().push_str("admin@example.com");
        prompt.toggle_focus();
        prompt.field_mut().push_str("secret");
        assert_eq!(prompt.email, "admin@example.com");
        assert_eq!(prompt.password, "secret");
    }
}
