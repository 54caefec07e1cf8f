/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::core::api_keys::validate_name;
use crate::core::models::{ApiKey, LoginResponse, Message, Sim};
use crate::core::session::validate_credentials;
use crate::core::sims::{Purchase, PurchaseError, SimEntry};
use crate::core::sms::{normalize_recipient, validate_content};
use crate::core::wallet::{validate_top_up, WalletSnapshot};
use crate::core::{
    ApiKeyManager, ClientError, Overview, PollHandle, Session, SimManager, SmsCenter, WalletManager,
};
use crate::screens::{self, Dashboard};
use crate::utils::constants::{API_KEY_NAME_MAX_LEN, MARKETPLACE, SMS_MAX_LEN, TOP_UP_PRESETS};
use crate::utils::{format_money, AppConfig};

pub const PAYMENT_METHODS: &[&str] = &["Credit card", "PayPal", "Bank transfer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Dashboard,
    Sms,
    Sims,
    Wallet,
    ApiKeys,
    Analytics,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Sms => "SMS Center",
            Screen::Sims => "SIM Manager",
            Screen::Wallet => "Wallet",
            Screen::ApiKeys => "API Keys",
            Screen::Analytics => "Analytics",
        }
    }

    pub fn all() -> &'static [Screen] {
        &[
            Screen::Dashboard,
            Screen::Sms,
            Screen::Sims,
            Screen::Wallet,
            Screen::ApiKeys,
            Screen::Analytics,
        ]
    }

    fn index(&self) -> usize {
        Screen::all().iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Screen {
        let all = Screen::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn prev(&self) -> Screen {
        let all = Screen::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    /// 0 = username, 1 = password
    pub field: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    Sender,
    Recipient,
    Content,
}

#[derive(Debug, Clone)]
pub struct ComposeForm {
    /// Active SIMs with quota left, captured when the dialog opened
    pub senders: Vec<Sim>,
    pub sender: usize,
    pub recipient: String,
    pub content: String,
    pub field: ComposeField,
}

impl ComposeForm {
    fn new(senders: Vec<Sim>) -> Self {
        Self {
            senders,
            sender: 0,
            recipient: String::new(),
            content: String::new(),
            field: ComposeField::Recipient,
        }
    }

    /// Sender id, normalized recipient and content, or the first problem found
    fn prepare(&self) -> Result<(i64, String, String), ClientError> {
        let sender = self
            .senders
            .get(self.sender)
            .ok_or_else(|| ClientError::validation("No active SIM with remaining quota"))?;
        let recipient = normalize_recipient(&self.recipient)?;
        validate_content(&self.content)?;
        Ok((sender.id, recipient, self.content.clone()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopUpForm {
    pub preset: usize,
    /// Typed amount; overrides the preset when not empty
    pub custom: String,
    /// Display only, the backend takes no payment method
    pub method: usize,
}

impl TopUpForm {
    pub fn amount(&self) -> Result<Decimal, ClientError> {
        if self.custom.is_empty() {
            let preset = TOP_UP_PRESETS[self.preset.min(TOP_UP_PRESETS.len() - 1)];
            return Ok(Decimal::from(preset));
        }
        self.custom
            .parse::<Decimal>()
            .map_err(|_| ClientError::validation("Enter a valid amount"))
    }
}

#[derive(Debug, Clone)]
pub enum Confirm {
    DeleteSim { id: i64, number: String },
    DeleteKey { id: i64, name: String },
}

#[derive(Debug, Clone)]
pub enum Dialog {
    Compose(ComposeForm),
    TopUp(TopUpForm),
    NewKey(String),
    /// Shows the full key once, right after creation
    KeyCreated(ApiKey),
    /// Selected marketplace offer
    Marketplace(usize),
    Confirm(Confirm),
    MessageDetail(Message),
}

/// Everything the renderer needs besides fetched data
#[derive(Debug, Default)]
pub struct UiState {
    pub screen: Screen,
    pub selected: usize,
    pub status_message: Option<String>,
    pub show_help: bool,
    /// A mutation is in flight; further mutations are refused
    pub busy: bool,
    pub dialog: Option<Dialog>,
    /// Present while logged out
    pub login: Option<LoginForm>,
    pub revealed_keys: HashSet<i64>,
}

/// Results of background work, drained by the render loop
pub enum AppEvent {
    Overview(Overview),
    LiveMessages(Result<Vec<Message>, ClientError>),
    Messages(Result<Vec<Message>, ClientError>),
    MessageLoaded(Result<Message, ClientError>),
    Sims(Result<Vec<Sim>, ClientError>),
    Wallet(Result<WalletSnapshot, ClientError>),
    ApiKeys(Result<Vec<ApiKey>, ClientError>),
    Balance(Result<Decimal, ClientError>),
    LoggedIn(Result<LoginResponse, ClientError>),
    SmsSent(Result<Vec<Message>, ClientError>),
    ToppedUp(Result<Decimal, ClientError>),
    SimUpdated(Result<Sim, ClientError>),
    SimDeleted(i64, Result<(), ClientError>),
    SimPurchased(Uuid, Result<Purchase, PurchaseError>),
    KeyCreated(Result<ApiKey, ClientError>),
    KeyDeleted(i64, Result<(), ClientError>),
}

/// An event tagged with the login epoch its request was started in
type Stamped = (u64, AppEvent);

pub struct App {
    should_quit: bool,
    api_url: String,
    session: Session,
    sms: SmsCenter,
    sims: SimManager,
    wallet: WalletManager,
    keys: ApiKeyManager,
    dashboard: Dashboard,
    ui: UiState,
    list_refresh: Duration,
    live_refresh: Duration,
    pollers: Vec<PollHandle>,
    /// Bumped whenever the login screen is shown
    epoch: u64,
    event_tx: UnboundedSender<Stamped>,
    event_rx: UnboundedReceiver<Stamped>,
}

impl App {
    pub fn new(config: &AppConfig, api_url: &str, session: Session) -> Result<Self> {
        let api = session.api();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let ui = UiState {
            login: if session.is_authenticated() {
                None
            } else {
                Some(LoginForm::default())
            },
            ..Default::default()
        };

        Ok(Self {
            should_quit: false,
            api_url: api_url.to_string(),
            sms: SmsCenter::new(Arc::clone(&api)),
            sims: SimManager::new(Arc::clone(&api)),
            wallet: WalletManager::new(Arc::clone(&api)),
            keys: ApiKeyManager::new(api),
            session,
            dashboard: Dashboard::new(),
            ui,
            list_refresh: config.list_refresh()?,
            live_refresh: config.live_refresh()?,
            pollers: Vec::new(),
            epoch: 0,
            event_tx,
            event_rx,
        })
    }

    fn set_status(&mut self, message: String) {
        self.ui.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.ui.status_message = None;
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        self.start_pollers();

        let result = self.run_loop(&mut terminal).await;

        for poller in self.pollers.drain(..) {
            poller.shutdown().await;
        }

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            // Apply whatever background tasks finished since the last frame
            while let Ok((epoch, app_event)) = self.event_rx.try_recv() {
                self.deliver(epoch, app_event);
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        self.handle_key(key_event);
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        match &self.ui.login {
            Some(form) => screens::login::render(
                frame,
                form,
                &self.api_url,
                self.ui.status_message.as_deref(),
                self.ui.busy,
            ),
            None => self
                .dashboard
                .render(frame, &self.ui, self.session.user(), self.session.balance()),
        }
    }

    // ------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------

    fn poll<F, Fut>(&mut self, interval: Duration, mut fetch: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let epoch = self.epoch;
        let handle = PollHandle::spawn(interval, self.event_tx.clone(), move || {
            let request = fetch();
            async move { (epoch, request.await) }
        });
        self.pollers.push(handle);
    }

    fn stop_pollers(&mut self) {
        for poller in self.pollers.drain(..) {
            poller.cancel();
        }
    }

    /// Replace the running pollers with the ones the current view needs
    fn start_pollers(&mut self) {
        self.stop_pollers();
        if !self.session.is_authenticated() {
            return;
        }

        let every = self.list_refresh;
        match self.ui.screen {
            Screen::Dashboard => {
                let api = self.session.api();
                self.poll(every, move || {
                    let api = Arc::clone(&api);
                    async move { AppEvent::Overview(Overview::fetch(api).await) }
                });
                let sms = self.sms.clone();
                self.poll(self.live_refresh, move || {
                    let sms = sms.clone();
                    async move { AppEvent::LiveMessages(sms.list().await) }
                });
            }
            Screen::Sms | Screen::Analytics => {
                let sms = self.sms.clone();
                self.poll(every, move || {
                    let sms = sms.clone();
                    async move { AppEvent::Messages(sms.list().await) }
                });
                if self.ui.screen == Screen::Sms {
                    self.poll_sims(every);
                }
            }
            Screen::Sims => {
                self.poll_sims(every);
                let wallet = self.wallet.clone();
                self.poll(every, move || {
                    let wallet = wallet.clone();
                    async move { AppEvent::Balance(wallet.balance().await) }
                });
            }
            Screen::Wallet => {
                let wallet = self.wallet.clone();
                self.poll(every, move || {
                    let wallet = wallet.clone();
                    async move { AppEvent::Wallet(wallet.snapshot().await) }
                });
            }
            Screen::ApiKeys => {
                let keys = self.keys.clone();
                self.poll(every, move || {
                    let keys = keys.clone();
                    async move { AppEvent::ApiKeys(keys.list().await) }
                });
            }
        }
        tracing::debug!(screen = self.ui.screen.title(), pollers = self.pollers.len(), "started pollers");
    }

    fn poll_sims(&mut self, every: Duration) {
        let sims = self.sims.clone();
        self.poll(every, move || {
            let sims = sims.clone();
            async move { AppEvent::Sims(sims.list().await) }
        });
    }

    fn spawn_task<Fut>(&self, task: Fut)
    where
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let _ = tx.send((epoch, task.await));
        });
    }

    /// Claim the in-flight slot for a mutation
    fn begin(&mut self, label: &str) -> bool {
        if self.ui.busy {
            self.set_status("⏳ Another operation is still running".to_string());
            return false;
        }
        self.ui.busy = true;
        self.set_status(format!("⏳ {}...", label));
        true
    }

    fn refresh_balance(&self) {
        let wallet = self.wallet.clone();
        self.spawn_task(async move { AppEvent::Balance(wallet.balance().await) });
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    fn show_login(&mut self, status: Option<String>) {
        self.stop_pollers();
        self.epoch = self.epoch.wrapping_add(1);
        self.dashboard = Dashboard::new();
        self.ui = UiState {
            login: Some(LoginForm::default()),
            status_message: status,
            ..Default::default()
        };
    }

    fn logout(&mut self) {
        self.session.logout();
        self.show_login(Some("Logged out".to_string()));
    }

    fn expire_session(&mut self) {
        self.session.expire();
        self.show_login(Some("Session expired, please log in again".to_string()));
    }

    /// Surface a failed call; a rejected token ends the session
    fn report(&mut self, error: &ClientError, action: &str) {
        if error.is_unauthorized() {
            self.expire_session();
            return;
        }
        tracing::warn!("failed to {}: {}", action, error);
        self.set_status(format!("✗ {}", error.user_message(action)));
    }

    fn submit_login(&mut self) {
        let Some(form) = &self.ui.login else {
            return;
        };
        let (username, password) = (form.username.trim().to_string(), form.password.clone());

        if let Err(e) = validate_credentials(&username, &password) {
            self.set_status(format!("✗ {}", e));
            return;
        }
        if !self.begin("Signing in") {
            return;
        }

        let api = self.session.api();
        self.spawn_task(async move { AppEvent::LoggedIn(api.login(&username, &password).await) });
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Apply a background result unless it belongs to an earlier login
    fn deliver(&mut self, epoch: u64, app_event: AppEvent) {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "dropping result from an earlier session");
            return;
        }
        self.handle_event(app_event);
    }

    fn handle_event(&mut self, app_event: AppEvent) {
        match app_event {
            AppEvent::LoggedIn(result) => {
                self.ui.busy = false;
                match result {
                    Ok(response) => {
                        self.session.establish(response);
                        let name = self
                            .session
                            .user()
                            .map(|u| u.display_name().to_string())
                            .unwrap_or_default();
                        self.ui.login = None;
                        self.set_status(format!("✓ Logged in as {}", name));
                        self.refresh_balance();
                        self.switch_screen(Screen::Dashboard);
                    }
                    Err(ClientError::Unauthorized) => {
                        self.set_status("✗ Invalid username or password".to_string());
                    }
                    Err(e) => {
                        tracing::warn!("login failed: {}", e);
                        self.set_status(format!("✗ {}", e.user_message("log in")));
                    }
                }
            }
            // results of requests started before a logout
            _ if !self.session.is_authenticated() => {}
            AppEvent::Overview(overview) => {
                if overview.unauthorized {
                    self.expire_session();
                    return;
                }
                if let Some(balance) = overview.balance {
                    self.session.set_balance(balance);
                }
                if !overview.failed.is_empty() {
                    let parts: Vec<String> = overview.failed.iter().map(|p| p.to_string()).collect();
                    self.set_status(format!("⚠ Could not load {}", parts.join(", ")));
                }
                self.dashboard.update_overview(&overview);
            }
            AppEvent::LiveMessages(Ok(messages)) => self.dashboard.record_live(messages),
            AppEvent::Messages(Ok(messages)) => self.dashboard.update_messages(messages),
            AppEvent::LiveMessages(Err(e)) | AppEvent::Messages(Err(e)) => self.report(&e, "fetch messages"),
            AppEvent::MessageLoaded(Ok(message)) => {
                if let Some(Dialog::MessageDetail(shown)) = &mut self.ui.dialog {
                    if shown.id == message.id {
                        *shown = message;
                    }
                }
            }
            AppEvent::MessageLoaded(Err(e)) => self.report(&e, "fetch message"),
            AppEvent::Sims(Ok(sims)) => self.dashboard.update_sims(sims),
            AppEvent::Sims(Err(e)) => self.report(&e, "fetch SIMs"),
            AppEvent::Wallet(Ok(snapshot)) => {
                self.session.set_balance(snapshot.balance());
                self.dashboard.update_wallet(snapshot);
            }
            AppEvent::Wallet(Err(e)) => self.report(&e, "fetch wallet"),
            AppEvent::ApiKeys(Ok(keys)) => self.dashboard.update_api_keys(keys),
            AppEvent::ApiKeys(Err(e)) => self.report(&e, "fetch API keys"),
            AppEvent::Balance(Ok(balance)) => self.session.set_balance(balance),
            AppEvent::Balance(Err(e)) => self.report(&e, "fetch wallet balance"),
            AppEvent::SmsSent(result) => {
                self.ui.busy = false;
                match result {
                    Ok(sent) => {
                        self.set_status(format!("✓ Sent {} message(s)", sent.len()));
                        self.dashboard.add_messages(sent);
                        self.refresh_balance();
                    }
                    Err(e) => self.report(&e, "send message"),
                }
            }
            AppEvent::ToppedUp(result) => {
                self.ui.busy = false;
                match result {
                    Ok(balance) => {
                        self.session.set_balance(balance);
                        self.set_status(format!("✓ Wallet topped up, balance {}", format_money(balance)));
                        self.start_pollers();
                    }
                    Err(e) => self.report(&e, "top up wallet"),
                }
            }
            AppEvent::SimUpdated(result) => {
                self.ui.busy = false;
                match result {
                    Ok(sim) => {
                        self.set_status(format!("✓ SIM {} is now {}", sim.phone_number, sim.status));
                        self.dashboard.apply_sim(sim);
                    }
                    Err(e) => self.report(&e, "update SIM"),
                }
            }
            AppEvent::SimDeleted(id, result) => {
                self.ui.busy = false;
                match result {
                    Ok(()) => {
                        self.dashboard.remove_sim(id);
                        self.set_status("✓ SIM deleted".to_string());
                    }
                    Err(e) => self.report(&e, "delete SIM"),
                }
            }
            AppEvent::SimPurchased(local_ref, result) => {
                self.ui.busy = false;
                match result {
                    Ok(purchase) => {
                        if let Some(balance) = purchase.balance {
                            self.session.set_balance(balance);
                        }
                        self.set_status(format!("✓ Purchased SIM {}", purchase.sim.phone_number));
                        self.dashboard.confirm_sim(local_ref, purchase.sim);
                    }
                    Err(e) => {
                        self.dashboard.discard_sim(local_ref);
                        if e.is_unauthorized() {
                            self.expire_session();
                            return;
                        }
                        tracing::warn!("SIM purchase failed: {}", e);
                        self.set_status(format!("✗ {}", e.user_message()));
                        self.refresh_balance();
                    }
                }
            }
            AppEvent::KeyCreated(result) => {
                self.ui.busy = false;
                match result {
                    Ok(key) => {
                        self.dashboard.add_api_key(key.clone());
                        self.set_status(format!("✓ Created API key '{}'", key.name));
                        self.ui.dialog = Some(Dialog::KeyCreated(key));
                    }
                    Err(e) => self.report(&e, "create API key"),
                }
            }
            AppEvent::KeyDeleted(id, result) => {
                self.ui.busy = false;
                match result {
                    Ok(()) => {
                        self.dashboard.remove_api_key(id);
                        self.ui.revealed_keys.remove(&id);
                        self.set_status("✓ API key deleted".to_string());
                    }
                    Err(e) => self.report(&e, "delete API key"),
                }
            }
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let count = self.dashboard.item_count(self.ui.screen);
        if self.ui.selected >= count {
            self.ui.selected = count.saturating_sub(1);
        }
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    fn handle_key(&mut self, key_event: KeyEvent) {
        let key = key_event.code;

        if key_event.modifiers.contains(KeyModifiers::CONTROL) && key == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.ui.login.is_some() {
            return self.handle_login_key(key);
        }

        if self.ui.dialog.is_some() {
            return self.handle_dialog_key(key);
        }

        // Clear status message on any key outside dialogs
        self.clear_status();

        match key {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                if self.ui.show_help {
                    self.ui.show_help = false;
                } else {
                    self.should_quit = true;
                }
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.ui.show_help = !self.ui.show_help;
            }
            KeyCode::Char('r') => {
                self.set_status("Refreshing...".to_string());
                self.start_pollers();
            }
            KeyCode::Char('L') => self.logout(),
            KeyCode::Right => self.switch_screen(self.ui.screen.next()),
            KeyCode::Left => self.switch_screen(self.ui.screen.prev()),
            KeyCode::Char(c @ '1'..='6') => {
                let index = c as usize - '1' as usize;
                self.switch_screen(Screen::all()[index]);
            }
            KeyCode::Up => {
                self.ui.selected = self.ui.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.ui.selected + 1 < self.dashboard.item_count(self.ui.screen) {
                    self.ui.selected += 1;
                }
            }
            _ => self.handle_screen_key(key),
        }
    }

    fn switch_screen(&mut self, screen: Screen) {
        self.ui.screen = screen;
        self.ui.selected = 0;
        self.ui.show_help = false;
        self.start_pollers();
    }

    fn handle_screen_key(&mut self, key: KeyCode) {
        match (self.ui.screen, key) {
            (Screen::Sms, KeyCode::Char('n')) => {
                let senders = self.dashboard.senders();
                if senders.is_empty() {
                    self.set_status("✗ No active SIM with remaining quota".to_string());
                } else {
                    self.ui.dialog = Some(Dialog::Compose(ComposeForm::new(senders)));
                }
            }
            (Screen::Sms, KeyCode::Enter) => {
                if let Some(message) = self.dashboard.messages().get(self.ui.selected).cloned() {
                    let sms = self.sms.clone();
                    let id = message.id;
                    self.ui.dialog = Some(Dialog::MessageDetail(message));
                    self.spawn_task(async move { AppEvent::MessageLoaded(sms.get(id).await) });
                }
            }
            (Screen::Sims, KeyCode::Char('t')) | (Screen::Sims, KeyCode::Char(' ')) => self.toggle_selected_sim(),
            (Screen::Sims, KeyCode::Char('m')) => {
                self.ui.dialog = Some(Dialog::Marketplace(0));
            }
            (Screen::Sims, KeyCode::Char('d')) => match self.dashboard.sims().entries().get(self.ui.selected) {
                Some(SimEntry::Confirmed(sim)) => {
                    self.ui.dialog = Some(Dialog::Confirm(Confirm::DeleteSim {
                        id: sim.id,
                        number: sim.phone_number.clone(),
                    }));
                }
                Some(SimEntry::Pending { .. }) => {
                    self.set_status("SIM is still being provisioned".to_string());
                }
                None => {}
            },
            (Screen::Wallet, KeyCode::Char('t')) => {
                self.ui.dialog = Some(Dialog::TopUp(TopUpForm::default()));
            }
            (Screen::ApiKeys, KeyCode::Char('n')) => {
                self.ui.dialog = Some(Dialog::NewKey(String::new()));
            }
            (Screen::ApiKeys, KeyCode::Char('v')) => {
                if let Some(key) = self.dashboard.api_keys().get(self.ui.selected) {
                    let id = key.id;
                    if !self.ui.revealed_keys.insert(id) {
                        self.ui.revealed_keys.remove(&id);
                    }
                }
            }
            (Screen::ApiKeys, KeyCode::Char('d')) => {
                if let Some(key) = self.dashboard.api_keys().get(self.ui.selected) {
                    self.ui.dialog = Some(Dialog::Confirm(Confirm::DeleteKey {
                        id: key.id,
                        name: key.name.clone(),
                    }));
                }
            }
            (Screen::Analytics, KeyCode::Char('w')) => {
                let window = self.dashboard.cycle_window();
                self.set_status(format!("Showing the last {}", window));
            }
            _ => {}
        }
    }

    fn toggle_selected_sim(&mut self) {
        let sim = match self.dashboard.sims().entries().get(self.ui.selected) {
            Some(SimEntry::Confirmed(sim)) => sim.clone(),
            Some(SimEntry::Pending { .. }) => {
                self.set_status("SIM is still being provisioned".to_string());
                return;
            }
            None => return,
        };
        if !self.begin("Updating SIM") {
            return;
        }

        let sims = self.sims.clone();
        self.spawn_task(async move { AppEvent::SimUpdated(sims.toggle(&sim).await) });
    }

    fn handle_login_key(&mut self, key: KeyCode) {
        let busy = self.ui.busy;
        let Some(form) = self.ui.login.as_mut() else {
            return;
        };

        match key {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => form.field = 1 - form.field.min(1),
            KeyCode::Backspace => {
                if form.field == 0 {
                    form.username.pop();
                } else {
                    form.password.pop();
                }
            }
            KeyCode::Char(c) => {
                if form.field == 0 {
                    form.username.push(c);
                } else {
                    form.password.push(c);
                }
            }
            KeyCode::Enter if !busy => {
                if form.field == 0 {
                    form.field = 1;
                } else {
                    self.submit_login();
                }
            }
            _ => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyCode) {
        if key == KeyCode::Esc {
            self.ui.dialog = None;
            return;
        }

        let Some(dialog) = self.ui.dialog.as_mut() else {
            return;
        };

        match dialog {
            Dialog::Compose(form) => match key {
                KeyCode::Tab => {
                    form.field = match form.field {
                        ComposeField::Sender => ComposeField::Recipient,
                        ComposeField::Recipient => ComposeField::Content,
                        ComposeField::Content => ComposeField::Sender,
                    };
                }
                KeyCode::Up if form.field == ComposeField::Sender => {
                    form.sender = form.sender.saturating_sub(1);
                }
                KeyCode::Down if form.field == ComposeField::Sender => {
                    if form.sender + 1 < form.senders.len() {
                        form.sender += 1;
                    }
                }
                KeyCode::Char(c) => match form.field {
                    ComposeField::Recipient if c.is_ascii_digit() || matches!(c, '+' | ' ' | '-') => {
                        form.recipient.push(c);
                    }
                    ComposeField::Content if form.content.chars().count() < SMS_MAX_LEN => {
                        form.content.push(c);
                    }
                    _ => {}
                },
                KeyCode::Backspace => match form.field {
                    ComposeField::Recipient => {
                        form.recipient.pop();
                    }
                    ComposeField::Content => {
                        form.content.pop();
                    }
                    ComposeField::Sender => {}
                },
                KeyCode::Enter => self.submit_compose(),
                _ => {}
            },
            Dialog::TopUp(form) => match key {
                KeyCode::Left => form.preset = form.preset.saturating_sub(1),
                KeyCode::Right => form.preset = (form.preset + 1).min(TOP_UP_PRESETS.len() - 1),
                KeyCode::Tab => form.method = (form.method + 1) % PAYMENT_METHODS.len(),
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => form.custom.push(c),
                KeyCode::Backspace => {
                    form.custom.pop();
                }
                KeyCode::Enter => self.submit_top_up(),
                _ => {}
            },
            Dialog::NewKey(name) => match key {
                KeyCode::Char(c) if name.chars().count() < API_KEY_NAME_MAX_LEN => name.push(c),
                KeyCode::Backspace => {
                    name.pop();
                }
                KeyCode::Enter => self.submit_new_key(),
                _ => {}
            },
            Dialog::KeyCreated(_) | Dialog::MessageDetail(_) => {
                if key == KeyCode::Enter {
                    self.ui.dialog = None;
                }
            }
            Dialog::Marketplace(selected) => match key {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => *selected = (*selected + 1).min(MARKETPLACE.len() - 1),
                KeyCode::Enter => {
                    let index = *selected;
                    self.buy_offer(index);
                }
                _ => {}
            },
            Dialog::Confirm(_) => match key {
                KeyCode::Char('y') | KeyCode::Enter => self.submit_confirm(),
                KeyCode::Char('n') => self.ui.dialog = None,
                _ => {}
            },
        }
    }

    fn submit_compose(&mut self) {
        let prepared = match &self.ui.dialog {
            Some(Dialog::Compose(form)) => form.prepare(),
            _ => return,
        };

        let (sim_id, recipient, content) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.set_status(format!("✗ {}", e.user_message("send message")));
                return;
            }
        };
        if !self.begin("Sending message") {
            return;
        }
        self.ui.dialog = None;

        let sms = self.sms.clone();
        self.spawn_task(async move { AppEvent::SmsSent(sms.send(sim_id, &recipient, &content).await) });
    }

    fn submit_top_up(&mut self) {
        let amount = match &self.ui.dialog {
            Some(Dialog::TopUp(form)) => form.amount().and_then(|a| validate_top_up(a).map(|_| a)),
            _ => return,
        };

        let amount = match amount {
            Ok(amount) => amount,
            Err(e) => {
                self.set_status(format!("✗ {}", e.user_message("top up wallet")));
                return;
            }
        };
        if !self.begin("Topping up") {
            return;
        }
        self.ui.dialog = None;

        let wallet = self.wallet.clone();
        self.spawn_task(async move { AppEvent::ToppedUp(wallet.top_up(amount).await) });
    }

    fn submit_new_key(&mut self) {
        let name = match &self.ui.dialog {
            Some(Dialog::NewKey(name)) => name.clone(),
            _ => return,
        };

        // keep the dialog open so the name can be fixed
        if let Err(e) = validate_name(&name) {
            self.set_status(format!("✗ {}", e));
            return;
        }
        if !self.begin("Creating API key") {
            return;
        }
        self.ui.dialog = None;

        let keys = self.keys.clone();
        self.spawn_task(async move { AppEvent::KeyCreated(keys.create(&name).await) });
    }

    fn buy_offer(&mut self, index: usize) {
        let Some(offer) = MARKETPLACE.get(index) else {
            return;
        };
        let Some(balance) = self.session.balance() else {
            self.set_status("✗ Wallet balance unknown, press r to refresh".to_string());
            return;
        };
        if !self.begin(&format!("Purchasing {} SIM", offer.country)) {
            return;
        }
        self.ui.dialog = None;

        let local_ref = self.dashboard.add_pending_sim(offer);
        let sims = self.sims.clone();
        self.spawn_task(async move { AppEvent::SimPurchased(local_ref, sims.purchase(offer, balance).await) });
    }

    fn submit_confirm(&mut self) {
        let Some(Dialog::Confirm(confirm)) = self.ui.dialog.take() else {
            return;
        };

        match confirm {
            Confirm::DeleteSim { id, .. } => {
                if !self.begin("Deleting SIM") {
                    return;
                }
                let sims = self.sims.clone();
                self.spawn_task(async move { AppEvent::SimDeleted(id, sims.delete(id).await) });
            }
            Confirm::DeleteKey { id, .. } => {
                if !self.begin("Deleting API key") {
                    return;
                }
                let keys = self.keys.clone();
                self.spawn_task(async move { AppEvent::KeyDeleted(id, keys.delete(id).await) });
            }
        }
    }
}
