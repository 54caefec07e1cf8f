use anyhow::{Context, Result};
use chrono::{FixedOffset, Local, Utc};
use clap::Parser;
use colored::{ColoredString, Colorize};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use smsgw_cli::app::App;
use smsgw_cli::cli::{Cli, Commands, ConfigCommands, KeyCommands, SimCommands, SmsCommands, WalletCommands};
use smsgw_cli::core::api_keys::display_key;
use smsgw_cli::core::session::env_token;
use smsgw_cli::core::models::{Direction, Message, MessageStatus, RegisterRequest, Sim, TransactionKind};
use smsgw_cli::core::sims::SimStats;
use smsgw_cli::core::sms::{watch_feed, SmsStats};
use smsgw_cli::core::{
    AnalyticsReport, ApiKeyManager, ClientError, GatewayApi, GatewayClient, PollHandle, PrefixTable, Session,
    SimManager, SmsCenter, TimeWindow, TokenStore, WalletManager,
};
use smsgw_cli::utils::app_config::AppConfig;
use smsgw_cli::utils::constants::{find_offer, MARKETPLACE};
use smsgw_cli::utils::{format_money, format_percent, format_timestamp, logging, truncate_string};
use smsgw_cli::widgets::bar_chart::share_bar;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let api_url = cli.api_url.clone().unwrap_or_else(|| config.resolved_api_url());

    let Some(command) = cli.command else {
        // No command - run interactive TUI
        logging::init_file(&AppConfig::log_path()?)?;

        let mut session = build_session(&api_url, &config)?;
        if let Err(e) = session.restore().await {
            tracing::warn!("could not restore session: {}", e);
        }

        let mut app = App::new(&config, &api_url, session)?;
        return app.run().await;
    };

    logging::init_stderr();
    let result = dispatch(command, &api_url, config).await;

    if let Err(e) = &result {
        if matches!(e.downcast_ref::<ClientError>(), Some(ClientError::Unauthorized)) {
            // a rejected SMSGW_TOKEN says nothing about the stored token
            if env_token().is_none() {
                if let Ok(store) = TokenStore::default_location() {
                    let _ = store.clear();
                }
            }
            eprintln!("{} Session expired, run `smsgw login`", "✗".red());
            std::process::exit(1);
        }
    }

    result
}

async fn dispatch(command: Commands, api_url: &str, config: AppConfig) -> Result<()> {
    match command {
        Commands::Login { username, password } => {
            let session = build_session(api_url, &config)?;
            handle_login(session, username, password).await?;
        }
        Commands::Logout => {
            let mut session = build_session(api_url, &config)?;
            session.logout();
            println!("{} Signed out", "✓".green());
        }
        Commands::Register {
            email,
            username,
            name,
            password,
        } => {
            let session = build_session(api_url, &config)?;
            handle_register(session, email, username, name, password).await?;
        }
        Commands::Whoami => {
            let session = require_session(api_url, &config).await?;
            handle_whoami(&session);
        }
        Commands::Sms { command } => {
            let session = require_session(api_url, &config).await?;
            handle_sms(&session, command).await?;
        }
        Commands::Watch { interval, filter } => {
            let session = require_session(api_url, &config).await?;
            let interval: Duration = match interval {
                Some(interval) => interval.into(),
                None => config.live_refresh()?,
            };
            handle_watch(&session, interval, filter).await?;
        }
        Commands::Sims { command } => {
            let session = require_session(api_url, &config).await?;
            handle_sims(&session, command).await?;
        }
        Commands::Wallet { command } => {
            let session = require_session(api_url, &config).await?;
            handle_wallet(&session, command).await?;
        }
        Commands::Keys { command } => {
            let session = require_session(api_url, &config).await?;
            handle_keys(&session, command).await?;
        }
        Commands::Analytics { window, json } => {
            let session = require_session(api_url, &config).await?;
            handle_analytics(&session, window, json).await?;
        }
        Commands::Config { command } => {
            handle_config(config, api_url, command)?;
        }
    }

    Ok(())
}

fn build_session(api_url: &str, config: &AppConfig) -> Result<Session> {
    let client = GatewayClient::new(api_url, config.request_timeout())
        .with_context(|| format!("Invalid API URL {}", api_url))?;
    let api: Arc<dyn GatewayApi> = Arc::new(client);
    Ok(Session::new(api, Some(TokenStore::default_location()?)))
}

/// Session for commands that need a signed-in user
async fn require_session(api_url: &str, config: &AppConfig) -> Result<Session> {
    let mut session = build_session(api_url, config)?;
    let spinner = spinner("Connecting...");
    let restored = session.restore().await;
    spinner.finish_and_clear();

    if !restored.with_context(|| format!("Could not reach the gateway at {}", api_url))? {
        anyhow::bail!("Not logged in, run `smsgw login`");
    }
    Ok(session)
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("Failed to read input")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

/// Colored labels are padded up front; escape codes defeat `{:<N}`
fn status_colored(status: MessageStatus, width: usize) -> ColoredString {
    let label = format!("{:<width$}", status.to_string(), width = width);
    match status {
        MessageStatus::Delivered => label.green(),
        MessageStatus::Sent => label.cyan(),
        MessageStatus::Pending => label.yellow(),
        MessageStatus::Failed => label.red(),
        MessageStatus::Received => label.blue(),
    }
}

fn active_colored(sim: &Sim, width: usize) -> ColoredString {
    if sim.is_active {
        format!("{:<width$}", "active", width = width).green()
    } else {
        format!("{:<width$}", "inactive", width = width).dimmed()
    }
}

async fn handle_login(mut session: Session, username: String, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password: ")?,
    };

    let spinner = spinner("Signing in...");
    let result = session.login(&username, &password).await;
    spinner.finish_and_clear();

    match result {
        Ok(user) => {
            println!("{} Signed in as {}", "✓".green(), user.display_name().bold());
        }
        Err(ClientError::Unauthorized) => anyhow::bail!("Invalid username or password"),
        Err(e) => return Err(e.into()),
    }

    if let Some(balance) = session.balance() {
        println!("Balance: {}", format_money(balance));
    }
    Ok(())
}

async fn handle_register(
    mut session: Session,
    email: String,
    username: String,
    name: String,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt("Password (8+ characters): ")?,
    };
    let request = RegisterRequest {
        email,
        username,
        name,
        password,
    };

    let spinner = spinner("Creating account...");
    let result = session.register(&request).await;
    spinner.finish_and_clear();

    let user = result?;
    println!("{} Account created, signed in as {}", "✓".green(), user.display_name().bold());
    Ok(())
}

fn handle_whoami(session: &Session) {
    let Some(user) = session.user() else {
        return;
    };

    println!("{:<12} {}", "User:", user.display_name().bold());
    println!("{:<12} {}", "Email:", user.email);
    if let Some(role) = &user.role {
        println!("{:<12} {}", "Role:", role);
    }
    println!(
        "{:<12} {}",
        "Balance:",
        session
            .balance()
            .map(format_money)
            .unwrap_or_else(|| "N/A".to_string())
    );
}

fn compile_filter(pattern: Option<String>) -> Result<Option<Regex>> {
    pattern
        .map(|p| Regex::new(&p).with_context(|| format!("Invalid pattern '{}'", p)))
        .transpose()
}

fn matches_filter(filter: Option<&Regex>, message: &Message) -> bool {
    filter.map_or(true, |re| {
        re.is_match(&message.content) || re.is_match(&message.sender_number) || re.is_match(&message.recipient_number)
    })
}

fn print_message_row(message: &Message) {
    let arrow = match message.direction {
        Direction::Outbound => "→".cyan(),
        Direction::Inbound => "←".blue(),
    };
    println!(
        "{:<8} {} {:<16} {} {:<17} {}",
        message.id,
        arrow,
        message.counterpart(),
        status_colored(message.status, 10),
        format_timestamp(&message.created_at),
        truncate_string(&message.content, 40)
    );
}

async fn handle_sms(session: &Session, command: SmsCommands) -> Result<()> {
    let center = SmsCenter::new(session.api());

    match command {
        SmsCommands::List { limit, search } => {
            let filter = compile_filter(search)?;
            let messages = center.list().await?;

            let shown: Vec<&Message> = messages
                .iter()
                .filter(|m| matches_filter(filter.as_ref(), m))
                .take(limit)
                .collect();

            if shown.is_empty() {
                println!("No messages");
                return Ok(());
            }

            println!("{:<8}   {:<16} {:<10} {:<17} {}", "ID", "Number", "Status", "Created", "Content");
            println!("{}", "-".repeat(90));
            for message in &shown {
                print_message_row(message);
            }
            println!("\n{} of {} messages", shown.len(), messages.len());
        }
        SmsCommands::Send { to, message, sim } => {
            let spinner = spinner("Sending...");
            let result = center.send_auto(sim, &to, &message).await;
            spinner.finish_and_clear();

            for sent in result? {
                println!(
                    "{} Message #{} to {} is {}",
                    "✓".green(),
                    sent.id,
                    sent.recipient_number,
                    status_colored(sent.status, 0)
                );
            }
        }
        SmsCommands::Show { ids } => {
            let results = join_all(ids.iter().map(|id| center.get(*id))).await;

            for (id, result) in ids.iter().zip(results) {
                match result {
                    Ok(message) => print_message_detail(&message),
                    Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized.into()),
                    Err(e) => println!("{} Message #{}: {}\n", "✗".red(), id, e),
                }
            }
        }
        SmsCommands::Stats => {
            let messages = center.list().await?;
            let stats = SmsStats::from_messages(&messages, Utc::now(), local_offset());

            println!("SMS Today\n");
            println!("{:<20} {}", "Sent:", stats.sent_today);
            println!("{:<20} {}", "Received:", stats.received_today);
            println!("{:<20} {}", "Pending:", stats.pending.to_string().yellow());
            println!("{:<20} {}", "Delivery rate:", format_percent(stats.delivery_rate).green());
        }
    }

    Ok(())
}

fn print_message_detail(message: &Message) {
    println!("{} #{}", "Message".bold(), message.id);
    println!("  {:<10} {} ({:?})", "Status:", status_colored(message.status, 0), message.direction);
    println!("  {:<10} {}", "From:", message.sender_number);
    println!("  {:<10} {}", "To:", message.recipient_number);
    println!("  {:<10} {}", "Created:", format_timestamp(&message.created_at));
    if let Some(tx) = &message.transaction {
        println!("  {:<10} {}", "Charge:", format_money(tx.amount));
    }
    if let Some(error) = &message.error_message {
        println!("  {:<10} {}", "Error:", error.red());
    }
    println!("\n  {}\n", message.content);
}

async fn handle_watch(session: &Session, interval: Duration, filter: Option<String>) -> Result<()> {
    let filter = compile_filter(filter)?;
    let center = SmsCenter::new(session.api());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let poller = PollHandle::spawn(interval, tx, move || {
        let center = center.clone();
        async move { center.list().await }
    });

    println!(
        "Watching for new messages every {} (Ctrl+C to stop)\n",
        humantime::format_duration(interval)
    );

    let outcome = watch_feed(
        &mut rx,
        tokio::signal::ctrl_c(),
        |message| {
            if matches_filter(filter.as_ref(), message) {
                print_message_row(message);
            }
        },
        |e| eprintln!("{} {}", "⚠".yellow(), e),
    )
    .await
    .map_err(anyhow::Error::from);

    poller.shutdown().await;
    outcome
}

async fn handle_sims(session: &Session, command: SimCommands) -> Result<()> {
    let sims = SimManager::new(session.api());

    match command {
        SimCommands::List => {
            let list = sims.list().await?;
            if list.is_empty() {
                println!("No SIM cards. Browse offers with `smsgw sims market`.");
                return Ok(());
            }

            let now = Utc::now();
            println!(
                "{:<6} {:<18} {:<10} {:<10} {:<12} {:<8} {}",
                "ID", "Number", "Status", "State", "Usage", "Plan", "Expires"
            );
            println!("{}", "-".repeat(85));
            for sim in &list {
                println!(
                    "{:<6} {:<18} {:<10} {} {:<12} {:<8} {}d",
                    sim.id,
                    sim.phone_number,
                    sim.status,
                    active_colored(sim, 10),
                    format!("{}/{}", sim.messages_used(), sim.messages_limit()),
                    sim.data_plan.as_deref().unwrap_or("-"),
                    sim.days_until_expiry(now)
                );
            }

            let stats = SimStats::from_sims(&list, now);
            println!(
                "\n{} of {} active | {} / {} messages | {} per month",
                stats.active,
                stats.total,
                stats.messages_used,
                stats.messages_limit,
                format_money(stats.monthly_cost)
            );
        }
        SimCommands::Show { id } => {
            let sim = sims.get(id).await?;
            println!("{} #{}", "SIM".bold(), sim.id);
            println!("  {:<10} {}", "Number:", sim.phone_number);
            println!("  {:<10} {}", "ICCID:", sim.iccid);
            println!("  {:<10} {} ({})", "Status:", sim.status, active_colored(&sim, 0));
            println!("  {:<10} {}", "Plan:", sim.data_plan.as_deref().unwrap_or("-"));
            println!("  {:<10} {}/{}", "Usage:", sim.messages_used(), sim.messages_limit());
            println!(
                "  {:<10} {} ({} days)",
                "Expires:",
                format_timestamp(&sim.expiry_date),
                sim.days_until_expiry(Utc::now())
            );
        }
        SimCommands::Toggle { id } => {
            let sim = sims.get(id).await?;
            let updated = sims.toggle(&sim).await?;
            println!("{} SIM {} is now {}", "✓".green(), updated.phone_number, active_colored(&updated, 0));
        }
        SimCommands::Activate { id } => {
            let updated = sims.activate(id).await?;
            println!("{} SIM {} is now {}", "✓".green(), updated.phone_number, active_colored(&updated, 0));
        }
        SimCommands::Deactivate { id } => {
            let updated = sims.deactivate(id).await?;
            println!("{} SIM {} is now {}", "✓".green(), updated.phone_number, active_colored(&updated, 0));
        }
        SimCommands::Delete { id, yes } => {
            let sim = sims.get(id).await?;
            if !yes && !confirm(&format!("Delete SIM {}?", sim.phone_number))? {
                println!("Cancelled");
                return Ok(());
            }
            sims.delete(id).await?;
            println!("{} Deleted SIM {}", "✓".green(), sim.phone_number);
        }
        SimCommands::Market => {
            println!(
                "{:<8} {:<16} {:<12} {:<18} {:>9} {:>7} {:>6} {:>6}",
                "Offer", "Country", "Provider", "Number", "Price", "Data", "SMS", "Rating"
            );
            println!("{}", "-".repeat(90));
            for offer in MARKETPLACE {
                println!(
                    "{:<8} {:<16} {:<12} {:<18} {:>9} {:>7} {:>6} {:>6}",
                    offer.id,
                    offer.country,
                    offer.provider,
                    offer.number,
                    format_money(offer.price()),
                    offer.data_plan(),
                    offer.messages_limit,
                    offer.rating()
                );
            }
            println!("\nBuy with: smsgw sims buy <OFFER>");
        }
        SimCommands::Buy { offer } => {
            let offer = find_offer(&offer)
                .with_context(|| format!("Unknown offer '{}', see `smsgw sims market`", offer))?;
            let balance = WalletManager::new(session.api()).balance().await?;

            let spinner = spinner(&format!("Purchasing {} ({})...", offer.number, format_money(offer.price())));
            let result = sims.purchase(offer, balance).await;
            spinner.finish_and_clear();

            match result {
                Ok(purchase) => {
                    println!(
                        "{} Purchased SIM {} (#{}) for {}",
                        "✓".green(),
                        purchase.sim.phone_number,
                        purchase.sim.id,
                        format_money(purchase.debit.amount)
                    );
                    if let Some(balance) = purchase.balance {
                        println!("Balance: {}", format_money(balance));
                    }
                }
                Err(e) if e.is_unauthorized() => return Err(ClientError::Unauthorized.into()),
                Err(e) => {
                    tracing::debug!("purchase failed: {:?}", e);
                    anyhow::bail!("{}", e.user_message());
                }
            }
        }
    }

    Ok(())
}

async fn handle_wallet(session: &Session, command: WalletCommands) -> Result<()> {
    let wallet = WalletManager::new(session.api());

    match command {
        WalletCommands::Balance => {
            let balance = wallet.balance().await?;
            println!("Balance: {}", format_money(balance).green().bold());
        }
        WalletCommands::History { limit } => {
            let snapshot = wallet.snapshot().await?;
            let summary = snapshot.summary(Utc::now());

            println!("Balance: {}\n", format_money(snapshot.balance()).green().bold());
            if snapshot.transactions.is_empty() {
                println!("No transactions");
                return Ok(());
            }

            println!("{:<8} {:<17} {:<8} {:>12} {:<10} {}", "ID", "Date", "Type", "Amount", "Status", "Description");
            println!("{}", "-".repeat(90));
            for tx in snapshot.transactions.iter().take(limit) {
                let amount = match tx.kind {
                    TransactionKind::Credit => format!("{:>12}", format!("+{}", format_money(tx.amount))).green(),
                    TransactionKind::Debit => format!("{:>12}", format!("-{}", format_money(tx.amount))).red(),
                };
                println!(
                    "{:<8} {:<17} {:<8} {} {:<10} {}",
                    tx.id,
                    format_timestamp(&tx.created_at),
                    tx.kind,
                    amount,
                    tx.status,
                    truncate_string(&tx.description, 40)
                );
            }

            println!(
                "\nTop-ups: {} | Spent: {} | Last 30 days: {} | Pending: {}",
                format_money(summary.total_top_ups),
                format_money(summary.total_spent),
                format_money(summary.spent_last_30_days),
                summary.pending_count
            );
        }
        WalletCommands::TopUp { amount } => {
            let spinner = spinner(&format!("Adding {}...", format_money(amount)));
            let result = wallet.top_up(amount).await;
            spinner.finish_and_clear();

            let balance = result?;
            println!("{} Added {}", "✓".green(), format_money(amount));
            println!("Balance: {}", format_money(balance).green().bold());
        }
    }

    Ok(())
}

async fn handle_keys(session: &Session, command: KeyCommands) -> Result<()> {
    let keys = ApiKeyManager::new(session.api());

    match command {
        KeyCommands::List { reveal } => {
            let list = keys.list().await?;
            if list.is_empty() {
                println!("No API keys");
                return Ok(());
            }

            println!("{:<6} {:<25} {:<42} {:<17} {}", "ID", "Name", "Key", "Created", "Last used");
            println!("{}", "-".repeat(110));
            for key in &list {
                println!(
                    "{:<6} {:<25} {:<42} {:<17} {}",
                    key.id,
                    truncate_string(&key.name, 24),
                    display_key(key, reveal),
                    format_timestamp(&key.created_at),
                    key.last_used_at
                        .as_ref()
                        .map(format_timestamp)
                        .unwrap_or_else(|| "never".to_string())
                );
            }
        }
        KeyCommands::Create { name } => {
            let key = keys.create(&name).await?;
            println!("{} Created API key '{}' (#{})\n", "✓".green(), key.name, key.id);
            println!("  {}\n", key.key.green().bold());
            println!("{}", "Copy this key now. It is masked everywhere else.".yellow());
        }
        KeyCommands::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete API key #{}? Clients using it will stop working.", id))? {
                println!("Cancelled");
                return Ok(());
            }
            keys.delete(id).await?;
            println!("{} Deleted API key #{}", "✓".green(), id);
        }
    }

    Ok(())
}

async fn handle_analytics(session: &Session, window: TimeWindow, json: bool) -> Result<()> {
    let spinner = spinner("Loading messages...");
    let messages = SmsCenter::new(session.api()).list().await;
    spinner.finish_and_clear();

    let report = AnalyticsReport::compute(&messages?, window, Utc::now(), local_offset(), &PrefixTable::standard());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Analytics, last {}\n", report.window);
    println!("{:<16} {}", "Messages:", report.total);
    println!(
        "{:<16} {} delivered, {} pending, {} failed",
        "Status:",
        report.delivered.to_string().green(),
        report.pending.to_string().yellow(),
        report.failed.to_string().red()
    );
    println!("{:<16} {}", "Delivery rate:", format_percent(report.delivery_rate));
    println!("{:<16} {}", "Revenue:", format_money(report.revenue));
    println!("{:<16} {}", "Active users:", report.active_users);

    let busiest = report.daily.iter().map(|d| d.count).max().unwrap_or(0);
    println!("\n{}", "Daily volume".bold());
    for bucket in &report.daily {
        let share = if busiest == 0 {
            0.0
        } else {
            bucket.count as f64 * 100.0 / busiest as f64
        };
        println!(
            "  {}  {} {:>5}  {}",
            bucket.date.format("%Y-%m-%d"),
            share_bar(share, 30).cyan(),
            bucket.count,
            format_money(bucket.revenue).green()
        );
    }

    if !report.countries.is_empty() {
        println!("\n{}", "By country".bold());
        for country in &report.countries {
            println!(
                "  {:<22} {} {:>5.1}% ({})",
                country.country,
                share_bar(country.percentage, 20),
                country.percentage,
                country.messages
            );
        }
    }

    if !report.peak_hours.is_empty() {
        println!("\n{}", "Peak hours".bold());
        for peak in &report.peak_hours {
            println!("  {:<16} {:>6}  {}", peak.label, peak.messages, format_percent(peak.share));
        }
    }

    Ok(())
}

fn handle_config(mut config: AppConfig, api_url: &str, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::View => {
            println!("Configuration:\n");
            println!("{:<22} {}", "api_url:", config.api_url);
            if api_url != config.api_url {
                println!("{:<22} {}", "  (in effect)", api_url.yellow());
            }
            println!("{:<22} {}", "request_timeout_secs:", config.request_timeout_secs);
            println!("{:<22} {}", "list_refresh:", config.list_refresh);
            println!("{:<22} {}", "live_refresh:", config.live_refresh);
        }
        ConfigCommands::SetUrl { url } => {
            config.set_api_url(&url)?;
            println!("{} API URL set to {}", "✓".green(), config.api_url);
        }
        ConfigCommands::Path => {
            println!("{:<8} {}", "Config:", AppConfig::config_path()?.display());
            println!("{:<8} {}", "Token:", AppConfig::token_path()?.display());
            println!("{:<8} {}", "Log:", AppConfig::log_path()?.display());
        }
    }

    Ok(())
}
