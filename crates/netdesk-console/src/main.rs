//! netdesk back-office console
//!
//! Terminal front-end for the ISP back office: billing, customers, tickets,
//! dashboard, network monitor, bandwidth control and the WhatsApp bot.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use clap::{Args, Parser, Subcommand};
use netdesk_console::{
    ApiClient, FileSession, FilterInput, LogNavigator, LogNotifier, Namespace, Navigator,
    PageContext, SessionStore, SocketHandle,
    api_client::LOGIN_PAGE,
    chart::Chart,
    forms::{BandwidthLimitForm, BoostForm, QosForm},
    pages::{
        bandwidth::BandwidthPage, billing::BillingPage, customers::CustomersPage,
        dashboard::DashboardPage, network_monitor::NetworkMonitorPage, settings::SettingsPage,
        spawn_poller, tickets::TicketsPage, whatsapp::WhatsAppPage,
    },
    pagination::PaginatorView,
    realtime::{RealtimeListener, spawn_listener},
    render::TableView,
    socket,
    templates::{TemplateInput, validate_template_form},
    whatsapp::{ConnectionState, EVENT_STOP},
};
use netdesk_core::{Config, Error, Result, init_logging};
use parking_lot::RwLock;
use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};
use tokio::{signal, sync::broadcast::error::RecvError};
use tracing::{info, warn};

/// Command line interface for the back-office console
#[derive(Parser)]
#[command(
    name = "netdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "ISP back-office console",
    long_about = "Terminal client for the netdesk back office: billing, customers, tickets, network monitoring, bandwidth control and the WhatsApp bot."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable structured JSON logging
    #[arg(long, global = true)]
    json: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token and check it against the backend
    Login {
        /// Token issued by the backend login endpoint
        #[arg(long)]
        token: String,
    },

    /// Forget the stored token
    Logout,

    /// List invoices
    Invoices(ListArgs),

    /// List customers
    Customers(ListArgs),

    /// List support tickets
    Tickets(ListArgs),

    /// Show the dashboard cards
    Dashboard {
        /// Keep refreshing and follow live updates
        #[arg(short, long)]
        watch: bool,
    },

    /// Show the network monitor
    Monitor {
        /// Start the collector first
        #[arg(long, conflicts_with = "stop")]
        start: bool,

        /// Stop the collector
        #[arg(long)]
        stop: bool,

        /// Follow live snapshots
        #[arg(short, long)]
        watch: bool,
    },

    /// Control the WhatsApp bot
    Whatsapp {
        /// WhatsApp action
        #[command(subcommand)]
        action: WhatsAppCommands,
    },

    /// Subscriber bandwidth control
    Bandwidth {
        /// Bandwidth action
        #[command(subcommand)]
        action: BandwidthCommands,
    },

    /// Message templates
    Templates {
        /// Template action
        #[command(subcommand)]
        action: TemplateCommands,
    },
}

/// Filter and page options shared by the list commands
#[derive(Args)]
struct ListArgs {
    /// Status to show (`all` for every status)
    #[arg(long, default_value = "all")]
    status: String,

    /// Free-text search
    #[arg(long, default_value = "")]
    search: String,

    /// First date, YYYY-MM-DD
    #[arg(long)]
    from: Option<String>,

    /// Last date, YYYY-MM-DD
    #[arg(long)]
    to: Option<String>,

    /// Page to show
    #[arg(long, default_value = "1")]
    page: usize,
}

impl ListArgs {
    fn filter(&self) -> FilterInput {
        FilterInput::all()
            .with_status(&self.status)
            .with_search(&self.search)
            .with_range(self.from.as_deref(), self.to.as_deref())
    }
}

/// WhatsApp bot commands
#[derive(Subcommand)]
enum WhatsAppCommands {
    /// Request a session and show the QR code until the phone is linked
    Start,
    /// Log the bot out
    Stop,
    /// Wipe the stored session
    DeleteSession,
    /// Follow connection state and chat traffic
    Watch,
}

/// Bandwidth commands
#[derive(Subcommand)]
enum BandwidthCommands {
    /// Show usage and top consumers
    Usage,

    /// Apply a permanent limit
    Limit {
        /// PPPoE username
        username: String,
        /// Download limit, Mbps
        #[arg(long)]
        download: u32,
        /// Upload limit, Mbps
        #[arg(long)]
        upload: u32,
    },

    /// Assign a QoS profile
    Qos {
        /// PPPoE username
        username: String,
        /// Profile label
        #[arg(long)]
        profile: String,
    },

    /// Raise the limit for a few hours
    Boost {
        /// PPPoE username
        username: String,
        /// Boosted download, Mbps
        #[arg(long)]
        download: u32,
        /// Boosted upload, Mbps
        #[arg(long)]
        upload: u32,
        /// Duration, hours
        #[arg(long, default_value = "1")]
        hours: u32,
    },
}

/// Template commands
#[derive(Subcommand)]
enum TemplateCommands {
    /// List stored templates
    List,
    /// Check a template file (TOML) without saving it
    Validate {
        /// Template file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Everything a command needs
struct App {
    config: Config,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    ctx: PageContext,
}

impl App {
    fn new(config: Config) -> Result<Self> {
        let session: Arc<dyn SessionStore> = Arc::new(FileSession::open(config.session.path.clone())?);
        let navigator: Arc<dyn Navigator> = Arc::new(LogNavigator);
        let api = ApiClient::from_config(&config.api, Arc::clone(&session), Arc::clone(&navigator))?;
        let ctx = PageContext::new(api, config.display.clone(), Arc::new(LogNotifier));

        Ok(Self {
            config,
            session,
            navigator,
            ctx,
        })
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.display.poll_interval_secs.max(1))
    }

    /// Open the page connection for `page_path`
    async fn connect(&self, page_path: &str) -> Result<SocketHandle> {
        let Some(token) = self.session.token() else {
            self.navigator.redirect(LOGIN_PAGE);
            return Err(Error::AuthRequired);
        };
        let url = self.config.realtime.resolve_url(&self.config.api);
        socket::connect(url, Namespace::select(page_path), &token).await
    }
}

/// Main entry point for the console
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_auth_required() {
                eprintln!("Run `netdesk login --token <TOKEN>` first.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if cli.json {
        config.logging.format = "json".to_string();
    }
    init_logging(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api.base_url,
        "netdesk console starting"
    );

    let app = App::new(config)?;
    match cli.command {
        Commands::Login { token } => login(&app, &token).await,
        Commands::Logout => {
            app.session.clear()?;
            println!("Logged out");
            Ok(())
        }
        Commands::Invoices(args) => invoices(&app, &args).await,
        Commands::Customers(args) => customers(&app, &args).await,
        Commands::Tickets(args) => tickets(&app, &args).await,
        Commands::Dashboard { watch } => dashboard(&app, watch).await,
        Commands::Monitor { start, stop, watch } => monitor(&app, start, stop, watch).await,
        Commands::Whatsapp { action } => whatsapp(&app, action).await,
        Commands::Bandwidth { action } => bandwidth(&app, action).await,
        Commands::Templates { action } => templates(&app, action).await,
    }
}

async fn login(app: &App, token: &str) -> Result<()> {
    app.session.set_token(token)?;
    let user = app.ctx.api.profile().await?;
    app.session.set_user(&user)?;
    println!(
        "Logged in as {} ({})",
        user.full_name.as_deref().unwrap_or(&user.username),
        user.role
    );
    Ok(())
}

fn print_table(table: &TableView, paginator: Option<PaginatorView>) {
    print!("{table}");
    if let Some(view) = paginator
        && view.total_pages > 1
    {
        let buttons: Vec<String> = view
            .pages
            .iter()
            .map(|page| {
                if *page == view.current_page {
                    format!("[{page}]")
                } else {
                    page.to_string()
                }
            })
            .collect();
        println!(
            "\nPage {} of {} ({} items)  {}",
            view.current_page,
            view.total_pages,
            view.total_items,
            buttons.join(" ")
        );
    }
}

fn print_cards(cards: &[(&str, String)]) {
    let width = cards.iter().map(|(title, _)| title.len()).max().unwrap_or(0);
    for (title, value) in cards {
        println!("{title:<width$}  {value}");
    }
}

fn print_chart(chart: &Chart) {
    println!("{chart}");
}

async fn invoices(app: &App, args: &ListArgs) -> Result<()> {
    let mut page = BillingPage::new(app.ctx.clone());
    page.refresh_invoices().await?;
    page.filter_invoices(&args.filter())?;
    page.set_page(args.page);
    print_table(page.invoice_table(), page.paginator());
    Ok(())
}

async fn customers(app: &App, args: &ListArgs) -> Result<()> {
    let mut page = CustomersPage::new(app.ctx.clone());
    page.refresh().await?;
    page.filter(&args.filter())?;
    page.set_page(args.page);
    print_table(page.table(), page.paginator());
    Ok(())
}

async fn tickets(app: &App, args: &ListArgs) -> Result<()> {
    let mut page = TicketsPage::new(app.ctx.clone());
    page.refresh().await?;
    page.filter(&args.filter())?;
    page.set_page(args.page);
    print_table(page.table(), page.paginator());
    Ok(())
}

fn print_dashboard(page: &DashboardPage) {
    print_cards(&page.cards());
    println!();
    print_chart(page.health_gauge());
    print_chart(page.traffic());
    print!("{}", page.devices());
}

async fn dashboard(app: &App, watch: bool) -> Result<()> {
    let mut page = DashboardPage::new(app.ctx.clone());
    if let Err(e) = page.load().await {
        if !watch {
            return Err(e);
        }
    }
    if !watch {
        print_dashboard(&page);
        return Ok(());
    }

    let page = Arc::new(RwLock::new(page));
    let listener = match app.connect("/index.html").await {
        Ok(socket) => Some(spawn_listener(&socket, Arc::clone(&page))),
        Err(e) => {
            warn!("Live updates unavailable, polling only: {e}");
            None
        }
    };
    let poller = spawn_poller(Arc::clone(&page), app.poll_interval());

    let mut redraw = tokio::time::interval(app.poll_interval());
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving dashboard");
                break;
            }
            _ = redraw.tick() => print_dashboard(&page.read()),
        }
    }

    poller.abort();
    if let Some(listener) = listener {
        listener.abort();
    }
    Ok(())
}

fn print_monitor(page: &NetworkMonitorPage) {
    if let Some(status) = page.status() {
        println!(
            "Collector: {}{}",
            if status.running { "running" } else { "stopped" },
            status
                .last_update
                .as_deref()
                .map(|t| format!(" (last update {t})"))
                .unwrap_or_default()
        );
    }
    let panel = page.panel();
    for gauge in panel.gauges() {
        print_chart(gauge);
    }
    if let Some(count) = panel.active_connections() {
        println!("Active connections: {count}");
    }
    print!("{}", panel.interfaces());
    print!("{}", panel.wireless());
    for issue in panel.critical() {
        println!("CRITICAL {}", issue.message);
    }
    for issue in panel.warning() {
        println!("WARNING  {}", issue.message);
    }
    if let Some(error) = panel.last_error() {
        println!("Last error: {error}");
    }
}

async fn monitor(app: &App, start: bool, stop: bool, watch: bool) -> Result<()> {
    let mut page = NetworkMonitorPage::new(app.ctx.clone());
    if start {
        page.start().await?;
    } else if stop {
        page.stop().await?;
    } else {
        page.refresh_status().await?;
    }
    page.load_snapshot().await?;
    print_monitor(&page);
    if !watch {
        return Ok(());
    }

    let socket = app.connect("/network-monitor.html").await?;
    let page = Arc::new(RwLock::new(page));
    let listener = spawn_listener(&socket, Arc::clone(&page));
    let mut redraw = tokio::time::interval(Duration::from_secs(5));
    redraw.tick().await;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, leaving network monitor");
                break;
            }
            _ = redraw.tick() => {
                println!();
                print_monitor(&page.read());
            }
        }
    }
    listener.abort();
    Ok(())
}

fn describe(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Disconnected => "WhatsApp disconnected".to_string(),
        ConnectionState::Connecting => "Waiting for a QR code...".to_string(),
        ConnectionState::AwaitingScan { qr } => format!(
            "Scan this code from WhatsApp > Linked devices:\n\n{qr}\n\nA new code is shown automatically when this one expires."
        ),
        ConnectionState::Active { phone } => format!("WhatsApp connected as {phone}"),
    }
}

/// Feed socket events to the page until `done` holds, the optional limit
/// passes or the operator presses Ctrl+C
async fn follow_whatsapp(
    socket: &SocketHandle,
    page: &mut WhatsAppPage,
    done: impl Fn(&ConnectionState) -> bool,
    limit: Option<Duration>,
) {
    let mut events = socket.subscribe();
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            () = &mut deadline => {
                warn!("No answer from the WhatsApp service");
                break;
            }
            received = events.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Console fell behind the WhatsApp feed");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !page.handles(&event.name) {
                    continue;
                }
                let before = page.state().clone();
                if let Err(e) = page.on_event(&event) {
                    warn!(event = %event.name, "Ignored WhatsApp event: {e}");
                    continue;
                }
                if event.name == "chat:message" {
                    if let Some(message) = page.chat().recent().last() {
                        println!("{}: {}", message.from, message.text);
                    }
                } else if page.state() != &before {
                    println!("{}", describe(page.state()));
                }
                if done(page.state()) {
                    break;
                }
            }
        }
    }
}

async fn whatsapp(app: &App, action: WhatsAppCommands) -> Result<()> {
    let socket = app.connect("/whatsapp.html").await?;
    let mut page = WhatsAppPage::new(app.ctx.clone(), socket.clone());

    match action {
        WhatsAppCommands::Start => {
            page.start()?;
            println!("{}", describe(page.state()));
            follow_whatsapp(
                &socket,
                &mut page,
                |state| matches!(state, ConnectionState::Active { .. }),
                None,
            )
            .await;
        }
        WhatsAppCommands::Stop => {
            // A fresh console does not know the bot state yet, so the stop
            // goes straight to the server instead of through the widget
            socket.emit(EVENT_STOP, serde_json::Value::Null);
            follow_whatsapp(
                &socket,
                &mut page,
                |state| matches!(state, ConnectionState::Disconnected),
                Some(Duration::from_secs(10)),
            )
            .await;
        }
        WhatsAppCommands::DeleteSession => {
            page.delete_session();
            follow_whatsapp(&socket, &mut page, |_| false, Some(Duration::from_secs(2))).await;
        }
        WhatsAppCommands::Watch => {
            follow_whatsapp(&socket, &mut page, |_| false, None).await;
        }
    }
    Ok(())
}

async fn bandwidth(app: &App, action: BandwidthCommands) -> Result<()> {
    let mut page = BandwidthPage::new(app.ctx.clone());
    match action {
        BandwidthCommands::Usage => {
            page.load().await?;
            if let Some(stats) = page.stats() {
                print_cards(&[
                    (
                        "Downloaded",
                        netdesk_core::utils::format_bandwidth(stats.total_download),
                    ),
                    (
                        "Uploaded",
                        netdesk_core::utils::format_bandwidth(stats.total_upload),
                    ),
                    ("Active users", stats.active_users.to_string()),
                ]);
                println!();
            }
            print_table(page.usage_table(), None);
            println!();
            print_chart(page.top_consumers());
            Ok(())
        }
        BandwidthCommands::Limit {
            username,
            download,
            upload,
        } => {
            page.set_limit(BandwidthLimitForm {
                username,
                download_mbps: download,
                upload_mbps: upload,
            })
            .await
        }
        BandwidthCommands::Qos { username, profile } => {
            page.set_qos(QosForm { username, profile }).await
        }
        BandwidthCommands::Boost {
            username,
            download,
            upload,
            hours,
        } => {
            page.boost(BoostForm {
                username,
                download_mbps: download,
                upload_mbps: upload,
                duration_hours: hours,
            })
            .await
        }
    }
}

async fn templates(app: &App, action: TemplateCommands) -> Result<()> {
    match action {
        TemplateCommands::List => {
            let mut page = SettingsPage::new(app.ctx.clone());
            page.refresh_templates().await?;
            print_table(page.table(), None);
            Ok(())
        }
        TemplateCommands::Validate { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let input: TemplateInput = toml::from_str(&raw).map_err(|e| {
                Error::validation("file", format!("Failed to parse {}: {e}", file.display()))
            })?;
            let template = validate_template_form(&input)?;
            println!(
                "{}/{} is valid ({} variables)",
                template.category,
                template.key,
                template.variables.len()
            );
            Ok(())
        }
    }
}
