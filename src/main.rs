use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use onegate_client::models::appointment::{Appointment, ApprovalForm, RiskTier, VisitForm};
use onegate_client::models::notification::Notification;
use onegate_client::models::property::{Property, PropertyFilter, RecommendationQuery};
use onegate_client::models::user::LoginRequest;
use onegate_client::services::api::Access;
use onegate_client::services::recommendations::ClickOutcome;
use onegate_client::services::session::RestoreOutcome;
use onegate_client::tasks::refresh_task::{run_refresh_loop, Refreshable};
use onegate_client::{Config, Portal};

#[derive(Parser)]
#[command(name = "onegate", version, about = "OneGate portal client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        remember_me: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in identity
    Whoami,
    #[command(subcommand)]
    Appointments(AppointmentCommand),
    #[command(subcommand)]
    Notifications(NotificationCommand),
    #[command(subcommand)]
    Properties(PropertyCommand),
    /// Society notices, newest first as the server sends them
    Notices {
        /// Only notices whose title contains this text
        #[arg(long)]
        search: Option<String>,
        /// Include expired notices
        #[arg(long)]
        all: bool,
    },
    /// Maintenance invoices for your society
    Maintenance,
    /// Users registered with the portal (owners only)
    Users,
    /// Follow live updates until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum AppointmentCommand {
    List {
        /// Only requests still awaiting a decision
        #[arg(long)]
        pending: bool,
    },
    Request {
        #[arg(long)]
        property: String,
        #[command(flatten)]
        slot: Slot,
    },
    Approve {
        id: String,
        #[command(flatten)]
        slot: Slot,
    },
    Reject {
        id: String,
    },
    Score {
        id: String,
    },
}

/// Visit date (YYYY-MM-DD), time (HH:MM) and meeting point.
#[derive(Args)]
struct Slot {
    #[arg(long, default_value = "")]
    date: String,
    #[arg(long, default_value = "")]
    time: String,
    #[arg(long, default_value = "")]
    location: String,
}

#[derive(Subcommand)]
enum NotificationCommand {
    List {
        #[arg(long)]
        unread: bool,
    },
    Read {
        id: String,
    },
    ReadAll,
}

#[derive(Subcommand)]
enum PropertyCommand {
    List {
        #[arg(long)]
        location: Option<String>,
        #[arg(long = "type")]
        property_type: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        /// Bypass the session cache
        #[arg(long)]
        refresh: bool,
    },
    Recommend {
        #[arg(short, long, default_value_t = 6)]
        k: u32,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        #[arg(long)]
        alpha: Option<f64>,
    },
    Click {
        id: String,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env();
    let realtime = matches!(cli.command, Command::Watch);
    let portal = Portal::from_config(config)
        .context("Failed to set up the API client")?
        .with_realtime(realtime);

    if let RestoreOutcome::Invalidated(reason) = portal.bootstrap() {
        eprintln!("{}. Please sign in again.", reason);
    }

    match cli.command {
        Command::Login {
            email,
            password,
            remember_me,
        } => {
            let request = LoginRequest {
                email,
                password,
                remember_me,
            };
            let identity = portal.login(&request).await?;
            println!("Signed in as {} ({})", identity.email, identity.role);
        }
        Command::Logout => {
            portal.logout();
            println!("Signed out");
        }
        Command::Whoami => {
            let identity = portal.current_user()?;
            let email = match portal.lookup_email().await {
                Ok(email) => email,
                Err(e) => {
                    log::warn!("User lookup failed: {}", e);
                    identity.email.clone()
                }
            };
            println!("{} ({})", email, identity.role);
            println!("id:        {}", identity.id.as_deref().unwrap_or("-"));
            println!("dashboard: {}", identity.role.dashboard_path());
        }
        Command::Appointments(command) => appointments(&portal, command).await?,
        Command::Notifications(command) => notifications(&portal, command).await?,
        Command::Properties(command) => properties(&portal, command).await?,
        Command::Notices { search, all } => notices(&portal, search.as_deref(), all).await?,
        Command::Maintenance => maintenance(&portal).await?,
        Command::Users => {
            for user in portal.list_users().await? {
                println!(
                    "{:<26} {:<32} {:<10} {}",
                    user.document_id().unwrap_or("-"),
                    user.email.as_deref().unwrap_or("-"),
                    user.role.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    user.society_id.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Watch => watch(Arc::new(portal)).await?,
    }
    Ok(())
}

async fn appointments(portal: &Portal, command: AppointmentCommand) -> anyhow::Result<()> {
    match command {
        AppointmentCommand::List { pending } => {
            portal.current_user()?;
            portal.appointments().refresh().await?;
            let list = if pending {
                portal.appointments().pending()
            } else {
                portal.appointments().appointments()
            };
            if list.is_empty() {
                println!("No appointments");
            }
            list.iter().for_each(print_appointment);
        }
        AppointmentCommand::Request { property, slot } => {
            if let Err(e) = portal.load_properties(false).await {
                log::warn!("Property lookup failed, no default meeting point: {}", e);
            }
            let form = VisitForm {
                property_id: property,
                date: slot.date,
                time: slot.time,
                location: slot.location,
            };
            let outcome = portal.request_visit(form).await?;
            println!("{}", outcome.message());
        }
        AppointmentCommand::Approve { id, slot } => {
            let form = ApprovalForm {
                date: slot.date,
                time: slot.time,
                location: slot.location,
            };
            let approved = portal.approve(&id, form).await?;
            print_appointment(&approved);
        }
        AppointmentCommand::Reject { id } => {
            portal.reject(&id).await?;
            println!("Appointment {} rejected", id);
        }
        AppointmentCommand::Score { id } => {
            let scored = portal.score(&id).await?;
            print_appointment(&scored);
        }
    }
    Ok(())
}

async fn notifications(portal: &Portal, command: NotificationCommand) -> anyhow::Result<()> {
    portal.current_user()?;
    let center = portal.notifications();
    center.refresh().await?;

    match command {
        NotificationCommand::List { unread } => {
            let list = if unread {
                center.unread()
            } else {
                center.notifications()
            };
            println!("{} unread", center.unread_count());
            list.iter().for_each(print_notification);
        }
        NotificationCommand::Read { id } => {
            if center.mark_read(&id).await? {
                println!("Marked {} as read, {} unread", id, center.unread_count());
            } else {
                println!("{} was already read", id);
            }
        }
        NotificationCommand::ReadAll => {
            center.mark_all_read().await?;
            println!("All notifications marked as read");
        }
    }
    Ok(())
}

async fn properties(portal: &Portal, command: PropertyCommand) -> anyhow::Result<()> {
    match command {
        PropertyCommand::List {
            location,
            property_type,
            status,
            min_price,
            max_price,
            refresh,
        } => {
            portal.load_properties(refresh).await?;
            let filter = PropertyFilter {
                location,
                property_type,
                status,
                min_price,
                max_price,
            };
            let options = portal.catalog().options();
            log::debug!(
                "Filter options: {} location(s), {} type(s), {} status(es)",
                options.locations.len(),
                options.types.len(),
                options.statuses.len()
            );
            portal.catalog().filter(&filter).iter().for_each(print_property);
        }
        PropertyCommand::Recommend {
            k,
            location,
            min_price,
            max_price,
            alpha,
        } => {
            let query = RecommendationQuery {
                k,
                location,
                min_price,
                max_price,
                alpha,
            };
            let results = portal.recommend(&query).await?;
            if results.is_empty() {
                println!("No recommendations right now.");
            }
            results.iter().for_each(print_property);
        }
        PropertyCommand::Click { id } => match portal.record_click(&id).await? {
            ClickOutcome::Recorded => println!("Recorded property click: {}", id),
            ClickOutcome::Duplicate => println!("Click for {} already recorded", id),
            ClickOutcome::Skipped => println!("Not signed in, click not recorded"),
            ClickOutcome::NotTracked { status } => {
                println!("Click tracking blocked ({}) for property {}", status, id)
            }
        },
    }
    Ok(())
}

async fn notices(portal: &Portal, search: Option<&str>, all: bool) -> anyhow::Result<()> {
    portal.current_user()?;
    let today = chrono::Local::now().date_naive();
    let notices = portal.api().get_notices().await?;

    let shown: Vec<_> = notices
        .iter()
        .filter(|n| all || !n.is_expired(today))
        .filter(|n| search.map_or(true, |q| n.matches_query(q)))
        .collect();
    if shown.is_empty() {
        println!("No notices");
    }
    for notice in shown {
        println!(
            "{:<12} {:<12} {}",
            notice.date.as_deref().and_then(|d| d.get(..10)).unwrap_or("-"),
            notice.category,
            notice.title
        );
    }
    Ok(())
}

async fn maintenance(portal: &Portal) -> anyhow::Result<()> {
    let Some(society_id) = portal.society_id().await? else {
        println!("You are not part of a society yet");
        return Ok(());
    };

    match portal.api().get_maintenance_summary(&society_id).await? {
        Access::Denied => println!("You do not have access to maintenance for this society"),
        Access::Granted(summary) => {
            let totals = summary.totals();
            println!("Total:        {}", totals.total);
            println!("Paid:         {}", totals.paid);
            println!("Pending:      {}", totals.pending);
            println!("Last payment: {}", totals.last_payment.as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}

/// Prints a one-line summary after every refresh.
struct WatchView(Arc<Portal>);

#[async_trait]
impl Refreshable for WatchView {
    async fn refresh_all(&self) {
        self.0.refresh_all().await;
        println!(
            "{} unread notification(s), {} pending appointment(s)",
            self.0.notifications().unread_count(),
            self.0.appointments().pending().len()
        );
    }
}

async fn watch(portal: Arc<Portal>) -> anyhow::Result<()> {
    let identity = portal.current_user()?;
    println!("Watching updates for {}, Ctrl-C to stop", identity.email);

    let cancel = CancellationToken::new();
    let view = Arc::new(WatchView(portal.clone()));
    let handle = tokio::spawn(run_refresh_loop(
        view,
        portal.invalidations(),
        portal.config().app.poll_interval(),
        cancel.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    cancel.cancel();
    portal.channel().disconnect();
    handle.await?;
    Ok(())
}

fn print_appointment(appointment: &Appointment) {
    let risk = appointment
        .no_show_score
        .map(RiskTier::label)
        .unwrap_or_else(|| "not scored".to_string());
    let requester = appointment
        .requester
        .as_ref()
        .and_then(|r| r.name.clone().or_else(|| r.email.clone()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<26} {:<9} {:<20} {:<20} {:<18} {}",
        appointment.id,
        appointment.status,
        appointment.date_time.as_deref().unwrap_or("-"),
        appointment.location.as_deref().unwrap_or("-"),
        requester,
        risk
    );
}

fn print_notification(notification: &Notification) {
    let marker = if notification.is_unread() { "*" } else { " " };
    println!(
        "{} {:<26} {:<20} {}",
        marker,
        notification.id,
        notification.created_at.as_deref().unwrap_or("-"),
        notification.message
    );
}

fn print_property(property: &Property) {
    let price = property
        .price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<26} {:<28} {:<12} {:<16} {}",
        property.id,
        property.name,
        property.property_type.as_deref().unwrap_or("-"),
        property.location.as_deref().unwrap_or("-"),
        price
    );
}
