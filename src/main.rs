use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use skillswap::auth::LogOtpSender;
use skillswap::cli::{self, Commands, NotificationCommands, RequestCommands, RequestDirection};
use skillswap::config::{self, Config};
use skillswap::jobs;
use skillswap::query::SwapQueries;
use skillswap::store::memory::MemoryStore;
use skillswap::store::postgres::PgStore;
use skillswap::store::{Store, SwapStore};
use skillswap::{server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(Commands::Migrate) => {
            let db = connect_pg(&cfg).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            Ok(())
        }
        Some(Commands::Requests { command }) => {
            let db = connect_pg(&cfg).await?;
            handle_request_command(Arc::new(db), command).await
        }
        Some(Commands::Notifications { command }) => {
            let db = connect_pg(&cfg).await?;
            handle_notification_command(Arc::new(db), command).await
        }
        Some(Commands::Cleanup) => {
            let db = connect_pg(&cfg).await?;
            let report = jobs::cleanup::run_once(&db, cfg.notification_retention_days).await?;
            println!(
                "Purged {} unverified users and {} read notifications.",
                report.users_purged, report.notifications_purged
            );
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn init_tracing() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "skillswap"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "skillswap=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();
    Ok(())
}

async fn connect_pg(cfg: &Config) -> anyhow::Result<PgStore> {
    let url = cfg
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for this command")?;
    PgStore::connect(url)
        .await
        .context("failed to connect to database")
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let retention_days = cfg.notification_retention_days;
    let state = Arc::new(AppState::new(cfg, store.clone(), Arc::new(LogOtpSender)));

    jobs::cleanup::spawn(store, retention_days);
    tracing::info!("Background cleanup job started (every 1h)");

    server::serve(state, port).await
}

fn parse_uuid(raw: &str, what: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid {} id: {}", what, raw))
}

async fn handle_request_command(
    store: Arc<dyn Store>,
    cmd: RequestCommands,
) -> anyhow::Result<()> {
    let queries = SwapQueries::new(store.clone());
    match cmd {
        RequestCommands::List { user, direction } => {
            let user_id = parse_uuid(&user, "user")?;
            let requests = match direction {
                RequestDirection::Sent => queries.sent_requests(user_id).await?,
                RequestDirection::Received => queries.received_requests(user_id).await?,
                RequestDirection::All => queries.all_requests(user_id).await?,
            };
            if requests.is_empty() {
                println!("No requests found.");
            } else {
                println!(
                    "{:<38} {:<20} {:<20} {:<10}",
                    "ID", "FROM", "TO", "STATUS"
                );
                for r in requests {
                    println!(
                        "{:<38} {:<20} {:<20} {:<10}",
                        r.id, r.from_user_name, r.to_user_name, r.status
                    );
                }
            }
        }
        RequestCommands::Show { id } => {
            let id = parse_uuid(&id, "request")?;
            let request = store.get_request(id).await.map_err(|e| e.entity("swap request"))?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }
    Ok(())
}

async fn handle_notification_command(
    store: Arc<dyn Store>,
    cmd: NotificationCommands,
) -> anyhow::Result<()> {
    let queries = SwapQueries::new(store);
    match cmd {
        NotificationCommands::List { user, limit } => {
            let user_id = parse_uuid(&user, "user")?;
            let notifications = queries.notifications(user_id, limit).await?;
            if notifications.is_empty() {
                println!("No notifications found.");
            } else {
                println!("{:<38} {:<24} {:<6} MESSAGE", "ID", "TYPE", "READ");
                for n in notifications {
                    println!(
                        "{:<38} {:<24} {:<6} {}",
                        n.id,
                        n.kind.as_str(),
                        n.read,
                        n.message
                    );
                }
            }
        }
        NotificationCommands::Unread { user } => {
            let user_id = parse_uuid(&user, "user")?;
            println!("{}", queries.unread_count(user_id).await?);
        }
    }
    Ok(())
}
