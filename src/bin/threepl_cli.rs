use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use threepl_api::{
    config::{self, AppConfig},
    db::{self, DbPool},
    events::outbox::OutboxDispatcher,
    integrations::shipstation::{ShipStationClient, ShippingPlatform},
    notifications,
    services::tracking::TrackingSource,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::DrainOutbox { passes } => {
            let dispatcher = OutboxDispatcher::new(
                context.db.clone(),
                context.shipping.clone(),
                context.config.outbox.clone(),
            );
            for pass in 1..=passes.max(1) {
                let stats = dispatcher
                    .drain_once()
                    .await
                    .context("outbox drain failed")?;
                if cli.json {
                    print_json(&stats)?;
                } else {
                    println!(
                        "pass {}: claimed {} • delivered {} • rescheduled {} • failed {} • reclaimed {}",
                        pass,
                        stats.claimed,
                        stats.delivered,
                        stats.rescheduled,
                        stats.failed,
                        stats.reclaimed
                    );
                }
                if stats.claimed == 0 {
                    break;
                }
            }
        }
        Commands::Ingest { resource_url } => {
            let state = context.app_state()?;
            let report = state
                .ingestor
                .ingest_resource(&resource_url)
                .await
                .context("ingestion failed")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "received {} • created {} • duplicates {} • excluded {} • unclassified {} • failed {}",
                    report.received,
                    report.created,
                    report.duplicates,
                    report.excluded,
                    report.unclassified,
                    report.failed.len()
                );
                for failure in &report.failed {
                    println!("- {}: {}", failure.order_number, failure.error);
                }
            }
        }
        Commands::Track {
            resource_url,
            fulfillments,
        } => {
            let state = context.app_state()?;
            let source = if fulfillments {
                TrackingSource::Fulfillments
            } else {
                TrackingSource::Shipments
            };
            let report = state
                .tracking
                .process_resource(source, &resource_url)
                .await
                .context("tracking update failed")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "received {} • updated {} • skipped {}",
                    report.received, report.updated, report.skipped
                );
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "threepl",
    about = "Maintenance commands for the 3PL order ingestion service",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Push pending mirrored orders to the shipping platform
    DrainOutbox {
        #[arg(long, default_value_t = 1, help = "Maximum number of drain passes")]
        passes: u32,
    },
    /// Replay an order notification resource URL through ingestion
    Ingest {
        #[arg(long, help = "resource_url from an ORDER_NOTIFY webhook")]
        resource_url: String,
    },
    /// Replay a shipment or fulfillment resource URL through tracking updates
    Track {
        #[arg(long, help = "resource_url from a SHIP_NOTIFY or FULFILLMENT_SHIPPED webhook")]
        resource_url: String,
        #[arg(long, action = ArgAction::SetTrue, help = "Treat the resource as marketplace fulfillments")]
        fulfillments: bool,
    },
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
    shipping: Arc<dyn ShippingPlatform>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let shipping: Arc<dyn ShippingPlatform> = Arc::new(
            ShipStationClient::new(&config.shipping).context("invalid shipping configuration")?,
        );
        info!(target: "threepl_cli", "context initialized");

        Ok(Self {
            config,
            db: Arc::new(db_pool),
            shipping,
        })
    }

    fn app_state(&self) -> Result<AppState> {
        let notifier = notifications::notifier_from_config(&self.config.notifications)
            .context("invalid notification configuration")?;
        Ok(AppState::new(
            self.db.clone(),
            self.config.clone(),
            self.shipping.clone(),
            notifier,
        ))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
