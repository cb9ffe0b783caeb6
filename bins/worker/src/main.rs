//! Pillar worker
//!
//! Runs the periodic ledger jobs: bank statement ingestion followed by
//! deferred return matching, and the capital transfer sweep. Any number of
//! workers may share one database; the job locks keep each job on a single
//! node at a time.

use std::sync::Arc;

use anyhow::Context;
use pillar_core::bank::{BankAccountRegistry, BankOperationProcessor, StatementDirectory};
use pillar_core::capital::{CapitalTransferExecutor, LoggingNotifier};
use pillar_core::events::{BroadcastPublisher, EventPublisher};
use pillar_core::jobs::{CapitalTransferJob, JobLock, ScheduledJob, StatementJob, run_scheduled};
use pillar_core::ledger::LedgerStore;
use pillar_core::payment::{DeferredReturnMatcher, PaymentRepository};
use pillar_db::migration::Migrator;
use pillar_db::{SeaContractRepository, SeaJobLock, SeaLedgerStore, SeaPaymentRepository};
use pillar_shared::{AppConfig, Clock, SystemClock};
use sea_orm_migration::MigratorTrait;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = pillar_db::connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );
    Migrator::up(&db, None).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let publisher = Arc::new(BroadcastPublisher::default());
    let events: Arc<dyn EventPublisher> = publisher.clone();
    let ledger: Arc<dyn LedgerStore> = Arc::new(SeaLedgerStore::new(db.clone(), clock.clone()));
    let payments: Arc<dyn PaymentRepository> = Arc::new(SeaPaymentRepository::new(db.clone()));
    let contracts = Arc::new(SeaContractRepository::new(db.clone()));
    let lock: Arc<dyn JobLock> = Arc::new(SeaJobLock::new(
        db,
        config.scheduler.instance_id.clone(),
        clock.clone(),
    ));

    let registry = BankAccountRegistry::from_config(&config.bank_accounts);
    let statement_job: Arc<dyn ScheduledJob> = Arc::new(StatementJob::new(
        StatementDirectory::new(config.scheduler.statement_dir.clone()),
        BankOperationProcessor::new(
            ledger.clone(),
            payments.clone(),
            registry,
            config.ledger.settlement_currency.clone(),
        ),
        DeferredReturnMatcher::new(ledger.clone(), payments, events.clone()),
        events.clone(),
    ));
    let executor = Arc::new(CapitalTransferExecutor::new(
        ledger,
        contracts,
        Arc::new(LoggingNotifier),
        events,
        clock,
        config.ledger.clamping_tolerance,
    ));
    let transfer_job: Arc<dyn ScheduledJob> = Arc::new(CapitalTransferJob::new(executor));

    tokio::spawn(log_events(publisher.subscribe()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = [
        tokio::spawn(run_scheduled(
            lock.clone(),
            statement_job,
            config.scheduler.statement_job,
            shutdown_rx.clone(),
        )),
        tokio::spawn(run_scheduled(
            lock,
            transfer_job,
            config.scheduler.capital_transfer_job,
            shutdown_rx,
        )),
    ];
    info!(
        instance_id = %config.scheduler.instance_id,
        statement_dir = %config.scheduler.statement_dir.display(),
        "Worker started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for running jobs");
    shutdown_tx.send(true)?;
    for worker in workers {
        worker.await?;
    }

    info!("Worker stopped");
    Ok(())
}

/// `RUST_LOG` selects levels; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pillar=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn log_events(mut events: broadcast::Receiver<pillar_core::events::CoreEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(payload) => info!(event = %payload, "Core event"),
                Err(err) => warn!(error = %err, "Failed to encode core event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
