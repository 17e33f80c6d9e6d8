//! regnskap server
//!
//! Serves the decision event endpoint and the admin surface, and runs the
//! scheduled jobs: krav transmission, status polling, resend,
//! reconciliation export and accrual runs.

use std::sync::Arc;

use anyhow::Context;
use chrono::TimeDelta;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regnskap_api::{AppState, create_router};
use regnskap_core::krav::SkattKlient;
use regnskap_core::metrics::{MetricsReporter, PrometheusMetrics};
use regnskap_core::storage::{FileStorage, SftpLevering};
use regnskap_db::migration::Migrator;
use regnskap_db::{
    DriftsavvikRepository, FeilrapportRepository, KonteringRepository, LeaseLock,
    OppdragRepository, PalopRepository, connect_pool,
};
use regnskap_scheduler::jobs::{
    AvstemmingJob, BehandlingsstatusJob, PalopFil, PalopJob, PalopJobDeps, ResendKravJob,
    SendKravJob,
};
use regnskap_scheduler::{HttpSkattKlient, KonteringGenerator, OutageGuard, Scheduler};
use regnskap_shared::{AlertService, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regnskap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(environment = %config.environment, "Configuration loaded");

    let db = connect_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    info!("Connected to database");
    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    let storage = FileStorage::from_provider(&config.storage)?;
    info!(provider = storage.provider_name(), "File storage configured");
    let levering = config
        .sftp
        .as_ref()
        .map(SftpLevering::from_config)
        .transpose()?;
    if levering.is_none() {
        info!("SFTP delivery disabled");
    }

    let klient: Arc<dyn SkattKlient> = Arc::new(HttpSkattKlient::from_config(&config.skatt)?);
    let alerts = Arc::new(AlertService::new(
        config.email.clone(),
        config.environment.clone(),
    ));
    let prometheus = Arc::new(PrometheusMetrics::new()?);
    let metrics: Arc<dyn MetricsReporter> = prometheus.clone();

    let konteringer = KonteringRepository::new(db.clone());
    let oppdrag = OppdragRepository::new(db.clone());
    let palop = PalopRepository::new(db.clone());
    let driftsavvik = DriftsavvikRepository::new(db.clone());
    let feilrapporter = FeilrapportRepository::new(db.clone());
    let generator = KonteringGenerator::new(oppdrag, palop.clone());

    let instance = std::env::var("HOSTNAME").unwrap_or_else(|_| uuid::Uuid::now_v7().to_string());
    let lock = LeaseLock::new(db.clone(), instance);
    let schedules = &config.scheduler;

    let scheduler = Scheduler::new(
        lock.clone(),
        OutageGuard::new(driftsavvik.clone(), Arc::clone(&klient)),
    )
    .register(
        Arc::new(SendKravJob::new(
            konteringer.clone(),
            Arc::clone(&klient),
            Arc::clone(&metrics),
        )),
        schedules.send_krav,
    )
    .register(
        Arc::new(BehandlingsstatusJob::new(
            Arc::new(konteringer.clone()),
            Arc::new(feilrapporter),
            Arc::clone(&klient),
            Arc::new(lock.clone()),
            alerts.clone(),
            Arc::clone(&metrics),
        )),
        schedules.behandlingsstatus,
    )
    .register(
        Arc::new(ResendKravJob::new(konteringer.clone(), Arc::clone(&metrics))),
        schedules.resend_krav,
    )
    .register(
        Arc::new(AvstemmingJob::new(
            Arc::new(konteringer.clone()),
            storage.clone(),
            levering.clone(),
            alerts.clone(),
        )),
        schedules.avstemming,
    )
    .register(
        Arc::new(PalopJob::new(
            PalopJobDeps {
                palop: Arc::new(palop),
                driftsavvik: Arc::new(driftsavvik),
                produsent: Arc::new(PalopFil::new(
                    konteringer,
                    generator.clone(),
                    storage,
                    levering,
                    alerts.clone(),
                )),
                laas: Arc::new(lock),
                varsling: alerts,
                metrics,
            },
            config.is_prod(),
            TimeDelta::try_seconds(i64::try_from(schedules.palop.lock_at_most_secs)?)
                .context("palop lock_at_most_secs out of range")?,
        )),
        schedules.palop,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = scheduler.start(shutdown_rx);

    let state = AppState {
        db: Arc::new(db),
        generator: Arc::new(generator),
        metrics: prometheus,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested");
        })
        .await?;

    shutdown_tx.send(true).ok();
    for handle in handles {
        handle.await.ok();
    }
    info!("Server stopped");

    Ok(())
}
