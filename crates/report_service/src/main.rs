mod config;

use anyhow::Result;
use hotelguide_postgres::{PostgresClient, PostgresReportStore};
use hotelguide_runner::{telemetry, Runner};
use report_worker::{ReportService, ReportWorker};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::ServiceConfig::from_env()?;
    telemetry::init_tracing(&config.log_level);

    info!("Starting report service");

    let postgres = PostgresClient::new(&config.postgres())?;
    postgres.ping().await?;

    let store = Arc::new(PostgresReportStore::new(postgres));
    let service = Arc::new(ReportService::new(store));
    let worker = ReportWorker::new(config.worker(), service);

    // The worker owns its broker connection and reconnects on failure, so
    // the runner has no separate closer to register.
    let runner = Runner::new().with_named_process("report-worker", move |ctx| async move {
        worker.run(ctx).await
    });

    runner.run().await
}
