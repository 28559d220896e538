mod config;
mod http;

use anyhow::Result;
use hotelguide_amqp::{ensure_topology, AggregateProducer, AmqpClient, AmqpReplyWaiterFactory};
use hotelguide_domain::ReportRequestService;
use hotelguide_postgres::{PostgresClient, PostgresContactRepository};
use hotelguide_runner::{telemetry, Runner};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::ServiceConfig::from_env()?;
    telemetry::init_tracing(&config.log_level);

    info!("Starting hotel service");

    let postgres = PostgresClient::new(&config.postgres())?;
    postgres.ping().await?;

    let amqp = Arc::new(AmqpClient::connect(&config.amqp_url, config.startup_timeout()).await?);
    let topology = config.topology();

    // Declare the shared topology once at startup; per-request reply queues
    // are created on demand by the waiter factory.
    let setup_channel = amqp.create_channel().await?;
    ensure_topology(&setup_channel, &topology).await?;

    let producer = AggregateProducer::new(&amqp, &topology).await?;
    let waiter_factory = AmqpReplyWaiterFactory::new(amqp.clone(), topology);

    let report_service = Arc::new(ReportRequestService::new(
        Arc::new(PostgresContactRepository::new(postgres)),
        Arc::new(producer),
        Arc::new(waiter_factory),
        config.reply_timeout(),
    ));

    let http_host = config.http_host.clone();
    let http_port = config.http_port;
    let state = http::AppState { report_service };

    let runner = Runner::new()
        .with_named_process("http-server", move |ctx| async move {
            http::serve(&http_host, http_port, state, ctx).await
        })
        .with_closer({
            let amqp = amqp.clone();
            move || async move {
                amqp.close().await;
                Ok(())
            }
        });

    runner.run().await
}
