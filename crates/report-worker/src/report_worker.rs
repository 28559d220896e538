use crate::amqp::ResultProducer;
use crate::domain::{ProcessOutcome, ReportService};
use anyhow::Context;
use futures::StreamExt;
use hotelguide_amqp::{ensure_topology, AmqpClient, TopologyConfig};
use hotelguide_domain::DomainError;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const CONSUMER_TAG: &str = "report-worker";

pub struct ReportWorkerConfig {
    pub amqp_url: String,
    pub connect_timeout: Duration,
    pub topology: TopologyConfig,
    pub prefetch_count: u16,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

/// Long-lived consumer of the request queue.
///
/// States: Disconnected -> Connecting -> Consuming, back to Disconnected on
/// any broker I/O error (with capped exponential backoff between attempts),
/// terminal Stopped on cancellation. Topology is declared once per
/// connection, never inside the consume loop.
pub struct ReportWorker {
    config: ReportWorkerConfig,
    service: Arc<ReportService>,
}

impl ReportWorker {
    pub fn new(config: ReportWorkerConfig, service: Arc<ReportService>) -> Self {
        Self { config, service }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);

        loop {
            if ctx.is_cancelled() {
                break;
            }

            debug!(state = "connecting", url = %self.config.amqp_url, "report worker connecting");

            let mut reached_consuming = false;
            match self.consume_session(&ctx, &mut reached_consuming).await {
                Ok(()) => break,
                Err(e) if is_fatal(&e) => {
                    error!(error = %format!("{e:#}"), "broker topology conflict, stopping");
                    return Err(e);
                }
                Err(e) => {
                    if reached_consuming {
                        backoff.reset();
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        state = "disconnected",
                        error = %e,
                        backoff_ms = delay.as_millis(),
                        "broker session ended, reconnecting after backoff"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(state = "stopped", "report worker stopped");
        Ok(())
    }

    /// One connection lifetime: declare topology, then consume until
    /// cancellation or a broker error. Sets `reached_consuming` once the
    /// session got past setup, so the reconnect delay starts over.
    async fn consume_session(
        &self,
        ctx: &CancellationToken,
        reached_consuming: &mut bool,
    ) -> anyhow::Result<()> {
        let client =
            AmqpClient::connect(&self.config.amqp_url, self.config.connect_timeout).await?;
        let channel = client.create_channel().await?;

        ensure_topology(&channel, &self.config.topology)
            .await
            .context("declaring topology")?;

        channel
            .basic_qos(self.config.prefetch_count, BasicQosOptions::default())
            .await
            .context("setting prefetch")?;

        let mut consumer = channel
            .basic_consume(
                &self.config.topology.request_queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .context("starting request consumer")?;

        let producer = ResultProducer::new(&client, &self.config.topology).await?;

        *reached_consuming = true;
        info!(
            state = "consuming",
            queue = %self.config.topology.request_queue,
            "report worker consuming"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping report worker");
                    if let Err(e) = channel
                        .basic_cancel(CONSUMER_TAG, BasicCancelOptions::default())
                        .await
                    {
                        debug!(error = %e, "consumer already cancelled");
                    }
                    client.close().await;
                    return Ok(());
                }
                delivery = consumer.next() => match delivery {
                    Some(Ok(delivery)) => self.handle_delivery(delivery, &producer).await?,
                    Some(Err(e)) => {
                        return Err(anyhow::Error::new(e).context("request consumer stream error"));
                    }
                    None => anyhow::bail!("request consumer stream closed"),
                }
            }
        }
    }

    /// Ack/nack one delivery per the processing outcome. An ack/nack failure
    /// is a broker I/O error and tears the session down for reconnection.
    async fn handle_delivery(
        &self,
        delivery: Delivery,
        producer: &ResultProducer,
    ) -> anyhow::Result<()> {
        match self.service.process_request(&delivery.data).await {
            Ok(ProcessOutcome::Completed { reply_to, result }) => {
                // Ack only after the batch is durable; the reply comes after
                // the ack and is best-effort, since the waiter may have timed
                // out and taken its queue with it.
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .context("acking processed request")?;

                if let Err(e) = producer.publish_result(&reply_to, &result).await {
                    warn!(
                        request_id = %result.request_id,
                        reply_to = %reply_to,
                        error = %e,
                        "result publish failed after persistence"
                    );
                }
            }
            Ok(ProcessOutcome::Discarded { reason }) => {
                warn!(reason = %reason, "dropping malformed request message");
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .context("acking malformed request")?;
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "persistence failed, leaving message for redelivery");
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
                    .context("nacking request")?;
            }
            Err(e) => {
                error!(error = %e, "unrecoverable processing error, dropping message");
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .context("acking unprocessable request")?;
            }
        }

        Ok(())
    }
}

/// A topology conflict cannot heal by reconnecting; redeclaring the same
/// incompatible objects fails the same way every time, so the worker must
/// stop instead of retrying.
fn is_fatal(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<DomainError>(),
        Some(DomainError::Topology(_))
    )
}

/// Capped exponential reconnect delay.
struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    /// Current delay; the next one is doubled up to the cap.
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_conflict_is_fatal_even_under_context() {
        let error = Err::<(), _>(DomainError::Topology(
            "queue hotel.aggregates: PRECONDITION_FAILED".to_string(),
        ))
        .context("declaring topology")
        .unwrap_err();

        assert!(is_fatal(&error));
    }

    #[test]
    fn io_errors_are_retried_not_fatal() {
        assert!(!is_fatal(&anyhow::anyhow!("connection reset by peer")));
        assert!(!is_fatal(&anyhow::Error::new(DomainError::Publish(
            "nacked".to_string()
        ))));
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(400));

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
    }

    #[test]
    fn healthy_session_resets_the_escalation() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
