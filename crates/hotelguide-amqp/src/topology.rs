use hotelguide_domain::{DomainError, DomainResult};
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tracing::info;

/// Names of the broker objects the pipeline relies on. Routing key is always
/// the queue's own name (direct exchange).
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    pub exchange: String,
    pub request_queue: String,
    pub result_queue: String,
}

impl TopologyConfig {
    /// Name of the exclusive reply queue used for one request.
    pub fn reply_queue_name(&self, request_id: &str) -> String {
        format!("{}.{}", self.result_queue, request_id)
    }
}

/// Declare the exchange, the two durable work queues and their bindings.
/// Safe to call repeatedly: declaring with identical parameters is a no-op
/// at the broker; an incompatible existing declaration surfaces as a
/// topology error. Call once per connection lifetime, never inside a
/// consume loop.
pub async fn ensure_topology(channel: &Channel, config: &TopologyConfig) -> DomainResult<()> {
    info!(
        exchange = %config.exchange,
        request_queue = %config.request_queue,
        result_queue = %config.result_queue,
        "Ensuring broker topology"
    );

    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| DomainError::Topology(format!("exchange {}: {e}", config.exchange)))?;

    for queue in [&config.request_queue, &config.result_queue] {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DomainError::Topology(format!("queue {queue}: {e}")))?;

        channel
            .queue_bind(
                queue,
                &config.exchange,
                queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| DomainError::Topology(format!("binding {queue}: {e}")))?;
    }

    info!("Broker topology in place");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_queue_name_is_unique_per_request() {
        let config = TopologyConfig {
            exchange: "reports".to_string(),
            request_queue: "hotel.aggregates".to_string(),
            result_queue: "report.results".to_string(),
        };

        assert_eq!(
            config.reply_queue_name("req-1"),
            "report.results.req-1".to_string()
        );
        assert_ne!(
            config.reply_queue_name("req-1"),
            config.reply_queue_name("req-2")
        );
    }
}
