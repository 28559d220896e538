use anyhow::Result;
use hotelguide_amqp::{AmqpClient, TopologyConfig};
use hotelguide_domain::{DomainError, DomainResult, ReportResult};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel};
use tracing::debug;

/// Publishes result batches to whatever reply destination the request named.
/// The routing key comes from the message, never from configuration, so
/// concurrent requests with distinct reply queues cannot cross-talk.
pub struct ResultProducer {
    channel: Channel,
    exchange: String,
}

impl ResultProducer {
    pub async fn new(client: &AmqpClient, config: &TopologyConfig) -> Result<Self> {
        let channel = client.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        Ok(Self {
            channel,
            exchange: config.exchange.clone(),
        })
    }

    pub async fn publish_result(
        &self,
        reply_to: &str,
        result: &ReportResult,
    ) -> DomainResult<()> {
        let payload = serde_json::to_vec(result)
            .map_err(|e| DomainError::Publish(format!("serializing result: {e}")))?;

        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                reply_to,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| DomainError::Publish(e.to_string()))?
            .await
            .map_err(|e| DomainError::Publish(e.to_string()))?;

        if let Confirmation::Nack(_) = confirmation {
            return Err(DomainError::Publish(format!(
                "broker rejected result for {}",
                result.request_id
            )));
        }

        debug!(
            request_id = %result.request_id,
            reply_to = %reply_to,
            item_count = result.items.len(),
            "published report result"
        );

        Ok(())
    }
}
