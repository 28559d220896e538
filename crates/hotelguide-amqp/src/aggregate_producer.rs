use crate::client::AmqpClient;
use crate::topology::TopologyConfig;
use anyhow::Result;
use async_trait::async_trait;
use hotelguide_domain::{DomainError, DomainResult, ReportRequest, RequestPublisher};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::{BasicProperties, Channel};
use tracing::debug;

/// Publishes aggregate snapshots as report requests. The channel runs in
/// confirm mode: `publish_request` returns only after the broker has
/// accepted the message.
pub struct AggregateProducer {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl AggregateProducer {
    pub async fn new(client: &AmqpClient, config: &TopologyConfig) -> Result<Self> {
        let channel = client.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        debug!(
            exchange = %config.exchange,
            routing_key = %config.request_queue,
            "initialized AggregateProducer"
        );

        Ok(Self {
            channel,
            exchange: config.exchange.clone(),
            routing_key: config.request_queue.clone(),
        })
    }
}

#[async_trait]
impl RequestPublisher for AggregateProducer {
    async fn publish_request(&self, request: &ReportRequest) -> DomainResult<()> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| DomainError::Publish(format!("serializing request: {e}")))?;

        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
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
                "broker rejected request {}",
                request.request_id
            )));
        }

        debug!(
            request_id = %request.request_id,
            reply_to = %request.reply_to,
            item_count = request.items.len(),
            "published report request"
        );

        Ok(())
    }
}
