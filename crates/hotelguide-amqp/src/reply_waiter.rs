use crate::client::AmqpClient;
use crate::topology::TopologyConfig;
use async_trait::async_trait;
use futures::StreamExt;
use hotelguide_domain::{
    DomainError, DomainResult, ReplyWaiter, ReplyWaiterFactory, ReportResult, ResultItem,
};
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Waits for the result of one report request on an exclusive, auto-deleted
/// reply queue. The queue is declared, bound and consumed from before the
/// request is published, so a fast reply can never be lost; auto-delete
/// tears the queue down when the consumer is cancelled.
pub struct AmqpReplyWaiter {
    channel: Channel,
    consumer: Consumer,
    consumer_tag: String,
    reply_queue: String,
    request_id: String,
}

impl AmqpReplyWaiter {
    pub async fn subscribe(
        client: &AmqpClient,
        config: &TopologyConfig,
        request_id: &str,
    ) -> DomainResult<Self> {
        let channel = client.create_channel().await?;
        let reply_queue = config.reply_queue_name(request_id);

        channel
            .queue_declare(
                &reply_queue,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DomainError::Topology(format!("reply queue {reply_queue}: {e}")))?;

        channel
            .queue_bind(
                &reply_queue,
                &config.exchange,
                &reply_queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| DomainError::Topology(format!("reply binding {reply_queue}: {e}")))?;

        let consumer_tag = format!("reply-waiter-{request_id}");
        let consumer = channel
            .basic_consume(
                &reply_queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow::Error::new(e).context("starting reply consumer"))?;

        debug!(request_id = %request_id, reply_queue = %reply_queue, "subscribed for reply");

        Ok(Self {
            channel,
            consumer,
            consumer_tag,
            reply_queue,
            request_id: request_id.to_string(),
        })
    }

    async fn next_match(&mut self) -> DomainResult<Vec<ResultItem>> {
        while let Some(delivery) = self.consumer.next().await {
            let delivery =
                delivery.map_err(|e| anyhow::Error::new(e).context("receiving reply"))?;

            let matched = match_result(&delivery.data, &self.request_id);

            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                warn!(request_id = %self.request_id, error = %e, "failed to ack reply");
            }

            match matched {
                ReplyMatch::Matched(items) => return Ok(items),
                ReplyMatch::Mismatch(other) => {
                    // Another request's result on our exclusive queue is
                    // anomalous but must not satisfy this wait.
                    warn!(
                        expected = %self.request_id,
                        received = %other,
                        "ignoring result tagged for another request"
                    );
                }
                ReplyMatch::Malformed(reason) => {
                    warn!(
                        request_id = %self.request_id,
                        reason = %reason,
                        "dropping malformed reply"
                    );
                }
            }
        }

        Err(DomainError::Repository(anyhow::anyhow!(
            "reply consumer for {} closed before a result arrived",
            self.reply_queue
        )))
    }

    async fn teardown(&self) {
        if let Err(e) = self
            .channel
            .basic_cancel(&self.consumer_tag, BasicCancelOptions::default())
            .await
        {
            debug!(request_id = %self.request_id, error = %e, "reply consumer already gone");
        }
    }
}

#[async_trait]
impl ReplyWaiter for AmqpReplyWaiter {
    fn reply_to(&self) -> &str {
        &self.reply_queue
    }

    async fn await_result(&mut self, timeout: Duration) -> DomainResult<Vec<ResultItem>> {
        let outcome = tokio::time::timeout(timeout, self.next_match()).await;

        // The subscription is torn down on every exit path; a late result is
        // acceptable to lose, the persisted rows are not rolled back.
        self.teardown().await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(DomainError::Timeout {
                request_id: self.request_id.clone(),
                waited: timeout,
            }),
        }
    }
}

/// Creates one `AmqpReplyWaiter` per request on its own channel.
pub struct AmqpReplyWaiterFactory {
    client: Arc<AmqpClient>,
    config: TopologyConfig,
}

impl AmqpReplyWaiterFactory {
    pub fn new(client: Arc<AmqpClient>, config: TopologyConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ReplyWaiterFactory for AmqpReplyWaiterFactory {
    async fn subscribe(&self, request_id: &str) -> DomainResult<Box<dyn ReplyWaiter>> {
        let waiter = AmqpReplyWaiter::subscribe(&self.client, &self.config, request_id).await?;
        Ok(Box::new(waiter))
    }
}

enum ReplyMatch {
    Matched(Vec<ResultItem>),
    Mismatch(String),
    Malformed(String),
}

fn match_result(payload: &[u8], request_id: &str) -> ReplyMatch {
    match serde_json::from_slice::<ReportResult>(payload) {
        Ok(result) if result.request_id == request_id => ReplyMatch::Matched(result.items),
        Ok(result) => ReplyMatch::Mismatch(result.request_id),
        Err(e) => ReplyMatch::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotelguide_domain::ReportStatus;

    fn result_payload(request_id: &str) -> Vec<u8> {
        let result = ReportResult {
            request_id: request_id.to_string(),
            items: vec![ResultItem {
                location: "Istanbul".to_string(),
                hotel_count: 3,
                contact_count: 5,
                status: ReportStatus::Completed,
                created_at: chrono::Utc::now(),
            }],
        };
        serde_json::to_vec(&result).unwrap()
    }

    #[test]
    fn matching_tag_yields_items() {
        let payload = result_payload("req-1");

        match match_result(&payload, "req-1") {
            ReplyMatch::Matched(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].location, "Istanbul");
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn foreign_tag_is_ignored_not_matched() {
        let payload = result_payload("req-other");

        match match_result(&payload, "req-1") {
            ReplyMatch::Mismatch(other) => assert_eq!(other, "req-other"),
            _ => panic!("expected a mismatch"),
        }
    }

    #[test]
    fn garbage_payload_is_malformed() {
        match match_result(b"not json", "req-1") {
            ReplyMatch::Malformed(_) => {}
            _ => panic!("expected malformed"),
        }
    }
}
