use crate::aggregate::aggregate_contacts;
use crate::error::DomainResult;
use crate::repository::{ContactRepository, ReplyWaiterFactory, RequestPublisher};
use crate::wire::{ReportRequest, ResultItem};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Request-side orchestration for one report round trip.
///
/// Flow:
/// 1. Read contacts once and compute the aggregate snapshot
/// 2. Subscribe for the reply (before publishing, so nothing can be missed)
/// 3. Publish the request with a fresh correlation id
/// 4. Block on the reply up to the configured timeout
pub struct ReportRequestService {
    contact_repository: Arc<dyn ContactRepository>,
    request_publisher: Arc<dyn RequestPublisher>,
    reply_waiters: Arc<dyn ReplyWaiterFactory>,
    reply_timeout: Duration,
}

impl ReportRequestService {
    pub fn new(
        contact_repository: Arc<dyn ContactRepository>,
        request_publisher: Arc<dyn RequestPublisher>,
        reply_waiters: Arc<dyn ReplyWaiterFactory>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            contact_repository,
            request_publisher,
            reply_waiters,
            reply_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn generate_report(&self) -> DomainResult<Vec<ResultItem>> {
        let contacts = self.contact_repository.list_contacts().await?;
        let items = aggregate_contacts(&contacts);
        let request_id = Uuid::new_v4().to_string();

        debug!(
            request_id = %request_id,
            location_count = items.len(),
            contact_count = contacts.len(),
            "computed aggregate snapshot"
        );

        // Subscribe-before-publish: the reply destination must exist and be
        // consumed from before the request is on the wire.
        let mut waiter = self.reply_waiters.subscribe(&request_id).await?;

        let request = ReportRequest {
            request_id: request_id.clone(),
            reply_to: waiter.reply_to().to_string(),
            items,
        };
        self.request_publisher.publish_request(&request).await?;

        let results = waiter.await_result(self.reply_timeout).await?;

        info!(
            request_id = %request_id,
            result_count = results.len(),
            "report round trip completed"
        );

        Ok(results)
    }
}
