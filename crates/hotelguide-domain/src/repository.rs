//! Trait seams between the domain and the broker/storage infrastructure.
//! Concrete implementations live in hotelguide-amqp and hotelguide-postgres.

use crate::aggregate::ContactRecord;
use crate::error::DomainResult;
use crate::report::Report;
use crate::wire::{ReportRequest, ResultItem};
use async_trait::async_trait;
use std::time::Duration;

/// Read-only view of the hotel service's contact data. One call must be one
/// consistent read; the snapshot never mixes two states of the table.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn list_contacts(&self) -> DomainResult<Vec<ContactRecord>>;
}

/// Durable persistence for report rows, owned exclusively by the report
/// processor. `save_batch` is atomic over the batch and idempotent on the
/// `(request_id, location)` pair; it returns the rows that are durably
/// stored for the request, whether written now or by an earlier delivery.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_batch(
        &self,
        request_id: &str,
        reports: Vec<Report>,
    ) -> DomainResult<Vec<Report>>;
}

/// Publishes a report request through the exchange. Returns only after the
/// broker has accepted the message (publisher confirm).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RequestPublisher: Send + Sync {
    async fn publish_request(&self, request: &ReportRequest) -> DomainResult<()>;
}

/// A live subscription for one request's reply. Created before the request
/// is published so no result can arrive unobserved.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplyWaiter: Send + Sync {
    /// Routing key the report service must publish the result to.
    fn reply_to(&self) -> &str;

    /// Block until the matching result arrives or the timeout elapses. The
    /// subscription is torn down either way.
    async fn await_result(&mut self, timeout: Duration) -> DomainResult<Vec<ResultItem>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplyWaiterFactory: Send + Sync {
    async fn subscribe(&self, request_id: &str) -> DomainResult<Box<dyn ReplyWaiter>>;
}
