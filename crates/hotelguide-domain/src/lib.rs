pub mod aggregate;
pub mod error;
pub mod in_memory_report_store;
pub mod report;
pub mod report_request_service;
pub mod repository;
pub mod wire;

pub use aggregate::{aggregate_contacts, AggregateItem, ContactRecord};
pub use error::{DomainError, DomainResult};
pub use in_memory_report_store::InMemoryReportStore;
pub use report::{Report, ReportStatus};
pub use report_request_service::ReportRequestService;
pub use repository::{
    ContactRepository, ReplyWaiter, ReplyWaiterFactory, ReportStore, RequestPublisher,
};
pub use wire::{ReportRequest, ReportResult, ResultItem};

#[cfg(any(test, feature = "testing"))]
pub use repository::{
    MockContactRepository, MockReplyWaiter, MockReplyWaiterFactory, MockReportStore,
    MockRequestPublisher,
};
