pub mod amqp;
pub mod domain;
pub mod report_worker;

pub use domain::{ProcessOutcome, ReportService};
pub use report_worker::{ReportWorker, ReportWorkerConfig};
