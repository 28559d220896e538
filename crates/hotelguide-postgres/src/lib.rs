pub mod client;
pub mod contact_repository;
pub mod report_store;

pub use client::{PostgresClient, PostgresSettings};
pub use contact_repository::PostgresContactRepository;
pub use report_store::PostgresReportStore;
