use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Broker topology conflict: {0}")]
    Topology(String),

    #[error("Publish rejected by broker: {0}")]
    Publish(String),

    #[error("No result for request {request_id} within {waited:?}")]
    Timeout { request_id: String, waited: Duration },

    #[error("Report store failure: {0}")]
    Store(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl DomainError {
    /// Store errors are the only retryable-by-redelivery failures; the
    /// worker nacks the triggering message instead of acking it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Store(_))
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
