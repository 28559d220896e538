//! JSON message bodies exchanged over the broker. Field names are camelCase
//! on the wire; both services must agree on them exactly.

use crate::aggregate::AggregateItem;
use crate::report::{Report, ReportStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request published by the hotel service on the request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub request_id: String,
    pub reply_to: String,
    pub items: Vec<AggregateItem>,
}

/// Reply published by the report service to the request's reply destination
/// once the whole batch is durably stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    pub request_id: String,
    pub items: Vec<ResultItem>,
}

/// Public fields of one persisted report, as seen by the requesting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub location: String,
    pub hotel_count: u32,
    pub contact_count: u32,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for ResultItem {
    fn from(report: &Report) -> Self {
        ResultItem {
            location: report.location.clone(),
            hotel_count: report.hotel_count,
            contact_count: report.contact_count,
            status: report.status,
            created_at: report.created_at,
        }
    }
}
