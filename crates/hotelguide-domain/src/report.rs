use crate::aggregate::AggregateItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a persisted report. Reports are immutable once
/// `Completed`; the pipeline only ever writes `Completed` rows today, the
/// other states exist for operator-written rows and forward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    Completed,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::Completed => "Completed",
            ReportStatus::Failed => "Failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(ReportStatus::Pending),
            "Completed" => Some(ReportStatus::Completed),
            "Failed" => Some(ReportStatus::Failed),
            _ => None,
        }
    }
}

/// Persisted report record. One row per aggregate item in a request;
/// `(request_id, location)` is unique so redelivered requests cannot
/// duplicate rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: Uuid,
    pub request_id: String,
    pub location: String,
    pub hotel_count: u32,
    pub contact_count: u32,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

impl Report {
    /// Build a completed report for one aggregate item. The id and
    /// timestamp are assigned here, at persistence time.
    pub fn completed(request_id: &str, item: &AggregateItem) -> Self {
        Report {
            id: Uuid::new_v4(),
            request_id: request_id.to_string(),
            location: item.location.clone(),
            hotel_count: item.hotel_count,
            contact_count: item.contact_count,
            status: ReportStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::Completed,
            ReportStatus::Failed,
        ] {
            assert_eq!(ReportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReportStatus::parse("Unknown"), None);
    }

    #[test]
    fn completed_report_copies_item_fields() {
        let item = AggregateItem {
            location: "Istanbul".to_string(),
            hotel_count: 3,
            contact_count: 5,
        };

        let report = Report::completed("req-1", &item);

        assert_eq!(report.request_id, "req-1");
        assert_eq!(report.location, "Istanbul");
        assert_eq!(report.hotel_count, 3);
        assert_eq!(report.contact_count, 5);
        assert_eq!(report.status, ReportStatus::Completed);
    }

    #[test]
    fn report_ids_are_never_reused() {
        let item = AggregateItem {
            location: "Ankara".to_string(),
            hotel_count: 1,
            contact_count: 1,
        };

        let a = Report::completed("req-1", &item);
        let b = Report::completed("req-1", &item);

        assert_ne!(a.id, b.id);
    }
}
