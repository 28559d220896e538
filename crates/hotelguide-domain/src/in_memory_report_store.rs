use crate::error::DomainResult;
use crate::report::Report;
use crate::repository::ReportStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory ReportStore for tests and local runs. Mirrors the Postgres
/// store's semantics: the whole batch lands atomically, duplicates on
/// `(request_id, location)` are dropped, and the returned rows are whatever
/// is durably held for the request.
#[derive(Default)]
pub struct InMemoryReportStore {
    // insertion-ordered so returned batches are reproducible
    reports: Mutex<Vec<Report>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all_reports(&self) -> Vec<Report> {
        self.reports.lock().await.clone()
    }

    pub async fn reports_for_request(&self, request_id: &str) -> Vec<Report> {
        self.reports
            .lock()
            .await
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save_batch(
        &self,
        request_id: &str,
        reports: Vec<Report>,
    ) -> DomainResult<Vec<Report>> {
        let mut stored = self.reports.lock().await;

        let mut existing: HashMap<String, ()> = stored
            .iter()
            .filter(|r| r.request_id == request_id)
            .map(|r| (r.location.clone(), ()))
            .collect();

        let mut inserted = 0usize;
        for report in reports {
            if existing.contains_key(&report.location) {
                continue;
            }
            existing.insert(report.location.clone(), ());
            stored.push(report);
            inserted += 1;
        }

        debug!(request_id = %request_id, inserted, "saved report batch in memory");

        Ok(stored
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }
}
