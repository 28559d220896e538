use crate::client::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelguide_domain::{DomainError, DomainResult, Report, ReportStatus, ReportStore};
use tokio_postgres::Row;
use tracing::{debug, info};
use uuid::Uuid;

/// Transactional report persistence.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE reports (
///     id            UUID PRIMARY KEY,
///     request_id    TEXT NOT NULL,
///     location      TEXT NOT NULL,
///     hotel_count   INTEGER NOT NULL,
///     contact_count INTEGER NOT NULL,
///     status        TEXT NOT NULL,
///     created_at    TIMESTAMPTZ NOT NULL,
///     UNIQUE (request_id, location)
/// );
/// ```
///
/// The whole batch commits atomically. `ON CONFLICT DO NOTHING` on the
/// unique pair makes redelivery of the same request a no-op; the rows read
/// back inside the transaction are the durably stored ones either way, so
/// the reply built from them always reflects the first successful write.
#[derive(Clone)]
pub struct PostgresReportStore {
    client: PostgresClient,
}

impl PostgresReportStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportStore for PostgresReportStore {
    async fn save_batch(
        &self,
        request_id: &str,
        reports: Vec<Report>,
    ) -> DomainResult<Vec<Report>> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;

        let insert = tx
            .prepare(
                "INSERT INTO reports (id, request_id, location, hotel_count, contact_count, status, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (request_id, location) DO NOTHING",
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;

        for report in &reports {
            let hotel_count = to_db_count(report.hotel_count)?;
            let contact_count = to_db_count(report.contact_count)?;
            let status = report.status.as_str();

            tx.execute(
                &insert,
                &[
                    &report.id,
                    &report.request_id,
                    &report.location,
                    &hotel_count,
                    &contact_count,
                    &status,
                    &report.created_at,
                ],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;
        }

        let rows = tx
            .query(
                "SELECT id, request_id, location, hotel_count, contact_count, status, created_at
                 FROM reports
                 WHERE request_id = $1
                 ORDER BY created_at, location",
                &[&request_id],
            )
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::Store(e.to_string()))?;

        let stored = rows
            .into_iter()
            .map(row_to_report)
            .collect::<DomainResult<Vec<_>>>()?;

        info!(
            request_id = %request_id,
            report_count = stored.len(),
            "report batch committed"
        );

        Ok(stored)
    }
}

fn to_db_count(count: u32) -> DomainResult<i32> {
    i32::try_from(count).map_err(|_| DomainError::Store(format!("count {count} overflows storage")))
}

fn row_to_report(row: Row) -> DomainResult<Report> {
    let id: Uuid = row.get(0);
    let request_id: String = row.get(1);
    let location: String = row.get(2);
    let hotel_count: i32 = row.get(3);
    let contact_count: i32 = row.get(4);
    let status_text: String = row.get(5);
    let created_at: DateTime<Utc> = row.get(6);

    let status = ReportStatus::parse(&status_text)
        .ok_or_else(|| DomainError::Store(format!("unknown report status '{status_text}'")))?;

    debug!(report_id = %id, location = %location, "loaded report row");

    Ok(Report {
        id,
        request_id,
        location,
        hotel_count: hotel_count.max(0) as u32,
        contact_count: contact_count.max(0) as u32,
        status,
        created_at,
    })
}
