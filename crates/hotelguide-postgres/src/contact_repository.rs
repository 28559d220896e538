use crate::client::PostgresClient;
use async_trait::async_trait;
use hotelguide_domain::{ContactRecord, ContactRepository, DomainError, DomainResult};
use tracing::debug;

/// Read-only view over the hotel service's `contacts` table. The snapshot
/// comes from a single SELECT so the counts never mix two states of the
/// data; grouping happens in the domain to keep first-seen ordering exact.
#[derive(Clone)]
pub struct PostgresContactRepository {
    client: PostgresClient,
}

impl PostgresContactRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContactRepository for PostgresContactRepository {
    async fn list_contacts(&self) -> DomainResult<Vec<ContactRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::Repository)?;

        let rows = conn
            .query(
                "SELECT location, hotel_id
                 FROM contacts
                 ORDER BY created_at, id",
                &[],
            )
            .await
            .map_err(|e| DomainError::Repository(e.into()))?;

        let contacts = rows
            .into_iter()
            .map(|row| ContactRecord {
                location: row.get(0),
                hotel_id: row.get(1),
            })
            .collect::<Vec<_>>();

        debug!(contact_count = contacts.len(), "listed contacts for snapshot");

        Ok(contacts)
    }
}
