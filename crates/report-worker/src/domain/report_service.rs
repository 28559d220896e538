use hotelguide_domain::{
    DomainResult, Report, ReportRequest, ReportResult, ReportStore, ResultItem,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What the worker should do with the message that produced this outcome.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Batch is durably stored; ack the message, then publish the result to
    /// the request's reply destination.
    Completed {
        reply_to: String,
        result: ReportResult,
    },
    /// Undeserializable request. Retrying can never make it valid, so the
    /// message is acknowledged and dropped; this is the one intentional
    /// loss path.
    Discarded { reason: String },
}

/// Per-message processing for the report pipeline: deserialize the request,
/// turn every aggregate item into a completed report, persist the whole
/// batch atomically and build the reply from the rows the store actually
/// holds. Store failures propagate so the worker leaves the message for
/// redelivery.
pub struct ReportService {
    store: Arc<dyn ReportStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(payload_size = payload.len()))]
    pub async fn process_request(&self, payload: &[u8]) -> DomainResult<ProcessOutcome> {
        let request: ReportRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                return Ok(ProcessOutcome::Discarded {
                    reason: e.to_string(),
                })
            }
        };

        debug!(
            request_id = %request.request_id,
            reply_to = %request.reply_to,
            item_count = request.items.len(),
            "processing report request"
        );

        let reports: Vec<Report> = request
            .items
            .iter()
            .map(|item| Report::completed(&request.request_id, item))
            .collect();

        // Atomic over the batch and idempotent on (request_id, location); a
        // redelivered request replies with the originally stored rows.
        let stored = self
            .store
            .save_batch(&request.request_id, reports)
            .await?;

        let result = ReportResult {
            request_id: request.request_id.clone(),
            items: stored.iter().map(ResultItem::from).collect(),
        };

        info!(
            request_id = %request.request_id,
            report_count = result.items.len(),
            "report batch persisted"
        );

        Ok(ProcessOutcome::Completed {
            reply_to: request.reply_to,
            result,
        })
    }
}
