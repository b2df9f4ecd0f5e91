//! Best-effort token usage recording.

use crate::models::UsageRecord;
use crate::services::MongoDb;

#[derive(Clone)]
pub struct UsageTracker {
    db: MongoDb,
}

impl UsageTracker {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    /// Record token usage out-of-band. Failures are logged and swallowed;
    /// accounting must never block or fail the pipeline.
    pub async fn record(&self, record: UsageRecord) {
        metrics::counter!("ai_tokens_total", "operation" => record.operation.clone())
            .increment(record.total_tokens as u64);

        if let Err(e) = self.db.usage_records().insert_one(&record, None).await {
            tracing::warn!(
                request_id = %record.request_id,
                error = %e,
                "Failed to record token usage"
            );
        }
    }
}
