use chrono::Utc;
use tracing::{error, info};

use crate::domain::Candidate;
use crate::observability::metrics;
use crate::storage::{RecordStore, RepairerRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub written: usize,
    pub failed: usize,
}

/// Upsert every candidate, one at a time. A failed write is logged and
/// skipped; it never fails the run.
pub async fn persist_candidates(
    store: &dyn RecordStore,
    candidates: &[Candidate],
) -> PersistSummary {
    let scraped_at = Utc::now();
    let mut summary = PersistSummary::default();

    for candidate in candidates {
        let record = RepairerRecord::from_candidate(candidate, scraped_at);
        match store.upsert(&record).await {
            Ok(()) => summary.written += 1,
            Err(e) => {
                error!(
                    name = %candidate.name,
                    postal_code = %candidate.postal_code,
                    "Failed to persist record: {}",
                    e
                );
                metrics::store::failed();
                summary.failed += 1;
            }
        }
    }

    metrics::store::persisted(summary.written);
    info!("💾 Persisted {} records ({} failed)", summary.written, summary.failed);
    summary
}
