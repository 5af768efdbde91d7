use std::sync::Arc;
use tracing::info;

use crate::domain::{PipelineMetadata, PipelineRequest, PipelineResponse};
use crate::error::Result;
use crate::pipeline::{persist_candidates, Pipeline};
use crate::storage::RecordStore;

/// Runs the pipeline for one request and persists the outcome unless the
/// request is a dry run.
pub struct LeadSourcingUseCase {
    pipeline: Pipeline,
    store: Arc<dyn RecordStore>,
}

impl LeadSourcingUseCase {
    pub fn new(pipeline: Pipeline, store: Arc<dyn RecordStore>) -> Self {
        Self { pipeline, store }
    }

    pub async fn execute(&self, request: PipelineRequest) -> Result<PipelineResponse> {
        let run = self
            .pipeline
            .run(&request.search_term, &request.location)
            .await?;

        if request.test_mode {
            info!("🧪 Test mode: skipping persistence of {} candidates", run.candidates.len());
        } else {
            persist_candidates(self.store.as_ref(), &run.candidates).await;
        }

        Ok(PipelineResponse {
            success: true,
            metadata: PipelineMetadata {
                pipeline_steps: run.steps,
                total_results: run.candidates.len(),
                test_mode: request.test_mode,
                ai_apis_used: self.pipeline.ai_apis_used(),
            },
            results: run.candidates,
        })
    }
}
