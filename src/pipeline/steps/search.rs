use std::sync::Arc;
use tracing::{info, instrument};

use crate::app::ports::{SearchPort, SearchQuery};
use crate::constants;
use crate::domain::RawSearchResult;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;

/// Web search: the only stage without a fallback.
pub struct SearchStep {
    provider: Option<Arc<dyn SearchPort>>,
    locale: String,
    num: u32,
}

impl SearchStep {
    pub fn new(provider: Option<Arc<dyn SearchPort>>, locale: String, num: u32) -> Self {
        Self {
            provider,
            locale,
            num,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn step_name(&self) -> &'static str {
        constants::STEP_SEARCH
    }

    /// Run the search. Any failure here aborts the pipeline.
    #[instrument(skip(self))]
    pub async fn run(&self, search_term: &str, location: &str) -> Result<Vec<RawSearchResult>> {
        let query = SearchQuery {
            q: build_query(search_term, location)?,
            locale: self.locale.clone(),
            num: self.num,
        };
        let provider = self
            .provider
            .as_ref()
            .ok_or(PipelineError::MissingCredential(constants::SERPER_API_KEY_ENV))?;

        let results = provider.search(&query).await.map_err(|e| {
            metrics::provider::error(constants::SERPER);
            e
        })?;
        info!("🔎 Search returned {} raw results", results.len());
        metrics::stage::items(self.step_name(), 1, results.len());
        Ok(results)
    }
}

/// Combine search term and location, rejecting blank inputs.
pub fn build_query(search_term: &str, location: &str) -> Result<String> {
    let term = search_term.trim();
    let location = location.trim();
    if term.is_empty() {
        return Err(PipelineError::InvalidRequest("searchTerm must not be empty".to_string()));
    }
    if location.is_empty() {
        return Err(PipelineError::InvalidRequest("location must not be empty".to_string()));
    }
    Ok(format!("{} {}", term, location))
}
