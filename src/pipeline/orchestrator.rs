use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::app::ports::{CompletionPort, GeocoderPort, RateLimiterPort, SearchPort};
use crate::config::{Config, PipelineSettings};
use crate::constants;
use crate::domain::{AiApisUsed, Candidate};
use crate::error::Result;
use crate::infra::chat_completion::ChatCompletionClient;
use crate::infra::http_client::build_client;
use crate::infra::nominatim::NominatimGeocoder;
use crate::infra::rate_limiter_adapter::RateLimiterAdapter;
use crate::infra::serper::SerperSearch;
use crate::observability::metrics;
use crate::rate_limiter::RateLimiter;

use super::steps::{ClassifyStep, EnrichStep, GeocodeStep, SearchStep, ValidateStep};

/// External collaborators of a pipeline run. Optional providers are skipped
/// (or replaced by a fallback) when their credential is absent.
#[derive(Clone)]
pub struct Providers {
    pub search: Option<Arc<dyn SearchPort>>,
    pub classifier: Option<Arc<dyn CompletionPort>>,
    pub enricher: Option<Arc<dyn CompletionPort>>,
    pub validator: Option<Arc<dyn CompletionPort>>,
    pub geocoder: Arc<dyn GeocoderPort>,
    pub geocode_limiter: Arc<dyn RateLimiterPort>,
}

impl Providers {
    /// Wire the real HTTP adapters from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(&config.settings.http)?;
        let urls = &config.settings.providers;
        let keys = &config.keys;

        let search = keys.search_key.clone().map(|key| {
            let search = SerperSearch::new(client.clone(), urls.search_url.clone(), key);
            Arc::new(search) as Arc<dyn SearchPort>
        });
        let chat = |provider: &'static str, url: &str, model: &str, key: &Option<String>| {
            key.clone().map(|key| {
                Arc::new(ChatCompletionClient::new(
                    provider,
                    client.clone(),
                    url.to_string(),
                    model.to_string(),
                    key,
                )) as Arc<dyn CompletionPort>
            })
        };
        let classifier = chat(
            constants::DEEPSEEK,
            &urls.classifier_url,
            &urls.classifier_model,
            &keys.classifier_key,
        );
        let enricher = chat(
            constants::MISTRAL,
            &urls.enricher_url,
            &urls.enricher_model,
            &keys.enricher_key,
        );
        let validator = chat(
            constants::PERPLEXITY,
            &urls.validator_url,
            &urls.validator_model,
            &keys.validator_key,
        );

        let throttle = config.settings.pipeline.geocode_throttle.limits();
        Ok(Self {
            search,
            classifier,
            enricher,
            validator,
            geocoder: Arc::new(NominatimGeocoder::new(client, urls.geocoder_url.clone())),
            geocode_limiter: Arc::new(RateLimiterAdapter(RateLimiter::new(throttle))),
        })
    }

    pub fn ai_apis_used(&self) -> AiApisUsed {
        AiApisUsed {
            serper: self.search.is_some(),
            deepseek: self.classifier.is_some(),
            mistral: self.enricher.is_some(),
            perplexity: self.validator.is_some(),
        }
    }
}

/// Outcome of one run: surviving candidates and the stages that actually ran.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub candidates: Vec<Candidate>,
    pub steps: Vec<String>,
}

/// Search, classify, enrich, validate, geocode. Only search can fail the run.
pub struct Pipeline {
    search: SearchStep,
    classify: ClassifyStep,
    enrich: EnrichStep,
    validate: ValidateStep,
    geocode: GeocodeStep,
    ai_apis_used: AiApisUsed,
}

impl Pipeline {
    pub fn new(providers: Providers, settings: &PipelineSettings) -> Self {
        let ai_apis_used = providers.ai_apis_used();
        Self {
            search: SearchStep::new(
                providers.search,
                settings.locale.clone(),
                settings.search_results,
            ),
            classify: ClassifyStep::new(providers.classifier),
            enrich: EnrichStep::new(providers.enricher),
            validate: ValidateStep::new(providers.validator, settings.validation_limit),
            geocode: GeocodeStep::new(
                providers.geocoder,
                providers.geocode_limiter,
                settings.country_code.clone(),
                settings.country_name.clone(),
            ),
            ai_apis_used,
        }
    }

    pub fn ai_apis_used(&self) -> AiApisUsed {
        self.ai_apis_used
    }

    pub async fn run(&self, search_term: &str, location: &str) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, search_term, location);
        let started = Instant::now();
        metrics::pipeline::run_started();

        let outcome = self.run_stages(search_term, location).instrument(span).await;
        metrics::pipeline::duration(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(run) => info!(
                %run_id,
                "🎉 Pipeline finished with {} candidates in {:.1}s",
                run.candidates.len(),
                started.elapsed().as_secs_f64()
            ),
            Err(e) => {
                metrics::pipeline::run_failed();
                error!(%run_id, "💥 Pipeline failed: {}", e);
            }
        }
        outcome
    }

    async fn run_stages(&self, search_term: &str, location: &str) -> Result<PipelineRun> {
        info!("🚀 Starting lead sourcing for '{}' in '{}'", search_term, location);
        let mut steps = Vec::with_capacity(5);

        let raw = self.search.run(search_term, location).await?;
        steps.push(self.search.step_name().to_string());

        let mut candidates = self.classify.run(raw, location).await;
        steps.push(self.classify.step_name().to_string());

        if self.enrich.is_configured() {
            candidates = self.enrich.run(candidates).await;
            steps.push(self.enrich.step_name().to_string());
        }

        if self.validate.is_configured() {
            candidates = self.validate.run(candidates).await;
            steps.push(self.validate.step_name().to_string());
        }

        candidates = self.geocode.run(candidates).await;
        steps.push(self.geocode.step_name().to_string());

        Ok(PipelineRun { candidates, steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_follows_credentials() {
        let mut config = Config::default();
        config.keys.search_key = Some("serper".to_string());
        config.keys.enricher_key = Some("mistral".to_string());

        let providers = Providers::from_config(&config).unwrap();
        assert_eq!(
            providers.ai_apis_used(),
            AiApisUsed {
                serper: true,
                deepseek: false,
                mistral: true,
                perplexity: false
            }
        );
    }
}
