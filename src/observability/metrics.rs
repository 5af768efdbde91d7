//! Metrics for the lead-sourcing pipeline.
//!
//! Names follow Prometheus conventions and are kept in one enum so call sites
//! never spell metric strings by hand.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PipelineRuns,
    PipelineFailures,
    PipelineDuration,
    StageInput,
    StageOutput,
    ProviderErrors,
    ClassificationRejected,
    ValidationDiscarded,
    GeocodeHits,
    GeocodeMisses,
    RecordsPersisted,
    RecordsFailed,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRuns => "repair_leads_pipeline_runs_total",
            MetricName::PipelineFailures => "repair_leads_pipeline_failures_total",
            MetricName::PipelineDuration => "repair_leads_pipeline_duration_seconds",
            MetricName::StageInput => "repair_leads_stage_input_items_total",
            MetricName::StageOutput => "repair_leads_stage_output_items_total",
            MetricName::ProviderErrors => "repair_leads_provider_errors_total",
            MetricName::ClassificationRejected => "repair_leads_classification_rejected_total",
            MetricName::ValidationDiscarded => "repair_leads_validation_discarded_total",
            MetricName::GeocodeHits => "repair_leads_geocode_hits_total",
            MetricName::GeocodeMisses => "repair_leads_geocode_misses_total",
            MetricName::RecordsPersisted => "repair_leads_records_persisted_total",
            MetricName::RecordsFailed => "repair_leads_records_failed_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            METRICS_HANDLE.set(handle).ok();
            info!("Metrics recorder installed");
        }
        Err(e) => warn!("Metrics recorder not installed: {}", e),
    }
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn run_failed() {
        ::metrics::counter!(MetricName::PipelineFailures.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }
}

pub mod stage {
    use super::MetricName;

    /// Record how many items entered and left a stage.
    pub fn items(stage: &'static str, input: usize, output: usize) {
        ::metrics::counter!(MetricName::StageInput.as_str(), "stage" => stage)
            .increment(input as u64);
        ::metrics::counter!(MetricName::StageOutput.as_str(), "stage" => stage)
            .increment(output as u64);
    }

    pub fn classification_rejected() {
        ::metrics::counter!(MetricName::ClassificationRejected.as_str()).increment(1);
    }

    pub fn validation_discarded() {
        ::metrics::counter!(MetricName::ValidationDiscarded.as_str()).increment(1);
    }
}

pub mod provider {
    use super::MetricName;

    pub fn error(provider: &'static str) {
        ::metrics::counter!(MetricName::ProviderErrors.as_str(), "provider" => provider)
            .increment(1);
    }
}

pub mod geocode {
    use super::MetricName;

    pub fn hit() {
        ::metrics::counter!(MetricName::GeocodeHits.as_str()).increment(1);
    }

    pub fn miss() {
        ::metrics::counter!(MetricName::GeocodeMisses.as_str()).increment(1);
    }
}

pub mod store {
    use super::MetricName;

    pub fn persisted(count: usize) {
        ::metrics::counter!(MetricName::RecordsPersisted.as_str()).increment(count as u64);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::RecordsFailed.as_str()).increment(1);
    }
}
