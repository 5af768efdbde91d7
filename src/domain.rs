use serde::{Deserialize, Serialize};

use crate::constants;

/// One organic result as returned by the search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

impl RawSearchResult {
    /// Title and snippet joined, as fed to the classifiers.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.snippet)
    }
}

/// A prospective repair business, progressively enriched across stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default = "unknown_postal_code")]
    pub postal_code: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    #[serde(default)]
    pub ai_enriched: bool,
    #[serde(default)]
    pub source: String,
}

fn unknown_postal_code() -> String {
    constants::UNKNOWN_POSTAL_CODE.to_string()
}

fn default_confidence() -> f64 {
    constants::DEFAULT_CONFIDENCE
}

impl Candidate {
    pub fn new(name: impl Into<String>, source: &str) -> Self {
        Self {
            name: name.into(),
            address: String::new(),
            city: String::new(),
            postal_code: unknown_postal_code(),
            phone: None,
            email: None,
            website: None,
            description: None,
            services: Vec::new(),
            price_range: None,
            lat: None,
            lng: None,
            confidence_score: constants::DEFAULT_CONFIDENCE,
            ai_enriched: false,
            source: source.to_string(),
        }
    }

    pub fn has_known_postal_code(&self) -> bool {
        !self.postal_code.is_empty() && self.postal_code != constants::UNKNOWN_POSTAL_CODE
    }

    pub fn is_geocoded(&self) -> bool {
        self.lat.is_some() && self.lng.is_some()
    }
}

/// Body accepted by the pipeline endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    pub search_term: String,
    pub location: String,
    #[serde(default)]
    pub test_mode: bool,
}

/// Which providers were configured for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiApisUsed {
    pub serper: bool,
    pub deepseek: bool,
    pub mistral: bool,
    pub perplexity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub pipeline_steps: Vec<String>,
    pub total_results: usize,
    pub test_mode: bool,
    pub ai_apis_used: AiApisUsed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub success: bool,
    pub results: Vec<Candidate>,
    pub metadata: PipelineMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub details: String,
}
