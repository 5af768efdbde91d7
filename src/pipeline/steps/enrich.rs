use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::app::ports::CompletionPort;
use crate::constants;
use crate::domain::Candidate;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::json_extract::parse_first_object;

/// Second-opinion enrichment: better description, service tags, price bucket
/// and a quality score folded into the confidence.
pub struct EnrichStep {
    enricher: Option<Arc<dyn CompletionPort>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnrichmentReply {
    #[serde(default)]
    pub enhanced_description: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

impl EnrichmentReply {
    /// True when none of the expected fields came back.
    pub fn is_empty(&self) -> bool {
        self.enhanced_description.is_none()
            && self.services.is_empty()
            && self.specialties.is_empty()
            && self.price_range.is_none()
            && self.quality_score.is_none()
    }
}

impl EnrichStep {
    pub fn new(enricher: Option<Arc<dyn CompletionPort>>) -> Self {
        Self { enricher }
    }

    pub fn is_configured(&self) -> bool {
        self.enricher.is_some()
    }

    pub fn step_name(&self) -> &'static str {
        constants::STEP_ENRICHMENT
    }

    /// Enrich each candidate; failures pass the candidate through untouched.
    #[instrument(skip(self, candidates), fields(input = candidates.len()))]
    pub async fn run(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let Some(enricher) = &self.enricher else {
            return candidates;
        };

        let input = candidates.len();
        let mut enriched = Vec::with_capacity(input);
        let mut improved = 0usize;
        for candidate in candidates {
            match request_enrichment(enricher.as_ref(), &candidate).await {
                Ok(reply) => {
                    improved += 1;
                    enriched.push(apply_enrichment(candidate, reply));
                }
                Err(e) => {
                    warn!("Enrichment failed for '{}': {}", candidate.name, e);
                    metrics::provider::error(enricher.provider());
                    enriched.push(candidate);
                }
            }
        }

        info!("✨ Enrichment improved {}/{} candidates", improved, input);
        metrics::stage::items(self.step_name(), input, enriched.len());
        enriched
    }
}

async fn request_enrichment(
    enricher: &dyn CompletionPort,
    candidate: &Candidate,
) -> Result<EnrichmentReply> {
    let reply = enricher.complete(&enrichment_prompt(candidate)).await?;
    let parsed: EnrichmentReply = parse_first_object(&reply)?;
    if parsed.is_empty() {
        return Err(PipelineError::Parse(
            "enrichment reply has none of the expected fields".to_string(),
        ));
    }
    Ok(parsed)
}

fn enrichment_prompt(candidate: &Candidate) -> String {
    format!(
        "Tu es un expert du marché de la réparation de smartphones en France.\n\
         Améliore la fiche de ce réparateur :\n\
         Nom : {name}\n\
         Adresse : {address}, {postal_code} {city}\n\
         Site : {website}\n\
         Description actuelle : {description}\n\n\
         Réponds uniquement avec un objet JSON :\n\
         {{\"enhanced_description\": \"description commerciale en 2 phrases\", \
         \"services\": [\"réparation écran\", \"...\"], \
         \"specialties\": [\"Apple\", \"...\"], \
         \"price_range\": \"€ | €€ | €€€\", \
         \"quality_score\": 0}}\n\
         quality_score est une note de 0 à 10.",
        name = candidate.name,
        address = candidate.address,
        postal_code = candidate.postal_code,
        city = candidate.city,
        website = candidate.website.as_deref().unwrap_or("inconnu"),
        description = candidate.description.as_deref().unwrap_or("aucune"),
    )
}

/// Fold an enrichment reply into a candidate.
///
/// Confidence grows by `quality_score / 20` (quality clamped to 0..=10, so the
/// bonus is 0..=0.5), capped at 1.0.
pub fn apply_enrichment(mut candidate: Candidate, reply: EnrichmentReply) -> Candidate {
    let quality = match reply.quality_score {
        Some(q) if q.is_finite() => q.clamp(0.0, 10.0),
        _ => 0.0,
    };
    candidate.confidence_score = (candidate.confidence_score + quality / 20.0).min(1.0);

    if let Some(description) = reply.enhanced_description.map(|d| d.trim().to_string()) {
        if !description.is_empty() {
            candidate.description = Some(description);
        }
    }

    for tag in reply.services.into_iter().chain(reply.specialties) {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !candidate.services.contains(&tag) {
            candidate.services.push(tag);
        }
    }

    if let Some(price_range) = reply.price_range.map(|p| p.trim().to_string()) {
        if !price_range.is_empty() {
            candidate.price_range = Some(price_range);
        }
    }

    candidate.ai_enriched = true;
    candidate.source = constants::SOURCE_MULTI_AI.to_string();
    candidate
}
