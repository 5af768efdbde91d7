use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::CompletionPort;
use crate::constants;
use crate::domain::{Candidate, RawSearchResult};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::json_extract::parse_first_object;

static POSTAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{5})\b").expect("valid regex"));
static EXCLUDED_RE: Lazy<Regex> = Lazy::new(|| {
    let terms: Vec<String> = constants::EXCLUDED_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect();
    Regex::new(&format!(r"\b(?:{})\b", terms.join("|"))).expect("valid regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+33\s?|\b0)[1-9](?:[\s.\-]?\d{2}){4}\b").expect("valid regex"));

/// Decides which raw results describe a device repair business.
pub struct ClassifyStep {
    classifier: Option<Arc<dyn CompletionPort>>,
}

/// Shape the classifier is asked to reply with.
#[derive(Debug, Deserialize)]
struct ClassificationReply {
    #[serde(rename = "isRepairer", default)]
    is_repairer: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    confidence: f64,
}

impl ClassifyStep {
    pub fn new(classifier: Option<Arc<dyn CompletionPort>>) -> Self {
        Self { classifier }
    }

    pub fn uses_ai(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn step_name(&self) -> &'static str {
        if self.uses_ai() {
            constants::STEP_AI_CLASSIFICATION
        } else {
            constants::STEP_BASIC_CLASSIFICATION
        }
    }

    /// Classify every result in order. Rejected or failed items are dropped;
    /// the output never holds more items than the input.
    #[instrument(skip(self, results), fields(input = results.len(), ai = self.uses_ai()))]
    pub async fn run(&self, results: Vec<RawSearchResult>, location: &str) -> Vec<Candidate> {
        let input = results.len();
        let mut candidates = Vec::with_capacity(input);

        for (i, result) in results.iter().enumerate() {
            let outcome = match &self.classifier {
                Some(classifier) => {
                    match classify_with_ai(classifier.as_ref(), result, location).await {
                        Ok(candidate) => candidate,
                        Err(e) => {
                            warn!(
                                "Classification failed for result {} ({}): {}",
                                i, result.link, e
                            );
                            metrics::provider::error(classifier.provider());
                            continue;
                        }
                    }
                }
                None => classify_by_keywords(result, location),
            };

            match outcome {
                Some(candidate) => {
                    debug!(
                        "Accepted '{}' (confidence {:.2})",
                        candidate.name, candidate.confidence_score
                    );
                    candidates.push(candidate);
                }
                None => metrics::stage::classification_rejected(),
            }
        }

        info!("🧠 Classification kept {}/{} results", candidates.len(), input);
        metrics::stage::items(self.step_name(), input, candidates.len());
        candidates
    }
}

async fn classify_with_ai(
    classifier: &dyn CompletionPort,
    result: &RawSearchResult,
    location: &str,
) -> Result<Option<Candidate>> {
    let reply = classifier.complete(&classification_prompt(result, location)).await?;
    let parsed: ClassificationReply = parse_first_object(&reply)?;
    Ok(candidate_from_reply(parsed, result, location))
}

fn classification_prompt(result: &RawSearchResult, location: &str) -> String {
    format!(
        "Analyse ce résultat de recherche et détermine s'il s'agit d'un réparateur \
         de smartphones, tablettes ou ordinateurs situé à {location}.\n\
         Titre : {title}\n\
         Description : {snippet}\n\
         Lien : {link}\n\n\
         Réponds uniquement avec un objet JSON de la forme :\n\
         {{\"isRepairer\": true, \"name\": \"\", \"address\": \"\", \"city\": \"\", \
         \"postal_code\": \"\", \"phone\": \"\", \"email\": \"\", \"website\": \"\", \
         \"confidence\": 0.0}}\n\
         confidence est un nombre entre 0 et 1.",
        location = location,
        title = result.title,
        snippet = result.snippet,
        link = result.link,
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Apply the relevance gate to a classifier reply.
fn candidate_from_reply(
    reply: ClassificationReply,
    result: &RawSearchResult,
    location: &str,
) -> Option<Candidate> {
    if !reply.is_repairer || !(reply.confidence > constants::AI_CONFIDENCE_GATE) {
        return None;
    }
    let name = non_empty(reply.name).or_else(|| non_empty(Some(business_name(&result.title))))?;

    let mut candidate = Candidate::new(name, constants::SOURCE_AI_CLASSIFICATION);
    candidate.address = non_empty(reply.address).unwrap_or_default();
    candidate.city = non_empty(reply.city).unwrap_or_else(|| location.trim().to_string());
    candidate.postal_code =
        non_empty(reply.postal_code).unwrap_or_else(|| constants::UNKNOWN_POSTAL_CODE.to_string());
    candidate.phone = non_empty(reply.phone);
    candidate.email = non_empty(reply.email);
    candidate.website = non_empty(reply.website).or_else(|| non_empty(Some(result.link.clone())));
    candidate.description = non_empty(Some(result.snippet.clone()));
    candidate.confidence_score = reply.confidence.min(1.0);
    candidate.ai_enriched = true;
    Some(candidate)
}

/// Keyword fallback used when no classifier is configured.
pub fn classify_by_keywords(result: &RawSearchResult, location: &str) -> Option<Candidate> {
    let text = result.text();
    let lowered = text.to_lowercase();

    let relevant = constants::REPAIR_KEYWORDS.iter().any(|k| lowered.contains(k));
    let excluded = EXCLUDED_RE.is_match(&lowered);
    if !relevant || excluded {
        return None;
    }

    let name = business_name(&result.title);
    if name.is_empty() {
        return None;
    }

    let mut candidate = Candidate::new(name, constants::SOURCE_BASIC_CLASSIFICATION);
    candidate.city = location.trim().to_string();
    if let Some(code) = POSTAL_CODE_RE.captures(&text).and_then(|c| c.get(1)) {
        candidate.postal_code = code.as_str().to_string();
    }
    candidate.phone = PHONE_RE.find(&text).map(|m| m.as_str().to_string());
    candidate.website = non_empty(Some(result.link.clone()));
    candidate.description = non_empty(Some(result.snippet.clone()));
    candidate.confidence_score = constants::BASIC_CLASSIFICATION_CONFIDENCE;
    candidate.ai_enriched = false;
    Some(candidate)
}

/// Business name from a result title: the part before the first separator.
fn business_name(title: &str) -> String {
    let cut = [" - ", " | ", " – ", " — "]
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    title[..cut].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;

    fn raw(title: &str, snippet: &str) -> RawSearchResult {
        RawSearchResult {
            title: title.to_string(),
            snippet: snippet.to_string(),
            link: format!("https://example.fr/{}", title.len()),
        }
    }

    /// Replies from a fixed script, one per call, in order.
    struct ScriptedClassifier {
        replies: std::sync::Mutex<Vec<Result<String>>>,
    }

    impl ScriptedClassifier {
        fn new(replies: Vec<Result<String>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self { replies: std::sync::Mutex::new(replies) }
        }
    }

    #[async_trait]
    impl CompletionPort for ScriptedClassifier {
        fn provider(&self) -> &'static str {
            constants::DEEPSEEK
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    #[test]
    fn test_business_name_cuts_at_separator() {
        assert_eq!(business_name("Phone Doctor - Réparation iPhone Lyon"), "Phone Doctor");
        assert_eq!(business_name("Repar'Phone | Lyon 3"), "Repar'Phone");
        assert_eq!(business_name("Simple"), "Simple");
    }

    #[test]
    fn test_keywords_accept_repairer_with_fixed_confidence() {
        let result = raw(
            "Phone Doctor - Réparation smartphone",
            "Réparation écran iPhone, 12 rue Mercière 69002 Lyon. Tél 04 78 00 00 00",
        );
        let candidate = classify_by_keywords(&result, "Lyon").unwrap();
        assert_eq!(candidate.name, "Phone Doctor");
        assert_eq!(candidate.confidence_score, 0.7);
        assert!(!candidate.ai_enriched);
        assert_eq!(candidate.source, constants::SOURCE_BASIC_CLASSIFICATION);
        assert_eq!(candidate.postal_code, "69002");
        assert_eq!(candidate.phone.as_deref(), Some("04 78 00 00 00"));
        assert_eq!(candidate.city, "Lyon");
    }

    #[test]
    fn test_keywords_reject_operators_and_irrelevant() {
        let operator = raw("Boutique Orange Lyon", "Réparation téléphone et forfaits");
        assert!(classify_by_keywords(&operator, "Lyon").is_none());
        let plan = raw("SFR Lyon Part-Dieu", "Réparation smartphone et forfait mobile");
        assert!(classify_by_keywords(&plan, "Lyon").is_none());
        let bakery = raw("Boulangerie Paul", "Pain et viennoiseries");
        assert!(classify_by_keywords(&bakery, "Lyon").is_none());
    }

    #[test]
    fn test_exclusions_match_whole_words_only() {
        let flat_rate = raw(
            "Atelier Mobile Lyon - Réparation smartphone",
            "Réparation écran iPhone à prix forfaitaire, 69003 Lyon",
        );
        let candidate = classify_by_keywords(&flat_rate, "Lyon").unwrap();
        assert_eq!(candidate.name, "Atelier Mobile Lyon");
        assert_eq!(candidate.postal_code, "69003");

        let orange_city = raw(
            "Phone Fix Orange - Réparation iPhone",
            "Réparateur smartphone, 84100 Orange",
        );
        let candidate = classify_by_keywords(&orange_city, "Orange").unwrap();
        assert_eq!(candidate.name, "Phone Fix Orange");
        assert_eq!(candidate.postal_code, "84100");
    }

    #[test]
    fn test_keywords_default_postal_code_sentinel() {
        let result = raw("iFix", "Réparation iPhone rapide");
        let candidate = classify_by_keywords(&result, "Lyon").unwrap();
        assert_eq!(candidate.postal_code, constants::UNKNOWN_POSTAL_CODE);
        assert!(candidate.phone.is_none());
    }

    #[test]
    fn test_reply_gate_requires_flag_and_confidence_above_half() {
        let result = raw("Phone Doctor", "Réparation");
        let reply = |is_repairer: bool, confidence: f64| ClassificationReply {
            is_repairer,
            name: Some("Phone Doctor".to_string()),
            address: None,
            city: None,
            postal_code: None,
            phone: None,
            email: None,
            website: None,
            confidence,
        };
        assert!(candidate_from_reply(reply(true, 0.5), &result, "Lyon").is_none());
        assert!(candidate_from_reply(reply(false, 0.9), &result, "Lyon").is_none());
        let accepted = candidate_from_reply(reply(true, 0.51), &result, "Lyon").unwrap();
        assert!(accepted.confidence_score > 0.5);
        assert!(accepted.ai_enriched);
        assert_eq!(accepted.source, constants::SOURCE_AI_CLASSIFICATION);
        assert_eq!(accepted.postal_code, constants::UNKNOWN_POSTAL_CODE);
        assert_eq!(accepted.website.as_deref(), Some(result.link.as_str()));
    }

    #[tokio::test]
    async fn test_ai_path_skips_failures_and_keeps_order() {
        let classifier = ScriptedClassifier::new(vec![
            Ok(r#"{"isRepairer": true, "name": "A", "postal_code": "69001", "confidence": 0.9}"#.to_string()),
            Err(PipelineError::Provider {
                provider: constants::DEEPSEEK,
                status: 500,
                body: String::new(),
            }),
            Ok("je ne sais pas".to_string()),
            Ok(r#"Résultat: {"isRepairer": false, "confidence": 0.9}"#.to_string()),
            Ok(r#"{"isRepairer": true, "name": "B", "confidence": 0.8}"#.to_string()),
        ]);
        let step = ClassifyStep::new(Some(Arc::new(classifier)));
        let results: Vec<RawSearchResult> = (0..5).map(|i| raw(&format!("r{}", i), "x")).collect();

        let candidates = step.run(results, "Lyon").await;
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(candidates.iter().all(|c| c.confidence_score > 0.5));
        assert_eq!(step.step_name(), constants::STEP_AI_CLASSIFICATION);
    }

    #[tokio::test]
    async fn test_fallback_output_never_exceeds_input() {
        let step = ClassifyStep::new(None);
        let results = vec![
            raw("Repair Lab - réparation", "iPhone"),
            raw("Fnac Bellecour", "réparation téléphone"),
            raw("Musée", "Visite"),
        ];
        let candidates = step.run(results, "Lyon").await;
        assert_eq!(candidates.len(), 1);
        assert!(candidates.iter().all(|c| c.confidence_score == 0.7 && !c.ai_enriched));
        assert_eq!(step.step_name(), constants::STEP_BASIC_CLASSIFICATION);
    }
}
