use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::CompletionPort;
use crate::constants;
use crate::domain::Candidate;
use crate::observability::metrics;

/// Outcome of asking the web-grounded validator about one business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    Ambiguous,
}

/// Read a verdict out of a free-text reply. "INVALIDE" contains "VALIDE",
/// so the negative marker is checked first.
pub fn read_verdict(reply: &str) -> Verdict {
    if reply.contains(constants::VERDICT_INVALID) {
        Verdict::Invalid
    } else if reply.contains(constants::VERDICT_VALID) {
        Verdict::Valid
    } else {
        Verdict::Ambiguous
    }
}

/// Apply a verdict: `None` means the candidate is discarded.
pub fn apply_verdict(mut candidate: Candidate, verdict: Verdict) -> Option<Candidate> {
    match verdict {
        Verdict::Invalid => None,
        Verdict::Valid => {
            candidate.confidence_score =
                (candidate.confidence_score + constants::VALIDATION_BONUS).min(1.0);
            Some(candidate)
        }
        Verdict::Ambiguous => Some(candidate),
    }
}

/// Confirms real-world existence for the first `limit` candidates.
/// Candidates past the limit are appended unvalidated.
pub struct ValidateStep {
    validator: Option<Arc<dyn CompletionPort>>,
    limit: usize,
}

impl ValidateStep {
    pub fn new(validator: Option<Arc<dyn CompletionPort>>, limit: usize) -> Self {
        Self { validator, limit }
    }

    pub fn is_configured(&self) -> bool {
        self.validator.is_some()
    }

    pub fn step_name(&self) -> &'static str {
        constants::STEP_VALIDATION
    }

    #[instrument(skip(self, candidates), fields(input = candidates.len(), limit = self.limit))]
    pub async fn run(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let Some(validator) = &self.validator else {
            return candidates;
        };

        let input = candidates.len();
        let mut kept = Vec::with_capacity(input);
        let mut remaining = candidates.into_iter();

        for candidate in remaining.by_ref().take(self.limit) {
            let verdict = match validator.complete(&validation_prompt(&candidate)).await {
                Ok(reply) => read_verdict(&reply),
                Err(e) => {
                    warn!("Validation failed for '{}': {}", candidate.name, e);
                    metrics::provider::error(validator.provider());
                    Verdict::Ambiguous
                }
            };
            debug!("'{}' judged {:?}", candidate.name, verdict);
            match apply_verdict(candidate, verdict) {
                Some(candidate) => kept.push(candidate),
                None => metrics::stage::validation_discarded(),
            }
        }
        kept.extend(remaining);

        info!("✅ Validation kept {}/{} candidates", kept.len(), input);
        metrics::stage::items(self.step_name(), input, kept.len());
        kept
    }
}

fn validation_prompt(candidate: &Candidate) -> String {
    let mut location = String::new();
    if !candidate.address.is_empty() {
        location.push_str(&candidate.address);
        location.push_str(", ");
    }
    if candidate.has_known_postal_code() {
        location.push_str(&candidate.postal_code);
        location.push(' ');
    }
    location.push_str(&candidate.city);

    format!(
        "Vérifie sur le web si l'entreprise de réparation \"{name}\" située {location} existe \
         réellement et est toujours en activité{website}.\n\
         Réponds par VALIDE si elle existe et est active, INVALIDE si elle n'existe pas ou est fermée, \
         suivi d'une courte justification.",
        name = candidate.name,
        location = location.trim(),
        website = candidate
            .website
            .as_deref()
            .map(|w| format!(" (site : {})", w))
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, Result};
    use async_trait::async_trait;

    /// Replies INVALIDE for names starting with "Fake", errors for "Down",
    /// an inconclusive reply for "Maybe", VALIDE otherwise.
    struct NameJudge {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl CompletionPort for NameJudge {
        fn provider(&self) -> &'static str {
            constants::PERPLEXITY
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if prompt.contains("\"Fake") {
                Ok("INVALIDE - aucune trace de cette entreprise".to_string())
            } else if prompt.contains("\"Down") {
                Err(PipelineError::Provider {
                    provider: constants::PERPLEXITY,
                    status: 502,
                    body: String::new(),
                })
            } else if prompt.contains("\"Maybe") {
                Ok("Je n'ai pas trouvé d'information fiable.".to_string())
            } else {
                Ok("VALIDE. L'entreprise est référencée.".to_string())
            }
        }
    }

    fn judge() -> Arc<NameJudge> {
        Arc::new(NameJudge { calls: std::sync::atomic::AtomicUsize::new(0) })
    }

    fn candidate(name: &str, confidence: f64) -> Candidate {
        let mut c = Candidate::new(name, constants::SOURCE_MULTI_AI);
        c.city = "Lyon".to_string();
        c.confidence_score = confidence;
        c
    }

    #[test]
    fn test_read_verdict() {
        assert_eq!(read_verdict("INVALIDE"), Verdict::Invalid);
        assert_eq!(read_verdict("Réponse : VALIDE"), Verdict::Valid);
        assert_eq!(read_verdict("valide"), Verdict::Ambiguous);
        assert_eq!(read_verdict(""), Verdict::Ambiguous);
    }

    #[test]
    fn test_valid_adds_exactly_bonus_capped() {
        let out = apply_verdict(candidate("A", 0.6), Verdict::Valid).unwrap();
        assert!((out.confidence_score - 0.8).abs() < 1e-9);
        let out = apply_verdict(candidate("A", 0.95), Verdict::Valid).unwrap();
        assert_eq!(out.confidence_score, 1.0);
        assert!(apply_verdict(candidate("A", 0.95), Verdict::Invalid).is_none());
        assert_eq!(
            apply_verdict(candidate("A", 0.6), Verdict::Ambiguous).unwrap(),
            candidate("A", 0.6)
        );
    }

    #[tokio::test]
    async fn test_invalid_removed_errors_and_ambiguous_kept() {
        let step = ValidateStep::new(Some(judge()), 10);
        let input = vec![
            candidate("Real", 0.6),
            candidate("Fake Shop", 0.9),
            candidate("Down Shop", 0.7),
            candidate("Maybe Shop", 0.65),
        ];
        let output = step.run(input).await;
        let names: Vec<&str> = output.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Real", "Down Shop", "Maybe Shop"]);
        assert!((output[0].confidence_score - 0.8).abs() < 1e-9);
        assert_eq!(output[1].confidence_score, 0.7);
        assert_eq!(output[2].confidence_score, 0.65);
    }

    #[tokio::test]
    async fn test_tail_beyond_limit_is_passed_through_untouched() {
        let judge = judge();
        let step = ValidateStep::new(Some(judge.clone()), 10);
        let input: Vec<Candidate> = (0..13)
            .map(|i| candidate(&format!("Fake {}", i), 0.6))
            .collect();
        let output = step.run(input.clone()).await;

        // first ten judged INVALIDE, last three never examined
        assert_eq!(output, input[10..].to_vec());
        assert_eq!(judge.calls.load(std::sync::atomic::Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_unconfigured_is_noop() {
        let step = ValidateStep::new(None, 10);
        let input = vec![candidate("Fake", 0.6)];
        assert_eq!(step.run(input.clone()).await, input);
    }
}
