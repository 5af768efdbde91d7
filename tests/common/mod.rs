//! Hand-written provider fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use repair_leads::app::ports::{CompletionPort, GeocoderPort, SearchPort, SearchQuery};
use repair_leads::config::PipelineSettings;
use repair_leads::constants;
use repair_leads::domain::RawSearchResult;
use repair_leads::error::{PipelineError, Result};
use repair_leads::infra::rate_limiter_adapter::RateLimiterAdapter;
use repair_leads::pipeline::{Pipeline, Providers};
use repair_leads::rate_limiter::RateLimiter;
use repair_leads::storage::{RecordStore, RepairerRecord};

pub fn result(title: &str, snippet: &str) -> RawSearchResult {
    RawSearchResult {
        title: title.to_string(),
        snippet: snippet.to_string(),
        link: format!("https://example.fr/{}", title.len()),
    }
}

/// 20 results: six repair shops (one of them a ghost listing) and fourteen
/// unrelated pages.
pub fn lyon_results() -> Vec<RawSearchResult> {
    let mut results = vec![
        result(
            "Phone Doctor - Réparation iPhone Lyon",
            "Réparation écran en 30 min, 69002 Lyon. 04 78 00 00 01",
        ),
        result("Lyon Repair Center | Smartphones", "Dépannage smartphone et tablette, 69003 Lyon"),
        result("Ghost Repair - Réparation téléphone", "Réparateur iPhone Lyon 7e"),
        result("Mobile Fix 69", "Réparation de téléphone portable toutes marques à Lyon"),
        result("iClinic Lyon - réparateur Apple", "Changement batterie iPhone, 69006 Lyon"),
        result("SOS Smartphone Villeurbanne", "Réparation smartphone, 69100 Villeurbanne"),
    ];
    for i in 0..14 {
        let title = format!("Restaurant Le Bouchon {}", i);
        results.push(result(&title, "Cuisine lyonnaise traditionnelle"));
    }
    results
}

/// Fixed organic results, optionally failing.
pub struct FakeSearch {
    pub results: Vec<RawSearchResult>,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn new(results: Vec<RawSearchResult>) -> Arc<Self> {
        Arc::new(Self { results, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl SearchPort for FakeSearch {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawSearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

/// Accepts results whose title mentions repair vocabulary.
pub struct FakeClassifier;

#[async_trait]
impl CompletionPort for FakeClassifier {
    fn provider(&self) -> &'static str {
        constants::DEEPSEEK
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let title = prompt
            .lines()
            .find_map(|l| l.trim().strip_prefix("Titre : "))
            .unwrap_or_default();
        let lowered = title.to_lowercase();
        let is_repairer = ["répar", "repair", "fix", "smartphone", "iclinic"]
            .iter()
            .any(|k| lowered.contains(k));
        let name = title.split(" - ").next().unwrap_or(title).split(" | ").next().unwrap_or(title);
        Ok(format!(
            "Voici l'analyse :\n```json\n{}\n```",
            serde_json::json!({
                "isRepairer": is_repairer,
                "name": name,
                "address": "1 rue de la République",
                "city": "Lyon",
                "postal_code": "69002",
                "confidence": if is_repairer { 0.6 } else { 0.1 },
            })
        ))
    }
}

/// Always rates quality 4 out of 10.
pub struct FakeEnricher;

#[async_trait]
impl CompletionPort for FakeEnricher {
    fn provider(&self) -> &'static str {
        constants::MISTRAL
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(r#"{"enhanced_description": "Atelier de réparation rapide.", "services": ["écran", "batterie"], "price_range": "€€", "quality_score": 4}"#.to_string())
    }
}

/// Rejects anything named "Ghost".
pub struct FakeValidator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionPort for FakeValidator {
    fn provider(&self) -> &'static str {
        constants::PERPLEXITY
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("\"Ghost") {
            Ok("INVALIDE : aucune trace de ce commerce.".to_string())
        } else {
            Ok("VALIDE : commerce référencé.".to_string())
        }
    }
}

/// Places everything in central Lyon.
pub struct FakeGeocoder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl GeocoderPort for FakeGeocoder {
    async fn geocode(&self, _address: &str, _country_code: &str) -> Result<Option<(f64, f64)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some((45.757_814_2, 4.832_011_3)))
    }
}

/// Every upsert fails.
pub struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn upsert(&self, _record: &RepairerRecord) -> Result<()> {
        Err(PipelineError::Store("connection refused".to_string()))
    }

    async fn get(&self, _name: &str, _postal_code: &str) -> Result<Option<RepairerRecord>> {
        Ok(None)
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Search plus geocoding only, as with just a search key configured.
pub fn search_only(search: Option<Arc<dyn SearchPort>>) -> Providers {
    Providers {
        search,
        classifier: None,
        enricher: None,
        validator: None,
        geocoder: Arc::new(FakeGeocoder { calls: AtomicUsize::new(0) }),
        geocode_limiter: Arc::new(RateLimiterAdapter(RateLimiter::unlimited())),
    }
}

/// Every provider configured.
pub fn all_providers(search: Arc<dyn SearchPort>) -> Providers {
    Providers {
        classifier: Some(Arc::new(FakeClassifier)),
        enricher: Some(Arc::new(FakeEnricher)),
        validator: Some(Arc::new(FakeValidator { calls: AtomicUsize::new(0) })),
        ..search_only(Some(search))
    }
}

pub fn pipeline(providers: Providers) -> Pipeline {
    Pipeline::new(providers, &PipelineSettings::default())
}
