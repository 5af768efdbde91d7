use crate::domain::Candidate;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Row shape written to the record store, unique on `(name, postal_code)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairerRecord {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub services: Vec<String>,
    pub price_range: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub confidence_score: f64,
    pub ai_enriched: bool,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl RepairerRecord {
    pub fn from_candidate(candidate: &Candidate, scraped_at: DateTime<Utc>) -> Self {
        Self {
            name: candidate.name.clone(),
            address: candidate.address.clone(),
            city: candidate.city.clone(),
            postal_code: candidate.postal_code.clone(),
            phone: candidate.phone.clone(),
            email: candidate.email.clone(),
            website: candidate.website.clone(),
            description: candidate.description.clone(),
            services: candidate.services.clone(),
            price_range: candidate.price_range.clone(),
            lat: candidate.lat,
            lng: candidate.lng,
            confidence_score: candidate.confidence_score,
            ai_enriched: candidate.ai_enriched,
            source: candidate.source.clone(),
            scraped_at,
        }
    }
}

/// Upsert-capable sink for pipeline results.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert the record, or overwrite the existing row with the same
    /// `(name, postal_code)`.
    async fn upsert(&self, record: &RepairerRecord) -> Result<()>;

    async fn get(&self, name: &str, postal_code: &str) -> Result<Option<RepairerRecord>>;

    async fn count(&self) -> Result<usize>;
}

/// In-memory record store for development/testing
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<(String, String), RepairerRecord>>,
    writes: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upserts received, including overwrites.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: &RepairerRecord) -> Result<()> {
        let key = (record.name.clone(), record.postal_code.clone());
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let replaced = records.insert(key, record.clone()).is_some();
        self.writes.fetch_add(1, Ordering::SeqCst);

        debug!(name = %record.name, postal_code = %record.postal_code, replaced, "Upserted record");
        Ok(())
    }

    async fn get(&self, name: &str, postal_code: &str) -> Result<Option<RepairerRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(&(name.to_string(), postal_code.to_string()))
            .cloned())
    }

    async fn count(&self) -> Result<usize> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.len())
    }
}
