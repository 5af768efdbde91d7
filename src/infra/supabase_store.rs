use async_trait::async_trait;
use serde::Deserialize;

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::infra::http_client::ensure_success;
use crate::storage::{RecordStore, RepairerRecord};

/// Record store backed by a Supabase (PostgREST) table with a unique
/// constraint on `(name, postal_code)`.
pub struct SupabaseRecordStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
    table: String,
}

#[derive(Deserialize)]
struct CountRow {
    count: usize,
}

impl SupabaseRecordStore {
    pub fn new(client: reqwest::Client, base_url: &str, key: String, table: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
            table,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn upsert_request(&self, record: &RepairerRecord) -> Result<reqwest::Request> {
        let request = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "name,postal_code")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .build()?;
        Ok(request)
    }

    fn get_request(&self, name: &str, postal_code: &str) -> Result<reqwest::Request> {
        let name_filter = format!("eq.{}", name);
        let postal_filter = format!("eq.{}", postal_code);
        let request = self
            .authorized(self.client.get(self.table_url()))
            .query(&[
                ("select", "*"),
                ("name", name_filter.as_str()),
                ("postal_code", postal_filter.as_str()),
                ("limit", "1"),
            ])
            .build()?;
        Ok(request)
    }

    fn count_request(&self) -> Result<reqwest::Request> {
        let request = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("select", "count")])
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    async fn upsert(&self, record: &RepairerRecord) -> Result<()> {
        let resp = self.client.execute(self.upsert_request(record)?).await?;
        ensure_success(constants::SUPABASE, resp).await?;
        Ok(())
    }

    async fn get(&self, name: &str, postal_code: &str) -> Result<Option<RepairerRecord>> {
        let resp = self.client.execute(self.get_request(name, postal_code)?).await?;
        let resp = ensure_success(constants::SUPABASE, resp).await?;
        let mut rows: Vec<RepairerRecord> = resp.json().await?;
        Ok(rows.pop())
    }

    async fn count(&self) -> Result<usize> {
        let resp = self.client.execute(self.count_request()?).await?;
        let resp = ensure_success(constants::SUPABASE, resp).await?;
        let rows: Vec<CountRow> = resp.json().await?;
        rows.first()
            .map(|r| r.count)
            .ok_or_else(|| PipelineError::Store("count query returned no rows".to_string()))
    }
}
