use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::app::ports::{SearchPort, SearchQuery};
use crate::constants;
use crate::domain::RawSearchResult;
use crate::error::Result;
use crate::infra::http_client::ensure_success;

/// Web search through the Serper API.
pub struct SerperSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<RawSearchResult>,
}

impl SerperSearch {
    pub fn new(client: reqwest::Client, endpoint: String, api_key: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }

    fn search_request(&self, query: &SearchQuery) -> Result<reqwest::Request> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({
                "q": query.q,
                "gl": query.locale,
                "hl": query.locale,
                "num": query.num,
            }))
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl SearchPort for SerperSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawSearchResult>> {
        debug!(q = %query.q, num = query.num, "querying serper");
        let resp = self.client.execute(self.search_request(query)?).await?;
        let resp = ensure_success(constants::SERPER, resp).await?;
        let body: SerperResponse = resp.json().await?;
        Ok(body.organic)
    }
}
