use async_trait::async_trait;

use crate::domain::RawSearchResult;
use crate::error::Result;

/// Parameters for one web-search call.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub locale: String,
    pub num: u32,
}

#[async_trait]
pub trait SearchPort: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawSearchResult>>;
}

/// A generative model reached through a single-prompt completion call.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Provider name, for logs and metrics.
    fn provider(&self) -> &'static str;

    /// Send one user prompt and return the raw text of the reply.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait GeocoderPort: Send + Sync {
    /// Resolve a postal address to `(lat, lng)`; `Ok(None)` when nothing matched.
    async fn geocode(&self, address: &str, country_code: &str) -> Result<Option<(f64, f64)>>;
}

#[async_trait]
pub trait RateLimiterPort: Send + Sync {
    /// Called after every throttled provider call.
    async fn acquire(&self);
}
