use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::rate_limiter::Limits;

/// Full runtime configuration: provider credentials from the environment plus
/// tunables from an optional TOML file.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub keys: ProviderKeys,
    pub settings: Settings,
}

/// Provider credentials. Each is optional; only `search_key` is required to run.
#[derive(Clone, Default)]
pub struct ProviderKeys {
    pub search_key: Option<String>,
    pub classifier_key: Option<String>,
    pub enricher_key: Option<String>,
    pub validator_key: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

// Keys never reach the logs.
impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("search_key", &self.search_key.is_some())
            .field("classifier_key", &self.classifier_key.is_some())
            .field("enricher_key", &self.enricher_key.is_some())
            .field("validator_key", &self.validator_key.is_some())
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.is_some())
            .finish()
    }
}

impl ProviderKeys {
    /// Read credentials from the process environment. Blank values count as absent.
    pub fn from_env() -> Self {
        Self {
            search_key: env_key(constants::SERPER_API_KEY_ENV),
            classifier_key: env_key(constants::DEEPSEEK_API_KEY_ENV),
            enricher_key: env_key(constants::MISTRAL_API_KEY_ENV),
            validator_key: env_key(constants::PERPLEXITY_API_KEY_ENV),
            supabase_url: env_key(constants::SUPABASE_URL_ENV),
            supabase_key: env_key(constants::SUPABASE_KEY_ENV),
        }
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineSettings,
    pub http: HttpSettings,
    pub providers: ProviderSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// How many candidates the validation stage examines; the rest pass through.
    pub validation_limit: usize,
    pub search_results: u32,
    pub locale: String,
    pub country_code: String,
    pub country_name: String,
    /// Throttle applied after every geocoding call.
    pub geocode_throttle: ThrottleSettings,
}

/// Throttling policy as written in the settings file, e.g.
/// `geocode_throttle = { policy = "token_bucket", requests = 60, period_ms = 60000 }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ThrottleSettings {
    FixedDelay { delay_ms: u64 },
    TokenBucket { requests: u32, period_ms: u64 },
    Unlimited,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        ThrottleSettings::FixedDelay {
            delay_ms: constants::DEFAULT_GEOCODE_DELAY_MS,
        }
    }
}

impl ThrottleSettings {
    pub fn limits(&self) -> Limits {
        match self {
            ThrottleSettings::FixedDelay { delay_ms } => {
                Limits::FixedDelay(Duration::from_millis(*delay_ms))
            }
            ThrottleSettings::TokenBucket {
                requests,
                period_ms,
            } => Limits::TokenBucket {
                requests: *requests,
                period: Duration::from_millis(*period_ms),
            },
            ThrottleSettings::Unlimited => Limits::Unlimited,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            validation_limit: constants::DEFAULT_VALIDATION_LIMIT,
            search_results: constants::DEFAULT_SEARCH_RESULTS,
            locale: "fr".to_string(),
            country_code: "fr".to_string(),
            country_name: "France".to_string(),
            geocode_throttle: ThrottleSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("repair-leads/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub search_url: String,
    pub classifier_url: String,
    pub classifier_model: String,
    pub enricher_url: String,
    pub enricher_model: String,
    pub validator_url: String,
    pub validator_model: String,
    pub geocoder_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            search_url: "https://google.serper.dev/search".to_string(),
            classifier_url: "https://api.deepseek.com/chat/completions".to_string(),
            classifier_model: "deepseek-chat".to_string(),
            enricher_url: "https://api.mistral.ai/v1/chat/completions".to_string(),
            enricher_model: "mistral-large-latest".to_string(),
            validator_url: "https://api.perplexity.ai/chat/completions".to_string(),
            validator_model: "sonar".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org/search".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub table: String,
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            table: "repairers".to_string(),
            sqlite_path: "data/repairers.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        if let ThrottleSettings::TokenBucket {
            requests,
            period_ms,
        } = settings.pipeline.geocode_throttle
        {
            if requests == 0 || period_ms == 0 {
                return Err(PipelineError::Config(
                    "token_bucket throttle needs non-zero requests and period_ms".to_string(),
                ));
            }
        }
        if settings.http.timeout_seconds == 0 {
            return Err(PipelineError::Config(
                "http.timeout_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(settings)
    }
}

impl Config {
    /// Load `.env`, read credentials from the environment and settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();
        Ok(Self {
            keys: ProviderKeys::from_env(),
            settings: Settings::load(path)?,
        })
    }
}
