/// Provider, source-tag and tuning constants shared across the pipeline.

// Environment variable names for provider credentials
pub const SERPER_API_KEY_ENV: &str = "SERPER_API_KEY";
pub const DEEPSEEK_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const MISTRAL_API_KEY_ENV: &str = "MISTRAL_API_KEY";
pub const PERPLEXITY_API_KEY_ENV: &str = "PERPLEXITY_API_KEY";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

// Provider names (used in logs, metrics labels and error messages)
pub const SERPER: &str = "serper";
pub const DEEPSEEK: &str = "deepseek";
pub const MISTRAL: &str = "mistral";
pub const PERPLEXITY: &str = "perplexity";
pub const NOMINATIM: &str = "nominatim";
pub const SUPABASE: &str = "supabase";

// Candidate source tags
pub const SOURCE_AI_CLASSIFICATION: &str = "deepseek_classification";
pub const SOURCE_BASIC_CLASSIFICATION: &str = "basic_classification";
pub const SOURCE_MULTI_AI: &str = "multi_ai_pipeline";

// Pipeline step names reported in response metadata
pub const STEP_SEARCH: &str = "serper_search";
pub const STEP_AI_CLASSIFICATION: &str = "deepseek_classification";
pub const STEP_BASIC_CLASSIFICATION: &str = "basic_classification";
pub const STEP_ENRICHMENT: &str = "mistral_enrichment";
pub const STEP_VALIDATION: &str = "perplexity_validation";
pub const STEP_GEOCODING: &str = "nominatim_geocoding";

/// Postal code used when none could be determined.
pub const UNKNOWN_POSTAL_CODE: &str = "00000";

pub const DEFAULT_VALIDATION_LIMIT: usize = 10;
pub const DEFAULT_SEARCH_RESULTS: u32 = 20;
pub const DEFAULT_GEOCODE_DELAY_MS: u64 = 1000;

/// Classifier replies at or below this confidence are rejected.
pub const AI_CONFIDENCE_GATE: f64 = 0.5;
pub const BASIC_CLASSIFICATION_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const VALIDATION_BONUS: f64 = 0.2;

// Validation verdict markers
pub const VERDICT_VALID: &str = "VALIDE";
pub const VERDICT_INVALID: &str = "INVALIDE";

/// Terms that suggest a device repair business.
pub const REPAIR_KEYWORDS: &[&str] = &[
    "réparation",
    "reparation",
    "réparateur",
    "reparateur",
    "repair",
    "dépannage",
    "depannage",
    "écran cassé",
    "ecran casse",
    "remplacement écran",
    "changement batterie",
    "smartphone",
    "iphone",
    "téléphone",
    "telephone",
];

/// Pure retail chains and network operators, never independent repairers.
/// Matched on whole words only.
pub const EXCLUDED_KEYWORDS: &[&str] = &[
    "boutique orange",
    "sfr",
    "bouygues",
    "free mobile",
    "fnac",
    "darty",
    "boulanger",
    "amazon",
    "cdiscount",
    "leboncoin",
    "pagesjaunes",
    "forfait",
    "forfaits",
];
