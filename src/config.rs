use crate::types::{PostsmithError, Result};
use std::env;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_SEARCH_API_URL: &str = "https://api.tavily.com/search";

/// Process-wide configuration, built once in `main` and passed by reference
/// into every component. Components never read the environment themselves.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base_url: String,

    // Model selection: a cheaper model for per-batch work, a stronger one for
    // synthesis and composition.
    pub batch_model: String,
    pub synthesis_model: String,
    pub compose_model: String,
    pub critique_model: String,
    pub research_model: String,

    pub analysis_temperature: f32,
    pub compose_temperature: f32,
    pub critique_temperature: f32,
    pub max_tokens: u32,

    pub batch_size: usize,
    /// Rough per-request input budget, in tokens (chars/4 heuristic).
    pub prompt_token_budget: usize,

    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,

    /// Optional web-search credential. Absence is not fatal; the composer
    /// falls back to model-internal knowledge.
    pub search_api_key: Option<String>,
    pub search_api_url: String,

    pub posts_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,

    // Advisory only: included in prompts, never enforced on output.
    pub max_post_chars: usize,
    pub max_hashtags: usize,
}

impl AppConfig {
    /// Build config from the environment. A missing API key is the one fatal
    /// case; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| PostsmithError::Config("OPENAI_API_KEY not set".to_string()))?;
        if api_key.trim().is_empty() {
            return Err(PostsmithError::Config("OPENAI_API_KEY is empty".to_string()));
        }

        let search_api_key = env::var("SEARCH_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if search_api_key.is_none() {
            warn!("SEARCH_API_KEY not configured; research will rely on model-internal knowledge only");
        }

        Ok(Self {
            api_key,
            api_base_url: env_or("API_BASE_URL", DEFAULT_API_BASE_URL),
            batch_model: env_or("ANALYZER_BATCH_MODEL", "gpt-4o-mini"),
            synthesis_model: env_or("ANALYZER_SYNTHESIS_MODEL", "gpt-4o"),
            compose_model: env_or("COMPOSITION_MODEL", "gpt-4o"),
            critique_model: env_or("CRITIQUE_MODEL", "gpt-4o-mini"),
            research_model: env_or("RESEARCH_MODEL", "gpt-4o-mini"),
            analysis_temperature: parse_or("ANALYSIS_TEMPERATURE", 0.3)?,
            compose_temperature: parse_or("COMPOSE_TEMPERATURE", 0.7)?,
            critique_temperature: parse_or("CRITIQUE_TEMPERATURE", 0.2)?,
            max_tokens: parse_or("MAX_TOKENS", 2000)?,
            batch_size: parse_or("ANALYSIS_BATCH_SIZE", 5)?,
            prompt_token_budget: parse_or("PROMPT_TOKEN_BUDGET", 6000)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 60)?,
            max_retries: parse_or("MAX_RETRIES", 3)?,
            retry_delay_secs: parse_or("RETRY_DELAY_SECS", 5)?,
            search_api_key,
            search_api_url: env_or("SEARCH_API_URL", DEFAULT_SEARCH_API_URL),
            posts_dir: PathBuf::from(env_or("POSTS_DIR", "posts")),
            input_dir: PathBuf::from(env_or("INPUT_DIR", "input")),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "output")),
            max_post_chars: parse_or("MAX_POST_CHARS", 3000)?,
            max_hashtags: parse_or("MAX_HASHTAGS", 5)?,
        })
    }

    /// Config for tests and offline runs; no credentials, small limits.
    pub fn for_testing() -> Self {
        Self {
            api_key: "test-key".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            batch_model: "batch-model".to_string(),
            synthesis_model: "synthesis-model".to_string(),
            compose_model: "compose-model".to_string(),
            critique_model: "critique-model".to_string(),
            research_model: "research-model".to_string(),
            analysis_temperature: 0.3,
            compose_temperature: 0.7,
            critique_temperature: 0.2,
            max_tokens: 512,
            batch_size: 2,
            prompt_token_budget: 2000,
            request_timeout_secs: 5,
            max_retries: 1,
            retry_delay_secs: 0,
            search_api_key: None,
            search_api_url: DEFAULT_SEARCH_API_URL.to_string(),
            posts_dir: PathBuf::from("posts"),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            max_post_chars: 3000,
            max_hashtags: 5,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PostsmithError::Config(format!("{} has invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
